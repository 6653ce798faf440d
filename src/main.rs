// Copyright 2026 Meterport Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use meterport::cli;
use meterport::config::Overrides;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "meterport",
    about = "Meterport — hourly energy report exporter for the Caruna Plus portal",
    version,
    after_help = "Run 'meterport <command> --help' for details on each command.\nRun 'meterport' with no command to fetch with environment configuration."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON records
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the hourly report and write normalized JSON
    Fetch {
        /// Report range start, YYYY-MM-DD (falls back to METERPORT_START_DATE)
        #[arg(long)]
        start_date: Option<String>,
        /// Report range end, YYYY-MM-DD (falls back to METERPORT_END_DATE)
        #[arg(long)]
        end_date: Option<String>,
        /// Output JSON path (falls back to METERPORT_OUTPUT)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Run with a visible browser window
        #[arg(long)]
        headful: bool,
        /// Delay between interactions in milliseconds
        #[arg(long)]
        slow_mo: Option<u64>,
        /// Navigation/visibility timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "meterport=debug"
    } else if cli.quiet {
        "meterport=warn"
    } else {
        "meterport=info"
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(default_level.parse().unwrap());
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match cli.command {
        // No subcommand → fetch with environment configuration
        None => cli::fetch_cmd::run(Overrides::default()).await,

        Some(Commands::Fetch {
            start_date,
            end_date,
            output,
            headful,
            slow_mo,
            timeout,
        }) => {
            cli::fetch_cmd::run(Overrides {
                start_date,
                end_date,
                output,
                headful,
                slow_mo_ms: slow_mo,
                nav_timeout_ms: timeout,
            })
            .await
        }
        Some(Commands::Doctor) => cli::doctor::run().await,
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "meterport", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        error!("{e:#}");
        std::process::exit(1);
    }

    result
}
