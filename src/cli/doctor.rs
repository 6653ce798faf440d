//! Environment readiness check.

use crate::config::{self, Overrides, Settings};
use crate::renderer::chromium::find_chromium;
use crate::session;
use anyhow::Result;

/// Check Chromium availability, credentials, and writable paths.
pub async fn run() -> Result<()> {
    println!("Meterport Doctor");
    println!("================");
    println!();

    // OS and architecture
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Check Chromium
    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set {}.",
            config::CHROMIUM_PATH_VAR
        ),
    }

    // Check credentials
    let creds_ok = std::env::var(config::USERNAME_VAR).is_ok()
        && std::env::var(config::PASSWORD_VAR).is_ok();
    if creds_ok {
        println!("[OK] Portal credentials are set");
    } else {
        println!(
            "[!!] Missing {} or {} in environment",
            config::USERNAME_VAR,
            config::PASSWORD_VAR
        );
    }

    // Check date range
    match Settings::resolve(&Overrides::default()) {
        Ok(settings) => println!(
            "[OK] Report range: {} .. {}",
            settings.range.start, settings.range.end
        ),
        Err(e) => println!("[!!] Configuration incomplete: {e:#}"),
    }

    // Check session state
    let state_file = std::env::var(config::STATE_FILE_VAR)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| session::default_state_file());
    if state_file.exists() {
        println!("[OK] Session state present: {}", state_file.display());
    } else {
        println!(
            "[??] No saved session state ({}); first run will log in",
            state_file.display()
        );
    }

    println!();
    let ready = chromium_path.is_some() && creds_ok;
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
