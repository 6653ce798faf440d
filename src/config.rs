//! Runtime settings resolved from `METERPORT_*` environment variables.
//!
//! CLI flags override their environment counterparts; credentials are
//! environment-only. Resolution is fail-fast: missing credentials or an
//! invalid date range abort the run before any browser work starts.

use crate::dates::{parse_date_range, DateRange};
use crate::session;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const USERNAME_VAR: &str = "METERPORT_USERNAME";
pub const PASSWORD_VAR: &str = "METERPORT_PASSWORD";
pub const START_DATE_VAR: &str = "METERPORT_START_DATE";
pub const END_DATE_VAR: &str = "METERPORT_END_DATE";
pub const OUTPUT_VAR: &str = "METERPORT_OUTPUT";
pub const NAV_TIMEOUT_VAR: &str = "METERPORT_NAV_TIMEOUT_MS";
pub const DEBUG_VAR: &str = "METERPORT_DEBUG";
pub const SLOWMO_VAR: &str = "METERPORT_SLOWMO_MS";
pub const STATE_FILE_VAR: &str = "METERPORT_STATE_FILE";
pub const DOWNLOAD_DIR_VAR: &str = "METERPORT_DOWNLOAD_DIR";
pub const SCREENSHOT_DIR_VAR: &str = "METERPORT_SCREENSHOT_DIR";
pub const CHROMIUM_PATH_VAR: &str = "METERPORT_CHROMIUM_PATH";

const DEFAULT_NAV_TIMEOUT_MS: u64 = 5000;

/// CLI-level overrides for environment configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub output: Option<PathBuf>,
    pub headful: bool,
    pub slow_mo_ms: Option<u64>,
    pub nav_timeout_ms: Option<u64>,
}

/// Fully resolved run settings.
#[derive(Debug)]
pub struct Settings {
    pub username: String,
    pub password: String,
    pub range: DateRange,
    pub output_path: PathBuf,
    pub nav_timeout: Duration,
    pub headful: bool,
    pub slow_mo: Duration,
    pub state_file: PathBuf,
    pub download_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub chromium_path: Option<PathBuf>,
}

impl Settings {
    /// Resolve settings from the environment plus CLI overrides.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let username = env_opt(USERNAME_VAR);
        let password = env_opt(PASSWORD_VAR);
        let (username, password) = match (username, password) {
            (Some(u), Some(p)) => (u, p),
            _ => bail!("missing {USERNAME_VAR} or {PASSWORD_VAR} in environment variables"),
        };

        let start = overrides
            .start_date
            .clone()
            .or_else(|| env_opt(START_DATE_VAR));
        let end = overrides.end_date.clone().or_else(|| env_opt(END_DATE_VAR));
        let range = parse_date_range(start.as_deref(), end.as_deref())?;

        let nav_timeout_ms = match overrides.nav_timeout_ms {
            Some(ms) => ms,
            None => env_parsed(NAV_TIMEOUT_VAR)?.unwrap_or(DEFAULT_NAV_TIMEOUT_MS),
        };
        let slow_mo_ms = match overrides.slow_mo_ms {
            Some(ms) => ms,
            None => env_parsed(SLOWMO_VAR)?.unwrap_or(0),
        };

        let output_path = overrides
            .output
            .clone()
            .or_else(|| env_opt(OUTPUT_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("output.json"));

        let state_file = env_opt(STATE_FILE_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(session::default_state_file);

        let download_dir = env_opt(DOWNLOAD_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::temp_dir().join(format!("meterport-dl-{}", std::process::id()))
            });

        let screenshot_dir = env_opt(SCREENSHOT_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Settings {
            username,
            password,
            range,
            output_path,
            nav_timeout: Duration::from_millis(nav_timeout_ms),
            headful: overrides.headful || env_flag(DEBUG_VAR),
            slow_mo: Duration::from_millis(slow_mo_ms),
            state_file,
            download_dir,
            screenshot_dir,
            chromium_path: env_opt(CHROMIUM_PATH_VAR).map(PathBuf::from),
        })
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    matches!(env_opt(name).as_deref(), Some("1") | Some("true"))
}

fn env_parsed(name: &str) -> Result<Option<u64>> {
    match env_opt(name) {
        Some(raw) => {
            let value = raw
                .parse::<u64>()
                .with_context(|| format!("{name} must be an integer, got \"{raw}\""))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
