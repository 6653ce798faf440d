//! Login session persistence.
//!
//! After a successful login the page's cookies are snapshotted to a state
//! file, so the next run can skip the login form while the portal session
//! is still valid. The snapshot is opaque JSON produced by the driver; a
//! corrupt or unreadable file is ignored with a warning, not an error.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default state file location: `~/.meterport/state.json`.
pub fn default_state_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".meterport")
        .join("state.json")
}

/// Load a previously saved session state. Returns `None` when the file is
/// absent or unreadable.
pub fn load(path: &Path) -> Option<serde_json::Value> {
    if !path.exists() {
        return None;
    }
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), "failed to read session state: {e}");
            return None;
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(path = %path.display(), "ignoring corrupt session state: {e}");
            None
        }
    }
}

/// Persist a session state snapshot, creating parent directories as needed.
pub fn save(path: &Path, state: &serde_json::Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(state).context("failed to serialize session state")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write session state to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");

        let state = json!({ "cookies": [{ "name": "sid", "value": "abc" }] });
        save(&path, &state).unwrap();

        assert_eq!(load(&path), Some(state));
    }

    #[test]
    fn test_missing_state_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("absent.json")), None);
    }

    #[test]
    fn test_corrupt_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert_eq!(load(&path), None);
    }
}
