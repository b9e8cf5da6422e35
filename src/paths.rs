//! Centralized path resolution for nuage
//!
//! # Environment Variables
//!
//! - `NUAGE_CONFIG_DIR` - Directory holding `nuage.toml`
//! - `NUAGE_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `NUAGE_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/nuage` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\nuage`
//!    - macOS/Linux: `~/.local/state/nuage`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "NUAGE_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "NUAGE_STATE_DIR";

/// Directory named by `NUAGE_CONFIG_DIR`, if set
pub fn config_dir_override() -> Option<PathBuf> {
    config_dir_from(|key| std::env::var(key).ok())
}

fn config_dir_from<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let dir = lookup(ENV_CONFIG_DIR)?;
    let path = expand(&dir);
    log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
    Some(path)
}

/// Get the nuage state directory path
pub fn state_dir() -> Result<PathBuf> {
    state_dir_from(|key| std::env::var(key).ok())
}

fn state_dir_from<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    // 1. Check environment variable override
    if let Some(dir) = lookup(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    // 2. Check XDG_STATE_HOME
    if let Some(xdg_state) = lookup("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("nuage");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    // 3. Platform default
    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join("nuage");
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    // Unix default: ~/.local/state/nuage
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("nuage");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
