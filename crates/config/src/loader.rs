use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::schema::PalaverConfig;

const CONFIG_FILENAME: &str = "palaver.toml";

/// Load config from the given TOML file.
pub fn load_config(path: &Path) -> anyhow::Result<PalaverConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let config = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./palaver.toml` (project-local)
/// 2. `~/.config/palaver/palaver.toml` (user-global)
///
/// Returns `PalaverConfig::default()` if no config file is found; a file
/// that fails to parse is warn-logged and also falls back to defaults.
#[must_use]
pub fn discover_and_load() -> PalaverConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(config) => return config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    PalaverConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "palaver") {
        let global = dirs.config_dir().join(CONFIG_FILENAME);
        if global.exists() {
            return Some(global);
        }
    }

    None
}

/// Default base directory for file-backed session storage
/// (`<user data dir>/palaver/sessions`).
#[must_use]
pub fn default_sessions_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "palaver")
        .map(|dirs| dirs.data_dir().join("sessions"))
}
