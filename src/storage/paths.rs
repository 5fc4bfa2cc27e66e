//! Application paths for config and data.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory (spend history).
    pub data: PathBuf,
}

impl AppPaths {
    /// Platform paths for tokenmeter.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("com", "tokenmeter", "tokenmeter") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            // No home directory; fall back to the working directory.
            let home = directories::BaseDirs::new()
                .map_or_else(|| PathBuf::from("."), |d| d.home_dir().to_path_buf());
            Self {
                config: home.join(".config/tokenmeter"),
                data: home.join(".local/share/tokenmeter"),
            }
        }
    }

    /// Path to the config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Path to the daily spend history.
    #[must_use]
    pub fn spend_history_file(&self) -> PathBuf {
        self.data.join("daily-spend.json")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
