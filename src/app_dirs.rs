use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "colormem";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Directory for mutable game state (highscore, history, log).
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(APP_NAME),
            )
        } else {
            ProjectDirs::from("", "", APP_NAME).map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn highscore_path() -> PathBuf {
        Self::state_dir()
            .map(|d| d.join("highscore.txt"))
            .unwrap_or_else(|| PathBuf::from("colormem_highscore.txt"))
    }

    pub fn history_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("history.csv"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("colormem.log"))
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("colormem_config.json"))
    }
}
