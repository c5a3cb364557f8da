use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::{Error, Result};
use crate::palette::DEFAULT_ACTIVE;

/// Largest accepted seconds-per-round factor.
pub const MAX_TIMER_FACTOR: f64 = 600.0;

/// Accept finite factors in `(0, MAX_TIMER_FACTOR]`.
pub fn validate_timer_factor(factor: f64) -> Result<f64> {
    if factor.is_finite() && factor > 0.0 && factor <= MAX_TIMER_FACTOR {
        Ok(factor)
    } else {
        Err(Error::InvalidTimerFactor(factor))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Seconds granted per round of sequence length.
    pub timer_factor: f64,
    pub timer_enabled: bool,
    pub active_colors: Vec<String>,
    pub player_name: String,
    /// Program and arguments that play the background music once.
    pub music_command: Option<Vec<String>>,
    /// Ring the terminal bell on success/failure.
    pub bell: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer_factor: 3.0,
            timer_enabled: false,
            active_colors: DEFAULT_ACTIVE.iter().map(|s| s.to_string()).collect(),
            player_name: "Player".to_string(),
            music_command: None,
            bell: true,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(mut cfg) => {
                    if let Err(e) = validate_timer_factor(cfg.timer_factor) {
                        tracing::warn!(error = %e, "using default timer factor");
                        cfg.timer_factor = Config::default().timer_factor;
                    }
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "ignoring unreadable config"
                    )
                }
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            timer_factor: 2.5,
            timer_enabled: true,
            active_colors: vec!["Red".into(), "Gray".into()],
            player_name: "Ada".into(),
            music_command: Some(vec!["aplay".into(), "music.wav".into()]),
            bell: false,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"timer_enabled": true}"#).unwrap();

        let loaded = FileConfigStore::with_path(&path).load();
        assert!(loaded.timer_enabled);
        assert_eq!(loaded.timer_factor, 3.0);
        assert_eq!(loaded.active_colors.len(), DEFAULT_ACTIVE.len());
    }

    #[test]
    fn out_of_range_timer_factor_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"timer_factor": -4.0, "timer_enabled": true}"#).unwrap();

        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.timer_factor, 3.0);
        assert!(loaded.timer_enabled);

        fs::write(&path, r#"{"timer_factor": 1e308}"#).unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load().timer_factor, 3.0);
    }

    #[test]
    fn timer_factor_bounds() {
        assert_eq!(validate_timer_factor(2.5).unwrap(), 2.5);
        assert_eq!(validate_timer_factor(MAX_TIMER_FACTOR).unwrap(), MAX_TIMER_FACTOR);
        for bad in [0.0, -1.0, f64::INFINITY, f64::NAN, MAX_TIMER_FACTOR + 1.0] {
            assert!(validate_timer_factor(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn garbage_config_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{{{").unwrap();

        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }
}
