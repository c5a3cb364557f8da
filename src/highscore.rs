use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::app_dirs::AppDirs;
use crate::error::Result;

/// Best completed round, optionally attributed to a player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighscoreRecord {
    pub best_round: u32,
    pub player: Option<String>,
}

impl HighscoreRecord {
    pub fn new(best_round: u32, player: Option<String>) -> Self {
        Self { best_round, player }
    }
}

/// Structured encoding, also accepted when reading older files.
#[derive(Debug, Serialize, Deserialize)]
struct StoredScore {
    score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    player: Option<String>,
}

/// Durable single-value persistence for the best round.
///
/// Loading never fails: missing or corrupt data reads as zero. Saving is
/// advisory, the in-memory value stays authoritative for the running game.
pub trait HighscoreStore {
    fn load(&self) -> HighscoreRecord;
    fn try_save(&self, record: &HighscoreRecord) -> Result<()>;

    fn save(&self, record: &HighscoreRecord) {
        if let Err(e) = self.try_save(record) {
            tracing::warn!(error = %e, "failed to persist highscore");
        }
    }

    fn reset(&self) {
        self.save(&HighscoreRecord::default());
    }
}

/// Parse highscore file content, degrading to zero on anything unreadable.
pub fn parse_record(raw: &str) -> HighscoreRecord {
    let raw = raw.trim();
    if raw.is_empty() {
        return HighscoreRecord::default();
    }
    if let Ok(value) = raw.parse::<i64>() {
        return HighscoreRecord::new(clamp_score(value), None);
    }
    if let Ok(stored) = serde_json::from_str::<StoredScore>(raw) {
        return HighscoreRecord::new(clamp_score(stored.score), stored.player);
    }
    if let Ok(value) = serde_json::from_str::<i64>(raw) {
        return HighscoreRecord::new(clamp_score(value), None);
    }
    tracing::debug!("unreadable highscore content, treating as 0");
    HighscoreRecord::default()
}

/// Render a record the way it is written to disk.
pub fn encode_record(record: &HighscoreRecord) -> Result<String> {
    match record.player {
        Some(ref player) if !player.is_empty() => Ok(serde_json::to_string(&StoredScore {
            score: record.best_round as i64,
            player: Some(player.clone()),
        })?),
        _ => Ok(record.best_round.to_string()),
    }
}

fn clamp_score(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

#[derive(Debug, Clone)]
pub struct FileHighscoreStore {
    path: PathBuf,
}

impl FileHighscoreStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_path(AppDirs::highscore_path())
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file holding `0` if it does not exist yet.
    pub fn ensure_exists(&self) {
        if self.path.exists() {
            return;
        }
        if let Err(e) = self.try_save(&HighscoreRecord::default()) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "could not create highscore file"
            );
        }
    }
}

impl Default for FileHighscoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HighscoreStore for FileHighscoreStore {
    fn load(&self) -> HighscoreRecord {
        self.ensure_exists();
        match fs::read_to_string(&self.path) {
            Ok(raw) => parse_record(&raw),
            Err(_) => HighscoreRecord::default(),
        }
    }

    fn try_save(&self, record: &HighscoreRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, encode_record(record)?)?;
        Ok(())
    }
}

/// Non-persistent store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryHighscoreStore {
    record: Mutex<HighscoreRecord>,
}

impl MemoryHighscoreStore {
    pub fn new(best_round: u32) -> Self {
        Self {
            record: Mutex::new(HighscoreRecord::new(best_round, None)),
        }
    }
}

impl HighscoreStore for MemoryHighscoreStore {
    fn load(&self) -> HighscoreRecord {
        self.record
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn try_save(&self, record: &HighscoreRecord) -> Result<()> {
        if let Ok(mut current) = self.record.lock() {
            *current = record.clone();
        }
        Ok(())
    }
}

impl<T: HighscoreStore + ?Sized> HighscoreStore for std::sync::Arc<T> {
    fn load(&self) -> HighscoreRecord {
        (**self).load()
    }

    fn try_save(&self, record: &HighscoreRecord) -> Result<()> {
        (**self).try_save(record)
    }
}
