use thiserror::Error;

/// Errors surfaced by the persistence and audio layers.
///
/// None of these are fatal to a running game: callers log and carry on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("history log: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid color `{0}`, expected #rrggbb")]
    InvalidColor(String),
    #[error("timer factor must be a finite number of seconds above 0 and at most 600, got {0}")]
    InvalidTimerFactor(f64),
    #[error("palette has no colors")]
    EmptyPalette,
    #[error("audio unavailable: {0}")]
    Audio(String),
}

pub type Result<T> = std::result::Result<T, Error>;
