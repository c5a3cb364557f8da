// Library surface for the binary and for headless/integration tests.
pub mod app;
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod error;
pub mod highscore;
pub mod history;
pub mod notify;
pub mod palette;
pub mod runtime;
pub mod scheduler;
pub mod sequence;
pub mod session;
pub mod ui;

pub use error::{Error, Result};
