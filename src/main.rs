use clap::{error::ErrorKind, CommandFactory, Parser};
use colormem::{
    app::{self, App},
    app_dirs::AppDirs,
    audio::{CommandPlayback, MusicController},
    config::{validate_timer_factor, Config, ConfigStore, FileConfigStore},
    highscore::{FileHighscoreStore, HighscoreRecord, HighscoreStore},
    history::HistoryLog,
    notify::ChannelNotifier,
    palette::Palette,
    runtime::{CrosstermEventSource, Runner, TICK_RATE_MS},
    scheduler::TimerQueue,
    sequence::{Draw, RandomDraw, SequenceEngine},
    session::{SessionConfig, SessionController},
};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    fs,
    io::{self, stdin},
    path::PathBuf,
    sync::{mpsc, Mutex},
    time::Duration,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// memorize an ever-growing sequence of colors
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal memory game: every round adds a color word to the sequence, \
                  and you reproduce the whole sequence from the palette before time runs out."
)]
pub struct Cli {
    /// seconds granted per round of sequence length
    #[clap(long, value_parser = parse_timer_factor, allow_negative_numbers = true)]
    timer_factor: Option<f64>,

    /// start with the countdown enabled
    #[clap(long)]
    timer: bool,

    /// comma separated color names to play with
    #[clap(long, value_delimiter = ',')]
    colors: Option<Vec<String>>,

    /// name stored next to a new highscore
    #[clap(short = 'p', long)]
    player: Option<String>,

    /// seed for a reproducible sequence
    #[clap(long)]
    seed: Option<u64>,

    /// highscore file to read and write
    #[clap(long)]
    highscore_path: Option<PathBuf>,

    /// program (and arguments) that plays the background music once
    #[clap(long, num_args = 1.., value_delimiter = ' ')]
    music: Option<Vec<String>>,

    /// no terminal bell on success or failure
    #[clap(long)]
    no_bell: bool,

    /// write the effective settings to the config file
    #[clap(long)]
    save_config: bool,

    /// print the highscore and exit
    #[clap(long)]
    show_highscore: bool,

    /// reset the highscore to zero and exit
    #[clap(long)]
    reset_highscore: bool,
}

fn parse_timer_factor(s: &str) -> Result<f64, String> {
    let factor: f64 = s.parse().map_err(|e| format!("{e}"))?;
    validate_timer_factor(factor).map_err(|e| e.to_string())
}

impl Cli {
    /// Layer command line overrides on top of the stored config.
    fn apply(&self, config: &mut Config) {
        if let Some(factor) = self.timer_factor {
            config.timer_factor = factor;
        }
        if self.timer {
            config.timer_enabled = true;
        }
        if let Some(colors) = &self.colors {
            config.active_colors = colors.clone();
        }
        if let Some(player) = &self.player {
            config.player_name = player.clone();
        }
        if let Some(music) = &self.music {
            config.music_command = Some(music.clone());
        }
        if self.no_bell {
            config.bell = false;
        }
    }

    fn highscore_store(&self) -> FileHighscoreStore {
        match &self.highscore_path {
            Some(path) => FileHighscoreStore::with_path(path),
            None => FileHighscoreStore::new(),
        }
    }
}

fn init_tracing() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .init();
}

fn print_highscore(record: &HighscoreRecord) {
    match &record.player {
        Some(player) => println!("Best round: {} ({player})", record.best_round),
        None => println!("Best round: {}", record.best_round),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply(&mut config);
    if cli.save_config {
        config_store.save(&config)?;
    }

    let store = cli.highscore_store();
    if cli.reset_highscore || cli.show_highscore {
        if cli.reset_highscore {
            store.try_save(&HighscoreRecord::default())?;
            println!("Highscore reset.");
        }
        if cli.show_highscore {
            print_highscore(&store.load());
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_tracing();
    tracing::info!(?config, "starting colormem");

    let palette = Palette::with_active(&config.active_colors);
    let draw: Box<dyn Draw> = match cli.seed {
        Some(seed) => Box::new(RandomDraw::seeded(seed)),
        None => Box::new(RandomDraw::from_entropy()),
    };
    let engine = SequenceEngine::new(palette, config.timer_factor, draw);

    let (tx, rx) = mpsc::channel();
    let notifier = ChannelNotifier::new(tx);
    let music = config
        .music_command
        .as_deref()
        .and_then(CommandPlayback::from_argv)
        .map(|playback| MusicController::new(playback, notifier.sender()));

    let session = SessionController::new(
        engine,
        TimerQueue::default(),
        Box::new(store),
        Box::new(notifier),
        SessionConfig {
            timer_enabled: config.timer_enabled,
            player: Some(config.player_name.clone()),
        },
    );
    let mut app = App::new(session, rx, config.player_name.clone()).with_bell(config.bell);
    if let Some(music) = music {
        app = app.with_music(music);
    }
    if let Some(history) = HistoryLog::new() {
        app = app.with_history(history);
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        Duration::from_millis(TICK_RATE_MS),
    );
    let result = app::run(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        tracing::error!(error = %e, "terminal loop failed");
    }
    result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["colormem"]);
        assert!(cli.timer_factor.is_none());
        assert!(!cli.timer);
        assert!(cli.colors.is_none());
        assert!(!cli.show_highscore);
        assert!(!cli.reset_highscore);

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "colormem",
            "--timer-factor",
            "2.5",
            "--timer",
            "--colors",
            "Red,Gray,Pink",
            "--player",
            "Ada",
            "--no-bell",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.timer_factor, 2.5);
        assert!(config.timer_enabled);
        assert_eq!(config.active_colors, vec!["Red", "Gray", "Pink"]);
        assert_eq!(config.player_name, "Ada");
        assert!(!config.bell);
    }

    #[test]
    fn test_cli_rejects_bad_timer_factor() {
        for bad in ["inf", "NaN", "-1", "0", "1e300", "fast"] {
            let parsed = Cli::try_parse_from(["colormem", "--timer-factor", bad]);
            assert!(parsed.is_err(), "--timer-factor {bad} accepted");
        }
        let cli = Cli::try_parse_from(["colormem", "--timer-factor", "0.5"]).unwrap();
        assert_eq!(cli.timer_factor, Some(0.5));
    }

    #[test]
    fn test_cli_music_command() {
        let cli = Cli::parse_from(["colormem", "--music", "aplay loop.wav"]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(
            config.music_command,
            Some(vec!["aplay".to_string(), "loop.wav".to_string()])
        );
    }

    #[test]
    fn test_cli_validates() {
        Cli::command().debug_assert();
    }
}
