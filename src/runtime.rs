use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// How often the shell wakes up to pump timers and redraw.
pub const TICK_RATE_MS: u64 = 50;

/// Keys selecting palette tiles, in tile order.
pub const TILE_KEYS: [char; 11] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0', '-'];

/// Key that selects the tile at `index`.
pub fn tile_key(index: usize) -> Option<char> {
    TILE_KEYS.get(index).copied()
}

/// Short legend for the keys of the first `tiles` tiles, e.g. "1-6" or "1-9,0,-".
pub fn tile_keys_hint(tiles: usize) -> String {
    let tiles = tiles.min(TILE_KEYS.len());
    match tiles {
        0 => String::new(),
        1..=9 => format!("1-{tiles}"),
        _ => std::iter::once("1-9".to_string())
            .chain(TILE_KEYS[9..tiles].iter().map(char::to_string))
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum GameEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// What a key press asks the session to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// Pick the tile at this position of the active palette.
    Select(usize),
    ToggleTimer,
    ResetHighscore,
    Menu,
    Quit,
}

/// Map a key press to a command. Tiles are picked with [`TILE_KEYS`].
pub fn command_for_key(key: &KeyEvent, tiles: usize) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Enter | KeyCode::Char('s') => Some(Command::Start),
        KeyCode::Char('x') => Some(Command::Stop),
        KeyCode::Char('t') => Some(Command::ToggleTimer),
        KeyCode::Char('R') => Some(Command::ResetHighscore),
        KeyCode::Char('m') => Some(Command::Menu),
        KeyCode::Char(c) => TILE_KEYS
            .iter()
            .position(|k| *k == c)
            .filter(|i| *i < tiles)
            .map(Command::Select),
        _ => None,
    }
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait GameEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError>;
}

/// Production event source reading crossterm events on a helper thread.
pub struct CrosstermEventSource {
    rx: Receiver<GameEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => tx.send(GameEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => tx.send(GameEvent::Resize),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Channel-fed event source for tests and headless drivers.
pub struct ChannelEventSource {
    rx: Receiver<GameEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<GameEvent>) -> Self {
        Self { rx }
    }
}

impl GameEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the application one event or tick at a time.
pub struct Runner<E: GameEventSource> {
    event_source: E,
    tick: Duration,
}

impl<E: GameEventSource> Runner<E> {
    pub fn new(event_source: E, tick: Duration) -> Self {
        Self { event_source, tick }
    }

    /// Waits for the next event, but no longer than the tick interval or
    /// `wake_hint` (the next scheduled callback), whichever is sooner.
    pub fn step(&self, wake_hint: Option<Duration>) -> GameEvent {
        let timeout = wake_hint.map_or(self.tick, |hint| hint.min(self.tick));
        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(_) => GameEvent::Tick,
        }
    }
}
