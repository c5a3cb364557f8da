use chrono::Local;
use ratatui::{backend::Backend, Terminal};
use std::io;
use std::sync::mpsc::Receiver;

use crate::audio::{ring_bell, MusicController};
use crate::history::{GameResult, HistoryLog};
use crate::notify::Notice;
use crate::palette::Rgb;
use crate::runtime::{command_for_key, Command, GameEvent, GameEventSource, Runner};
use crate::scheduler::{Scheduler, TimerQueue};
use crate::session::{SessionController, SessionState, SessionTimer, Snapshot};

/// Last status line shown to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub text: String,
    pub color: Option<Rgb>,
}

/// Presentation shell state: forwards commands to the session, keeps the
/// latest snapshot for rendering and reacts to notices.
pub struct App<S: Scheduler<SessionTimer> = TimerQueue<SessionTimer>> {
    pub session: SessionController<S>,
    pub snapshot: Snapshot,
    pub feedback: Option<Feedback>,
    pub should_quit: bool,
    pub player: String,
    notices: Receiver<Notice>,
    music: Option<MusicController>,
    history: Option<HistoryLog>,
    bell: bool,
}

impl<S: Scheduler<SessionTimer>> App<S> {
    pub fn new(session: SessionController<S>, notices: Receiver<Notice>, player: String) -> Self {
        let snapshot = session.snapshot();
        Self {
            session,
            snapshot,
            feedback: None,
            should_quit: false,
            player,
            notices,
            music: None,
            history: None,
            bell: false,
        }
    }

    pub fn with_music(mut self, music: MusicController) -> Self {
        self.music = Some(music);
        self
    }

    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_bell(mut self, bell: bool) -> Self {
        self.bell = bell;
        self
    }

    pub fn handle(&mut self, command: Command) {
        let before = self.snapshot.state.clone();
        match command {
            Command::Start => {
                self.session.start();
            }
            Command::Stop => {
                self.session.stop(true);
            }
            Command::Select(index) => {
                let name = self
                    .session
                    .palette()
                    .active()
                    .get(index)
                    .map(|t| t.name().to_string());
                if let Some(name) = name {
                    self.session.submit(&name);
                }
            }
            Command::ToggleTimer => {
                let enabled = !self.snapshot.timer_enabled;
                self.session.set_timer_enabled(enabled);
            }
            Command::ResetHighscore => {
                self.session.reset_highscore();
            }
            Command::Menu => {
                self.session.return_to_menu();
            }
            Command::Quit => {
                if self.session.state().is_running() {
                    self.session.stop(false);
                }
                self.should_quit = true;
            }
        }
        self.after_update(before);
    }

    /// Fire due timers and pick up notices from the session and music worker.
    pub fn on_tick(&mut self) {
        let before = self.snapshot.state.clone();
        self.session.pump();
        self.after_update(before);
    }

    fn after_update(&mut self, before: SessionState) {
        self.snapshot = self.session.snapshot();
        let now = &self.snapshot.state;

        match now {
            SessionState::Armed if before != SessionState::Armed => {
                if let Some(music) = self.music.as_mut() {
                    music.start();
                }
            }
            SessionState::Failed(summary) if before.is_running() => {
                if let Some(music) = self.music.as_mut() {
                    music.stop();
                }
                if let Some(history) = &self.history {
                    let result = GameResult {
                        date: Local::now(),
                        player: self.player.clone(),
                        score: summary.score,
                        new_highscore: summary.new_highscore,
                        timer: self.snapshot.timer_enabled,
                    };
                    if let Err(e) = history.append(&result) {
                        tracing::warn!(error = %e, "failed to record game history");
                    }
                }
            }
            SessionState::Idle if before != SessionState::Idle => {
                if let Some(music) = self.music.as_mut() {
                    music.cleanup();
                }
            }
            _ => {}
        }

        self.drain_notices();
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            match notice {
                Notice::Message { text, color_hint } => {
                    self.feedback = (!text.is_empty()).then(|| Feedback {
                        text,
                        color: color_hint.parse().ok(),
                    });
                }
                Notice::Sound(sound) => {
                    tracing::debug!(%sound, "feedback sound");
                    if self.bell {
                        ring_bell();
                    }
                }
            }
        }
    }
}

/// Draw, wait for a key or the next due timer, repeat until quit.
pub fn run<B, E, S>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
    runner: &Runner<E>,
) -> io::Result<()>
where
    B: Backend,
    E: GameEventSource,
    S: Scheduler<SessionTimer>,
{
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step(app.session.next_wakeup()) {
            GameEvent::Key(key) => {
                let tiles = app.session.palette().active().len();
                if let Some(command) = command_for_key(&key, tiles) {
                    app.handle(command);
                }
            }
            GameEvent::Resize | GameEvent::Tick => {}
        }
        app.on_tick();

        if app.should_quit {
            return Ok(());
        }
    }
}
