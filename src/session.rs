use std::collections::BTreeMap;
use std::time::Duration;

use crate::highscore::{HighscoreRecord, HighscoreStore};
use crate::notify::{hint, FeedbackSound, Notifier};
use crate::palette::{Palette, Rgb};
use crate::scheduler::{Scheduler, TaskHandle, TimerQueue};
use crate::sequence::{RoundSpec, SequenceEngine};

/// Pause between pressing start and the first word.
pub const START_DELAY: Duration = Duration::from_millis(800);
/// Pause between a completed round and the next word.
pub const NEXT_ROUND_DELAY: Duration = Duration::from_millis(600);
/// Word is shown on a neutral card this long before its background appears
/// and input opens.
pub const REVEAL_DELAY: Duration = Duration::from_millis(180);
/// How long the word stays readable once revealed.
pub const CONCEAL_DELAY: Duration = Duration::from_millis(1200);
pub const TILE_FLASH: Duration = Duration::from_millis(250);
pub const COUNTDOWN_TICK: Duration = Duration::from_millis(50);
/// Upper bound on a single round's countdown.
pub const MAX_TIME_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

// upper bound on dispatch passes per pump, every task has a non-zero delay
const MAX_PUMP_PASSES: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub timer_enabled: bool,
    pub player: Option<String>,
}

/// Deferred work owned by a session phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTimer {
    AdvanceRound,
    Reveal,
    Conceal,
    CountdownTick,
    TileFlashEnd(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    WrongColor { index: usize },
    TooManyColors,
    TimeUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSummary {
    /// Rounds fully completed; the round in progress never counts.
    pub score: u32,
    pub new_highscore: bool,
    pub solution: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// First round is scheduled.
    Starting,
    /// Round on screen, input accepted once revealed.
    Armed,
    /// Sequence reproduced, next round scheduled.
    RoundComplete,
    Failed(FailureSummary),
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Armed | SessionState::RoundComplete
        )
    }
}

/// What the word card currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum WordDisplay {
    Ready,
    Shown {
        word: String,
        text_color: Rgb,
        background: Option<Rgb>,
    },
    Concealed,
    Stopped,
    Solution(String),
}

/// Read-only view handed to the presentation shell after every command.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: SessionState,
    pub round: u32,
    pub best: u32,
    pub best_player: Option<String>,
    /// `None` while the timer is disabled.
    pub remaining_secs: Option<f64>,
    pub timer_enabled: bool,
    pub selection: Vec<String>,
    pub input_enabled: bool,
    pub display: WordDisplay,
    pub flashing: Vec<String>,
}

/// Single owner of all game state; every mutation goes through its
/// commands or through timers it scheduled itself.
pub struct SessionController<S: Scheduler<SessionTimer> = TimerQueue<SessionTimer>> {
    engine: SequenceEngine,
    scheduler: S,
    store: Box<dyn HighscoreStore>,
    notifier: Box<dyn Notifier>,
    highscore: HighscoreRecord,
    // best round when the current game started, for flagging a new record
    best_at_start: u32,
    player: Option<String>,
    state: SessionState,
    input: Vec<String>,
    input_enabled: bool,
    timer_enabled: bool,
    remaining: Duration,
    deadline: Option<Duration>,
    display: WordDisplay,
    current: Option<RoundSpec>,
    // bumped whenever every pending callback is dropped
    epoch: u64,
    round_task: Option<TaskHandle>,
    phase_task: Option<TaskHandle>,
    countdown_task: Option<TaskHandle>,
    flash_tasks: BTreeMap<String, TaskHandle>,
}

impl<S: Scheduler<SessionTimer>> SessionController<S> {
    pub fn new(
        engine: SequenceEngine,
        scheduler: S,
        store: Box<dyn HighscoreStore>,
        notifier: Box<dyn Notifier>,
        config: SessionConfig,
    ) -> Self {
        let highscore = store.load();
        tracing::debug!(best = highscore.best_round, "loaded highscore");
        Self {
            engine,
            scheduler,
            store,
            notifier,
            best_at_start: highscore.best_round,
            highscore,
            player: config.player,
            state: SessionState::Idle,
            input: Vec::new(),
            input_enabled: false,
            timer_enabled: config.timer_enabled,
            remaining: Duration::ZERO,
            deadline: None,
            display: WordDisplay::Ready,
            current: None,
            epoch: 0,
            round_task: None,
            phase_task: None,
            countdown_task: None,
            flash_tasks: BTreeMap::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            round: self.engine.round(),
            best: self.highscore.best_round,
            best_player: self.highscore.player.clone(),
            remaining_secs: self
                .timer_enabled
                .then(|| round_tenths(self.remaining.as_secs_f64())),
            timer_enabled: self.timer_enabled,
            selection: self.input.clone(),
            input_enabled: self.input_enabled,
            display: self.display.clone(),
            flashing: self.flash_tasks.keys().cloned().collect(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn engine(&self) -> &SequenceEngine {
        &self.engine
    }

    pub fn palette(&self) -> &Palette {
        self.engine.palette()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn highscore(&self) -> &HighscoreRecord {
        &self.highscore
    }

    /// The round currently on screen, if any.
    pub fn current_round(&self) -> Option<&RoundSpec> {
        self.current.as_ref()
    }

    pub fn start(&mut self) -> Snapshot {
        if self.state.is_running() {
            return self.snapshot();
        }

        self.cancel_all();
        self.engine.reset();
        self.input.clear();
        self.input_enabled = false;
        self.remaining = Duration::ZERO;
        self.display = WordDisplay::Ready;
        self.current = None;
        self.best_at_start = self.highscore.best_round;
        self.state = SessionState::Starting;
        self.notifier.notify("Memorize the word!", hint::INFO);
        self.schedule_next_round(START_DELAY);
        tracing::debug!("session starting");
        self.snapshot()
    }

    pub fn stop(&mut self, manual: bool) -> Snapshot {
        if !self.state.is_running() {
            self.notifier.notify("No game running.", hint::WARNING);
            return self.snapshot();
        }

        self.clear_session(WordDisplay::Stopped);
        if manual {
            self.notifier.notify("Game stopped.", hint::FAILURE);
        }
        tracing::debug!(manual, "session stopped");
        self.snapshot()
    }

    /// Leave a running or finished game without feedback.
    pub fn return_to_menu(&mut self) -> Snapshot {
        self.clear_session(WordDisplay::Ready);
        self.snapshot()
    }

    pub fn submit(&mut self, name: &str) -> Snapshot {
        if self.state != SessionState::Armed || !self.input_enabled {
            return self.snapshot();
        }

        self.input.push(name.to_string());
        self.flash_tile(name);

        let index = self.input.len() - 1;
        let expected_len = self.engine.sequence().len();
        if index >= expected_len {
            self.fail(FailureReason::TooManyColors);
        } else if !self.engine.matches_at(index, name) {
            self.fail(FailureReason::WrongColor { index });
        } else if self.input.len() == expected_len {
            self.complete_round();
        }
        self.snapshot()
    }

    pub fn set_timer_enabled(&mut self, enabled: bool) -> Snapshot {
        self.timer_enabled = enabled;
        if enabled {
            self.notifier.notify("Timer enabled.", hint::TIMER_ON);
            // keep the running deadline rather than the last tick's reading
            self.suspend_countdown();
            self.start_countdown();
        } else {
            self.notifier.notify("Timer disabled.", hint::TIMER_OFF);
            self.suspend_countdown();
        }
        self.snapshot()
    }

    pub fn reset_highscore(&mut self) -> Snapshot {
        self.highscore = HighscoreRecord::default();
        self.best_at_start = 0;
        self.store.reset();
        self.notifier.notify("Highscore reset.", hint::TIMER_OFF);
        self.snapshot()
    }

    /// Fire every scheduled callback that is due.
    pub fn pump(&mut self) -> Snapshot {
        for _ in 0..MAX_PUMP_PASSES {
            let due = self.scheduler.poll_due();
            if due.is_empty() {
                break;
            }
            let epoch = self.epoch;
            for task in due {
                if self.epoch != epoch {
                    tracing::debug!(?task, "dropping callback of a superseded phase");
                    continue;
                }
                self.dispatch(task);
            }
        }
        self.snapshot()
    }

    /// How long the shell may sleep before the next callback is due.
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.scheduler.next_deadline_in()
    }

    pub fn on_timer_expired(&mut self) {
        if self.state == SessionState::Armed && self.timer_enabled {
            self.remaining = Duration::ZERO;
            self.fail(FailureReason::TimeUp);
        }
    }

    fn dispatch(&mut self, task: SessionTimer) {
        match task {
            SessionTimer::AdvanceRound => {
                self.round_task = None;
                self.advance_round();
            }
            SessionTimer::Reveal => {
                self.phase_task = None;
                self.reveal();
            }
            SessionTimer::Conceal => {
                self.phase_task = None;
                if self.state == SessionState::Armed {
                    self.display = WordDisplay::Concealed;
                }
            }
            SessionTimer::CountdownTick => {
                self.countdown_task = None;
                self.countdown_tick();
            }
            SessionTimer::TileFlashEnd(name) => {
                self.flash_tasks.remove(&name);
            }
        }
    }

    fn advance_round(&mut self) {
        if !matches!(
            self.state,
            SessionState::Starting | SessionState::RoundComplete
        ) {
            tracing::debug!(state = ?self.state, "stale round advance ignored");
            return;
        }

        self.cancel_phase();
        self.notifier.notify("", hint::NEUTRAL);
        let spec = self.engine.next_round();
        self.input.clear();
        self.input_enabled = false;
        self.remaining = budget_duration(spec.time_budget);
        self.display = WordDisplay::Shown {
            word: spec.token.name().to_string(),
            text_color: spec.text_color,
            background: None,
        };
        self.current = Some(spec);
        self.state = SessionState::Armed;
        self.start_countdown();
        self.phase_task = Some(self.scheduler.schedule(REVEAL_DELAY, SessionTimer::Reveal));
    }

    fn reveal(&mut self) {
        if self.state != SessionState::Armed {
            return;
        }
        if let (WordDisplay::Shown { background, .. }, Some(spec)) =
            (&mut self.display, &self.current)
        {
            *background = Some(spec.background);
        }
        self.input_enabled = true;
        self.phase_task = Some(self.scheduler.schedule(CONCEAL_DELAY, SessionTimer::Conceal));
    }

    fn complete_round(&mut self) {
        self.suspend_countdown();
        self.cancel_phase();

        let round = self.engine.round();
        if round > self.highscore.best_round {
            self.highscore = HighscoreRecord::new(round, self.player.clone());
            self.store.save(&self.highscore);
        }

        self.notifier.play_feedback(FeedbackSound::Success);
        self.notifier.notify("Correct!", hint::SUCCESS);
        self.input_enabled = false;
        self.state = SessionState::RoundComplete;
        self.schedule_next_round(NEXT_ROUND_DELAY);
        tracing::debug!(round, "round complete");
    }

    fn fail(&mut self, reason: FailureReason) {
        if !self.state.is_running() {
            return;
        }

        self.cancel_all();
        let score = self.engine.round().saturating_sub(1);
        // rounds won this game were already saved by complete_round
        let new_highscore = score > self.best_at_start;
        if score > self.highscore.best_round {
            self.highscore = HighscoreRecord::new(score, self.player.clone());
            self.store.save(&self.highscore);
        }

        self.notifier.play_feedback(FeedbackSound::Failure);
        let mut message = format!("Wrong! Round {} completed.", score);
        if new_highscore {
            message.push_str(" New highscore!");
        }
        self.notifier.notify(&message, hint::FAILURE);

        let solution = self.engine.solution();
        self.input.clear();
        self.input_enabled = false;
        self.display = WordDisplay::Solution(solution.clone());
        tracing::info!(score, new_highscore, ?reason, "game over");
        self.state = SessionState::Failed(FailureSummary {
            score,
            new_highscore,
            solution,
            reason,
        });
    }

    fn clear_session(&mut self, display: WordDisplay) {
        self.cancel_all();
        self.engine.reset();
        self.input.clear();
        self.input_enabled = false;
        self.remaining = Duration::ZERO;
        self.display = display;
        self.current = None;
        self.state = SessionState::Idle;
    }

    fn schedule_next_round(&mut self, delay: Duration) {
        if let Some(handle) = self.round_task.take() {
            self.scheduler.cancel(handle);
        }
        self.round_task = Some(self.scheduler.schedule(delay, SessionTimer::AdvanceRound));
    }

    fn start_countdown(&mut self) {
        self.cancel_countdown();
        if !self.timer_enabled || self.state != SessionState::Armed {
            return;
        }
        self.deadline = Some(self.scheduler.now() + self.remaining);
        self.schedule_tick();
    }

    fn countdown_tick(&mut self) {
        if self.state != SessionState::Armed || !self.timer_enabled {
            return;
        }
        let Some(deadline) = self.deadline else {
            return;
        };
        self.remaining = deadline.saturating_sub(self.scheduler.now());
        if self.remaining.is_zero() {
            self.on_timer_expired();
        } else {
            self.schedule_tick();
        }
    }

    fn schedule_tick(&mut self) {
        let wait = COUNTDOWN_TICK.min(self.remaining);
        self.countdown_task = Some(self.scheduler.schedule(wait, SessionTimer::CountdownTick));
    }

    /// Stop the countdown, keeping whatever time was left.
    fn suspend_countdown(&mut self) {
        if let Some(deadline) = self.deadline {
            self.remaining = deadline.saturating_sub(self.scheduler.now());
        }
        self.cancel_countdown();
    }

    fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown_task.take() {
            self.scheduler.cancel(handle);
        }
        self.deadline = None;
    }

    fn cancel_phase(&mut self) {
        if let Some(handle) = self.phase_task.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn flash_tile(&mut self, name: &str) {
        let key = self
            .palette()
            .lookup(name)
            .map(|t| t.name().to_string())
            .unwrap_or_else(|| name.to_string());
        if let Some(handle) = self.flash_tasks.remove(&key) {
            self.scheduler.cancel(handle);
        }
        let handle = self
            .scheduler
            .schedule(TILE_FLASH, SessionTimer::TileFlashEnd(key.clone()));
        self.flash_tasks.insert(key, handle);
    }

    fn cancel_all(&mut self) {
        self.scheduler.cancel_all();
        self.epoch += 1;
        self.round_task = None;
        self.phase_task = None;
        self.countdown_task = None;
        self.deadline = None;
        self.flash_tasks.clear();
    }
}

fn budget_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).map_or(MAX_TIME_BUDGET, |d| d.min(MAX_TIME_BUDGET))
}

fn round_tenths(secs: f64) -> f64 {
    (secs * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highscore::MemoryHighscoreStore;
    use crate::notify::Notice;
    use crate::scheduler::ManualClock;
    use crate::sequence::ScriptedDraw;
    use assert_matches::assert_matches;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Recorder {
        notices: Rc<RefCell<Vec<Notice>>>,
    }

    impl Recorder {
        fn messages(&self) -> Vec<String> {
            self.notices
                .borrow()
                .iter()
                .filter_map(|n| match n {
                    Notice::Message { text, .. } => Some(text.clone()),
                    Notice::Sound(_) => None,
                })
                .collect()
        }

        fn sounds(&self) -> Vec<FeedbackSound> {
            self.notices
                .borrow()
                .iter()
                .filter_map(|n| match n {
                    Notice::Sound(s) => Some(*s),
                    Notice::Message { .. } => None,
                })
                .collect()
        }
    }

    impl Notifier for Recorder {
        fn notify(&self, message: &str, color_hint: &str) {
            self.notices
                .borrow_mut()
                .push(Notice::message(message, color_hint));
        }

        fn play_feedback(&self, sound: FeedbackSound) {
            self.notices.borrow_mut().push(Notice::Sound(sound));
        }
    }

    struct Harness {
        clock: ManualClock,
        store: Arc<MemoryHighscoreStore>,
        recorder: Recorder,
        session: SessionController<TimerQueue<SessionTimer, ManualClock>>,
    }

    impl Harness {
        fn new(draws: Vec<usize>, best: u32, timer_enabled: bool) -> Self {
            Self::with_factor(draws, best, timer_enabled, 3.0)
        }

        fn with_factor(draws: Vec<usize>, best: u32, timer_enabled: bool, factor: f64) -> Self {
            let full = Palette::from_hex_entries(&[
                ("Red", "#ff0000"),
                ("Blue", "#0000ff"),
                ("Green", "#00ff00"),
            ])
            .unwrap();
            let palette = Palette::new(full, &["Red", "Blue", "Green"]).unwrap();
            let engine =
                SequenceEngine::new(palette, factor, Box::new(ScriptedDraw::new(draws)));
            let clock = ManualClock::new();
            let store = Arc::new(MemoryHighscoreStore::new(best));
            let recorder = Recorder::default();
            let session = SessionController::new(
                engine,
                TimerQueue::new(clock.clone()),
                Box::new(store.clone()),
                Box::new(recorder.clone()),
                SessionConfig {
                    timer_enabled,
                    player: Some("Ada".into()),
                },
            );
            Self {
                clock,
                store,
                recorder,
                session,
            }
        }

        fn advance(&mut self, by: Duration) -> Snapshot {
            self.clock.advance(by);
            self.session.pump()
        }

        /// Start and wait until the first round accepts input.
        fn armed(draws: Vec<usize>, best: u32, timer_enabled: bool) -> Self {
            let mut h = Self::new(draws, best, timer_enabled);
            h.session.start();
            h.advance(START_DELAY);
            h.advance(REVEAL_DELAY);
            h
        }
    }

    #[test]
    fn start_schedules_first_round_after_delay() {
        let mut h = Harness::new(vec![0, 0], 0, false);
        let snap = h.session.start();
        assert_eq!(snap.state, SessionState::Starting);
        assert_eq!(snap.round, 0);
        assert_eq!(h.session.scheduler().pending(), 1);

        let snap = h.advance(START_DELAY - Duration::from_millis(1));
        assert_eq!(snap.state, SessionState::Starting);

        let snap = h.advance(Duration::from_millis(1));
        assert_eq!(snap.state, SessionState::Armed);
        assert_eq!(snap.round, 1);
        assert!(!snap.input_enabled);
        // the round start clears the feedback line
        assert_eq!(h.recorder.messages(), vec!["Memorize the word!", ""]);
    }

    #[test]
    fn start_while_running_is_a_noop() {
        let mut h = Harness::armed(vec![0, 0], 0, false);
        let before = h.session.snapshot();
        let after = h.session.start();
        assert_eq!(before, after);
    }

    #[test]
    fn reveal_then_conceal() {
        let mut h = Harness::new(vec![0, 1], 0, false);
        h.session.start();
        let snap = h.advance(START_DELAY);
        assert_matches!(
            snap.display,
            WordDisplay::Shown { ref word, background: None, .. } if word == "Red"
        );

        let snap = h.advance(REVEAL_DELAY);
        assert!(snap.input_enabled);
        assert_matches!(
            snap.display,
            WordDisplay::Shown { background: Some(bg), text_color, .. }
                if bg == text_color.darken(crate::palette::DARKEN_FACTOR)
        );

        let snap = h.advance(CONCEAL_DELAY);
        assert_eq!(snap.display, WordDisplay::Concealed);
        assert!(snap.input_enabled);
    }

    #[test]
    fn input_before_reveal_is_ignored() {
        let mut h = Harness::new(vec![0, 0], 0, false);
        h.session.start();
        h.advance(START_DELAY);

        let snap = h.session.submit("Red");
        assert!(snap.selection.is_empty());
        assert_eq!(snap.state, SessionState::Armed);
    }

    #[test]
    fn submit_when_idle_is_ignored() {
        let mut h = Harness::new(vec![0, 0], 0, false);
        let snap = h.session.submit("Red");
        assert_eq!(snap.state, SessionState::Idle);
        assert!(snap.selection.is_empty());
    }

    #[test]
    fn correct_sequence_completes_round_and_schedules_one_advance() {
        let mut h = Harness::armed(vec![0, 0], 0, false);

        let snap = h.session.submit("red");
        assert_eq!(snap.state, SessionState::RoundComplete);
        assert!(!snap.input_enabled);
        // round advance plus the tile flash
        assert_eq!(h.session.scheduler().pending(), 2);
        assert_eq!(h.recorder.sounds(), vec![FeedbackSound::Success]);
        assert!(h.recorder.messages().contains(&"Correct!".to_string()));

        let snap = h.advance(NEXT_ROUND_DELAY);
        assert_eq!(snap.state, SessionState::Armed);
        assert_eq!(snap.round, 2);
        assert!(snap.selection.is_empty());
    }

    #[test]
    fn success_raises_and_persists_highscore() {
        let mut h = Harness::armed(vec![0, 0], 0, false);
        let snap = h.session.submit("Red");

        assert_eq!(snap.best, 1);
        assert_eq!(snap.best_player.as_deref(), Some("Ada"));
        assert_eq!(h.store.load(), HighscoreRecord::new(1, Some("Ada".into())));
    }

    #[test]
    fn success_below_highscore_keeps_it() {
        let mut h = Harness::armed(vec![0, 0], 5, false);
        h.session.submit("Red");
        assert_eq!(h.session.highscore().best_round, 5);
        assert_eq!(h.store.load().best_round, 5);
    }

    #[test]
    fn wrong_color_fails_with_previous_round_as_score() {
        // Red, then Blue
        let mut h = Harness::armed(vec![0, 0, 1, 0], 0, false);
        h.session.submit("Red");
        h.advance(NEXT_ROUND_DELAY);
        h.advance(REVEAL_DELAY);

        h.session.submit("Red");
        let snap = h.session.submit("Green");
        assert_matches!(
            snap.state,
            SessionState::Failed(FailureSummary {
                score: 1,
                reason: FailureReason::WrongColor { index: 1 },
                ref solution,
                ..
            }) if solution == "Red → Blue"
        );
        assert_eq!(snap.display, WordDisplay::Solution("Red → Blue".into()));
        assert_eq!(h.session.scheduler().pending(), 0);
        assert_eq!(
            h.recorder.sounds(),
            vec![FeedbackSound::Success, FeedbackSound::Failure]
        );
    }

    #[test]
    fn failing_first_round_scores_zero() {
        let mut h = Harness::armed(vec![0, 0], 0, false);
        let snap = h.session.submit("Blue");
        assert_matches!(
            snap.state,
            SessionState::Failed(FailureSummary { score: 0, new_highscore: false, .. })
        );
        assert!(h
            .recorder
            .messages()
            .contains(&"Wrong! Round 0 completed.".to_string()));
    }

    #[test]
    fn failure_keeps_sequence_until_restart() {
        let mut h = Harness::armed(vec![0, 0], 0, false);
        h.session.submit("Blue");
        assert_eq!(h.session.engine().sequence().len(), 1);

        let snap = h.session.start();
        assert_eq!(snap.state, SessionState::Starting);
        assert_eq!(snap.round, 0);
    }

    #[test]
    fn timer_expiry_fails_the_round() {
        let mut h = Harness::armed(vec![0, 0], 0, true);
        // budget 3s, countdown started when the word appeared
        let snap = h.advance(Duration::from_millis(1500));
        assert_eq!(snap.state, SessionState::Armed);
        let remaining = snap.remaining_secs.unwrap();
        assert!(remaining > 1.0 && remaining < 1.5, "remaining {remaining}");

        let snap = h.advance(Duration::from_secs(2));
        assert_matches!(
            snap.state,
            SessionState::Failed(FailureSummary {
                score: 0,
                reason: FailureReason::TimeUp,
                ..
            })
        );
        assert_eq!(snap.remaining_secs, Some(0.0));
    }

    #[test]
    fn success_stops_the_countdown() {
        let mut h = Harness::armed(vec![0, 0, 1, 0], 0, true);
        let snap = h.session.submit("Red");
        assert_eq!(snap.remaining_secs, Some(2.8));

        let snap = h.advance(NEXT_ROUND_DELAY / 2);
        assert_eq!(snap.state, SessionState::RoundComplete);
        assert_eq!(snap.remaining_secs, Some(2.8));

        let snap = h.advance(NEXT_ROUND_DELAY / 2);
        assert_eq!(snap.state, SessionState::Armed);
        assert_eq!(snap.round, 2);
        assert_eq!(snap.remaining_secs, Some(6.0));

        let snap = h.advance(Duration::from_millis(100));
        assert_eq!(snap.remaining_secs, Some(5.9));
    }

    #[test]
    fn disabling_timer_suspends_and_reenabling_resumes() {
        let mut h = Harness::armed(vec![0, 0], 0, true);
        h.advance(Duration::from_millis(820));

        let snap = h.session.set_timer_enabled(false);
        assert_eq!(snap.remaining_secs, None);
        assert_eq!(snap.round, 1);

        // no countdown while disabled
        let snap = h.advance(Duration::from_secs(10));
        assert_eq!(snap.state, SessionState::Armed);

        let snap = h.session.set_timer_enabled(true);
        assert_eq!(snap.remaining_secs, Some(2.0));
        let snap = h.advance(Duration::from_secs(2));
        assert_matches!(snap.state, SessionState::Failed(_));
        assert!(h.recorder.messages().contains(&"Timer disabled.".to_string()));
        assert!(h.recorder.messages().contains(&"Timer enabled.".to_string()));
    }

    #[test]
    fn reenabling_running_timer_keeps_the_deadline() {
        // deadline at 3.8s, last tick read the clock at 0.98s
        let mut h = Harness::armed(vec![0, 0], 0, true);
        h.advance(Duration::from_millis(30));

        h.session.set_timer_enabled(true);
        let snap = h.advance(Duration::from_millis(2790));
        assert_matches!(
            snap.state,
            SessionState::Failed(FailureSummary {
                reason: FailureReason::TimeUp,
                ..
            })
        );
    }

    #[test]
    fn unbounded_timer_factor_caps_the_budget() {
        for factor in [f64::INFINITY, 1e300] {
            let mut h = Harness::with_factor(vec![0, 0], 0, true, factor);
            h.session.start();
            let snap = h.advance(START_DELAY);
            assert_eq!(snap.state, SessionState::Armed);
            assert_eq!(snap.remaining_secs, Some(MAX_TIME_BUDGET.as_secs_f64()));
        }
    }

    #[test]
    fn unbounded_timer_factor_with_timer_off_still_plays() {
        let mut h = Harness::with_factor(vec![0, 0], 0, false, f64::INFINITY);
        h.session.start();
        h.advance(START_DELAY);
        let snap = h.advance(REVEAL_DELAY);
        assert!(snap.input_enabled);
        assert_eq!(h.session.submit("Red").state, SessionState::RoundComplete);
    }

    #[test]
    fn record_setting_game_is_flagged_as_new_highscore() {
        let mut h = Harness::armed(vec![0, 0, 1, 0], 0, false);
        h.session.submit("Red");
        h.advance(NEXT_ROUND_DELAY);
        h.advance(REVEAL_DELAY);

        let snap = h.session.submit("Green");
        assert_matches!(
            snap.state,
            SessionState::Failed(FailureSummary {
                score: 1,
                new_highscore: true,
                ..
            })
        );
        assert!(h
            .recorder
            .messages()
            .contains(&"Wrong! Round 1 completed. New highscore!".to_string()));
        assert_eq!(h.store.load().best_round, 1);
    }

    #[test]
    fn game_below_previous_best_is_not_flagged() {
        let mut h = Harness::armed(vec![0, 0, 1, 0], 3, false);
        h.session.submit("Red");
        h.advance(NEXT_ROUND_DELAY);
        h.advance(REVEAL_DELAY);

        let snap = h.session.submit("Green");
        assert_matches!(
            snap.state,
            SessionState::Failed(FailureSummary {
                score: 1,
                new_highscore: false,
                ..
            })
        );
        assert_eq!(h.store.load().best_round, 3);
    }

    #[test]
    fn expiry_ignored_when_timer_disabled() {
        let mut h = Harness::armed(vec![0, 0], 0, false);
        h.session.on_timer_expired();
        assert_eq!(h.session.state(), &SessionState::Armed);
    }

    #[test]
    fn stop_cancels_everything_and_returns_to_idle() {
        let mut h = Harness::armed(vec![0, 0], 0, true);
        h.session.submit("Red");
        let snap = h.session.stop(true);

        assert_eq!(snap.state, SessionState::Idle);
        assert_eq!(snap.round, 0);
        assert_eq!(snap.display, WordDisplay::Stopped);
        assert_eq!(h.session.scheduler().pending(), 0);

        let snap = h.advance(Duration::from_secs(5));
        assert_eq!(snap.state, SessionState::Idle);
        assert!(h.recorder.messages().contains(&"Game stopped.".to_string()));
    }

    #[test]
    fn stop_when_idle_reports_no_game() {
        let mut h = Harness::new(vec![0], 0, false);
        let snap = h.session.stop(true);
        assert_eq!(snap.state, SessionState::Idle);
        assert_eq!(h.recorder.messages(), vec!["No game running."]);
    }

    #[test]
    fn rapid_stop_start_leaves_a_single_pending_round() {
        let mut h = Harness::new(vec![0, 0], 0, false);
        h.session.start();
        h.session.stop(true);
        h.session.start();
        h.session.stop(true);
        h.session.start();
        assert_eq!(h.session.scheduler().pending(), 1);

        let snap = h.advance(START_DELAY * 3);
        assert_eq!(snap.round, 1);
    }

    #[test]
    fn return_to_menu_clears_failed_game() {
        let mut h = Harness::armed(vec![0, 0], 0, false);
        h.session.submit("Green");
        let snap = h.session.return_to_menu();
        assert_eq!(snap.state, SessionState::Idle);
        assert_eq!(snap.display, WordDisplay::Ready);
        assert!(h.session.engine().sequence().is_empty());
    }

    #[test]
    fn reset_highscore_zeroes_and_persists() {
        let mut h = Harness::new(vec![0], 9, false);
        assert_eq!(h.session.snapshot().best, 9);

        let snap = h.session.reset_highscore();
        assert_eq!(snap.best, 0);
        assert_eq!(h.store.load().best_round, 0);
    }

    #[test]
    fn tile_flash_is_transient_and_restartable() {
        let mut h = Harness::armed(vec![0, 0, 0, 0, 0, 0], 0, false);
        h.session.submit("Red");
        h.advance(NEXT_ROUND_DELAY);
        let snap = h.advance(REVEAL_DELAY);
        assert!(snap.flashing.is_empty());

        let snap = h.session.submit("red");
        assert_eq!(snap.flashing, vec!["Red".to_string()]);

        let snap = h.advance(TILE_FLASH / 2);
        assert_eq!(snap.flashing, vec!["Red".to_string()]);
        let snap = h.advance(TILE_FLASH);
        assert!(snap.flashing.is_empty());
    }
}
