use std::sync::mpsc::Sender;

/// Color hints attached to user-facing messages.
pub mod hint {
    pub const INFO: &str = "#5164d8";
    pub const SUCCESS: &str = "#2f8c68";
    pub const FAILURE: &str = "#c34d5e";
    pub const WARNING: &str = "#d48b1f";
    pub const TIMER_ON: &str = "#4352c5";
    pub const TIMER_OFF: &str = "#c67b1e";
    pub const NEUTRAL: &str = "#4b58c2";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackSound {
    Success,
    Failure,
}

/// What the core tells its environment. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Message { text: String, color_hint: String },
    Sound(FeedbackSound),
}

impl Notice {
    pub fn message(text: impl Into<String>, color_hint: impl Into<String>) -> Self {
        Notice::Message {
            text: text.into(),
            color_hint: color_hint.into(),
        }
    }
}

/// Typed outbound channel from the game core to the presentation shell.
///
/// Implementations must not block and must ignore delivery failures.
pub trait Notifier {
    fn notify(&self, message: &str, color_hint: &str);
    fn play_feedback(&self, sound: FeedbackSound);
}

/// Forwards every notice over an mpsc channel.
///
/// The same sender type is handed to the music worker, so background audio
/// reaches the shell through exactly the path the session uses.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<Notice>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<Notice>) -> Self {
        Self { tx }
    }

    pub fn sender(&self) -> Sender<Notice> {
        self.tx.clone()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str, color_hint: &str) {
        let _ = self.tx.send(Notice::message(message, color_hint));
    }

    fn play_feedback(&self, sound: FeedbackSound) {
        let _ = self.tx.send(Notice::Sound(sound));
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str, _color_hint: &str) {}
    fn play_feedback(&self, _sound: FeedbackSound) {}
}
