use std::fmt::{Display, Formatter};
use std::rc::Rc;

use serde::Serialize;

/// Signals a media handle can report to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEventKind {
    LoadStart,
    LoadedMetadata,
    DurationChange,
    TimeUpdate,
    CanPlay,
    CanPlayThrough,
    Play,
    Playing,
    Pause,
    Waiting,
    Ended,
    Error,
}

impl MediaEventKind {
    /// DOM event name emitted by `HTMLMediaElement`.
    pub const fn dom_name(self) -> &'static str {
        match self {
            Self::LoadStart => "loadstart",
            Self::LoadedMetadata => "loadedmetadata",
            Self::DurationChange => "durationchange",
            Self::TimeUpdate => "timeupdate",
            Self::CanPlay => "canplay",
            Self::CanPlayThrough => "canplaythrough",
            Self::Play => "play",
            Self::Playing => "playing",
            Self::Pause => "pause",
            Self::Waiting => "waiting",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }
}

/// One signal plus the handle's position at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaEvent {
    pub kind: MediaEventKind,
    pub current_time: f64,
    /// `NaN` while the duration is unknown.
    pub duration: f64,
}

/// Buffered readiness level, ordered from least to most data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Maps the numeric `readyState` of a media element.
    pub fn from_level(level: u16) -> Self {
        match level {
            0 => Self::HaveNothing,
            1 => Self::HaveMetadata,
            2 => Self::HaveCurrentData,
            3 => Self::HaveFutureData,
            _ => Self::HaveEnoughData,
        }
    }

    /// Whether playback can start without immediately stalling.
    pub fn can_play(self) -> bool {
        self >= Self::HaveFutureData
    }
}

/// Loading state of one timeline's media, surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Result of an asynchronous play request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// Rejected by the playback subsystem (autoplay policy, resource not ready, ...).
    Rejected(String),
}

impl Display for PlayOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

/// Completion callback for [`MediaHandle::play`].
pub type PlayCallback = Box<dyn FnOnce(PlayOutcome)>;

/// Listener attached with [`MediaHandle::subscribe`].
pub type MediaListener = Rc<dyn Fn(&MediaEvent)>;

/// Identifies one subscription on one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// One playable video stream (with its audio track).
///
/// Handles may dispatch listeners and settle play requests synchronously from
/// inside their own methods. Listeners and play callbacks handed to a handle
/// must therefore never call back into that handle directly; they defer such
/// work through a [`Scheduler`](crate::scheduler::Scheduler).
pub trait MediaHandle {
    /// Starts loading `source`, replacing any previous one.
    fn load(&mut self, source: &str);

    /// Requests playback; `on_settled` reports whether it started.
    fn play(&mut self, on_settled: PlayCallback);

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, seconds: f64);

    /// Media duration in seconds, `NaN` while unknown.
    fn duration(&self) -> f64;

    fn is_muted(&self) -> bool;

    fn set_muted(&mut self, muted: bool);

    fn ready_state(&self) -> ReadyState;

    fn subscribe(&mut self, kind: MediaEventKind, listener: MediaListener) -> ListenerId;

    /// Removes a listener. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: ListenerId);
}
