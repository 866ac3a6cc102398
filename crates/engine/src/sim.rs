//! Deterministic in-memory media handle.
//!
//! [`SimulatedHandle`] behaves like a browser video element without decoding
//! anything: time only moves when its [`SimProbe`] says so, and readiness,
//! load failures and play rejections are injected explicitly. Used by tests
//! and by the terminal explorer.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::media::{
    ListenerId, MediaEvent, MediaEventKind, MediaHandle, MediaListener, PlayCallback, PlayOutcome,
    ReadyState,
};

const REJECTION_REASON: &str = "NotAllowedError: play() request was rejected";

struct SimState {
    source: Option<String>,
    paused: bool,
    muted: bool,
    current_time: f64,
    media_duration: f64,
    duration_known: bool,
    ready: ReadyState,
    /// Loads complete as soon as they start.
    instant_load: bool,
    rejections_left: u32,
    play_calls: u32,
    seek_calls: u32,
    next_listener: u64,
    listeners: Vec<(ListenerId, MediaEventKind, MediaListener)>,
    monitor: Option<(AudibleMonitor, usize)>,
}

impl SimState {
    fn duration(&self) -> f64 {
        if self.duration_known {
            self.media_duration
        } else {
            f64::NAN
        }
    }

    fn event(&self, kind: MediaEventKind) -> MediaEvent {
        MediaEvent {
            kind,
            current_time: self.current_time,
            duration: self.duration(),
        }
    }

    fn report_mute(&self) {
        if let Some((monitor, slot)) = &self.monitor {
            monitor.record(*slot, self.muted);
        }
    }
}

/// Simulated video stream.
pub struct SimulatedHandle {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedHandle {
    /// Creates an unloaded handle whose media lasts `duration` seconds once loaded.
    pub fn new(duration: f64) -> Self {
        Self::build(duration, ReadyState::HaveNothing, false)
    }

    /// Creates a handle with its media fully buffered; later loads complete immediately.
    pub fn preloaded(duration: f64) -> Self {
        Self::build(duration, ReadyState::HaveEnoughData, true)
    }

    fn build(duration: f64, ready: ReadyState, loaded: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState {
                source: None,
                paused: true,
                muted: false,
                current_time: 0.0,
                media_duration: duration,
                duration_known: loaded,
                ready,
                instant_load: loaded,
                rejections_left: 0,
                play_calls: 0,
                seek_calls: 0,
                next_listener: 0,
                listeners: Vec::new(),
                monitor: None,
            })),
        }
    }

    /// Returns a probe that observes and drives this handle after it is moved
    /// into an engine.
    pub fn probe(&self) -> SimProbe {
        SimProbe {
            state: Rc::clone(&self.state),
        }
    }
}

impl MediaHandle for SimulatedHandle {
    fn load(&mut self, source: &str) {
        let instant = {
            let mut state = self.state.borrow_mut();
            state.source = Some(source.to_owned());
            state.current_time = 0.0;
            if !state.instant_load {
                state.ready = ReadyState::HaveNothing;
                state.duration_known = false;
            }
            state.instant_load
        };
        emit(&self.state, MediaEventKind::LoadStart);
        if instant {
            emit_readiness(&self.state, ReadyState::HaveEnoughData);
        }
    }

    fn play(&mut self, on_settled: PlayCallback) {
        let outcome = {
            let mut state = self.state.borrow_mut();
            state.play_calls += 1;
            if state.rejections_left > 0 {
                state.rejections_left -= 1;
                Some(PlayOutcome::Rejected(REJECTION_REASON.to_owned()))
            } else if !state.paused {
                Some(PlayOutcome::Started)
            } else {
                state.paused = false;
                None
            }
        };

        match outcome {
            Some(outcome) => on_settled(outcome),
            None => {
                emit(&self.state, MediaEventKind::Play);
                emit(&self.state, MediaEventKind::Playing);
                on_settled(PlayOutcome::Started);
            }
        }
    }

    fn pause(&mut self) {
        let was_playing = {
            let mut state = self.state.borrow_mut();
            let was_playing = !state.paused;
            state.paused = true;
            was_playing
        };
        if was_playing {
            emit(&self.state, MediaEventKind::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        {
            let mut state = self.state.borrow_mut();
            state.seek_calls += 1;
            state.current_time = if state.duration_known {
                seconds.clamp(0.0, state.media_duration)
            } else {
                seconds.max(0.0)
            };
        }
        emit(&self.state, MediaEventKind::TimeUpdate);
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration()
    }

    fn is_muted(&self) -> bool {
        self.state.borrow().muted
    }

    fn set_muted(&mut self, muted: bool) {
        let mut state = self.state.borrow_mut();
        state.muted = muted;
        state.report_mute();
    }

    fn ready_state(&self) -> ReadyState {
        self.state.borrow().ready
    }

    fn subscribe(&mut self, kind: MediaEventKind, listener: MediaListener) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, kind, listener));
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|(listener, _, _)| *listener != id);
    }
}

/// Test-side view of a [`SimulatedHandle`].
#[derive(Clone)]
pub struct SimProbe {
    state: Rc<RefCell<SimState>>,
}

impl SimProbe {
    /// Raises readiness to `ready`, emitting the signals a browser would.
    pub fn set_ready_state(&self, ready: ReadyState) {
        emit_readiness(&self.state, ready);
    }

    /// Completes loading with all media buffered.
    pub fn finish_load(&self) {
        self.set_ready_state(ReadyState::HaveEnoughData);
    }

    pub fn fail_load(&self) {
        emit(&self.state, MediaEventKind::Error);
    }

    /// Makes the next `count` play requests reject.
    pub fn reject_next_plays(&self, count: u32) {
        self.state.borrow_mut().rejections_left = count;
    }

    /// Advances playback by `seconds` if playing; emits pause and ended at the end.
    pub fn advance(&self, seconds: f64) {
        let ended = {
            let mut state = self.state.borrow_mut();
            if state.paused {
                return;
            }
            state.current_time += seconds;
            if state.duration_known && state.current_time >= state.media_duration {
                state.current_time = state.media_duration;
                state.paused = true;
                true
            } else {
                false
            }
        };
        emit(&self.state, MediaEventKind::TimeUpdate);
        if ended {
            emit(&self.state, MediaEventKind::Pause);
            emit(&self.state, MediaEventKind::Ended);
        }
    }

    /// Moves the playhead without emitting anything.
    pub fn place_at(&self, seconds: f64) {
        self.state.borrow_mut().current_time = seconds;
    }

    /// Pauses without emitting anything, as if playback stopped behind the engine's back.
    pub fn pause_silently(&self) {
        self.state.borrow_mut().paused = true;
    }

    pub fn stall(&self) {
        emit(&self.state, MediaEventKind::Waiting);
    }

    pub fn resume_after_stall(&self) {
        emit(&self.state, MediaEventKind::Playing);
    }

    /// Emits `kind` with the handle's current position.
    pub fn emit(&self, kind: MediaEventKind) {
        emit(&self.state, kind);
    }

    pub fn is_muted(&self) -> bool {
        self.state.borrow().muted
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    pub fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    pub fn play_calls(&self) -> u32 {
        self.state.borrow().play_calls
    }

    pub fn seek_calls(&self) -> u32 {
        self.state.borrow().seek_calls
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn source(&self) -> Option<String> {
        self.state.borrow().source.clone()
    }
}

/// Tracks how many attached handles are audible at once.
#[derive(Clone, Default)]
pub struct AudibleMonitor {
    inner: Rc<RefCell<MonitorState>>,
}

#[derive(Default)]
struct MonitorState {
    next_slot: usize,
    audible: BTreeSet<usize>,
    peak: usize,
}

impl AudibleMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking the handle behind `probe`.
    pub fn attach(&self, probe: &SimProbe) {
        let slot = {
            let mut inner = self.inner.borrow_mut();
            let slot = inner.next_slot;
            inner.next_slot += 1;
            slot
        };
        let mut state = probe.state.borrow_mut();
        state.monitor = Some((self.clone(), slot));
        state.report_mute();
    }

    /// Handles currently unmuted.
    pub fn audible(&self) -> usize {
        self.inner.borrow().audible.len()
    }

    /// Highest number of simultaneously unmuted handles since the last reset.
    pub fn peak(&self) -> usize {
        self.inner.borrow().peak
    }

    pub fn reset_peak(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.peak = inner.audible.len();
    }

    fn record(&self, slot: usize, muted: bool) {
        let mut inner = self.inner.borrow_mut();
        if muted {
            inner.audible.remove(&slot);
        } else {
            inner.audible.insert(slot);
        }
        inner.peak = inner.peak.max(inner.audible.len());
    }
}

fn emit(state: &Rc<RefCell<SimState>>, kind: MediaEventKind) {
    let (event, listeners) = {
        let state = state.borrow();
        let listeners: Vec<MediaListener> = state
            .listeners
            .iter()
            .filter(|(_, listened, _)| *listened == kind)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();
        (state.event(kind), listeners)
    };
    for listener in listeners {
        listener(&event);
    }
}

fn emit_readiness(state: &Rc<RefCell<SimState>>, ready: ReadyState) {
    let newly_known = {
        let mut state = state.borrow_mut();
        state.ready = ready;
        let newly_known = ready >= ReadyState::HaveMetadata && !state.duration_known;
        if newly_known {
            state.duration_known = true;
        }
        newly_known
    };

    if newly_known {
        emit(state, MediaEventKind::LoadedMetadata);
        emit(state, MediaEventKind::DurationChange);
    }
    if ready.can_play() {
        emit(state, MediaEventKind::CanPlay);
    }
    if ready == ReadyState::HaveEnoughData {
        emit(state, MediaEventKind::CanPlayThrough);
    }
}
