//! Multi-video synchronization.
//!
//! [`VideoSync`] owns one [`MediaHandle`] per timeline. Exactly one handle is
//! active: it is the only one ever unmuted and the only one whose signals feed
//! [`VideoSyncState`]. The others stay muted and follow the active handle's
//! play/pause/seek commands so a switch can land on an already-positioned
//! stream.

use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::media::{
    ListenerId, LoadState, MediaEvent, MediaEventKind, MediaHandle, MediaListener, PlayCallback,
    PlayOutcome,
};
use crate::observer::{Observers, Subscription};
use crate::scheduler::Scheduler;
use crate::time::{SEEK_TOLERANCE_SECONDS, needs_seek, progress_percent, usable_duration};
use crate::timeline::{TimelineId, TimelineMap};

pub const DEFAULT_PLAY_RETRY_DELAY: Duration = Duration::from_millis(100);

const STATE_SIGNALS: [MediaEventKind; 8] = [
    MediaEventKind::TimeUpdate,
    MediaEventKind::DurationChange,
    MediaEventKind::LoadedMetadata,
    MediaEventKind::Play,
    MediaEventKind::Pause,
    MediaEventKind::Waiting,
    MediaEventKind::Playing,
    MediaEventKind::Ended,
];

const LOAD_SIGNALS: [MediaEventKind; 4] = [
    MediaEventKind::LoadStart,
    MediaEventKind::CanPlay,
    MediaEventKind::CanPlayThrough,
    MediaEventKind::Error,
];

/// Tunables for [`VideoSync`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOptions {
    /// Delay before the single retry of a rejected play request.
    pub play_retry_delay: Duration,
    /// Handles closer than this to a seek target are left alone.
    pub seek_tolerance: f64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            play_retry_delay: DEFAULT_PLAY_RETRY_DELAY,
            seek_tolerance: SEEK_TOLERANCE_SECONDS,
        }
    }
}

/// Playback state of the active handle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoSyncState {
    pub active_timeline: TimelineId,
    pub current_time: f64,
    pub duration: f64,
    pub is_playing: bool,
    pub is_buffering: bool,
}

impl VideoSyncState {
    fn initial(active: TimelineId) -> Self {
        Self {
            active_timeline: active,
            current_time: 0.0,
            duration: active.timeline().duration,
            is_playing: false,
            is_buffering: false,
        }
    }

    /// Playback progress in percent, clamped to `0..=100`.
    pub fn progress(&self) -> f64 {
        progress_percent(self.current_time, self.duration)
    }
}

/// Options for [`VideoSync::set_active_timeline`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchOptions {
    /// Position the new handle at 0 instead of the outgoing handle's time.
    pub start_from_beginning: bool,
}

struct PendingResume {
    timeline: TimelineId,
    listener: ListenerId,
}

struct Shared {
    active: TimelineId,
    state: VideoSyncState,
    muted: bool,
    /// Bumped on every switch; state listeners bound under an older epoch are stale.
    switch_epoch: u64,
    /// Bumped on every switch and pause; retries and deferred resumes from an
    /// older epoch are dropped.
    intent_epoch: u64,
    bindings: Vec<ListenerId>,
    pending_resume: Option<PendingResume>,
    load_states: TimelineMap<LoadState>,
}

struct SyncInner<H> {
    handles: TimelineMap<RefCell<H>>,
    shared: RefCell<Shared>,
    ended: Observers<TimelineId>,
    scheduler: Rc<dyn Scheduler>,
    options: SyncOptions,
}

/// Synchronization engine over one media handle per timeline.
///
/// Cloning yields another reference to the same engine.
///
/// # Example
/// ```
/// use std::rc::Rc;
///
/// use worlds_engine::scheduler::ManualScheduler;
/// use worlds_engine::sim::SimulatedHandle;
/// use worlds_engine::sync::{SwitchOptions, SyncOptions, VideoSync};
/// use worlds_engine::{TimelineId, TimelineMap};
///
/// let scheduler = Rc::new(ManualScheduler::new());
/// let handles = TimelineMap::from_fn(|_| SimulatedHandle::preloaded(15.0));
/// let sync = VideoSync::new(handles, scheduler, TimelineId::Catch, SyncOptions::default());
///
/// sync.seek(5.0).expect("seek target is valid");
/// sync.set_active_timeline(TimelineId::Sky, SwitchOptions::default());
///
/// assert_eq!(sync.active_timeline(), TimelineId::Sky);
/// assert!((sync.state().progress() - 33.333).abs() < 1e-2);
/// ```
pub struct VideoSync<H: MediaHandle + 'static> {
    inner: Rc<SyncInner<H>>,
}

impl<H: MediaHandle + 'static> Clone for VideoSync<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Non-owning reference to a [`VideoSync`], for callbacks the engine itself may hold.
pub struct WeakVideoSync<H: MediaHandle + 'static> {
    inner: Weak<SyncInner<H>>,
}

impl<H: MediaHandle + 'static> Clone for WeakVideoSync<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<H: MediaHandle + 'static> WeakVideoSync<H> {
    pub fn upgrade(&self) -> Option<VideoSync<H>> {
        self.inner.upgrade().map(|inner| VideoSync { inner })
    }
}

impl<H: MediaHandle + 'static> VideoSync<H> {
    /// Takes ownership of `handles` and makes `active` the audible one.
    pub fn new(
        handles: TimelineMap<H>,
        scheduler: Rc<dyn Scheduler>,
        active: TimelineId,
        options: SyncOptions,
    ) -> Self {
        let sync = Self {
            inner: Rc::new(SyncInner {
                handles: handles.map(|_, handle| RefCell::new(handle)),
                shared: RefCell::new(Shared {
                    active,
                    state: VideoSyncState::initial(active),
                    muted: false,
                    switch_epoch: 0,
                    intent_epoch: 0,
                    bindings: Vec::new(),
                    pending_resume: None,
                    load_states: TimelineMap::default(),
                }),
                ended: Observers::new(),
                scheduler,
                options,
            }),
        };

        for id in TimelineId::ALL {
            sync.attach_load_listeners(id);
            sync.inner.handles[id].borrow_mut().set_muted(id != active);
        }
        sync.bind(active, 0);
        sync.refresh_state(active);
        sync
    }

    pub fn downgrade(&self) -> WeakVideoSync<H> {
        WeakVideoSync {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Starts loading every timeline's media.
    pub fn load_sources(&self, sources: &TimelineMap<String>) {
        for (id, source) in sources.iter() {
            self.inner.shared.borrow_mut().load_states[id] = LoadState::Loading;
            info!(timeline = %id, source = %source, "loading timeline media");
            self.inner.handles[id].borrow_mut().load(source);
        }
    }

    /// Resumes the active handle, then every background handle (muted).
    pub fn play(&self) {
        let (active, epoch) = {
            let shared = self.inner.shared.borrow();
            (shared.active, shared.intent_epoch)
        };
        debug!(timeline = %active, "play requested");
        self.request_play(active, epoch, true);
        for id in TimelineId::ALL.into_iter().filter(|id| *id != active) {
            self.request_play(id, epoch, true);
        }
    }

    /// Pauses every handle and drops any retry or deferred resume in flight.
    pub fn pause(&self) {
        self.inner.shared.borrow_mut().intent_epoch += 1;
        self.cancel_pending_resume();
        for id in TimelineId::ALL {
            self.inner.handles[id].borrow_mut().pause();
        }
        debug!("playback paused");
    }

    pub fn toggle_play_pause(&self) {
        if self.inner.shared.borrow().state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Moves every handle that is more than the seek tolerance away from `seconds`.
    pub fn seek(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(EngineError::InvalidSeekTime(seconds));
        }

        let tolerance = self.inner.options.seek_tolerance;
        for id in TimelineId::ALL {
            let mut handle = self.inner.handles[id].borrow_mut();
            if needs_seek(handle.current_time(), seconds, tolerance) {
                handle.set_current_time(seconds);
            }
        }

        let active = self.active_timeline();
        let current_time = self.inner.handles[active].borrow().current_time();
        self.inner.shared.borrow_mut().state.current_time = current_time;
        debug!(seconds, timeline = %active, "seek applied");
        Ok(())
    }

    /// Seeks to `percent` of the active handle's duration.
    ///
    /// Values outside `0..=100` are clamped; non-finite values are rejected.
    pub fn seek_to_progress(&self, percent: f64) -> Result<()> {
        if !percent.is_finite() {
            return Err(EngineError::InvalidProgress(percent));
        }
        let active = self.active_timeline();
        let fallback = self.inner.shared.borrow().state.duration;
        let duration = usable_duration(self.inner.handles[active].borrow().duration(), fallback);
        self.seek(duration * percent.clamp(0.0, 100.0) / 100.0)
    }

    /// Makes `id` the active, audible handle.
    ///
    /// Every handle is muted before the switch and only the new one is
    /// unmuted afterwards, so two handles are never audible together. If
    /// playback was running, the new handle resumes immediately when it has
    /// enough data buffered, otherwise as soon as it reports it can play.
    pub fn set_active_timeline(&self, id: TimelineId, options: SwitchOptions) {
        let (previous, was_playing) = {
            let shared = self.inner.shared.borrow();
            // A resume still waiting on canplay counts as playing.
            (
                shared.active,
                shared.state.is_playing || shared.pending_resume.is_some(),
            )
        };
        let target_time = if options.start_from_beginning {
            0.0
        } else {
            let current = self.inner.handles[previous].borrow().current_time();
            if current.is_finite() { current } else { 0.0 }
        };

        for timeline in TimelineId::ALL {
            self.inner.handles[timeline].borrow_mut().set_muted(true);
        }

        self.cancel_pending_resume();
        let stale = std::mem::take(&mut self.inner.shared.borrow_mut().bindings);
        {
            let mut handle = self.inner.handles[previous].borrow_mut();
            for listener in stale {
                handle.unsubscribe(listener);
            }
        }

        let (switch_epoch, intent_epoch, muted) = {
            let mut shared = self.inner.shared.borrow_mut();
            shared.switch_epoch += 1;
            shared.intent_epoch += 1;
            shared.active = id;
            (shared.switch_epoch, shared.intent_epoch, shared.muted)
        };
        self.bind(id, switch_epoch);

        {
            let mut handle = self.inner.handles[id].borrow_mut();
            if needs_seek(handle.current_time(), target_time, self.inner.options.seek_tolerance) {
                handle.set_current_time(target_time);
            }
            if !muted {
                handle.set_muted(false);
            }
        }
        self.refresh_state(id);

        info!(
            from = %previous,
            to = %id,
            target_time,
            was_playing,
            "active timeline switched"
        );

        if !was_playing || !self.inner.handles[id].borrow().is_paused() {
            return;
        }
        if self.is_video_ready(id) {
            self.request_play(id, intent_epoch, true);
        } else {
            self.defer_resume(id, intent_epoch);
        }
    }

    /// Whether the handle has at least "future data" buffered.
    pub fn is_video_ready(&self, id: TimelineId) -> bool {
        self.inner.handles[id].borrow().ready_state().can_play()
    }

    pub fn all_ready(&self) -> bool {
        TimelineId::ALL.into_iter().all(|id| self.is_video_ready(id))
    }

    /// Sets the global mute flag. Muting silences every handle; unmuting only
    /// restores the active one.
    pub fn set_muted(&self, muted: bool) {
        let active = {
            let mut shared = self.inner.shared.borrow_mut();
            shared.muted = muted;
            shared.active
        };
        for id in TimelineId::ALL {
            self.inner.handles[id]
                .borrow_mut()
                .set_muted(muted || id != active);
        }
        debug!(muted, timeline = %active, "global mute applied");
    }

    pub fn is_muted(&self) -> bool {
        self.inner.shared.borrow().muted
    }

    /// Registers `callback` for end-of-media on the active handle.
    ///
    /// Callbacks run from a scheduled task, never from inside a handle
    /// method, so they may call back into the engine.
    pub fn on_video_ended(&self, mut callback: impl FnMut(TimelineId) + 'static) -> Subscription {
        self.inner.ended.subscribe(move |id: &TimelineId| callback(*id))
    }

    pub fn state(&self) -> VideoSyncState {
        self.inner.shared.borrow().state
    }

    pub fn active_timeline(&self) -> TimelineId {
        self.inner.shared.borrow().active
    }

    pub fn load_state(&self, id: TimelineId) -> LoadState {
        self.inner.shared.borrow().load_states[id]
    }

    fn request_play(&self, id: TimelineId, epoch: u64, retry_on_reject: bool) {
        let weak = Rc::downgrade(&self.inner);
        let on_settled: PlayCallback = Box::new(move |outcome| {
            let PlayOutcome::Rejected(reason) = outcome else {
                return;
            };
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !retry_on_reject {
                warn!(timeline = %id, %reason, "play rejected again; leaving handle paused");
                return;
            }

            debug!(timeline = %id, %reason, "play rejected; scheduling retry");
            let retry = Rc::downgrade(&inner);
            inner.scheduler.schedule(
                inner.options.play_retry_delay,
                Box::new(move || {
                    let Some(inner) = retry.upgrade() else {
                        return;
                    };
                    if inner.shared.borrow().intent_epoch != epoch {
                        debug!(timeline = %id, "play retry superseded");
                        return;
                    }
                    VideoSync { inner }.request_play(id, epoch, false);
                }),
            );
        });
        self.inner.handles[id].borrow_mut().play(on_settled);
    }

    fn defer_resume(&self, id: TimelineId, epoch: u64) {
        let weak = Rc::downgrade(&self.inner);
        let listener: MediaListener = Rc::new(move |_event: &MediaEvent| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let task = Rc::downgrade(&inner);
            inner.scheduler.schedule(
                Duration::ZERO,
                Box::new(move || {
                    if let Some(inner) = task.upgrade() {
                        VideoSync { inner }.finish_deferred_resume(id, epoch);
                    }
                }),
            );
        });

        let listener = self.inner.handles[id]
            .borrow_mut()
            .subscribe(MediaEventKind::CanPlay, listener);
        self.inner.shared.borrow_mut().pending_resume = Some(PendingResume {
            timeline: id,
            listener,
        });
        debug!(timeline = %id, "resume deferred until handle can play");
    }

    fn finish_deferred_resume(&self, id: TimelineId, epoch: u64) {
        let pending = {
            let mut shared = self.inner.shared.borrow_mut();
            if shared.intent_epoch != epoch {
                return;
            }
            match shared.pending_resume.take() {
                Some(pending) if pending.timeline == id => pending,
                other => {
                    shared.pending_resume = other;
                    return;
                }
            }
        };
        self.inner.handles[id]
            .borrow_mut()
            .unsubscribe(pending.listener);

        if self.inner.handles[id].borrow().is_paused() {
            debug!(timeline = %id, "resuming deferred playback");
            self.request_play(id, epoch, true);
        }
    }

    fn cancel_pending_resume(&self) {
        let pending = self.inner.shared.borrow_mut().pending_resume.take();
        if let Some(pending) = pending {
            self.inner.handles[pending.timeline]
                .borrow_mut()
                .unsubscribe(pending.listener);
        }
    }

    fn bind(&self, id: TimelineId, epoch: u64) {
        let mut bindings = Vec::with_capacity(STATE_SIGNALS.len());
        {
            let mut handle = self.inner.handles[id].borrow_mut();
            for kind in STATE_SIGNALS {
                let weak = Rc::downgrade(&self.inner);
                let listener: MediaListener = Rc::new(move |event: &MediaEvent| {
                    if let Some(inner) = weak.upgrade() {
                        apply_state_signal(&inner, id, epoch, event);
                    }
                });
                bindings.push(handle.subscribe(kind, listener));
            }
        }
        self.inner.shared.borrow_mut().bindings = bindings;
    }

    fn attach_load_listeners(&self, id: TimelineId) {
        let mut handle = self.inner.handles[id].borrow_mut();
        for kind in LOAD_SIGNALS {
            let weak = Rc::downgrade(&self.inner);
            let listener: MediaListener = Rc::new(move |event: &MediaEvent| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let next = match event.kind {
                    MediaEventKind::LoadStart => LoadState::Loading,
                    MediaEventKind::Error => LoadState::Failed,
                    _ => LoadState::Ready,
                };
                let mut shared = inner.shared.borrow_mut();
                if shared.load_states[id] == next {
                    return;
                }
                shared.load_states[id] = next;
                match next {
                    LoadState::Failed => warn!(timeline = %id, "timeline media failed to load"),
                    _ => debug!(timeline = %id, state = ?next, "timeline load state changed"),
                }
            });
            handle.subscribe(kind, listener);
        }
    }

    fn refresh_state(&self, id: TimelineId) {
        let (current_time, duration, paused) = {
            let handle = self.inner.handles[id].borrow();
            (handle.current_time(), handle.duration(), handle.is_paused())
        };
        let mut shared = self.inner.shared.borrow_mut();
        shared.state = VideoSyncState {
            active_timeline: id,
            current_time: if current_time.is_finite() { current_time } else { 0.0 },
            duration: usable_duration(duration, id.timeline().duration),
            is_playing: !paused,
            is_buffering: false,
        };
    }
}

impl<H: MediaHandle + 'static> Debug for VideoSync<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.borrow();
        f.debug_struct("VideoSync")
            .field("state", &shared.state)
            .field("muted", &shared.muted)
            .field("options", &self.inner.options)
            .finish()
    }
}

fn apply_state_signal<H: MediaHandle + 'static>(
    inner: &Rc<SyncInner<H>>,
    id: TimelineId,
    epoch: u64,
    event: &MediaEvent,
) {
    {
        let mut shared = inner.shared.borrow_mut();
        if shared.switch_epoch != epoch || shared.active != id {
            return;
        }
        let state = &mut shared.state;
        match event.kind {
            MediaEventKind::TimeUpdate => state.current_time = event.current_time,
            MediaEventKind::DurationChange | MediaEventKind::LoadedMetadata => {
                state.duration = usable_duration(event.duration, id.timeline().duration);
            }
            MediaEventKind::Play => state.is_playing = true,
            MediaEventKind::Pause => state.is_playing = false,
            MediaEventKind::Waiting => state.is_buffering = true,
            MediaEventKind::Playing => {
                state.is_playing = true;
                state.is_buffering = false;
            }
            MediaEventKind::Ended => {}
            _ => return,
        }
    }

    if event.kind == MediaEventKind::Ended {
        info!(timeline = %id, "active timeline reached its end");
        let weak = Rc::downgrade(inner);
        inner.scheduler.schedule(
            Duration::ZERO,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.shared.borrow().active == id {
                    inner.ended.notify(&id);
                }
            }),
        );
    }
}
