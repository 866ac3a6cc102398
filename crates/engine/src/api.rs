use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::{MuteBridge, MuteToggle};
use crate::config::SessionConfig;
use crate::error::{EngineError, Result};
use crate::media::{LoadState, MediaHandle};
use crate::navigation::{MemoryMap, NavigationEvent, Navigator};
use crate::observer::Subscription;
use crate::scheduler::{Clock, Scheduler, TaskId};
use crate::sync::{SwitchOptions, VideoSync, VideoSyncState, WeakVideoSync};
use crate::timeline::{Direction, TimelineId, TimelineMap};

/// Commands accepted by a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Starts loading every timeline's media and opens the intro gate.
    Load,
    Navigate(Direction),
    NavigateTo(TimelineId),
    /// Picks a timeline from the quad or memory-map view.
    ///
    /// Navigates like [`Command::NavigateTo`]; from the quad view it also
    /// returns to the single view.
    SelectTimeline(TimelineId),
    Play,
    Pause,
    TogglePlayPause,
    Seek {
        seconds: f64,
    },
    /// Seeks to a percentage of the active timeline's duration.
    ///
    /// # Example
    /// ```
    /// use std::rc::Rc;
    ///
    /// use worlds_engine::scheduler::ManualScheduler;
    /// use worlds_engine::sim::SimulatedHandle;
    /// use worlds_engine::{Command, Session, SessionConfig, TimelineMap};
    ///
    /// let scheduler = Rc::new(ManualScheduler::new());
    /// let handles = TimelineMap::from_fn(|_| SimulatedHandle::preloaded(15.0));
    /// let mut session = Session::new(handles, scheduler.clone(), scheduler, SessionConfig::default())
    ///     .expect("default config is valid");
    ///
    /// session
    ///     .handle_command(Command::SeekToProgress { percent: 40.0 })
    ///     .expect("seek should succeed");
    /// assert_eq!(session.snapshot().playback.current_time, 6.0);
    /// ```
    SeekToProgress {
        percent: f64,
    },
    SetMuted(bool),
    ToggleMute,
    /// Sets the effect-sound volume. Finite values are clamped to `0.0..=1.0`.
    SetMasterVolume(f64),
    SetAutoAdvance(bool),
    CycleViewMode,
    SetViewMode(ViewMode),
    /// Resets navigation to the initial timeline and rewinds every handle to 0.
    Reset,
}

/// Events emitted by a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Navigated(NavigationEvent),
    TransitionStarted { from: TimelineId, to: TimelineId },
    TransitionFinished { to: TimelineId },
    AutoAdvanced { from: TimelineId, to: TimelineId },
    MuteChanged { muted: bool },
    MasterVolumeChanged { volume: f64 },
    ViewModeChanged(ViewMode),
    Reset { timeline: TimelineId },
    /// The intro gate opened, either because every handle became ready or
    /// because the fallback timeout elapsed first.
    IntroComplete { all_ready: bool },
    Error(EngineErrorEvent),
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    InvalidSeek,
    InvalidVolume,
    UnknownIdentifier,
    InvalidConfig,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::InvalidSeekTime(_) | EngineError::InvalidProgress(_) => Self::InvalidSeek,
            EngineError::InvalidVolume(_) => Self::InvalidVolume,
            EngineError::UnknownTimeline(_)
            | EngineError::UnknownDirection(_)
            | EngineError::UnknownViewMode(_) => Self::UnknownIdentifier,
            EngineError::InvalidConfig { .. } | EngineError::ConfigParse { .. } => {
                Self::InvalidConfig
            }
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Layout the presentation layer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    Single,
    Quad,
    MemoryMap,
}

impl ViewMode {
    pub const ALL: [Self; 3] = [Self::Single, Self::Quad, Self::MemoryMap];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Quad => "quad",
            Self::MemoryMap => "memory-map",
        }
    }

    /// Next mode in the `single -> quad -> memory-map` cycle.
    pub const fn next(self) -> Self {
        match self {
            Self::Single => Self::Quad,
            Self::Quad => Self::MemoryMap,
            Self::MemoryMap => Self::Single,
        }
    }
}

impl FromStr for ViewMode {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| EngineError::UnknownViewMode(value.to_owned()))
    }
}

/// Immutable session snapshot consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub active_timeline: TimelineId,
    pub previous_timeline: Option<TimelineId>,
    pub history: Vec<NavigationEvent>,
    pub memory_map: MemoryMap,
    pub playback: VideoSyncState,
    pub progress: f64,
    pub muted: bool,
    pub master_volume: f64,
    pub view_mode: ViewMode,
    pub auto_advance: bool,
    pub transitioning: bool,
    pub intro_complete: bool,
    pub load_states: Vec<(TimelineId, LoadState)>,
}

#[derive(Debug, Default)]
struct IntroGate {
    started: bool,
    complete: bool,
    poll: Option<TaskId>,
    fallback: Option<TaskId>,
}

type Outbox = Rc<RefCell<Vec<Event>>>;

/// One viewer session: navigation, synchronized playback, mute and view state
/// behind a single command entry point.
///
/// Synchronous consequences of a command are returned from
/// [`handle_command`](Self::handle_command). Consequences that happen later
/// (finished transitions, auto-advance, intro completion) are queued and
/// drained with [`take_events`](Self::take_events).
pub struct Session<H: MediaHandle + 'static> {
    config: SessionConfig,
    navigator: Rc<RefCell<Navigator>>,
    sync: VideoSync<H>,
    audio: MuteToggle,
    mute_bridge: Option<MuteBridge>,
    scheduler: Rc<dyn Scheduler>,
    outbox: Outbox,
    transition: Rc<Cell<Option<TaskId>>>,
    auto_advance: Rc<Cell<bool>>,
    intro: Rc<RefCell<IntroGate>>,
    view_mode: ViewMode,
    subscriptions: Vec<Subscription>,
}

impl<H: MediaHandle + 'static> Session<H> {
    /// Wires a session over `handles`, one per timeline.
    pub fn new(
        handles: TimelineMap<H>,
        scheduler: Rc<dyn Scheduler>,
        clock: Rc<dyn Clock>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;

        let initial = config.initial_timeline;
        let sync = VideoSync::new(
            handles,
            Rc::clone(&scheduler),
            initial,
            config.sync_options(),
        );
        let navigator = Rc::new(RefCell::new(Navigator::new(initial, clock)));
        let audio = MuteToggle::new(config.start_muted);
        audio.set_master_volume(config.master_volume);
        let mute_bridge = MuteBridge::connect(&audio, &sync);
        let outbox: Outbox = Rc::default();
        let transition = Rc::new(Cell::new(None));
        let auto_advance = Rc::new(Cell::new(config.auto_advance));

        let on_navigate = navigator.borrow().on_navigate({
            let sync = sync.clone();
            let scheduler = Rc::clone(&scheduler);
            let outbox = Rc::clone(&outbox);
            let transition = Rc::clone(&transition);
            let duration = config.transition_duration();
            move |event: &NavigationEvent| {
                sync.set_active_timeline(event.to, SwitchOptions::default());
                {
                    let mut outbox = outbox.borrow_mut();
                    outbox.push(Event::Navigated(*event));
                    outbox.push(Event::TransitionStarted {
                        from: event.from,
                        to: event.to,
                    });
                }

                if let Some(stale) = transition.take() {
                    scheduler.cancel(stale);
                }
                let to = event.to;
                let finished = Rc::clone(&transition);
                let outbox = Rc::clone(&outbox);
                let task = scheduler.schedule(
                    duration,
                    Box::new(move || {
                        finished.set(None);
                        outbox.borrow_mut().push(Event::TransitionFinished { to });
                    }),
                );
                transition.set(Some(task));
            }
        });

        let on_ended = sync.on_video_ended({
            let navigator = Rc::downgrade(&navigator);
            let sync = sync.downgrade();
            let auto_advance = Rc::clone(&auto_advance);
            let outbox = Rc::clone(&outbox);
            move |ended| advance_after_end(&navigator, &sync, &auto_advance, &outbox, ended)
        });

        info!(
            initial = %initial,
            auto_advance = config.auto_advance,
            start_muted = config.start_muted,
            "session created"
        );

        Ok(Self {
            config,
            navigator,
            sync,
            audio,
            mute_bridge: Some(mute_bridge),
            scheduler,
            outbox,
            transition,
            auto_advance,
            intro: Rc::default(),
            view_mode: ViewMode::Single,
            subscriptions: vec![on_navigate, on_ended],
        })
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        let mark = self.outbox.borrow().len();
        let mut direct = match command {
            Command::Load => self.load(),
            Command::Navigate(direction) => {
                self.navigator.borrow_mut().navigate_direction(direction);
                Ok(Vec::new())
            }
            Command::NavigateTo(target) => {
                self.navigator.borrow_mut().navigate_to_timeline(target);
                Ok(Vec::new())
            }
            Command::SelectTimeline(target) => self.select_timeline(target),
            Command::Play => {
                self.sync.play();
                Ok(Vec::new())
            }
            Command::Pause => {
                self.sync.pause();
                Ok(Vec::new())
            }
            Command::TogglePlayPause => {
                self.sync.toggle_play_pause();
                Ok(Vec::new())
            }
            Command::Seek { seconds } => self.sync.seek(seconds).map(|()| Vec::new()),
            Command::SeekToProgress { percent } => {
                self.sync.seek_to_progress(percent).map(|()| Vec::new())
            }
            Command::SetMuted(muted) => Ok(self.set_muted(muted)),
            Command::ToggleMute => Ok(self.set_muted(!self.audio.is_muted())),
            Command::SetMasterVolume(volume) => self.set_master_volume(volume),
            Command::SetAutoAdvance(enabled) => {
                self.auto_advance.set(enabled);
                debug!(enabled, "auto-advance updated");
                Ok(Vec::new())
            }
            Command::CycleViewMode => Ok(self.set_view_mode(self.view_mode.next())),
            Command::SetViewMode(mode) => Ok(self.set_view_mode(mode)),
            Command::Reset => self.reset(),
        }?;

        let mut events = self.outbox.borrow_mut().split_off(mark);
        events.append(&mut direct);
        Ok(events)
    }

    /// Like [`handle_command`](Self::handle_command), but reports failures as
    /// [`Event::Error`] instead of returning them.
    pub fn dispatch(&mut self, command: Command) -> Vec<Event> {
        match self.handle_command(command) {
            Ok(events) => events,
            Err(error) => {
                warn!(%error, "command failed");
                let mut events = self.take_events();
                events.push(Event::Error(EngineErrorEvent::from_error(&error)));
                events
            }
        }
    }

    /// Drains events produced by scheduled work since the last call.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let navigator = self.navigator.borrow();
        let playback = self.sync.state();
        SessionSnapshot {
            active_timeline: navigator.active(),
            previous_timeline: navigator.previous(),
            history: navigator.history().to_vec(),
            memory_map: navigator.memory_map().clone(),
            playback,
            progress: playback.progress(),
            muted: self.audio.is_muted(),
            master_volume: self.audio.master_volume(),
            view_mode: self.view_mode,
            auto_advance: self.auto_advance.get(),
            transitioning: self.is_transitioning(),
            intro_complete: self.intro.borrow().complete,
            load_states: TimelineId::ALL
                .into_iter()
                .map(|id| (id, self.sync.load_state(id)))
                .collect(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn navigator(&self) -> Ref<'_, Navigator> {
        self.navigator.borrow()
    }

    pub fn sync(&self) -> &VideoSync<H> {
        &self.sync
    }

    pub fn audio(&self) -> &MuteToggle {
        &self.audio
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.get().is_some()
    }

    fn load(&mut self) -> Result<Vec<Event>> {
        self.sync.load_sources(&self.config.sources());
        self.begin_intro();
        Ok(Vec::new())
    }

    fn begin_intro(&self) {
        {
            let mut gate = self.intro.borrow_mut();
            if gate.started {
                return;
            }
            gate.started = true;
        }

        let context = IntroContext {
            sync: self.sync.downgrade(),
            gate: Rc::clone(&self.intro),
            scheduler: Rc::downgrade(&self.scheduler),
            outbox: Rc::clone(&self.outbox),
            interval: self.config.readiness_poll_interval(),
        };
        let fallback = {
            let context = context.clone();
            self.scheduler.schedule(
                self.config.intro_fallback(),
                Box::new(move || {
                    warn!("intro fallback elapsed before every timeline was ready");
                    context.complete(false);
                }),
            )
        };
        self.intro.borrow_mut().fallback = Some(fallback);
        schedule_intro_poll(context);
        debug!(
            fallback_ms = self.config.intro_fallback_ms,
            poll_ms = self.config.readiness_poll_ms,
            "intro gate started"
        );
    }

    fn select_timeline(&mut self, target: TimelineId) -> Result<Vec<Event>> {
        self.navigator.borrow_mut().navigate_to_timeline(target);
        if self.view_mode == ViewMode::Quad {
            return Ok(self.set_view_mode(ViewMode::Single));
        }
        Ok(Vec::new())
    }

    fn set_muted(&mut self, muted: bool) -> Vec<Event> {
        if self.audio.set(muted) {
            vec![Event::MuteChanged { muted }]
        } else {
            Vec::new()
        }
    }

    fn set_master_volume(&mut self, volume: f64) -> Result<Vec<Event>> {
        if !volume.is_finite() {
            return Err(EngineError::InvalidVolume(volume));
        }
        if !self.audio.set_master_volume(volume) {
            return Ok(Vec::new());
        }
        Ok(vec![Event::MasterVolumeChanged {
            volume: self.audio.master_volume(),
        }])
    }

    fn set_view_mode(&mut self, mode: ViewMode) -> Vec<Event> {
        if self.view_mode == mode {
            return Vec::new();
        }
        self.view_mode = mode;
        debug!(?mode, "view mode changed");
        vec![Event::ViewModeChanged(mode)]
    }

    fn reset(&mut self) -> Result<Vec<Event>> {
        let initial = {
            let mut navigator = self.navigator.borrow_mut();
            navigator.reset();
            navigator.initial()
        };
        if let Some(task) = self.transition.take() {
            self.scheduler.cancel(task);
        }
        self.sync.set_active_timeline(
            initial,
            SwitchOptions {
                start_from_beginning: true,
            },
        );
        self.sync.seek(0.0)?;
        Ok(vec![Event::Reset { timeline: initial }])
    }
}

impl<H: MediaHandle + 'static> Drop for Session<H> {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
        if let Some(bridge) = self.mute_bridge.take() {
            bridge.disconnect();
        }
    }
}

impl<H: MediaHandle + 'static> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("navigator", &*self.navigator.borrow())
            .field("sync", &self.sync)
            .field("view_mode", &self.view_mode)
            .field("auto_advance", &self.auto_advance.get())
            .finish()
    }
}

fn advance_after_end<H: MediaHandle + 'static>(
    navigator: &Weak<RefCell<Navigator>>,
    sync: &WeakVideoSync<H>,
    auto_advance: &Cell<bool>,
    outbox: &Outbox,
    ended: TimelineId,
) {
    if !auto_advance.get() {
        return;
    }
    let (Some(navigator), Some(sync)) = (navigator.upgrade(), sync.upgrade()) else {
        return;
    };

    let next = ended.next();
    let moved = navigator.borrow_mut().navigate_to_timeline(next);
    if moved.is_none() {
        return;
    }
    if let Err(error) = sync.seek(0.0) {
        outbox
            .borrow_mut()
            .push(Event::Error(EngineErrorEvent::from_error(&error)));
        return;
    }
    sync.play();
    info!(from = %ended, to = %next, "auto-advanced to next timeline");
    outbox.borrow_mut().push(Event::AutoAdvanced {
        from: ended,
        to: next,
    });
}

struct IntroContext<H: MediaHandle + 'static> {
    sync: WeakVideoSync<H>,
    gate: Rc<RefCell<IntroGate>>,
    scheduler: Weak<dyn Scheduler>,
    outbox: Outbox,
    interval: std::time::Duration,
}

impl<H: MediaHandle + 'static> Clone for IntroContext<H> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
            gate: Rc::clone(&self.gate),
            scheduler: Weak::clone(&self.scheduler),
            outbox: Rc::clone(&self.outbox),
            interval: self.interval,
        }
    }
}

impl<H: MediaHandle + 'static> IntroContext<H> {
    fn complete(&self, all_ready: bool) {
        let (poll, fallback) = {
            let mut gate = self.gate.borrow_mut();
            if gate.complete {
                return;
            }
            gate.complete = true;
            (gate.poll.take(), gate.fallback.take())
        };
        if let Some(scheduler) = self.scheduler.upgrade() {
            for task in [poll, fallback].into_iter().flatten() {
                scheduler.cancel(task);
            }
        }
        info!(all_ready, "intro complete");
        self.outbox
            .borrow_mut()
            .push(Event::IntroComplete { all_ready });
    }
}

fn schedule_intro_poll<H: MediaHandle + 'static>(context: IntroContext<H>) {
    let Some(scheduler) = context.scheduler.upgrade() else {
        return;
    };
    let gate = Rc::clone(&context.gate);
    let interval = context.interval;
    let task = scheduler.schedule(
        interval,
        Box::new(move || {
            if context.gate.borrow().complete {
                return;
            }
            let ready = context
                .sync
                .upgrade()
                .is_some_and(|sync| sync.all_ready());
            if ready {
                context.complete(true);
            } else {
                schedule_intro_poll(context);
            }
        }),
    );
    gate.borrow_mut().poll = Some(task);
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use super::{Command, EngineErrorKind, Event, Session, ViewMode};
    use crate::config::SessionConfig;
    use crate::scheduler::ManualScheduler;
    use crate::sim::{SimProbe, SimulatedHandle};
    use crate::timeline::{Direction, TimelineId, TimelineMap};

    struct Rig {
        scheduler: Rc<ManualScheduler>,
        session: Session<SimulatedHandle>,
        probes: TimelineMap<SimProbe>,
    }

    fn rig(config: SessionConfig, make: impl Fn(TimelineId) -> SimulatedHandle) -> Rig {
        let scheduler = Rc::new(ManualScheduler::starting_at(1_000));
        let handles = TimelineMap::from_fn(make);
        let probes = TimelineMap::from_fn(|id| handles[id].probe());
        let session = Session::new(handles, scheduler.clone(), scheduler.clone(), config)
            .expect("session config should be valid");
        Rig {
            scheduler,
            session,
            probes,
        }
    }

    fn preloaded(config: SessionConfig) -> Rig {
        rig(config, |_| SimulatedHandle::preloaded(15.0))
    }

    #[test]
    fn navigate_switches_playback_and_emits_transition_events() {
        let mut rig = preloaded(SessionConfig::default());

        let events = rig
            .session
            .handle_command(Command::Navigate(Direction::East))
            .expect("navigate should succeed");

        assert_eq!(events.len(), 2);
        let Event::Navigated(navigation) = &events[0] else {
            panic!("first event must be Navigated");
        };
        assert_eq!(navigation.to, TimelineId::Sky);
        assert_eq!(
            events[1],
            Event::TransitionStarted {
                from: TimelineId::Catch,
                to: TimelineId::Sky,
            }
        );
        assert_eq!(rig.session.sync().active_timeline(), TimelineId::Sky);
        assert!(!rig.probes[TimelineId::Sky].is_muted());
        assert!(rig.probes[TimelineId::Catch].is_muted());
        assert!(rig.session.is_transitioning());

        rig.scheduler.advance(Duration::from_millis(599));
        assert!(rig.session.take_events().is_empty());
        rig.scheduler.advance(Duration::from_millis(1));
        assert_eq!(
            rig.session.take_events(),
            vec![Event::TransitionFinished { to: TimelineId::Sky }]
        );
        assert!(!rig.session.is_transitioning());
    }

    #[test]
    fn rapid_navigation_finishes_only_the_latest_transition() {
        let mut rig = preloaded(SessionConfig::default());

        rig.session
            .handle_command(Command::Navigate(Direction::East))
            .expect("navigate should succeed");
        rig.scheduler.advance(Duration::from_millis(300));
        rig.session
            .handle_command(Command::Navigate(Direction::South))
            .expect("navigate should succeed");
        rig.scheduler.advance(Duration::from_secs(1));

        assert_eq!(
            rig.session.take_events(),
            vec![Event::TransitionFinished {
                to: TimelineId::Tangled
            }]
        );
    }

    #[test]
    fn stay_direction_emits_nothing() {
        let mut rig = preloaded(SessionConfig::default());

        let events = rig
            .session
            .handle_command(Command::Navigate(Direction::North))
            .expect("navigate should succeed");

        assert!(events.is_empty());
        assert_eq!(rig.session.snapshot().active_timeline, TimelineId::Catch);
    }

    #[test]
    fn navigation_keeps_playback_running_on_new_timeline() {
        let mut rig = preloaded(SessionConfig::default());
        rig.session
            .handle_command(Command::Play)
            .expect("play should succeed");
        rig.probes[TimelineId::Catch].advance(3.0);

        rig.session
            .handle_command(Command::NavigateTo(TimelineId::Shared))
            .expect("navigate should succeed");

        let snapshot = rig.session.snapshot();
        assert_eq!(snapshot.playback.active_timeline, TimelineId::Shared);
        assert!(snapshot.playback.is_playing);
        assert_eq!(rig.probes[TimelineId::Shared].current_time(), 3.0);
    }

    #[test]
    fn select_timeline_from_quad_view_returns_to_single_view() {
        let mut rig = preloaded(SessionConfig::default());
        rig.session
            .handle_command(Command::CycleViewMode)
            .expect("cycle should succeed");

        let events = rig
            .session
            .handle_command(Command::SelectTimeline(TimelineId::Tangled))
            .expect("select should succeed");

        assert_eq!(events.last(), Some(&Event::ViewModeChanged(ViewMode::Single)));
        assert_eq!(rig.session.view_mode(), ViewMode::Single);
        assert_eq!(rig.session.snapshot().active_timeline, TimelineId::Tangled);
    }

    #[test]
    fn view_mode_names_round_trip_through_from_str() {
        assert_eq!("memory-map".parse::<ViewMode>().ok(), Some(ViewMode::MemoryMap));
        assert_eq!(" Quad ".parse::<ViewMode>().ok(), Some(ViewMode::Quad));
        let error = "grid".parse::<ViewMode>().expect_err("unknown mode must fail");
        assert_eq!(EngineErrorKind::from(&error), EngineErrorKind::UnknownIdentifier);
    }

    #[test]
    fn view_mode_cycles_through_three_layouts() {
        let mut rig = preloaded(SessionConfig::default());
        let mut seen = Vec::new();
        for _ in 0..3 {
            let events = rig
                .session
                .handle_command(Command::CycleViewMode)
                .expect("cycle should succeed");
            seen.extend(events);
        }

        assert_eq!(
            seen,
            vec![
                Event::ViewModeChanged(ViewMode::Quad),
                Event::ViewModeChanged(ViewMode::MemoryMap),
                Event::ViewModeChanged(ViewMode::Single),
            ]
        );
    }

    #[test]
    fn toggle_mute_reaches_every_handle() {
        let mut rig = preloaded(SessionConfig::default());

        let events = rig
            .session
            .handle_command(Command::ToggleMute)
            .expect("toggle should succeed");

        assert_eq!(events, vec![Event::MuteChanged { muted: true }]);
        for id in TimelineId::ALL {
            assert!(rig.probes[id].is_muted());
        }

        let events = rig
            .session
            .handle_command(Command::SetMuted(true))
            .expect("set muted should succeed");
        assert!(events.is_empty());
    }

    #[test]
    fn master_volume_defaults_and_clamps_through_commands() {
        let mut rig = preloaded(SessionConfig::default());
        assert_eq!(rig.session.snapshot().master_volume, 0.7);

        let events = rig
            .session
            .handle_command(Command::SetMasterVolume(1.4))
            .expect("volume should be accepted");
        assert_eq!(events, vec![Event::MasterVolumeChanged { volume: 1.0 }]);
        assert_eq!(rig.session.snapshot().master_volume, 1.0);

        let events = rig
            .session
            .handle_command(Command::SetMasterVolume(1.0))
            .expect("volume should be accepted");
        assert!(events.is_empty());

        let events = rig.session.dispatch(Command::SetMasterVolume(f64::NAN));
        let [Event::Error(error)] = events.as_slice() else {
            panic!("non-finite volume must be reported as an error");
        };
        assert_eq!(error.kind, EngineErrorKind::InvalidVolume);
        assert_eq!(rig.session.audio().master_volume(), 1.0);
    }

    #[test]
    fn start_muted_config_keeps_active_handle_silent() {
        let config = SessionConfig {
            start_muted: true,
            ..SessionConfig::default()
        };
        let rig = preloaded(config);

        assert!(rig.probes[TimelineId::Catch].is_muted());
        assert!(rig.session.snapshot().muted);
    }

    #[test]
    fn reset_returns_to_initial_timeline_and_rewinds() {
        let mut rig = preloaded(SessionConfig::default());
        for direction in [Direction::East, Direction::South] {
            rig.session
                .handle_command(Command::Navigate(direction))
                .expect("navigate should succeed");
        }
        rig.session
            .handle_command(Command::Seek { seconds: 9.0 })
            .expect("seek should succeed");

        let events = rig
            .session
            .handle_command(Command::Reset)
            .expect("reset should succeed");

        assert_eq!(
            events,
            vec![Event::Reset {
                timeline: TimelineId::Catch
            }]
        );
        let snapshot = rig.session.snapshot();
        assert_eq!(snapshot.active_timeline, TimelineId::Catch);
        assert_eq!(snapshot.playback.active_timeline, TimelineId::Catch);
        assert_eq!(snapshot.memory_map.exploration_percentage(), 25.0);
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.transitioning);
        for id in TimelineId::ALL {
            assert_eq!(rig.probes[id].current_time(), 0.0);
        }
    }

    #[test]
    fn auto_advance_moves_to_next_timeline_from_the_start() {
        let config = SessionConfig {
            auto_advance: true,
            ..SessionConfig::default()
        };
        let mut rig = preloaded(config);
        rig.session
            .handle_command(Command::Play)
            .expect("play should succeed");

        rig.probes[TimelineId::Catch].advance(15.0);
        rig.scheduler.advance(Duration::ZERO);

        let events = rig.session.take_events();
        assert!(events.contains(&Event::AutoAdvanced {
            from: TimelineId::Catch,
            to: TimelineId::Sky,
        }));
        let snapshot = rig.session.snapshot();
        assert_eq!(snapshot.active_timeline, TimelineId::Sky);
        assert!(snapshot.playback.is_playing);
        assert_eq!(rig.probes[TimelineId::Sky].current_time(), 0.0);
        assert!(!rig.probes[TimelineId::Sky].is_paused());
    }

    #[test]
    fn end_of_media_without_auto_advance_stays_put() {
        let mut rig = preloaded(SessionConfig::default());
        rig.session
            .handle_command(Command::Play)
            .expect("play should succeed");

        rig.probes[TimelineId::Catch].advance(15.0);
        rig.scheduler.advance(Duration::ZERO);

        assert!(rig.session.take_events().is_empty());
        assert_eq!(rig.session.snapshot().active_timeline, TimelineId::Catch);
        assert!(!rig.session.snapshot().playback.is_playing);
    }

    #[test]
    fn intro_completes_once_every_timeline_is_ready() {
        let mut rig = rig(SessionConfig::default(), |_| SimulatedHandle::new(15.0));
        rig.session
            .handle_command(Command::Load)
            .expect("load should succeed");

        rig.scheduler.advance(Duration::from_millis(500));
        assert!(rig.session.take_events().is_empty());

        for id in TimelineId::ALL {
            rig.probes[id].finish_load();
        }
        rig.scheduler.advance(Duration::from_millis(250));

        assert_eq!(
            rig.session.take_events(),
            vec![Event::IntroComplete { all_ready: true }]
        );
        assert!(rig.session.snapshot().intro_complete);
        assert_eq!(rig.scheduler.pending(), 0);
    }

    #[test]
    fn intro_falls_back_after_timeout_when_media_never_loads() {
        let mut rig = rig(SessionConfig::default(), |_| SimulatedHandle::new(15.0));
        rig.session
            .handle_command(Command::Load)
            .expect("load should succeed");
        rig.probes[TimelineId::Sky].fail_load();

        rig.scheduler.advance(Duration::from_millis(2_499));
        assert!(rig.session.take_events().is_empty());
        rig.scheduler.advance(Duration::from_millis(1));

        assert_eq!(
            rig.session.take_events(),
            vec![Event::IntroComplete { all_ready: false }]
        );
        assert_eq!(rig.scheduler.pending(), 0);
    }

    #[test]
    fn dispatch_reports_invalid_seek_as_error_event() {
        let mut rig = preloaded(SessionConfig::default());

        let events = rig.session.dispatch(Command::Seek { seconds: -4.0 });

        let [Event::Error(error)] = events.as_slice() else {
            panic!("expected a single error event, got {events:?}");
        };
        assert_eq!(error.kind, EngineErrorKind::InvalidSeek);
        assert!(error.message.contains("-4"));
    }

    #[test]
    fn invalid_config_is_rejected_before_wiring() {
        let scheduler = Rc::new(ManualScheduler::new());
        let handles = TimelineMap::from_fn(|_| SimulatedHandle::preloaded(15.0));
        let config = SessionConfig {
            readiness_poll_ms: 0,
            ..SessionConfig::default()
        };

        let result = Session::new(handles, scheduler.clone(), scheduler, config);

        assert!(result.is_err());
    }
}
