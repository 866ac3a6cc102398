//! Timeline navigation state machine.

use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::observer::{Observers, Subscription};
use crate::scheduler::Clock;
use crate::timeline::{Direction, TimelineId, adjacent, first_direction_to};

/// One completed move between timelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub from: TimelineId,
    pub to: TimelineId,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    pub direction: Direction,
}

/// Which timelines the viewer has seen, and in what order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryMap {
    visited_timelines: BTreeSet<TimelineId>,
    current_path: Vec<NavigationEvent>,
    exploration_percentage: f64,
}

impl MemoryMap {
    /// Starts with only `initial` visited and an empty path.
    pub fn new(initial: TimelineId) -> Self {
        let mut map = Self {
            visited_timelines: BTreeSet::new(),
            current_path: Vec::new(),
            exploration_percentage: 0.0,
        };
        map.visit(initial);
        map
    }

    fn record(&mut self, event: NavigationEvent) {
        self.current_path.push(event);
        self.visit(event.to);
    }

    fn visit(&mut self, id: TimelineId) {
        self.visited_timelines.insert(id);
        self.exploration_percentage =
            self.visited_timelines.len() as f64 / TimelineId::COUNT as f64 * 100.0;
    }

    pub fn visited_timelines(&self) -> &BTreeSet<TimelineId> {
        &self.visited_timelines
    }

    pub fn has_visited(&self, id: TimelineId) -> bool {
        self.visited_timelines.contains(&id)
    }

    /// Moves taken since the last reset, oldest first.
    pub fn current_path(&self) -> &[NavigationEvent] {
        &self.current_path
    }

    pub fn exploration_percentage(&self) -> f64 {
        self.exploration_percentage
    }
}

/// Tracks the active timeline, navigation history and exploration progress.
///
/// Every successful move notifies the callbacks registered with
/// [`on_navigate`](Self::on_navigate) before the navigating call returns.
///
/// # Example
/// ```
/// use std::rc::Rc;
///
/// use worlds_engine::navigation::Navigator;
/// use worlds_engine::scheduler::SystemClock;
/// use worlds_engine::{Direction, TimelineId};
///
/// let mut navigator = Navigator::new(TimelineId::Catch, Rc::new(SystemClock));
/// navigator.navigate_direction(Direction::East);
///
/// assert_eq!(navigator.active(), TimelineId::Sky);
/// assert_eq!(navigator.memory_map().exploration_percentage(), 50.0);
/// ```
pub struct Navigator {
    initial: TimelineId,
    active: TimelineId,
    previous: Option<TimelineId>,
    history: Vec<NavigationEvent>,
    memory_map: MemoryMap,
    clock: Rc<dyn Clock>,
    transitions: Observers<NavigationEvent>,
}

impl Navigator {
    pub fn new(initial: TimelineId, clock: Rc<dyn Clock>) -> Self {
        Self {
            initial,
            active: initial,
            previous: None,
            history: Vec::new(),
            memory_map: MemoryMap::new(initial),
            clock,
            transitions: Observers::new(),
        }
    }

    /// Moves one step in `direction`. Returns `None` when the direction loops
    /// back onto the active timeline.
    pub fn navigate_direction(&mut self, direction: Direction) -> Option<NavigationEvent> {
        let target = adjacent(self.active, direction);
        if target == self.active {
            debug!(timeline = %self.active, %direction, "direction stays on active timeline");
            return None;
        }

        let event = NavigationEvent {
            from: self.active,
            to: target,
            timestamp: self.clock.now_millis(),
            direction,
        };
        self.previous = Some(self.active);
        self.active = target;
        self.history.push(event);
        self.memory_map.record(event);

        info!(
            from = %event.from,
            to = %event.to,
            %direction,
            explored = self.memory_map.exploration_percentage,
            "navigated"
        );
        self.transitions.notify(&event);
        Some(event)
    }

    /// Jumps straight to `target` using the first direction, in canonical
    /// order, that leads there.
    pub fn navigate_to_timeline(&mut self, target: TimelineId) -> Option<NavigationEvent> {
        if target == self.active {
            return None;
        }
        let direction = first_direction_to(self.active, target)?;
        self.navigate_direction(direction)
    }

    pub fn can_navigate(&self, direction: Direction) -> bool {
        adjacent(self.active, direction) != self.active
    }

    /// Timeline reached from the active one in `direction`.
    pub fn timeline_in_direction(&self, direction: Direction) -> TimelineId {
        adjacent(self.active, direction)
    }

    /// Returns to the initial timeline and forgets history and exploration.
    ///
    /// Does not notify navigation callbacks.
    pub fn reset(&mut self) {
        self.active = self.initial;
        self.previous = None;
        self.history.clear();
        self.memory_map = MemoryMap::new(self.initial);
        info!(timeline = %self.initial, "navigation reset");
    }

    /// Registers a callback run synchronously after every successful move.
    pub fn on_navigate(&self, mut callback: impl FnMut(&NavigationEvent) + 'static) -> Subscription {
        self.transitions.subscribe(move |event: &NavigationEvent| callback(event))
    }

    pub fn initial(&self) -> TimelineId {
        self.initial
    }

    pub fn active(&self) -> TimelineId {
        self.active
    }

    pub fn previous(&self) -> Option<TimelineId> {
        self.previous
    }

    pub fn history(&self) -> &[NavigationEvent] {
        &self.history
    }

    pub fn memory_map(&self) -> &MemoryMap {
        &self.memory_map
    }
}

impl Debug for Navigator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("initial", &self.initial)
            .field("active", &self.active)
            .field("previous", &self.previous)
            .field("history", &self.history.len())
            .field("memory_map", &self.memory_map)
            .finish()
    }
}
