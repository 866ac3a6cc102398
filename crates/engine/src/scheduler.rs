//! Deferred task scheduling and wall-clock access.
//!
//! Retries, transition timers and the intro fallback all go through
//! [`Scheduler`] so they can run against a logical clock in tests
//! ([`ManualScheduler`]) and a real one in production ([`InstantScheduler`] or
//! a browser timer backend).

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Work deferred to a later turn of the event loop.
pub type Task = Box<dyn FnOnce()>;

/// Handle for cancelling a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// Single-threaded task scheduler.
///
/// Implementations must never run `task` from inside `schedule`; tasks always
/// run on a later turn, after the caller has returned.
pub trait Scheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskId;

    /// Cancels a pending task. Unknown or already-run ids are ignored.
    fn cancel(&self, id: TaskId);
}

/// Source of wall-clock timestamps for navigation history.
pub trait Clock {
    /// Milliseconds since the UNIX epoch.
    fn now_millis(&self) -> u64;
}

/// Reads the operating system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Pending tasks ordered by due time, then by scheduling order.
#[derive(Default)]
struct TaskQueue {
    next_id: Cell<u64>,
    tasks: RefCell<BTreeMap<(Duration, u64), Task>>,
}

impl TaskQueue {
    fn push(&self, due: Duration, task: Task) -> TaskId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.tasks.borrow_mut().insert((due, id), task);
        TaskId(id)
    }

    fn cancel(&self, id: TaskId) {
        self.tasks.borrow_mut().retain(|(_, task_id), _| *task_id != id.0);
    }

    /// Removes the earliest task due at or before `now`.
    ///
    /// The queue borrow is released before the caller runs the task, so tasks
    /// may schedule or cancel freely.
    fn pop_due(&self, now: Duration) -> Option<(Duration, Task)> {
        let mut tasks = self.tasks.borrow_mut();
        let (&(due, id), _) = tasks.iter().next()?;
        if due > now {
            return None;
        }
        tasks.remove(&(due, id)).map(|task| (due, task))
    }

    fn next_due(&self) -> Option<Duration> {
        self.tasks.borrow().keys().next().map(|(due, _)| *due)
    }

    fn len(&self) -> usize {
        self.tasks.borrow().len()
    }
}

/// Logical-clock scheduler: time only moves when [`advance`](Self::advance) is called.
///
/// # Example
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use std::time::Duration;
///
/// use worlds_engine::scheduler::{ManualScheduler, Scheduler};
///
/// let scheduler = ManualScheduler::new();
/// let fired = Rc::new(Cell::new(false));
/// let flag = Rc::clone(&fired);
/// scheduler.schedule(Duration::from_millis(100), Box::new(move || flag.set(true)));
///
/// scheduler.advance(Duration::from_millis(99));
/// assert!(!fired.get());
/// scheduler.advance(Duration::from_millis(1));
/// assert!(fired.get());
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    epoch_millis: u64,
    queue: TaskQueue,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler whose [`Clock`] starts at `epoch_millis`.
    pub fn starting_at(epoch_millis: u64) -> Self {
        Self {
            epoch_millis,
            ..Self::default()
        }
    }

    /// Logical time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.now.get()
    }

    /// Moves logical time forward by `by`, running every task that falls due,
    /// including tasks scheduled by other tasks within the window.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        while let Some((due, task)) = self.queue.pop_due(target) {
            if due > self.now.get() {
                self.now.set(due);
            }
            task();
        }
        self.now.set(target);
    }

    /// Number of tasks still waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskId {
        self.queue.push(self.now.get() + delay, task)
    }

    fn cancel(&self, id: TaskId) {
        self.queue.cancel(id);
    }
}

impl Clock for ManualScheduler {
    fn now_millis(&self) -> u64 {
        self.epoch_millis + self.now.get().as_millis() as u64
    }
}

impl Debug for ManualScheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now.get())
            .field("epoch_millis", &self.epoch_millis)
            .field("pending", &self.queue.len())
            .finish()
    }
}

/// Wall-clock scheduler for native event loops.
///
/// The host loop calls [`run_due`](Self::run_due) and may sleep for
/// [`time_until_next`](Self::time_until_next) between turns.
pub struct InstantScheduler {
    origin: Instant,
    queue: TaskQueue,
}

impl InstantScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            queue: TaskQueue::default(),
        }
    }

    /// Runs every task whose deadline has passed. Returns how many ran.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        while let Some((_, task)) = self.queue.pop_due(self.origin.elapsed()) {
            task();
            ran += 1;
        }
        ran
    }

    /// Time until the next pending task, or `None` when idle.
    pub fn time_until_next(&self) -> Option<Duration> {
        self.queue
            .next_due()
            .map(|due| due.saturating_sub(self.origin.elapsed()))
    }
}

impl Default for InstantScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for InstantScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskId {
        self.queue.push(self.origin.elapsed() + delay, task)
    }

    fn cancel(&self, id: TaskId) {
        self.queue.cancel(id);
    }
}

impl Clock for InstantScheduler {
    fn now_millis(&self) -> u64 {
        SystemClock.now_millis()
    }
}

impl Debug for InstantScheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstantScheduler")
            .field("elapsed", &self.origin.elapsed())
            .field("pending", &self.queue.len())
            .finish()
    }
}
