//! `setTimeout`-backed scheduling and wall-clock time.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use worlds_engine::scheduler::{Clock, Scheduler, Task, TaskId};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = "setTimeout")]
    fn set_timeout(callback: &JsValue, millis: i32) -> i32;

    #[wasm_bindgen(js_name = "clearTimeout")]
    fn clear_timeout(handle: i32);

    #[wasm_bindgen(js_namespace = Date, js_name = "now")]
    fn date_now() -> f64;
}

type TimeoutClosure = Closure<dyn FnMut()>;

/// [`Scheduler`] over the browser event loop.
///
/// Zero-delay tasks run on a later turn, never inside `schedule`.
#[derive(Clone, Default)]
pub struct TimeoutScheduler {
    inner: Rc<TimeoutInner>,
}

#[derive(Default)]
struct TimeoutInner {
    next_id: Cell<u64>,
    pending: RefCell<HashMap<u64, (i32, TimeoutClosure)>>,
    /// Closures whose callback already ran. Freed on the next `schedule`, not
    /// from inside their own invocation.
    retired: RefCell<Vec<TimeoutClosure>>,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }
}

impl Scheduler for TimeoutScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskId {
        self.inner.retired.borrow_mut().clear();

        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let weak = Rc::downgrade(&self.inner);
        let mut task = Some(task);
        let closure: TimeoutClosure = Closure::wrap(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let entry = inner.pending.borrow_mut().remove(&id);
            if let Some(task) = task.take() {
                task();
            }
            if let Some((_, closure)) = entry {
                inner.retired.borrow_mut().push(closure);
            }
        }) as Box<dyn FnMut()>);

        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let handle = set_timeout(closure.as_ref().unchecked_ref(), millis);
        self.inner
            .pending
            .borrow_mut()
            .insert(id, (handle, closure));
        TaskId(id)
    }

    fn cancel(&self, id: TaskId) {
        if let Some((handle, _closure)) = self.inner.pending.borrow_mut().remove(&id.0) {
            clear_timeout(handle);
        }
    }
}

impl Drop for TimeoutInner {
    fn drop(&mut self) {
        for (handle, _) in self.pending.get_mut().values() {
            clear_timeout(*handle);
        }
    }
}

/// [`Clock`] reading `Date.now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_millis(&self) -> u64 {
        let millis = date_now();
        if millis.is_finite() && millis > 0.0 {
            millis as u64
        } else {
            0
        }
    }
}
