use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};

type Callback<A> = Rc<RefCell<dyn FnMut(&A)>>;

struct Slots<A> {
    next_id: u64,
    entries: Vec<(u64, Callback<A>)>,
}

/// Ordered set of callbacks notified with a shared value.
///
/// Callbacks may register or cancel other callbacks while being notified;
/// changes take effect from the next notification.
pub struct Observers<A> {
    slots: Rc<RefCell<Slots<A>>>,
}

impl<A: 'static> Observers<A> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers `callback` and returns the token that removes it again.
    pub fn subscribe(&self, callback: impl FnMut(&A) + 'static) -> Subscription {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            let callback: Callback<A> = Rc::new(RefCell::new(callback));
            slots.entries.push((id, callback));
            id
        };

        let weak: Weak<RefCell<Slots<A>>> = Rc::downgrade(&self.slots);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Calls every registered callback in registration order.
    pub fn notify(&self, value: &A) {
        let callbacks: Vec<Callback<A>> = self
            .slots
            .borrow()
            .entries
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            (callback.borrow_mut())(value);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: 'static> Default for Observers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Debug for Observers<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.slots.borrow().entries.len())
            .finish()
    }
}

/// De-registration token returned by [`Observers::subscribe`].
///
/// Dropping the token keeps the callback registered; call
/// [`cancel`](Self::cancel) to remove it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::Observers;

    #[test]
    fn notify_reaches_every_subscriber_in_order() {
        let observers = Observers::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for label in ["first", "second"] {
            let log = Rc::clone(&log);
            let _ = observers.subscribe(move |value| log.borrow_mut().push((label, *value)));
        }

        observers.notify(&7);

        assert_eq!(*log.borrow(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn cancelled_subscription_is_not_notified() {
        let observers = Observers::<u32>::new();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let subscription = observers.subscribe(move |_| *counter.borrow_mut() += 1);

        subscription.cancel();
        observers.notify(&1);

        assert_eq!(*hits.borrow(), 0);
        assert!(observers.is_empty());
    }

    #[test]
    fn subscriber_may_cancel_itself_while_being_notified() {
        let observers = Rc::new(Observers::<u32>::new());
        let slot: Rc<RefCell<Option<super::Subscription>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(RefCell::new(0));

        let own_slot = Rc::clone(&slot);
        let counter = Rc::clone(&hits);
        let subscription = observers.subscribe(move |_| {
            *counter.borrow_mut() += 1;
            if let Some(subscription) = own_slot.borrow_mut().take() {
                subscription.cancel();
            }
        });
        *slot.borrow_mut() = Some(subscription);

        observers.notify(&1);
        observers.notify(&2);

        assert_eq!(*hits.borrow(), 1);
    }
}
