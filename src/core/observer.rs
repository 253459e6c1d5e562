//! Push-style change notification with explicit unsubscription
//!
//! A [`Notifier`] delivers events synchronously to every registered listener.
//! Registering returns a [`Subscription`]; cancelling or dropping it removes the
//! listener, so a torn-down consumer never sees another event.
//!
//! Listeners must not register or notify on the same notifier from inside a
//! callback. Dropping a subscription during delivery is allowed.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<E> = Rc<dyn Fn(&E)>;

struct ListenerTable<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// Single-threaded event fan-out
pub struct Notifier<E> {
    table: Rc<RefCell<ListenerTable<E>>>,
}

impl<E: 'static> Notifier<E> {
    pub fn new() -> Self {
        Self {
            table: Rc::new(RefCell::new(ListenerTable {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// subscription is cancelled or dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn listen<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + 'static,
    {
        let id = {
            let mut table = self.table.borrow_mut();
            let id = table.next_id;
            table.next_id += 1;
            table.listeners.push((id, Rc::new(listener)));
            id
        };

        let weak: Weak<RefCell<ListenerTable<E>>> = Rc::downgrade(&self.table);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(table) = weak.upgrade() {
                    table.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Deliver an event to every current listener
    pub fn notify(&self, event: &E) {
        // Snapshot so listeners may unsubscribe while being called
        let listeners: Vec<Listener<E>> = self
            .table
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.table.borrow().listeners.len()
    }
}

impl<E: 'static> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.table.borrow().listeners.len())
            .finish()
    }
}

/// Handle to a registered listener
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Unsubscribe now
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A live configuration value that announces its changes
pub struct Setting<T> {
    value: RefCell<T>,
    notifier: Notifier<T>,
}

impl<T: Clone + PartialEq + 'static> Setting<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            notifier: Notifier::new(),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the value, notifying listeners only if it actually changed
    pub fn set(&self, value: T) {
        if *self.value.borrow() == value {
            return;
        }
        *self.value.borrow_mut() = value.clone();
        self.notifier.notify(&value);
    }

    /// Listen for changes; the listener receives the new value
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn listen<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.notifier.listen(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }
}

impl<T: fmt::Debug> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("value", &*self.value.borrow())
            .finish()
    }
}
