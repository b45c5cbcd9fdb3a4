//! Observer hooks fired by mutable collections.
//!
//! Dispatch is synchronous, inside the mutating call: the specific event
//! first, then the generic [`CollectionEvent::Changed`]. Listeners must not
//! mutate the collection reentrantly.

use std::fmt;
use std::rc::Rc;

/// What a mutation did to the collection.
pub enum CollectionEvent<I> {
    ItemsAdded(Vec<Rc<I>>),
    ItemsRemoved(Vec<Rc<I>>),
    Cleared { count: usize },
    Changed,
}

pub type EventListener<I> = Rc<dyn Fn(&CollectionEvent<I>)>;

/// Listener registry embedded in every mutable index. Subscription order is
/// not part of the contract.
pub struct EventSource<I> {
    listeners: Vec<EventListener<I>>,
}

impl<I> Default for EventSource<I> {
    fn default() -> Self {
        EventSource {
            listeners: Vec::new(),
        }
    }
}

impl<I> EventSource<I> {
    pub fn subscribe(&mut self, listener: EventListener<I>) {
        self.listeners.push(listener);
    }

    fn fire(&self, event: &CollectionEvent<I>) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn fire_added(&self, items: Vec<Rc<I>>) {
        self.fire(&CollectionEvent::ItemsAdded(items));
        self.fire(&CollectionEvent::Changed);
    }

    pub fn fire_removed(&self, items: Vec<Rc<I>>) {
        self.fire(&CollectionEvent::ItemsRemoved(items));
        self.fire(&CollectionEvent::Changed);
    }

    pub fn fire_cleared(&self, count: usize) {
        self.fire(&CollectionEvent::Cleared { count });
        self.fire(&CollectionEvent::Changed);
    }
}

impl<I> fmt::Debug for EventSource<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
