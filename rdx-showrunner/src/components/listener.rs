//! Callback listeners for named show notifications.

use crate::common::ListenerId;
use crate::events::{EventKind, ShowEvent};
use slotmap::SlotMap;

/// A callback invoked with each matching notification.
pub type EventCallback = Box<dyn FnMut(&ShowEvent) + Send + Sync>;

/// A callback bound to one notification kind.
#[doc(hidden)]
pub(crate) struct EventListener {
    pub kind: EventKind,
    pub callback: EventCallback,
}

impl EventListener {
    pub(crate) fn new(kind: EventKind, callback: EventCallback) -> Self {
        Self { kind, callback }
    }

    /// Runs the callback if the event is of the watched kind.
    /// Returns `true` if the callback was executed.
    pub(crate) fn process(&mut self, event: &ShowEvent) -> bool {
        if event.kind() == self.kind {
            (self.callback)(event);
            true
        } else {
            false
        }
    }
}

/// Owns every registered listener, keyed by a never-reused `ListenerId`.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: SlotMap<ListenerId, EventListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventKind, callback: EventCallback) -> ListenerId {
        self.listeners.insert(EventListener::new(kind, callback))
    }

    /// Returns `true` if the listener was found and removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    /// Hands the event to every listener of its kind, returning how many ran.
    pub fn dispatch(&mut self, event: &ShowEvent) -> usize {
        self.listeners
            .values_mut()
            .map(|listener| listener.process(event))
            .filter(|fired| *fired)
            .count()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
