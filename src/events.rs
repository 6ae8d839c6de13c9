//! Router events.
//!
//! Two channels:
//!
//! - **routed**: fired after every completed navigation (never for
//!   cancelled ones or full reloads) with the path settings of the page
//!   now displayed;
//! - **error**: every [`RouteError`] the router surfaces without failing
//!   the navigation, such as a script that did not load.
//!
//! Subscribing returns a [`Subscription`]; call
//! [`unsubscribe`](Subscription::unsubscribe) to stop receiving events.
//! Handlers may subscribe or unsubscribe while an event is being emitted;
//! the change applies to the next emission.

use crate::active_link::PathSettings;
use crate::error::RouteError;
use crate::trace_log;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type RoutedHandler = Rc<dyn Fn(&PathSettings)>;
type ErrorHandler = Rc<dyn Fn(&RouteError)>;

/// Event hub shared by the router and its collaborators.
#[derive(Default)]
pub struct RouterEvents {
    next_id: Cell<usize>,
    routed: RefCell<Vec<(usize, RoutedHandler)>>,
    errors: RefCell<Vec<(usize, ErrorHandler)>>,
}

impl std::fmt::Debug for RouterEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterEvents")
            .field("routed", &self.routed.borrow().len())
            .field("errors", &self.errors.borrow().len())
            .finish()
    }
}

impl RouterEvents {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn take_id(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Subscribe to completed navigations.
    pub fn on_routed(self: &Rc<Self>, handler: impl Fn(&PathSettings) + 'static) -> Subscription {
        let id = self.take_id();
        self.routed.borrow_mut().push((id, Rc::new(handler)));
        Subscription {
            id,
            events: Rc::downgrade(self),
        }
    }

    /// Subscribe to surfaced errors.
    pub fn on_error(self: &Rc<Self>, handler: impl Fn(&RouteError) + 'static) -> Subscription {
        let id = self.take_id();
        self.errors.borrow_mut().push((id, Rc::new(handler)));
        Subscription {
            id,
            events: Rc::downgrade(self),
        }
    }

    pub fn emit_routed(&self, path: &PathSettings) {
        let handlers: Vec<RoutedHandler> = self
            .routed
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        trace_log!("Emitting routed to {} handlers", handlers.len());
        for handler in handlers {
            handler(path);
        }
    }

    pub fn emit_error(&self, error: &RouteError) {
        let handlers: Vec<ErrorHandler> = self
            .errors
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(error);
        }
    }

    fn remove(&self, id: usize) -> bool {
        let mut removed = false;
        self.routed.borrow_mut().retain(|(sub, _)| {
            let keep = *sub != id;
            removed |= !keep;
            keep
        });
        self.errors.borrow_mut().retain(|(sub, _)| {
            let keep = *sub != id;
            removed |= !keep;
            keep
        });
        removed
    }

    /// Drop every handler.
    pub fn clear(&self) {
        self.routed.borrow_mut().clear();
        self.errors.borrow_mut().clear();
    }
}

/// Handle to one registered handler.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: usize,
    events: Weak<RouterEvents>,
}

impl Subscription {
    /// Remove the handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.events
            .upgrade()
            .is_some_and(|events| events.remove(self.id))
    }
}
