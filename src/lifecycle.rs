//! Page behavior hooks around content replacement.
//!
//! Scripts on the page usually keep per-element state (event listeners,
//! widgets, observers) inside the content regions. Before the router
//! touches any region it calls [`PageBehaviors::detach`]; after *all*
//! regions have been replaced it calls [`PageBehaviors::attach`] once.
//! Both receive every region key of the document and the live settings.
//!
//! # Creating behaviors
//!
//! | Approach | When to use |
//! |----------|-------------|
//! | Implement [`PageBehaviors`] | Named type with its own state |
//! | [`behaviors_fn`] | Quick hook pair from two closures |
//!
//! # Example
//!
//! ```
//! use fragment_navigator::behaviors_fn;
//!
//! let behaviors = behaviors_fn(
//!     |regions, _settings| println!("detaching {regions:?}"),
//!     |regions, _settings| println!("attaching {regions:?}"),
//! );
//! # let _ = behaviors;
//! ```

use serde_json::{Map, Value};

/// Detach/attach hooks called by the navigator.
pub trait PageBehaviors {
    /// Called before any region changes.
    fn detach(&self, regions: &[String], settings: &Map<String, Value>);

    /// Called once after every region has been updated.
    fn attach(&self, regions: &[String], settings: &Map<String, Value>);
}

/// Behaviors that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBehaviors;

impl PageBehaviors for NoBehaviors {
    fn detach(&self, _regions: &[String], _settings: &Map<String, Value>) {}

    fn attach(&self, _regions: &[String], _settings: &Map<String, Value>) {}
}

/// Create behaviors from two closures (detach and attach).
pub const fn behaviors_fn<D, A>(detach: D, attach: A) -> FnBehaviors<D, A>
where
    D: Fn(&[String], &Map<String, Value>) + 'static,
    A: Fn(&[String], &Map<String, Value>) + 'static,
{
    FnBehaviors { detach, attach }
}

/// Behaviors created from two closures via [`behaviors_fn`].
pub struct FnBehaviors<D, A> {
    detach: D,
    attach: A,
}

impl<D, A> PageBehaviors for FnBehaviors<D, A>
where
    D: Fn(&[String], &Map<String, Value>) + 'static,
    A: Fn(&[String], &Map<String, Value>) + 'static,
{
    fn detach(&self, regions: &[String], settings: &Map<String, Value>) {
        (self.detach)(regions, settings);
    }

    fn attach(&self, regions: &[String], settings: &Map<String, Value>) {
        (self.attach)(regions, settings);
    }
}
