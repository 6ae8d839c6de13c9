//! Page transitions.
//!
//! A transition gets two moments in every navigation:
//!
//! - [`exit`](PageTransition::exit) starts once the route is known and is
//!   awaited together with asset loading, so an exit animation and script
//!   loading overlap;
//! - [`enter`](PageTransition::enter) runs after the new content is in
//!   place and the routed event has fired.
//!
//! Cancelled navigations still ran `exit`; only the navigation that wins
//! reaches `enter`.

use async_trait::async_trait;
use futures::future::LocalBoxFuture;

/// Exit/enter hooks around a content swap.
#[async_trait(?Send)]
pub trait PageTransition {
    /// Play the exit animation; content is swapped after this resolves.
    async fn exit(&self);

    /// Start the enter animation.
    fn enter(&self);
}

/// No animation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransition;

#[async_trait(?Send)]
impl PageTransition for NoTransition {
    async fn exit(&self) {}

    fn enter(&self) {}
}

/// Create a transition from an exit future factory and an enter closure.
pub const fn transition_fn<X, E>(exit: X, enter: E) -> FnTransition<X, E>
where
    X: Fn() -> LocalBoxFuture<'static, ()> + 'static,
    E: Fn() + 'static,
{
    FnTransition { exit, enter }
}

/// Transition created from closures via [`transition_fn`].
pub struct FnTransition<X, E> {
    exit: X,
    enter: E,
}

#[async_trait(?Send)]
impl<X, E> PageTransition for FnTransition<X, E>
where
    X: Fn() -> LocalBoxFuture<'static, ()> + 'static,
    E: Fn() + 'static,
{
    async fn exit(&self) {
        (self.exit)().await;
    }

    fn enter(&self) {
        (self.enter)();
    }
}
