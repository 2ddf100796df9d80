//! Task-scoped "who is acting" context.
//!
//! A unit of work (one request, one CLI command, one background job) runs
//! inside [`scope`] or [`sync_scope`]. Code anywhere below it, such as the
//! audit hook in the storage layer, reads the actor with
//! [`get_current_actor`] instead of taking it as a parameter.
//!
//! The value lives in a `tokio` task-local, so concurrent tasks never see each
//! other's actor and nothing survives past the end of the scope, including
//! scopes that end in an error or a panic.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

tokio::task_local! {
    static CURRENT: RefCell<ActorContext>;
}

/// Identity credited with a change, e.g. `user:42` or `system:init`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Actor for automated work, e.g. `system:seed`.
    #[must_use]
    pub fn system(operation: &str) -> Self {
        Self(format!("system:{operation}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ActorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Everything known about the caller of the current unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    /// `None` for anonymous or system-initiated work.
    pub actor: Option<ActorId>,
    pub client_address: Option<IpAddr>,
    pub client_agent: Option<String>,
}

impl ActorContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_actor(actor: impl Into<ActorId>) -> Self {
        Self {
            actor: Some(actor.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_client_address(mut self, address: IpAddr) -> Self {
        self.client_address = Some(address);
        self
    }

    #[must_use]
    pub fn with_client_agent(mut self, agent: impl Into<String>) -> Self {
        self.client_agent = Some(agent.into());
        self
    }
}

/// Run `work` as one unit of work with `ctx` as its starting context.
pub async fn scope<F>(ctx: ActorContext, work: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(RefCell::new(ctx), work).await
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<F, R>(ctx: ActorContext, work: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT.sync_scope(RefCell::new(ctx), work)
}

/// Whether the caller is inside a unit of work.
#[must_use]
pub fn in_scope() -> bool {
    CURRENT.try_with(|_| ()).is_ok()
}

/// Replace the actor of the current unit of work.
pub fn set_current_actor(actor: Option<ActorId>) {
    update(|ctx| ctx.actor = actor);
}

/// The actor of the current unit of work, or `None` outside any scope.
#[must_use]
pub fn get_current_actor() -> Option<ActorId> {
    CURRENT
        .try_with(|ctx| ctx.borrow().actor.clone())
        .ok()
        .flatten()
}

/// Set the caller address and agent string of the current unit of work.
pub fn set_client(address: Option<IpAddr>, agent: Option<String>) {
    update(|ctx| {
        ctx.client_address = address;
        ctx.client_agent = agent;
    });
}

/// Copy of the whole current context; the default context outside any scope.
#[must_use]
pub fn current() -> ActorContext {
    CURRENT
        .try_with(|ctx| ctx.borrow().clone())
        .unwrap_or_default()
}

/// Reset the current unit of work to the anonymous context.
pub fn clear() {
    update(|ctx| *ctx = ActorContext::default());
}

fn update(apply: impl FnOnce(&mut ActorContext)) {
    if CURRENT.try_with(|ctx| apply(&mut ctx.borrow_mut())).is_err() {
        tracing::warn!("actor context changed outside a unit of work; ignoring");
    }
}
