//! Interception agent
//!
//! The agent reacts to four lifecycle signals delivered by a host:
//!
//! | Signal | Handler | Effect |
//! |--------|---------|--------|
//! | install | [`LifecycleHandler::on_install`] | cache the shell manifest, request skip-waiting |
//! | activate | [`LifecycleHandler::on_activate`] | delete stale generations, claim clients |
//! | fetch | [`LifecycleHandler::on_fetch`] | bypass, cache-first, network, offline fallback |
//! | message | [`LifecycleHandler::on_message`] | `SKIP_WAITING` forces activation |
//!
//! Handlers return futures; keeping the host's signal open until they
//! resolve is the host's job (see [`crate::host::WorkerHost`]).

mod interceptor;
mod message;

pub use interceptor::InterceptionAgent;
pub use message::ClientMessage;

use crate::error::AgentResult;
use crate::request::{Request, Response};
use async_trait::async_trait;
use futures_util::future::BoxFuture;

/// Capabilities the host exposes to a handler while it runs.
///
/// `skip_waiting` and `claim_clients` only record the request; the host acts
/// on them once the handler's future has completed.
pub trait HostControl: Send + Sync {
    /// Activate without waiting for existing clients to close
    fn skip_waiting(&self);

    /// Take control of every open client immediately
    fn claim_clients(&self);

    /// Run `task` in the background. The handler never learns how it ends;
    /// the host only keeps itself alive until it does.
    fn wait_until(&self, task: BoxFuture<'static, ()>);
}

/// Outcome of stale-generation cleanup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Buckets removed
    pub deleted: Vec<String>,
    /// Buckets whose deletion failed and were left in place
    pub failed: Vec<String>,
}

/// One method per host signal
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// Populate the current generation. Any failure fails the install.
    async fn on_install(&self, host: &dyn HostControl) -> AgentResult<()>;

    /// Garbage-collect every generation except the current one
    async fn on_activate(&self, host: &dyn HostControl) -> AgentResult<ActivationReport>;

    /// Produce a response for an intercepted request.
    ///
    /// `Ok(None)` means no response could be produced.
    async fn on_fetch(
        &self,
        request: &Request,
        host: &dyn HostControl,
    ) -> AgentResult<Option<Response>>;

    /// Handle a structured message from a page
    async fn on_message(
        &self,
        message: &serde_json::Value,
        host: &dyn HostControl,
    ) -> AgentResult<()>;

    /// Cache generation this handler serves
    fn generation(&self) -> &str;
}
