//! Host adapter for the interception agent
//!
//! Bridges a runtime's signals to a [`LifecycleHandler`]. The host owns the
//! lifecycle state and keeps every install/activate signal open until the
//! handler's future resolves. Skip-waiting and client claiming requested by
//! the handler are acted on here once that future completes.

mod lifecycle;
mod registration;

pub use lifecycle::{LifecycleState, Transition};
pub use registration::Registration;

use crate::agent::{ActivationReport, HostControl, LifecycleHandler};
use crate::error::{AgentError, AgentResult};
use crate::network::NetworkFetcher;
use crate::request::{Request, Response};
use futures_util::future::{join_all, BoxFuture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Flags a handler raises through [`HostControl`], plus its background tasks
#[derive(Debug, Default)]
struct Controls {
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl HostControl for Controls {
    fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    fn claim_clients(&self) {
        self.claimed.store(true, Ordering::SeqCst);
    }

    fn wait_until(&self, task: BoxFuture<'static, ()>) {
        let handle = tokio::spawn(task);
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

/// Runs one agent instance through its lifecycle and routes requests to it
pub struct WorkerHost {
    handler: Arc<dyn LifecycleHandler>,
    network: Arc<dyn NetworkFetcher>,
    state: Mutex<LifecycleState>,
    controls: Controls,
    defer_activation: bool,
}

impl WorkerHost {
    /// Host a freshly registered agent
    pub fn new(handler: Arc<dyn LifecycleHandler>, network: Arc<dyn NetworkFetcher>) -> Self {
        Self {
            handler,
            network,
            state: Mutex::new(LifecycleState::Unregistered),
            controls: Controls::default(),
            defer_activation: false,
        }
    }

    /// Keep an installed agent waiting even if it asks to skip waiting.
    /// It activates on an explicit activate signal or a later
    /// `SKIP_WAITING` message.
    pub fn with_deferred_activation(mut self) -> Self {
        self.defer_activation = true;
        self
    }

    /// Host an agent that a previous process registered.
    ///
    /// A `Waiting` or `Active` registration of the same generation is picked
    /// up where it left off; anything else starts over as unregistered.
    pub fn resume(
        handler: Arc<dyn LifecycleHandler>,
        network: Arc<dyn NetworkFetcher>,
        registration: &Registration,
    ) -> Self {
        let host = Self::new(handler, network);
        if let Some(state) = registration.resumable_state(host.handler.generation()) {
            debug!("Resuming {} agent {}", state, registration.id);
            host.set_state(state);
            if state == LifecycleState::Active {
                host.controls.claim_clients();
            }
        }
        host
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether fetches go through the agent
    pub fn controls_clients(&self) -> bool {
        self.state().handles_fetches() && self.controls.claimed.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn transition(&self, transition: Transition) -> AgentResult<LifecycleState> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let next = state.apply(transition)?;
        debug!("Lifecycle {} -> {}", *state, next);
        *state = next;
        Ok(next)
    }

    /// Deliver the install signal.
    ///
    /// On success the agent waits, unless it asked to skip waiting, in which
    /// case activation runs immediately. Returns the state reached.
    pub async fn install(&self) -> AgentResult<LifecycleState> {
        self.transition(Transition::InstallStarted)?;

        if let Err(e) = self.handler.on_install(&self.controls).await {
            warn!("Install failed: {}", e);
            self.transition(Transition::InstallFailed)?;
            return Err(e);
        }
        self.transition(Transition::InstallSucceeded)?;

        if self.controls.skip_waiting.load(Ordering::SeqCst) && !self.defer_activation {
            self.activate().await?;
        }
        Ok(self.state())
    }

    /// Deliver the activate signal
    pub async fn activate(&self) -> AgentResult<ActivationReport> {
        self.transition(Transition::ActivateStarted)?;

        match self.handler.on_activate(&self.controls).await {
            Ok(report) => {
                self.transition(Transition::ActivateSucceeded)?;
                info!(
                    "Agent active for {} ({} stale cache(s) removed)",
                    self.handler.generation(),
                    report.deleted.len()
                );
                Ok(report)
            }
            Err(e) => {
                warn!("Activation failed: {}", e);
                self.transition(Transition::ActivateFailed)?;
                Err(e)
            }
        }
    }

    /// Rerun the activate handler on an agent that is already active, so
    /// generations whose deletion failed earlier get another attempt.
    pub async fn cleanup(&self) -> AgentResult<ActivationReport> {
        let state = self.state();
        if state != LifecycleState::Active {
            return Err(AgentError::InvalidTransition {
                from: state.to_string(),
                signal: "cleanup".to_string(),
            });
        }
        self.handler.on_activate(&self.controls).await
    }

    /// Deliver an intercepted request.
    ///
    /// Requests from clients the agent does not control go straight to the
    /// network. When the agent produces no response the page sees a network
    /// error response.
    pub async fn fetch(&self, request: &Request) -> AgentResult<Response> {
        if !self.controls_clients() {
            debug!("Uncontrolled request, passing through: {}", request.url);
            return self.network.fetch(request).await;
        }

        Ok(self
            .handler
            .on_fetch(request, &self.controls)
            .await?
            .unwrap_or_else(Response::error))
    }

    /// Deliver a client message. A skip-waiting request from a waiting agent
    /// activates it before this returns.
    pub async fn message(&self, payload: &serde_json::Value) -> AgentResult<LifecycleState> {
        self.controls.skip_waiting.store(false, Ordering::SeqCst);
        self.handler.on_message(payload, &self.controls).await?;

        if self.controls.skip_waiting.load(Ordering::SeqCst)
            && self.state() == LifecycleState::Waiting
        {
            self.activate().await?;
        }
        Ok(self.state())
    }

    /// Wait for every background task handed over through `wait_until`.
    ///
    /// Task outcomes are discarded; this only keeps the host alive until the
    /// work is done.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(
                &mut *self
                    .controls
                    .pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()),
            );
            if pending.is_empty() {
                return;
            }
            debug!("Waiting for {} background task(s)", pending.len());
            join_all(pending).await;
        }
    }

    /// Update a registration record with this host's state
    pub fn record(&self, registration: &mut Registration) {
        registration.generation = self.handler.generation().to_string();
        registration.touch(self.state());
    }
}
