//! CLI command implementations

pub mod activate;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod install;
pub mod message;

pub use activate::execute as activate;
pub use cache::execute as cache;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use message::execute as message;

use crate::agent::InterceptionAgent;
use crate::config::Config;
use crate::error::AgentResult;
use crate::host::{Registration, WorkerHost};
use crate::network::{HttpFetcher, NetworkFetcher};
use crate::storage::{CacheStorage, DiskCacheStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// One agent instance wired to the disk cache and the configured origin,
/// plus the registration record it is persisted through.
pub(crate) struct AgentContext {
    pub host: WorkerHost,
    pub registration: Registration,
    registration_path: PathBuf,
}

impl AgentContext {
    /// Register a new agent instance for the configured generation
    pub fn register(config: &Config, defer_activation: bool) -> AgentResult<Self> {
        let host = build_host(config, None)?;
        let host = if defer_activation {
            host.with_deferred_activation()
        } else {
            host
        };
        Ok(Self {
            host,
            registration: Registration::new(&config.agent.generation),
            registration_path: config.storage.registration_path(),
        })
    }

    /// Pick up the agent a previous invocation left behind
    pub async fn resume(config: &Config) -> AgentResult<Self> {
        let registration_path = config.storage.registration_path();
        let registration = match Registration::load(&registration_path).await? {
            Some(registration) => registration,
            None => {
                debug!("No registration at {}", registration_path.display());
                Registration::new(&config.agent.generation)
            }
        };
        let host = build_host(config, Some(&registration))?;

        Ok(Self {
            host,
            registration,
            registration_path,
        })
    }

    /// Persist the host's current state
    pub async fn save(&mut self) -> AgentResult<()> {
        self.host.record(&mut self.registration);
        self.registration.save(&self.registration_path).await
    }
}

fn build_host(config: &Config, registration: Option<&Registration>) -> AgentResult<WorkerHost> {
    let origin = config.network.origin_url()?;
    let network = Arc::new(HttpFetcher::new(&config.network)?);
    let caches = Arc::new(DiskCacheStorage::new(config.storage.caches_dir()));
    debug!(
        "Agent for {} using {} storage at {} and {} fetcher",
        config.agent.generation,
        caches.backend_name(),
        caches.root().display(),
        network.fetcher_name()
    );
    let agent = Arc::new(InterceptionAgent::new(
        config.agent.clone(),
        origin,
        caches,
        network.clone(),
    ));

    Ok(match registration {
        Some(registration) => WorkerHost::resume(agent, network, registration),
        None => WorkerHost::new(agent, network),
    })
}
