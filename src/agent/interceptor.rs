//! Cache-first request interception for one cache generation

use super::{ActivationReport, ClientMessage, HostControl, LifecycleHandler};
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::network::NetworkFetcher;
use crate::request::{Destination, Request, Response};
use crate::storage::{CacheBucket, CacheStorage};
use async_trait::async_trait;
use futures_util::future::{join_all, try_join_all};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Stateless handler serving one cache generation.
///
/// All shared state lives in the cache storage; the agent itself only holds
/// immutable configuration and handles to its collaborators.
#[derive(Clone)]
pub struct InterceptionAgent {
    config: Arc<AgentConfig>,
    origin: Url,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn NetworkFetcher>,
}

impl InterceptionAgent {
    pub fn new(
        config: AgentConfig,
        origin: Url,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn NetworkFetcher>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            origin,
            caches,
            network,
        }
    }

    /// GET request for a shell path, with the destination a browser would use
    fn shell_request(&self, path: &str) -> AgentResult<Request> {
        let url = self.origin.join(path).map_err(|e| AgentError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Request::get(url).with_destination(Destination::for_path(path)))
    }

    async fn cache_shell_entry(
        &self,
        bucket: &dyn CacheBucket,
        request: &Request,
    ) -> AgentResult<()> {
        let response = self.network.fetch(request).await?;
        if !response.is_ok() {
            return Err(AgentError::InstallFailed {
                url: request.url.to_string(),
                status: response.status,
            });
        }
        bucket.put(request, response).await
    }

    /// Lookup in the current generation only. A missing bucket is a miss.
    async fn lookup(&self, request: &Request) -> AgentResult<Option<Response>> {
        if !self.caches.has(&self.config.generation).await? {
            return Ok(None);
        }
        self.caches
            .open(&self.config.generation)
            .await?
            .match_request(request)
            .await
    }

    async fn cache_first(
        &self,
        request: &Request,
        host: &dyn HostControl,
    ) -> AgentResult<Response> {
        if let Some(cached) = self.lookup(request).await? {
            debug!("Serving from cache: {}", request.url);
            return Ok(cached);
        }

        debug!("Fetching from network: {}", request.url);
        let response = self.network.fetch(request).await?;
        if response.is_cacheable() {
            self.populate_in_background(request.clone(), response.clone(), host);
        }
        Ok(response)
    }

    /// Store a copy of a network response without holding up the caller.
    ///
    /// The write is handed to the host as a detached task. Its completion and
    /// any failure are never observed by the response path.
    fn populate_in_background(
        &self,
        request: Request,
        response: Response,
        host: &dyn HostControl,
    ) {
        let caches = Arc::clone(&self.caches);
        let generation = self.config.generation.clone();

        host.wait_until(Box::pin(async move {
            let result: AgentResult<()> = async {
                caches.open(&generation).await?.put(&request, response).await
            }
            .await;

            if let Err(e) = result {
                debug!("Dropped cache write for {}: {}", request.url, e);
            }
        }));
    }

    /// Cached shell document for a navigation that could not be served
    async fn offline_fallback(&self) -> Option<Response> {
        let request = match self.shell_request(&self.config.offline_document) {
            Ok(request) => request,
            Err(e) => {
                warn!("Offline document unavailable: {}", e);
                return None;
            }
        };

        match self.lookup(&request).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Offline document lookup failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl LifecycleHandler for InterceptionAgent {
    async fn on_install(&self, host: &dyn HostControl) -> AgentResult<()> {
        info!("Installing cache generation {}", self.config.generation);

        let bucket = self.caches.open(&self.config.generation).await?;
        let requests = self
            .config
            .shell_manifest
            .iter()
            .map(|path| self.shell_request(path))
            .collect::<AgentResult<Vec<_>>>()?;

        info!("Caching {} core files", requests.len());
        try_join_all(
            requests
                .iter()
                .map(|request| self.cache_shell_entry(bucket.as_ref(), request)),
        )
        .await?;

        host.skip_waiting();
        Ok(())
    }

    async fn on_activate(&self, host: &dyn HostControl) -> AgentResult<ActivationReport> {
        info!("Activating cache generation {}", self.config.generation);

        let stale: Vec<String> = self
            .caches
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.config.generation)
            .collect();

        let outcomes = join_all(stale.iter().map(|name| async move {
            info!("Deleting old cache: {}", name);
            (name, self.caches.delete(name).await)
        }))
        .await;

        let mut report = ActivationReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(_) => report.deleted.push(name.clone()),
                Err(e) => {
                    warn!("Failed to delete old cache {}: {}", name, e);
                    report.failed.push(name.clone());
                }
            }
        }

        host.claim_clients();
        Ok(report)
    }

    async fn on_fetch(
        &self,
        request: &Request,
        host: &dyn HostControl,
    ) -> AgentResult<Option<Response>> {
        if self.config.is_bypassed(request.path()) {
            debug!("Network only: {}", request.url);
            return self.network.fetch(request).await.map(Some);
        }

        match self.cache_first(request, host).await {
            Ok(response) => Ok(Some(response)),
            Err(e) if request.is_navigation() => {
                debug!("Navigation to {} failed ({}), trying offline document", request.url, e);
                Ok(self.offline_fallback().await)
            }
            Err(e) => Err(e),
        }
    }

    async fn on_message(
        &self,
        message: &serde_json::Value,
        host: &dyn HostControl,
    ) -> AgentResult<()> {
        match ClientMessage::from_value(message) {
            Some(ClientMessage::SkipWaiting) => {
                info!("Skip waiting requested by client");
                host.skip_waiting();
            }
            Some(ClientMessage::Unknown) | None => {
                debug!("Ignoring client message: {}", message);
            }
        }
        Ok(())
    }

    fn generation(&self) -> &str {
        &self.config.generation
    }
}
