//! Network fetcher abstraction
//!
//! The agent never talks to the network directly. It goes through a
//! [`NetworkFetcher`], which the CLI backs with a blocking `ureq` agent
//! driven on tokio's blocking pool.

use crate::config::schema::NetworkConfig;
use crate::error::{AgentError, AgentResult};
use crate::request::{Request, Response, ResponseKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;
use url::{Origin, Url};

/// Issues HTTP requests on behalf of the agent
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Perform the request. HTTP error statuses are responses, not errors;
    /// only transport failures return `Err`.
    async fn fetch(&self, request: &Request) -> AgentResult<Response>;

    /// Human-readable fetcher name for display
    fn fetcher_name(&self) -> &'static str;
}

/// HTTP fetcher backed by `ureq`
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    origin: Origin,
    user_agent: String,
    max_body_bytes: u64,
}

impl HttpFetcher {
    /// Build a fetcher for the configured origin
    pub fn new(config: &NetworkConfig) -> AgentResult<Self> {
        let origin = config.origin_url()?.origin();

        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self {
            agent: ureq::Agent::new_with_config(agent_config),
            origin,
            user_agent: config.user_agent.clone(),
            max_body_bytes: u64::from(config.max_body_mb) * 1024 * 1024,
        })
    }

    /// Response type the platform would report for this URL
    fn kind_for(&self, url: &Url) -> ResponseKind {
        if url.origin() == self.origin {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        }
    }

    fn fetch_blocking(&self, request: &Request) -> AgentResult<Response> {
        let url = request.url.as_str();

        let mut builder = http::Request::builder()
            .method(request.method.clone())
            .uri(url)
            .header(http::header::USER_AGENT, &self.user_agent);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let http_request = builder.body(()).map_err(|e| AgentError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut response = self
            .agent
            .run(http_request)
            .map_err(|e| AgentError::network(url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_vec()
            .map_err(|e| AgentError::network(url, e))?;

        debug!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());

        Ok(Response {
            status,
            kind: self.kind_for(&request.url),
            headers,
            body: Bytes::from(body),
        })
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> AgentResult<Response> {
        let fetcher = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || fetcher.fetch_blocking(&request))
            .await
            .map_err(|e| AgentError::Internal(format!("fetch task failed: {}", e)))?
    }

    fn fetcher_name(&self) -> &'static str {
        "http"
    }
}
