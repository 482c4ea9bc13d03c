//! Configuration schema for shellcache
//!
//! Configuration is stored at `~/.config/shellcache/config.toml`. Every
//! section falls back to compiled-in defaults, so an empty file (or none at
//! all) yields the stock shell for the current build.

use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Cache generation shipped with this build
pub const CURRENT_GENERATION: &str = "youtube-pwa-v1";

/// Static entry points cached at install time
pub const SHELL_MANIFEST: &[&str] = &["/", "/index.html", "/manifest.json"];

/// Dynamic endpoints that always go to the network
pub const BYPASS_PREFIXES: &[&str] = &[
    "/video-info",
    "/download",
    "/stream",
    "/search",
    "/saved-videos",
    "/delete",
];

/// Shell entry served when a navigation cannot reach the network
pub const OFFLINE_DOCUMENT: &str = "/index.html";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Interception agent settings
    pub agent: AgentConfig,

    /// Network fetcher settings
    pub network: NetworkConfig,

    /// Cache storage settings
    pub storage: StorageConfig,
}

impl Config {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        self.agent.validate()?;
        self.network.origin_url().map_err(|e| e.to_string())?;
        if self.network.timeout_secs == 0 {
            return Err("network.timeout_secs must be at least 1".to_string());
        }
        if self.general.log_format != "text" && self.general.log_format != "json" {
            return Err(format!(
                "general.log_format must be \"text\" or \"json\", got \"{}\"",
                self.general.log_format
            ));
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Immutable policy handed to the interception agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Name of the current cache generation
    pub generation: String,

    /// Root-relative paths cached at install, in order
    pub shell_manifest: Vec<String>,

    /// Path prefixes that are never cached
    pub bypass_prefixes: Vec<String>,

    /// Shell path served for failed navigations
    pub offline_document: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            generation: CURRENT_GENERATION.to_string(),
            shell_manifest: SHELL_MANIFEST.iter().map(|s| s.to_string()).collect(),
            bypass_prefixes: BYPASS_PREFIXES.iter().map(|s| s.to_string()).collect(),
            offline_document: OFFLINE_DOCUMENT.to_string(),
        }
    }
}

impl AgentConfig {
    /// Whether a request path must skip the cache entirely
    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn validate(&self) -> Result<(), String> {
        crate::storage::validate_bucket_name(&self.generation).map_err(|e| e.to_string())?;

        if self.shell_manifest.is_empty() {
            return Err("agent.shell_manifest must list at least one path".to_string());
        }
        for path in self.shell_manifest.iter().chain(&self.bypass_prefixes) {
            if !path.starts_with('/') {
                return Err(format!("path '{}' must start with '/'", path));
            }
        }
        if !self.shell_manifest.contains(&self.offline_document) {
            return Err(format!(
                "agent.offline_document '{}' is not in agent.shell_manifest",
                self.offline_document
            ));
        }
        Ok(())
    }
}

/// Network fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Origin the application is served from
    pub origin: String,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Largest response body accepted, in MB
    pub max_body_mb: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 30,
            user_agent: format!("shellcache/{}", env!("CARGO_PKG_VERSION")),
            max_body_mb: 256,
        }
    }
}

impl NetworkConfig {
    /// Parse the origin, requiring an absolute http(s) URL
    pub fn origin_url(&self) -> AgentResult<Url> {
        let url = Url::parse(&self.origin).map_err(|e| AgentError::InvalidUrl {
            url: self.origin.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AgentError::InvalidUrl {
                url: self.origin.clone(),
                reason: "origin must use http or https".to_string(),
            });
        }
        Ok(url)
    }

    /// Resolve a root-relative path or absolute URL against the origin
    pub fn resolve(&self, target: &str) -> AgentResult<Url> {
        self.origin_url()?
            .join(target)
            .map_err(|e| AgentError::InvalidUrl {
                url: target.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Cache storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Cache root directory (default: `<state dir>/shellcache/caches`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Registration record (default: `<state dir>/shellcache/registration.json`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory holding one subdirectory per cache bucket
    pub fn caches_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| super::ConfigManager::state_dir().join("caches"))
    }

    /// File the host persists its lifecycle state to
    pub fn registration_path(&self) -> PathBuf {
        self.registration
            .clone()
            .unwrap_or_else(|| super::ConfigManager::state_dir().join("registration.json"))
    }
}
