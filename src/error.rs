//! Error types for shellcache
//!
//! All modules use `AgentResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shellcache operations
pub type AgentResult<T> = Result<T, AgentError>;

/// All errors that can occur in shellcache
#[derive(Error, Debug)]
pub enum AgentError {
    // Network errors
    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Install aborted, {url} responded with status {status}")]
    InstallFailed { url: String, status: u16 },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Cache storage errors
    #[error("Failed to open cache {name}: {reason}")]
    CacheOpen { name: String, reason: String },

    #[error("Failed to read from cache {name}: {reason}")]
    CacheRead { name: String, reason: String },

    #[error("Failed to write to cache {name}: {reason}")]
    CacheWrite { name: String, reason: String },

    #[error("Failed to delete cache {name}: {reason}")]
    CacheDelete { name: String, reason: String },

    #[error("Invalid cache name: {0}")]
    InvalidBucketName(String),

    #[error("Only GET requests can be cached, got {0}")]
    UnsupportedMethod(String),

    // Lifecycle errors
    #[error("Cannot handle {signal} while {from}")]
    InvalidTransition { from: String, signal: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl AgentError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from the network fetcher
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Network { .. } => Some("Check that the origin in [network] is reachable"),
            Self::InstallFailed { .. } => {
                Some("Every shell manifest path must respond with a 2xx status")
            }
            Self::InvalidTransition { .. } => Some("Run: shellcache install"),
            Self::InvalidBucketName(_) => Some("Cache names may only use A-Z, a-z, 0-9, '.', '_' and '-'"),
            _ => None,
        }
    }
}
