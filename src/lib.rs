//! shellcache - offline shell cache agent
//!
//! Intercepts an application's requests, serves its static shell from a
//! versioned cache, and falls back to the cached shell when navigations
//! cannot reach the network.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod network;
pub mod request;
pub mod storage;
pub mod ui;

pub use error::{AgentError, AgentResult};
