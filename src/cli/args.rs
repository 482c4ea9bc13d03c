//! CLI argument definitions using clap derive

use crate::request::Destination;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use http::Method;
use std::path::PathBuf;

/// shellcache - offline shell cache agent
///
/// Installs a versioned copy of an application's shell, serves it
/// cache-first, and keeps navigations working when the origin is down.
#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELLCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the current generation and activate it
    Install(InstallArgs),

    /// Activate an installed agent and remove stale generations
    Activate,

    /// Send a request through the agent
    Fetch(FetchArgs),

    /// Deliver a client message to the agent
    Message(MessageArgs),

    /// Inspect or clear cache buckets
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Stay waiting after install instead of activating right away
    #[arg(long)]
    pub no_activate: bool,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL, or a path resolved against the configured origin
    pub target: String,

    /// Request destination (document, script, style, image, font, manifest, worker).
    /// Guessed from the path when omitted.
    #[arg(short, long)]
    pub destination: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Request header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Write the response body to a file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl FetchArgs {
    /// Destination given on the command line, or the one a browser would use
    pub fn destination_for(&self, path: &str) -> Destination {
        match &self.destination {
            Some(d) => Destination::parse(d),
            None => Destination::for_path(path),
        }
    }
}

/// Arguments for the message command
#[derive(Parser, Debug)]
pub struct MessageArgs {
    /// JSON payload, e.g. '{"type":"SKIP_WAITING"}'
    #[arg(value_parser = parse_json)]
    pub payload: serde_json::Value,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., network.origin)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache buckets
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List the entries of one bucket
    Show {
        /// Bucket name (defaults to the current generation)
        bucket: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete every bucket
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn parse_method(s: &str) -> Result<Method, String> {
    Method::from_bytes(s.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method '{s}'"))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{s}'"))?;
    let name = http::HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| format!("invalid header name '{}'", name.trim()))?;
    let value = value.trim();
    http::HeaderValue::from_str(value).map_err(|_| format!("invalid value for header '{name}'"))?;
    Ok((name.to_string(), value.to_string()))
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}
