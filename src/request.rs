//! Request and response snapshots exchanged between the host, the agent,
//! the network fetcher and cache storage.

use crate::error::{AgentError, AgentResult};
use bytes::Bytes;
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// What the page intends to do with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Full page navigation
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    Worker,
    /// `fetch()`/XHR and anything else without a destination
    #[default]
    Empty,
}

impl Destination {
    /// Parse from the platform's destination string
    pub fn parse(s: &str) -> Self {
        match s {
            "document" => Self::Document,
            "script" => Self::Script,
            "style" => Self::Style,
            "image" => Self::Image,
            "font" => Self::Font,
            "manifest" => Self::Manifest,
            "worker" => Self::Worker,
            _ => Self::Empty,
        }
    }

    /// Infer the destination a browser would use for a shell path
    pub fn for_path(path: &str) -> Self {
        if path.ends_with('/') || path.ends_with(".html") || path.ends_with(".htm") {
            Self::Document
        } else if path.ends_with(".json") || path.ends_with(".webmanifest") {
            Self::Manifest
        } else if path.ends_with(".js") {
            Self::Script
        } else if path.ends_with(".css") {
            Self::Style
        } else {
            Self::Empty
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Script => "script",
            Self::Style => "style",
            Self::Image => "image",
            Self::Font => "font",
            Self::Manifest => "manifest",
            Self::Worker => "worker",
            Self::Empty => "",
        }
    }
}

/// An intercepted request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Create a GET request for an absolute URL
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            destination: Destination::Empty,
            headers: Vec::new(),
        }
    }

    /// Parse an absolute URL into a GET request
    pub fn parse(url: &str) -> AgentResult<Self> {
        let url = Url::parse(url).map_err(|e| AgentError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::get(url))
    }

    /// Set the request destination
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Set the request method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// URL path, used for bypass matching
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Whether this is a full page navigation
    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    /// Identity of this request inside a cache bucket
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url)
    }
}

/// Method + URL (fragment stripped) identifying a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.as_str().to_string(),
            url: url.into(),
        }
    }

    /// Only GET entries can be matched or stored
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET.as_str()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// How a response was produced, mirroring the platform's response types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    #[default]
    Basic,
    Cors,
    Opaque,
    /// Network error surfaced as a response
    Error,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Cors => write!(f, "cors"),
            Self::Opaque => write!(f, "opaque"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A fully buffered response. Cloning shares the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            kind: ResponseKind::Basic,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// The response a page sees when nothing could be produced
    pub fn error() -> Self {
        Self {
            status: 0,
            kind: ResponseKind::Error,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Status in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Eligible for opportunistic caching: exactly 200 and not an error
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind != ResponseKind::Error
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
