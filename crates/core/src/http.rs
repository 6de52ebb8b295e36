//! Request and response snapshots exchanged between pages, the worker and the network.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// How the page issued the request.
///
/// Together with the worker origin this decides whether a cross-origin
/// response can be inspected or is opaque.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    Cors,
    #[default]
    NoCors,
}

/// An outgoing request from a controlled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-cased HTTP method.
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    /// Build a request from a method and an absolute URL string.
    pub fn new(method: &str, url: &str, mode: RequestMode) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::from_url(method, url, mode))
    }

    pub fn from_url(method: &str, url: Url, mode: RequestMode) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url, mode }
    }

    /// A plain GET, as issued by the worker itself when precaching.
    pub fn get(url: Url) -> Self {
        Self::from_url("GET", url, RequestMode::NoCors)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Response type as seen by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response readable under CORS.
    Cors,
    /// Cross-origin response whose status and headers are hidden.
    Opaque,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Cors => "cors",
            Self::Opaque => "opaque",
        }
    }

    /// Kind of the response a page gets back for `request` when the worker lives at `origin`.
    pub fn for_request(request: &Request, origin: &Url) -> Self {
        if request.url.origin() == origin.origin() {
            Self::Basic
        } else if request.mode == RequestMode::NoCors {
            Self::Opaque
        } else {
            Self::Cors
        }
    }
}

impl std::str::FromStr for ResponseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "cors" => Ok(Self::Cors),
            "opaque" => Ok(Self::Opaque),
            other => Err(Error::CorruptEntry(format!("unknown response kind: {other}"))),
        }
    }
}

/// A captured response snapshot: status, headers and body at capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// Build an opaque response. Status and headers are not observable.
    pub fn opaque(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            url: url.into(),
            status: 0,
            status_text: String::new(),
            kind: ResponseKind::Opaque,
            headers: Vec::new(),
            body,
        }
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Cache-first only keeps plain 200s it can inspect.
    pub fn is_cacheable_for_shell(&self) -> bool {
        self.status == 200 && self.kind != ResponseKind::Opaque
    }

    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
