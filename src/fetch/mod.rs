//! Pluggable URL fetch capability used by the probes.
//!
//! Probes never talk to `reqwest` directly. They describe what they need with a
//! [`FetchRequest`] and hand it to a [`Fetcher`], which lets the engine run
//! against real HTTP ([`HttpFetcher`]) or a scripted stand-in under test.
//!
//! # Body handling
//!
//! Every body read is bounded by [`BodyPolicy`]. A fetcher reads at most
//! `limit + 1` bytes, so a host streaming an endless body costs no more than
//! the configured ceiling.

mod client;
mod error;

pub use client::HttpFetcher;
pub use error::FetchError;

use std::collections::HashMap;

use async_trait::async_trait;

/// HTTP method override for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    /// Full request.
    Get,
    /// Header-only request.
    Head,
}

impl FetchMethod {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// Inclusive byte range for a `Range` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    /// Range covering the first `len` bytes. `len` must be non-zero.
    #[must_use]
    pub fn prefix(len: u64) -> Self {
        Self {
            start: 0,
            end: len.saturating_sub(1),
        }
    }

    /// Formats the `Range` header value, e.g. `bytes=0-8191`.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// How much of the response body to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPolicy {
    /// Do not read the body.
    Skip,
    /// Keep up to `limit` bytes.
    Retain {
        /// Maximum bytes kept.
        limit: u64,
    },
    /// Count up to `limit + 1` bytes without keeping them.
    Count {
        /// Byte count beyond which reading stops.
        limit: u64,
    },
}

/// Options for one fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Request method.
    pub method: FetchMethod,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Optional byte-range hint.
    pub range: Option<ByteRange>,
    /// Body read policy.
    pub body: BodyPolicy,
}

impl FetchRequest {
    /// Header-only request.
    #[must_use]
    pub fn head() -> Self {
        Self {
            method: FetchMethod::Head,
            headers: Vec::new(),
            range: None,
            body: BodyPolicy::Skip,
        }
    }

    /// GET request keeping at most `limit` body bytes.
    #[must_use]
    pub fn get_retaining(limit: u64) -> Self {
        Self {
            method: FetchMethod::Get,
            headers: Vec::new(),
            range: None,
            body: BodyPolicy::Retain { limit },
        }
    }

    /// GET request that only counts body bytes up to `limit + 1`.
    #[must_use]
    pub fn get_counting(limit: u64) -> Self {
        Self {
            method: FetchMethod::Get,
            headers: Vec::new(),
            range: None,
            body: BodyPolicy::Count { limit },
        }
    }

    /// Adds a byte-range hint.
    #[must_use]
    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Response returned by a [`Fetcher`].
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers keyed by lower-cased name.
    pub headers: HashMap<String, String>,
    /// Retained body bytes (empty for `Skip` and `Count`).
    pub body: Vec<u8>,
    /// Body bytes read from the wire, capped at `limit + 1`.
    pub bytes_seen: u64,
    /// True when reading stopped before the end of the body.
    pub truncated: bool,
}

impl FetchResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the `content-type` header, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Declared size of the full resource.
    ///
    /// Prefers the total from `content-range` (partial responses report only the
    /// slice length in `content-length`), then `content-length`.
    #[must_use]
    pub fn declared_size(&self) -> Option<u64> {
        if let Some(total) = self.header("content-range").and_then(parse_content_range_total) {
            return Some(total);
        }
        if self.status == 206 {
            return None;
        }
        self.content_length()
    }

    /// Parsed `content-length` header.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|value| value.trim().parse::<u64>().ok())
    }

    /// Complete body length, when the body was read to the end.
    #[must_use]
    pub fn complete_body_len(&self) -> Option<u64> {
        (!self.truncated && self.status != 206).then_some(self.bytes_seen)
    }
}

/// Parses the total length from `bytes 0-8191/123456`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}

/// Capability to fetch a URL.
///
/// Implementations must return `Ok` for any HTTP response, including 4xx/5xx.
/// `Err` is reserved for transport failures.
///
/// # Object Safety
///
/// This trait uses `async_trait` so probes can hold `Arc<dyn Fetcher>`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` according to `request`.
    async fn fetch(&self, url: &str, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}
