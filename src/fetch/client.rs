//! `reqwest`-backed fetcher.
//!
//! This module provides [`HttpFetcher`], which applies the shared networking
//! policy (timeouts, User-Agent, bounded redirects) and enforces body limits
//! while streaming.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, Method, redirect};
use tracing::{debug, instrument, trace};
use url::Url;

use super::{BodyPolicy, FetchError, FetchMethod, FetchRequest, FetchResponse, Fetcher};
use crate::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use crate::user_agent;

/// Maximum redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// HTTP fetcher with streaming, size-bounded body reads.
///
/// Create once and share; the inner client pools connections.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .user_agent(user_agent::default_probe_user_agent())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, request), fields(url = %url, method = request.method.as_str()))]
    async fn fetch(&self, url: &str, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }

        let method = match request.method {
            FetchMethod::Get => Method::GET,
            FetchMethod::Head => Method::HEAD,
        };
        let mut builder = self.client.request(method, parsed);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(range) = request.range {
            builder = builder.header(RANGE, range.header_value());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let headers = collect_headers(&response);
        debug!(status, "response received");

        let policy = if request.method == FetchMethod::Head {
            BodyPolicy::Skip
        } else {
            request.body
        };
        let (body, bytes_seen, truncated) = read_body(response, url, policy).await?;

        Ok(FetchResponse {
            status,
            headers,
            body,
            bytes_seen,
            truncated,
        })
    }
}

fn collect_headers(response: &reqwest::Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// Streams the body according to `policy`, stopping once the limit is passed.
async fn read_body(
    response: reqwest::Response,
    url: &str,
    policy: BodyPolicy,
) -> Result<(Vec<u8>, u64, bool), FetchError> {
    let (limit, retain) = match policy {
        BodyPolicy::Skip => return Ok((Vec::new(), 0, true)),
        BodyPolicy::Retain { limit } => (limit, true),
        BodyPolicy::Count { limit } => (limit, false),
    };

    let mut stream = response.bytes_stream();
    let mut body = Vec::new();
    let mut seen: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::from_reqwest(url, e))?;
        let chunk_len = chunk.len() as u64;

        if retain {
            let room = usize::try_from(limit.saturating_sub(seen)).unwrap_or(usize::MAX);
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
        seen = seen.saturating_add(chunk_len);

        if seen > limit {
            trace!(limit, seen, "body limit passed; stopping read");
            return Ok((body, seen.min(limit.saturating_add(1)), true));
        }
    }

    Ok((body, seen, false))
}
