//! Body-inspecting probe: classifies leading bytes by magic-byte signature.
//!
//! When no signature matches, a printable-ratio heuristic decides whether the
//! sample is plain text. Anything else is a failed probe; the sniffer never guesses.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{Probe, ProbeMethod, ProbeResult};
use crate::fetch::{ByteRange, FetchRequest, Fetcher};
use crate::resource::ResourceRef;
use crate::size_guard::{DEFAULT_MAX_SIZE_BYTES, SizeEvidence};

/// Base confidence for a signature or text match. Bytes do not lie about their format.
pub const CONTENT_SNIFF_CONFIDENCE: f64 = 0.9;

/// Default prefix length requested with a `Range` header.
pub const DEFAULT_SNIFF_PREFIX_BYTES: u64 = 8192;

/// Bytes sampled by the plain-text heuristic.
pub const TEXT_SAMPLE_BYTES: usize = 1024;

/// Share of printable bytes above which a sample counts as text.
pub const TEXT_RATIO_THRESHOLD: f64 = 0.8;

const TEXT_EXTENSION: &str = ".txt";

/// Probe that downloads a bounded prefix (or the full body) and sniffs it.
#[derive(Debug, Clone, Copy)]
pub struct ContentSniffProbe {
    prefix_bytes: Option<u64>,
    full_body_limit: u64,
}

impl ContentSniffProbe {
    /// Sniffs the first `prefix_bytes` bytes, requested with a `Range` header.
    #[must_use]
    pub fn with_prefix(prefix_bytes: u64) -> Self {
        Self {
            prefix_bytes: Some(prefix_bytes.max(1)),
            full_body_limit: DEFAULT_MAX_SIZE_BYTES,
        }
    }

    /// Downloads the whole body, reading at most `limit + 1` bytes.
    ///
    /// The body length becomes observed size evidence.
    #[must_use]
    pub fn full_body(limit: u64) -> Self {
        Self {
            prefix_bytes: None,
            full_body_limit: limit,
        }
    }

    fn request(&self) -> FetchRequest {
        match self.prefix_bytes {
            Some(prefix) => {
                FetchRequest::get_retaining(prefix).with_range(ByteRange::prefix(prefix))
            }
            None => FetchRequest::get_retaining(self.full_body_limit),
        }
    }
}

impl Default for ContentSniffProbe {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_SNIFF_PREFIX_BYTES)
    }
}

#[async_trait]
impl Probe for ContentSniffProbe {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::ContentSniff
    }

    #[instrument(skip(self, resource, fetcher), fields(probe = "content_sniff", url = %resource.as_str()))]
    async fn probe(&self, resource: &ResourceRef, fetcher: &dyn Fetcher) -> ProbeResult {
        let failed = ProbeResult::failed(ProbeMethod::ContentSniff);
        let Some(url) = resource.url() else {
            return failed;
        };

        let response = match fetcher.fetch(url.as_str(), &self.request()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "body request failed");
                return failed;
            }
        };
        if !response.is_success() {
            debug!(status = response.status, "body request returned error status");
            return failed;
        }

        let observed = if self.prefix_bytes.is_none() && response.truncated {
            Some(response.bytes_seen)
        } else {
            response.complete_body_len()
        };
        let size = SizeEvidence {
            declared: response.declared_size(),
            observed,
        };

        match classify_bytes(&response.body) {
            Some(extension) => {
                debug!(extension = %extension, sampled = response.body.len(), "content classified");
                ProbeResult::detected(ProbeMethod::ContentSniff, extension, CONTENT_SNIFF_CONFIDENCE)
                    .with_size(size)
            }
            None => {
                debug!(sampled = response.body.len(), "no signature or text match");
                failed.with_size(size)
            }
        }
    }
}

/// Classifies `bytes` by signature, then by the plain-text heuristic.
#[must_use]
pub fn classify_bytes(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    if let Some(kind) = infer::get(bytes) {
        return Some(format!(".{}", kind.extension()));
    }
    looks_like_text(bytes).then(|| TEXT_EXTENSION.to_string())
}

#[allow(clippy::cast_precision_loss)]
fn looks_like_text(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(TEXT_SAMPLE_BYTES)];
    if sample.is_empty() {
        return false;
    }
    let printable = sample
        .iter()
        .filter(|&&b| (32..=126).contains(&b) || matches!(b, b'\t' | b'\n' | b'\r'))
        .count();
    printable as f64 / sample.len() as f64 > TEXT_RATIO_THRESHOLD
}
