//! Batch pipeline: free text in, attachment descriptors out.
//!
//! Each URL is processed independently and URLs run in parallel. A URL that
//! fails a size check is dropped from the output; nothing at the per-URL level
//! fails the batch.

use std::fmt;
use std::sync::{Arc, LazyLock};

use futures_util::future::join_all;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::attachment::AttachmentDescriptor;
use crate::config::ConverterConfig;
use crate::fetch::{FetchError, FetchRequest, Fetcher, HttpFetcher};
use crate::orchestrator::Orchestrator;
use crate::probe::{ContentSniffProbe, ContentTypeProbe, ProbeSet, UrlExtensionProbe};
use crate::resource::ResourceRef;
use crate::size_guard::{SizeEvidence, SizeSource, SizeVerdict};
use crate::strategy::StrategySelector;

#[allow(clippy::expect_used)]
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s]+").expect("URL regex is valid") // Static pattern, safe to panic
});

/// Punctuation that ends a sentence or closes a bracket around a link.
const TRAILING_PUNCTUATION: [char; 11] = [',', '.', ';', ':', '!', '?', ')', ']', '}', '\'', '"'];

/// Finds every `http(s)://` token in `text`, in order of appearance.
///
/// Trailing prose punctuation (`https://x/a.png,`) is not part of the URL.
#[must_use]
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
        .filter(|url| url.split_once("://").is_some_and(|(_, rest)| !rest.is_empty()))
        .map(str::to_string)
        .collect()
}

/// Batch-level status. Every variant is a successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Input was empty or whitespace.
    EmptyInput,
    /// Input contained no URL.
    NoUrlFound,
    /// URLs were processed; the attachment list may still be empty.
    Converted,
}

impl BatchStatus {
    /// Human-readable status message.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::EmptyInput => "Input cannot be empty",
            Self::NoUrlFound => "No valid links found",
            Self::Converted => "Link conversion successful",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of converting one input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Degenerate-case marker.
    pub status: BatchStatus,
    /// Message matching `status`.
    pub message: String,
    /// Surviving descriptors, in input order.
    pub attachments: Vec<AttachmentDescriptor>,
}

impl BatchOutcome {
    fn new(status: BatchStatus, attachments: Vec<AttachmentDescriptor>) -> Self {
        Self {
            status,
            message: status.message().to_string(),
            attachments,
        }
    }
}

/// Converts URLs found in text into attachment descriptors.
pub struct LinkConverter {
    config: ConverterConfig,
    selector: StrategySelector,
    orchestrator: Orchestrator,
    fetcher: Arc<dyn Fetcher>,
}

impl LinkConverter {
    /// Creates a converter backed by a real HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: ConverterConfig) -> Result<Self, FetchError> {
        let fetcher =
            HttpFetcher::with_timeouts(config.connect_timeout_secs, config.read_timeout_secs)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Creates a converter over any [`Fetcher`].
    #[must_use]
    pub fn with_fetcher(config: ConverterConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let sniff = match config.sniff_prefix_bytes {
            Some(prefix) => ContentSniffProbe::with_prefix(prefix),
            None => ContentSniffProbe::full_body(config.max_size_bytes),
        };
        let probes = ProbeSet::new(
            Box::new(ContentTypeProbe::default()),
            Box::new(UrlExtensionProbe::new()),
            Box::new(sniff),
        );
        let orchestrator = Orchestrator::new(probes, Arc::clone(&fetcher), config.mode);
        Self {
            config,
            selector: StrategySelector::builtin(),
            orchestrator,
            fetcher,
        }
    }

    /// Replaces the provider policy table.
    #[must_use]
    pub fn with_selector(mut self, selector: StrategySelector) -> Self {
        self.selector = selector;
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Extracts URLs from `text` and converts up to `batch_limit` of them.
    #[instrument(skip(self, text), fields(mode = %self.config.mode))]
    pub async fn convert(&self, text: &str) -> BatchOutcome {
        if text.trim().is_empty() {
            return BatchOutcome::new(BatchStatus::EmptyInput, Vec::new());
        }
        let urls = extract_urls(text);
        if urls.is_empty() {
            return BatchOutcome::new(BatchStatus::NoUrlFound, Vec::new());
        }

        let limit = self.config.batch_limit.max(1);
        if urls.len() > limit {
            info!(found = urls.len(), limit, "batch capped; extra URLs ignored");
        }
        let attempted: Vec<&String> = urls.iter().take(limit).collect();

        let results = join_all(
            attempted
                .iter()
                .enumerate()
                .map(|(index, url)| self.convert_one(index, url)),
        )
        .await;
        let attachments: Vec<AttachmentDescriptor> = results.into_iter().flatten().collect();

        info!(
            attempted = attempted.len(),
            emitted = attachments.len(),
            dropped = attempted.len() - attachments.len(),
            "batch converted"
        );
        BatchOutcome::new(BatchStatus::Converted, attachments)
    }

    /// Runs one URL through selection, resolution, size checks and naming.
    ///
    /// Returns `None` when the URL is dropped.
    #[instrument(skip(self))]
    pub async fn convert_one(&self, index: usize, url: &str) -> Option<AttachmentDescriptor> {
        let resource = ResourceRef::parse(url);
        if !resource.is_valid() {
            warn!(url, "malformed URL; emitting generic attachment");
            return Some(AttachmentDescriptor::malformed(url, index));
        }

        let hostname = resource.hostname();
        let policy = self.selector.select(hostname.as_deref());
        let resolution = self.orchestrator.resolve(&resource, policy).await;

        if !self.passes_size_checks(&resource, resolution.size).await {
            return None;
        }

        let segment = resource.last_segment();
        let descriptor =
            AttachmentDescriptor::assemble(url, segment.as_deref(), &resolution.decision, index);
        debug!(name = %descriptor.name, "attachment assembled");
        Some(descriptor)
    }

    async fn passes_size_checks(&self, resource: &ResourceRef, evidence: SizeEvidence) -> bool {
        let limit = self.config.max_size_bytes;
        if let Some(declared) = evidence.declared
            && !self.within_limit(resource, declared, SizeSource::Declared)
        {
            return false;
        }

        let observed = match evidence.observed {
            Some(observed) => Some(observed),
            None if self.config.verify_actual_size => {
                let measured = self.measure(resource, limit).await;
                if let Some(declared) = measured.declared
                    && !self.within_limit(resource, declared, SizeSource::Declared)
                {
                    return false;
                }
                measured.observed
            }
            None => None,
        };

        observed.is_none_or(|bytes| self.within_limit(resource, bytes, SizeSource::Observed))
    }

    fn within_limit(&self, resource: &ResourceRef, bytes: u64, source: SizeSource) -> bool {
        let verdict = SizeVerdict::check(bytes, self.config.max_size_bytes, source);
        if verdict.exceeds {
            warn!(
                url = %resource.as_str(),
                size = %verdict.formatted,
                source = %verdict.source,
                limit = self.config.max_size_bytes,
                "resource exceeds size ceiling; dropped"
            );
        }
        !verdict.exceeds
    }

    /// Counts the body with a bounded GET. Failures yield empty evidence.
    async fn measure(&self, resource: &ResourceRef, limit: u64) -> SizeEvidence {
        let Some(url) = resource.url() else {
            return SizeEvidence::default();
        };
        let request = FetchRequest::get_counting(limit);
        match self.fetcher.fetch(url.as_str(), &request).await {
            Ok(response) if response.is_success() => SizeEvidence {
                declared: response.declared_size(),
                observed: Some(response.bytes_seen),
            },
            Ok(response) => {
                debug!(status = response.status, "size measurement returned error status");
                SizeEvidence::default()
            }
            Err(error) => {
                debug!(error = %error, "size measurement failed; keeping resource");
                SizeEvidence::default()
            }
        }
    }
}

impl fmt::Debug for LinkConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkConverter")
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::{BodyPolicy, FetchMethod, FetchResponse};
    use crate::orchestrator::ExecutionMode;
    use crate::probe::DEFAULT_SNIFF_PREFIX_BYTES;

    const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ];

    /// Serves one fixed resource for every URL; records fetched URLs.
    struct StaticFetcher {
        content_type: &'static str,
        body: Vec<u8>,
        send_length: bool,
        fetched: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        fn new(content_type: &'static str, body: &[u8]) -> Self {
            Self {
                content_type,
                body: body.to_vec(),
                send_length: true,
                fetched: Mutex::new(Vec::new()),
            }
        }

        /// Omits `Content-Length`, like a chunked response.
        fn without_length(mut self) -> Self {
            self.send_length = false;
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(
            &self,
            url: &str,
            request: &FetchRequest,
        ) -> Result<FetchResponse, FetchError> {
            self.fetched.lock().unwrap().push(url.to_string());
            let mut headers =
                HashMap::from([("content-type".to_string(), self.content_type.to_string())]);
            if self.send_length {
                headers.insert("content-length".to_string(), self.body.len().to_string());
            }
            let total = self.body.len() as u64;
            let (body, bytes_seen, truncated) = match (request.method, request.body) {
                (FetchMethod::Head, _) | (_, BodyPolicy::Skip) => (Vec::new(), 0, true),
                (_, BodyPolicy::Retain { limit }) => {
                    let kept = usize::try_from(limit.min(total)).unwrap();
                    (self.body[..kept].to_vec(), total.min(limit + 1), limit < total)
                }
                (_, BodyPolicy::Count { limit }) => {
                    (Vec::new(), total.min(limit + 1), total > limit)
                }
            };
            Ok(FetchResponse {
                status: 200,
                headers,
                body,
                bytes_seen,
                truncated,
            })
        }
    }

    fn converter(fetcher: Arc<StaticFetcher>, config: ConverterConfig) -> LinkConverter {
        LinkConverter::with_fetcher(config, fetcher)
    }

    #[test]
    fn test_extract_urls_in_order() {
        let urls = extract_urls("see https://a.example/x.png and\nhttp://b.example/y then ftp://c");
        assert_eq!(urls, vec!["https://a.example/x.png", "http://b.example/y"]);
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn test_extract_urls_strips_trailing_punctuation() {
        let urls = extract_urls("see https://x.example/a.png, and (https://y.example/b.pdf). Or \"https://z.example/c?\"");
        assert_eq!(
            urls,
            vec!["https://x.example/a.png", "https://y.example/b.pdf", "https://z.example/c"]
        );
        assert!(extract_urls("https://.").is_empty());
    }

    #[tokio::test]
    async fn test_url_followed_by_comma_is_named_from_clean_segment() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", PNG_BYTES));
        let conv = converter(fetcher, ConverterConfig::default());

        let outcome = conv.convert("look: https://example.com/a.png, nice").await;

        assert_eq!(outcome.attachments.len(), 1);
        assert_eq!(outcome.attachments[0].name, "a.png");
        assert_eq!(outcome.attachments[0].content, "https://example.com/a.png");
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(BatchStatus::EmptyInput.message(), "Input cannot be empty");
        assert_eq!(BatchStatus::NoUrlFound.message(), "No valid links found");
        assert_eq!(BatchStatus::Converted.message(), "Link conversion successful");
    }

    #[tokio::test]
    async fn test_empty_and_linkless_input() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", PNG_BYTES));
        let conv = converter(Arc::clone(&fetcher), ConverterConfig::default());

        let empty = conv.convert("   \n").await;
        assert_eq!(empty.status, BatchStatus::EmptyInput);
        assert!(empty.attachments.is_empty());

        let none = conv.convert("just words").await;
        assert_eq!(none.status, BatchStatus::NoUrlFound);
        assert_eq!(none.message, "No valid links found");
        assert!(fetcher.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_convert_names_and_orders_attachments() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", PNG_BYTES));
        let conv = converter(fetcher, ConverterConfig::default());

        let outcome = conv
            .convert("https://example.com/a.png https://example.com/photo.bmp https://example.com/")
            .await;

        assert_eq!(outcome.status, BatchStatus::Converted);
        let names: Vec<&str> = outcome.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "photo.png", "link_3.png"]);
        assert_eq!(outcome.attachments[1].content, "https://example.com/photo.bmp");
    }

    #[tokio::test]
    async fn test_declared_size_over_limit_drops_url() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", &[0_u8; 2048]));
        let config = ConverterConfig {
            max_size_bytes: 1024,
            ..ConverterConfig::default()
        };
        let conv = converter(fetcher, config);

        let outcome = conv.convert("https://example.com/big.png").await;

        assert_eq!(outcome.status, BatchStatus::Converted);
        assert!(outcome.attachments.is_empty());
    }

    #[tokio::test]
    async fn test_observed_size_over_limit_drops_url_without_length_header() {
        let mut body = PNG_BYTES.to_vec();
        body.resize(4096, 0);
        let modes = [ExecutionMode::StrategyGuided, ExecutionMode::Concurrent];
        let sniff_prefixes = [Some(DEFAULT_SNIFF_PREFIX_BYTES), None];

        for mode in modes {
            for sniff_prefix_bytes in sniff_prefixes {
                let fetcher =
                    Arc::new(StaticFetcher::new("image/png", &body).without_length());
                let config = ConverterConfig {
                    max_size_bytes: 1024,
                    mode,
                    sniff_prefix_bytes,
                    ..ConverterConfig::default()
                };
                let conv = converter(fetcher, config);

                let outcome = conv.convert("https://example.com/chunked.png").await;

                assert_eq!(outcome.status, BatchStatus::Converted);
                assert!(
                    outcome.attachments.is_empty(),
                    "kept with mode {mode:?}, sniff prefix {sniff_prefix_bytes:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_observed_size_within_limit_kept_without_length_header() {
        let mut body = PNG_BYTES.to_vec();
        body.resize(1024, 0);
        let fetcher = Arc::new(StaticFetcher::new("image/png", &body).without_length());
        let config = ConverterConfig {
            max_size_bytes: 1024,
            ..ConverterConfig::default()
        };
        let conv = converter(fetcher, config);

        let outcome = conv.convert("https://example.com/chunked.png").await;
        assert_eq!(outcome.attachments.len(), 1);
        assert_eq!(outcome.attachments[0].name, "chunked.png");
    }

    #[tokio::test]
    async fn test_size_at_limit_is_kept() {
        let mut body = PNG_BYTES.to_vec();
        body.resize(1024, 0);
        let fetcher = Arc::new(StaticFetcher::new("image/png", &body));
        let config = ConverterConfig {
            max_size_bytes: 1024,
            ..ConverterConfig::default()
        };
        let conv = converter(fetcher, config);

        let outcome = conv.convert("https://example.com/exact.png").await;
        assert_eq!(outcome.attachments.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_cap_limits_attempts() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", PNG_BYTES));
        let config = ConverterConfig {
            mode: ExecutionMode::Concurrent,
            ..ConverterConfig::default()
        };
        let conv = converter(Arc::clone(&fetcher), config);
        let text: Vec<String> = (1..=8).map(|i| format!("https://example.com/{i}.png")).collect();

        let outcome = conv.convert(&text.join(" ")).await;

        assert_eq!(outcome.attachments.len(), 5);
        let fetched = fetcher.fetched();
        for i in 6..=8 {
            let url = format!("https://example.com/{i}.png");
            assert!(!fetched.contains(&url), "{url} should not be fetched");
        }
    }

    #[tokio::test]
    async fn test_malformed_url_emits_generic_attachment() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", PNG_BYTES));
        let conv = converter(Arc::clone(&fetcher), ConverterConfig::default());

        let outcome = conv.convert("broken: http://[oops/x.png").await;

        assert_eq!(outcome.attachments.len(), 1);
        assert_eq!(outcome.attachments[0].name, "link_1.file");
        assert_eq!(outcome.attachments[0].content, "http://[oops/x.png");
        assert!(fetcher.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_conversion_is_idempotent() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", PNG_BYTES));
        let conv = converter(fetcher, ConverterConfig::default());
        let text = "https://example.com/a.png https://example.com/b";

        let first = conv.convert(text).await;
        let second = conv.convert(text).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_custom_selector_changes_probe_order() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", PNG_BYTES));
        let trusted_paths = crate::strategy::ProviderPolicy {
            name: "trusted-paths",
            match_domains: vec!["example.com"],
            primary: crate::probe::ProbeMethod::UrlExtension,
            fallback: crate::probe::ProbeMethod::ContentType,
            category_confidence: 1.0,
        };
        let config = ConverterConfig {
            verify_actual_size: false,
            ..ConverterConfig::default()
        };
        let conv = converter(Arc::clone(&fetcher), config)
            .with_selector(StrategySelector::new(vec![trusted_paths]));

        let outcome = conv.convert("https://example.com/scan.jpeg").await;

        assert_eq!(outcome.attachments[0].name, "scan.jpeg");
        assert!(fetcher.fetched().is_empty());
        assert!(!conv.config().verify_actual_size);
    }

    #[tokio::test]
    async fn test_outcome_serializes_for_output() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", PNG_BYTES));
        let conv = converter(fetcher, ConverterConfig::default());

        let outcome = conv.convert("https://example.com/a.png").await;
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["status"], "converted");
        assert_eq!(json["message"], "Link conversion successful");
        assert_eq!(json["attachments"][0]["contentType"], "attachment/url");
    }
}
