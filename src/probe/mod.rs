//! Format detection probes.
//!
//! Each probe is an independent signal for a resource's extension:
//!
//! - [`ContentTypeProbe`] - header-only request, media type table lookup
//! - [`UrlExtensionProbe`] - path and query heuristics, no network access
//! - [`ContentSniffProbe`] - magic-byte signatures over a bounded body prefix
//!
//! A probe never returns an error. Network failures, table misses and
//! unsupported candidates all collapse into [`ProbeVerdict::Failed`].

mod content_sniff;
mod content_type;
mod url_extension;

pub use content_sniff::{
    CONTENT_SNIFF_CONFIDENCE, ContentSniffProbe, DEFAULT_SNIFF_PREFIX_BYTES, TEXT_RATIO_THRESHOLD,
    TEXT_SAMPLE_BYTES, classify_bytes,
};
pub use content_type::{CONTENT_TYPE_CONFIDENCE, ContentTypeProbe};
pub use url_extension::{URL_EXTENSION_CONFIDENCE, UrlExtensionProbe, extension_from_url};

use std::fmt;

use async_trait::async_trait;

use crate::fetch::Fetcher;
use crate::resource::ResourceRef;
use crate::size_guard::SizeEvidence;

/// Detection method a probe implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeMethod {
    /// `content-type` response header.
    ContentType,
    /// URL path and query heuristics.
    UrlExtension,
    /// Binary signature of the body.
    ContentSniff,
}

impl ProbeMethod {
    /// All methods in the order concurrent mode reports them.
    pub const ALL: [Self; 3] = [Self::ContentType, Self::UrlExtension, Self::ContentSniff];

    /// Stable label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentType => "content_type",
            Self::UrlExtension => "url_extension",
            Self::ContentSniff => "content_sniff",
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeVerdict {
    /// The probe recovered a trusted extension.
    Detected {
        /// Extension with a leading dot.
        extension: String,
        /// Trust in `[0, 1]`.
        confidence: f64,
    },
    /// The probe could not produce an extension.
    Failed,
}

/// Result of exactly one probe invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// Which probe produced this result.
    pub method: ProbeMethod,
    /// Detected extension, or failure.
    pub verdict: ProbeVerdict,
    /// Size signals the probe saw along the way.
    pub size: SizeEvidence,
}

impl ProbeResult {
    /// Successful result.
    #[must_use]
    pub fn detected(method: ProbeMethod, extension: impl Into<String>, confidence: f64) -> Self {
        Self {
            method,
            verdict: ProbeVerdict::Detected {
                extension: extension.into(),
                confidence: confidence.clamp(0.0, 1.0),
            },
            size: SizeEvidence::default(),
        }
    }

    /// Failed result.
    #[must_use]
    pub fn failed(method: ProbeMethod) -> Self {
        Self {
            method,
            verdict: ProbeVerdict::Failed,
            size: SizeEvidence::default(),
        }
    }

    /// Attaches size evidence.
    #[must_use]
    pub fn with_size(mut self, size: SizeEvidence) -> Self {
        self.size = size;
        self
    }

    /// Returns true when the probe detected an extension.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.verdict, ProbeVerdict::Detected { .. })
    }

    /// Detected extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        match &self.verdict {
            ProbeVerdict::Detected { extension, .. } => Some(extension),
            ProbeVerdict::Failed => None,
        }
    }

    /// Confidence, `0.0` for failures.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        match self.verdict {
            ProbeVerdict::Detected { confidence, .. } => confidence,
            ProbeVerdict::Failed => 0.0,
        }
    }
}

/// A single detection method.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the orchestrator can hold `Box<dyn Probe>`.
#[async_trait]
pub trait Probe: Send + Sync {
    /// The method this probe implements.
    fn method(&self) -> ProbeMethod;

    /// Runs the probe against `resource`. Never fails; see [`ProbeVerdict::Failed`].
    async fn probe(&self, resource: &ResourceRef, fetcher: &dyn Fetcher) -> ProbeResult;
}

/// One probe per method.
pub struct ProbeSet {
    content_type: Box<dyn Probe>,
    url_extension: Box<dyn Probe>,
    content_sniff: Box<dyn Probe>,
}

impl ProbeSet {
    /// Builds a set from explicit probes.
    #[must_use]
    pub fn new(
        content_type: Box<dyn Probe>,
        url_extension: Box<dyn Probe>,
        content_sniff: Box<dyn Probe>,
    ) -> Self {
        Self {
            content_type,
            url_extension,
            content_sniff,
        }
    }

    /// Returns the probe for `method`.
    #[must_use]
    pub fn get(&self, method: ProbeMethod) -> &dyn Probe {
        match method {
            ProbeMethod::ContentType => self.content_type.as_ref(),
            ProbeMethod::UrlExtension => self.url_extension.as_ref(),
            ProbeMethod::ContentSniff => self.content_sniff.as_ref(),
        }
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::new(
            Box::new(ContentTypeProbe::default()),
            Box::new(UrlExtensionProbe::new()),
            Box::new(ContentSniffProbe::default()),
        )
    }
}

impl fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = ProbeMethod::ALL
            .iter()
            .map(|m| self.get(*m).method().as_str())
            .collect();
        f.debug_struct("ProbeSet").field("probes", &methods).finish()
    }
}
