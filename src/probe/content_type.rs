//! Header-only probe: maps the response media type through a [`MimeTable`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{Probe, ProbeMethod, ProbeResult};
use crate::fetch::{FetchRequest, Fetcher};
use crate::formats::MimeTable;
use crate::resource::ResourceRef;
use crate::size_guard::SizeEvidence;

/// Base confidence for a media type hit. Headers are often generic or wrong.
pub const CONTENT_TYPE_CONFIDENCE: f64 = 0.7;

/// Probe that issues a `HEAD` request and reads `content-type`.
#[derive(Debug, Clone)]
pub struct ContentTypeProbe {
    table: Arc<MimeTable>,
}

impl ContentTypeProbe {
    /// Creates a probe over `table`.
    #[must_use]
    pub fn new(table: Arc<MimeTable>) -> Self {
        Self { table }
    }
}

impl Default for ContentTypeProbe {
    fn default() -> Self {
        Self::new(MimeTable::builtin())
    }
}

#[async_trait]
impl Probe for ContentTypeProbe {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::ContentType
    }

    #[instrument(skip(self, resource, fetcher), fields(probe = "content_type", url = %resource.as_str()))]
    async fn probe(&self, resource: &ResourceRef, fetcher: &dyn Fetcher) -> ProbeResult {
        let failed = ProbeResult::failed(ProbeMethod::ContentType);
        let Some(url) = resource.url() else {
            return failed;
        };

        let response = match fetcher.fetch(url.as_str(), &FetchRequest::head()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "header request failed");
                return failed;
            }
        };

        if !response.is_success() {
            debug!(status = response.status, "header request returned error status");
            return failed;
        }
        let size = SizeEvidence::declared(response.declared_size());

        let content_type = response.content_type().unwrap_or_default();
        match self.table.lookup(content_type) {
            Some(extension) => {
                debug!(content_type, extension, "media type mapped");
                ProbeResult::detected(ProbeMethod::ContentType, extension, CONTENT_TYPE_CONFIDENCE)
                    .with_size(size)
            }
            None => {
                debug!(content_type, "media type not in table");
                failed.with_size(size)
            }
        }
    }
}
