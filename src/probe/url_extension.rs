//! URL-only probe: recovers an extension from the path or query string.
//!
//! Steps run in order and the first supported candidate wins:
//!
//! 1. extension of the final path segment
//! 2. extension inside a `filename`, `name`, or `file` query value
//! 3. a bare `format` query value
//! 4. a `/format/<value>` path pair
//! 5. a `format` token inside an image-processing directive in the query
//!    (`x-oss-process=image/format,png`, `imageMogr2/format/webp`, ...)
//!
//! An unsupported candidate does not end the search; later steps still run.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument, trace};

use super::{Probe, ProbeMethod, ProbeResult};
use crate::fetch::Fetcher;
use crate::formats::supported_extension;
use crate::resource::ResourceRef;

/// Base confidence for a URL-derived extension. URLs can lie, but this probe is free.
pub const URL_EXTENSION_CONFIDENCE: f64 = 0.6;

/// Query parameters that commonly carry a filename, in priority order.
const FILENAME_PARAMS: [&str; 3] = ["filename", "name", "file"];

/// `format` token inside an image-processing directive.
#[allow(clippy::expect_used)]
static DIRECTIVE_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[/,&|!?])format[/,]([a-z0-9]+)").expect("directive regex is valid") // Static pattern, safe to panic
});

/// Probe that inspects the URL without any network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlExtensionProbe;

impl UrlExtensionProbe {
    /// Creates a new `UrlExtensionProbe`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs the URL heuristics synchronously.
    #[must_use]
    pub fn detect(&self, resource: &ResourceRef) -> ProbeResult {
        match detect_extension(resource) {
            Some(extension) => {
                ProbeResult::detected(ProbeMethod::UrlExtension, extension, URL_EXTENSION_CONFIDENCE)
            }
            None => ProbeResult::failed(ProbeMethod::UrlExtension),
        }
    }
}

#[async_trait]
impl Probe for UrlExtensionProbe {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::UrlExtension
    }

    #[instrument(skip_all, fields(probe = "url_extension"))]
    async fn probe(&self, resource: &ResourceRef, _fetcher: &dyn Fetcher) -> ProbeResult {
        self.detect(resource)
    }
}

/// Extension recovered from `url` alone, e.g. `.pdf`.
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    detect_extension(&ResourceRef::parse(url))
}

fn detect_extension(resource: &ResourceRef) -> Option<String> {
    if !resource.is_valid() {
        trace!("unparsable URL");
        return None;
    }

    if let Some(segment) = resource.last_segment()
        && let Some(ext) = accept("path segment", extension_of(&segment))
    {
        return Some(ext);
    }

    for param in FILENAME_PARAMS {
        if let Some(value) = resource.query_param(param) {
            let leaf = value.rsplit(['/', '\\']).next().unwrap_or(value.as_str());
            if let Some(ext) = accept(param, extension_of(leaf)) {
                return Some(ext);
            }
        }
    }

    if let Some(value) = resource.query_param("format")
        && let Some(ext) = accept("format param", Some(leading_token(&value)))
    {
        return Some(ext);
    }

    let segments = resource.path_segments();
    let from_path = segments
        .windows(2)
        .find(|pair| pair[0].eq_ignore_ascii_case("format"))
        .map(|pair| leading_token(&pair[1]));
    if let Some(ext) = accept("format path", from_path) {
        return Some(ext);
    }

    let query = resource.query()?;
    let decoded = urlencoding::decode(query).map_or_else(|_| query.to_string(), |q| q.into_owned());
    let from_directive = DIRECTIVE_FORMAT
        .captures_iter(&decoded)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| supported_extension(m.as_str()));
    if let Some(ext) = &from_directive {
        debug!(step = "format directive", extension = %ext, "extension found");
    }
    from_directive
}

fn accept(step: &str, candidate: Option<&str>) -> Option<String> {
    let candidate = candidate?;
    match supported_extension(candidate) {
        Some(ext) => {
            debug!(step, extension = %ext, "extension found");
            Some(ext)
        }
        None => {
            trace!(step, candidate, "unsupported extension candidate");
            None
        }
    }
}

/// Text after the last `.`, cut at the first character that cannot be part of
/// an extension (`photo.jpg!thumb` gives `jpg`).
fn extension_of(name: &str) -> Option<&str> {
    let (_, after) = name.rsplit_once('.')?;
    let token = leading_token(after);
    (!token.is_empty()).then_some(token)
}

fn leading_token(value: &str) -> &str {
    let value = value.trim().trim_start_matches('.');
    let end = value
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(value.len());
    &value[..end]
}
