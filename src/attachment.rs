//! Attachment naming and packaging.
//!
//! The resolved extension is reconciled with the URL's own last path segment
//! so names never end up with doubled (`a.png.png`) or mismatched
//! (`a.bmp` for PNG bytes) extensions.

use serde::{Deserialize, Serialize};

use crate::orchestrator::ResolutionDecision;

/// Fixed content type marker carried by every descriptor.
pub const ATTACHMENT_CONTENT_TYPE: &str = "attachment/url";

/// Longest suffix after the last `.` still treated as an extension.
const MAX_EXTENSION_CHARS: usize = 10;

/// Externally visible unit of output for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    /// Reconciled, filesystem-safe filename.
    pub name: String,
    /// The original URL, unchanged.
    pub content: String,
    /// Always [`ATTACHMENT_CONTENT_TYPE`].
    pub content_type: String,
}

impl AttachmentDescriptor {
    /// Builds a descriptor for `url` named from its path segment and `decision`.
    ///
    /// `index` is the zero-based position of the URL within its batch.
    #[must_use]
    pub fn assemble(
        url: &str,
        segment: Option<&str>,
        decision: &ResolutionDecision,
        index: usize,
    ) -> Self {
        Self {
            name: reconcile_filename(segment, decision, index),
            content: url.to_string(),
            content_type: ATTACHMENT_CONTENT_TYPE.to_string(),
        }
    }

    /// Descriptor for a URL that could not be parsed: `link_<n>.file`.
    #[must_use]
    pub fn malformed(url: &str, index: usize) -> Self {
        Self::assemble(url, None, &ResolutionDecision::fallback(), index)
    }
}

/// Positional name used when the URL has no usable path segment.
#[must_use]
pub fn positional_name(index: usize, extension: &str) -> String {
    format!("link_{}{extension}", index + 1)
}

/// Combines the URL's last path segment with the resolved extension.
///
/// - segment already ends with the extension (any case): kept verbatim
/// - segment has a different extension: replaced
/// - segment has no extension: appended
/// - no usable segment: `link_<index + 1><extension>`
#[must_use]
pub fn reconcile_filename(
    segment: Option<&str>,
    decision: &ResolutionDecision,
    index: usize,
) -> String {
    let extension = decision.extension.as_str();
    let segment = segment
        .map(sanitize_filename)
        .filter(|s| !s.trim_matches(['_', '.']).is_empty());
    let Some(segment) = segment else {
        return positional_name(index, extension);
    };

    if segment.to_lowercase().ends_with(&extension.to_lowercase()) {
        return segment;
    }
    match split_extension(&segment) {
        Some((stem, _)) => format!("{stem}{extension}"),
        None => format!("{segment}{extension}"),
    }
}

/// Splits `name` into `(stem, ".ext")` when it ends with a short alphanumeric extension.
fn split_extension(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    let (stem, ext) = name.split_at(dot);
    let bare = &ext[1..];
    let plausible = !stem.is_empty()
        && (1..=MAX_EXTENSION_CHARS).contains(&bare.len())
        && bare.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then_some((stem, ext))
}

/// Makes `name` safe to use as a single filename.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |`) and control characters with `_`. A bare `.` or `..`
/// has its dots replaced too.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if sanitized == "." || sanitized == ".." {
        return sanitized.replace('.', "_");
    }
    sanitized
}
