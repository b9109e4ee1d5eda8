//! Resource references: one absolute URL and the pieces probes read from it.

use url::Url;

/// An absolute URL under resolution.
///
/// Parsing never fails; an unparsable or non-HTTP string keeps `raw` and
/// reports no host, path, or query.
#[derive(Debug, Clone)]
pub struct ResourceRef {
    raw: String,
    parsed: Option<Url>,
}

impl ResourceRef {
    /// Wraps `raw`, parsing it when possible.
    #[must_use]
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = Url::parse(raw.trim())
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some());
        Self { raw, parsed }
    }

    /// The URL exactly as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed URL, or `None` when the input is malformed.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.parsed.as_ref()
    }

    /// Returns true when the URL parsed as an absolute http(s) URL.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.parsed.is_some()
    }

    /// Lower-cased hostname.
    #[must_use]
    pub fn hostname(&self) -> Option<String> {
        self.parsed
            .as_ref()
            .and_then(Url::host_str)
            .map(str::to_ascii_lowercase)
    }

    /// URL path, still percent-encoded.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.parsed.as_ref().map(Url::path)
    }

    /// Non-empty path segments, percent-decoded.
    #[must_use]
    pub fn path_segments(&self) -> Vec<String> {
        self.parsed
            .as_ref()
            .and_then(Url::path_segments)
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(decode_component)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Final path segment, percent-decoded. `None` for `/` or a trailing slash.
    #[must_use]
    pub fn last_segment(&self) -> Option<String> {
        let mut segments = self.parsed.as_ref()?.path_segments()?;
        let last = segments.next_back()?;
        (!last.is_empty()).then(|| decode_component(last))
    }

    /// Decoded query parameters in order of appearance.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.parsed
            .as_ref()
            .map(|url| {
                url.query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First value of query parameter `name` (case-insensitive key).
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.trim().is_empty())
            .map(|(_, value)| value)
    }

    /// Raw query string without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.parsed.as_ref().and_then(Url::query)
    }
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |decoded| decoded.into_owned())
}
