//! Shared User-Agent string for probe traffic.
//!
//! Some CDNs reject requests without a browser-compatible token, so the string
//! keeps the `Mozilla/5.0 (compatible; ...)` shape while naming the tool.

/// Product token used in the User-Agent header.
const PRODUCT_NAME: &str = "link-attach";

/// Default User-Agent for every probe request.
#[must_use]
pub(crate) fn default_probe_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("Mozilla/5.0 (compatible; {PRODUCT_NAME}/{version})")
}
