//! Provider policies: which probe to trust first for a given host.
//!
//! Hosting providers differ in which signal is reliable. Code hosts serve
//! authoritative paths; generic CDNs front arbitrary origins where only the
//! bytes can be trusted. The [`StrategySelector`] evaluates an ordered rule
//! table top to bottom and the first matching policy wins, so overlapping
//! suffixes (`cloudflare.com` vs `cdnjs.cloudflare.com`) resolve by position.

use std::sync::{Arc, LazyLock};

use tracing::debug;

use crate::probe::ProbeMethod;

/// Category confidence of the default policy.
pub const DEFAULT_CATEGORY_CONFIDENCE: f64 = 0.7;

/// Probe order and trust weighting for one hosting category.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    /// Category label for logs.
    pub name: &'static str,
    /// Hostname suffixes this policy claims.
    pub match_domains: Vec<&'static str>,
    /// Probe tried first.
    pub primary: ProbeMethod,
    /// Probe tried when the primary fails.
    pub fallback: ProbeMethod,
    /// Multiplier applied to a primary hit, in `(0, 1]`.
    pub category_confidence: f64,
}

impl ProviderPolicy {
    /// Policy used when no category matches.
    #[must_use]
    pub fn default_policy() -> Self {
        Self {
            name: "default",
            match_domains: Vec::new(),
            primary: ProbeMethod::ContentType,
            fallback: ProbeMethod::UrlExtension,
            category_confidence: DEFAULT_CATEGORY_CONFIDENCE,
        }
    }

    /// Returns true when `hostname` equals a suffix or is a subdomain of one.
    #[must_use]
    pub fn matches(&self, hostname: &str) -> bool {
        let host = hostname.trim_end_matches('.').to_ascii_lowercase();
        self.match_domains.iter().any(|suffix| {
            host == *suffix
                || host
                    .strip_suffix(suffix)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

static BUILTIN_POLICIES: LazyLock<Arc<[ProviderPolicy]>> =
    LazyLock::new(|| builtin_policies().into());

fn builtin_policies() -> Vec<ProviderPolicy> {
    vec![
        ProviderPolicy {
            name: "code-hosting",
            match_domains: vec![
                "github.com",
                "githubusercontent.com",
                "github.io",
                "githubassets.com",
                "gitlab.com",
                "bitbucket.org",
                "jsdelivr.net",
                "unpkg.com",
                "cdnjs.cloudflare.com",
            ],
            primary: ProbeMethod::UrlExtension,
            fallback: ProbeMethod::ContentType,
            category_confidence: 0.95,
        },
        ProviderPolicy {
            name: "image-cdn",
            match_domains: vec![
                "alicdn.com",
                "qpic.cn",
                "qlogo.cn",
                "sinaimg.cn",
                "imagedelivery.net",
                "qiniucdn.com",
                "clouddn.com",
                "qnssl.com",
                "upaiyun.com",
                "upyun.com",
                "upcdn.net",
                "hdslb.com",
                "xhscdn.com",
                "byteimg.com",
                "douyinpic.com",
                "ytimg.com",
                "ggpht.com",
                "twimg.com",
                "fbcdn.net",
                "cdninstagram.com",
            ],
            primary: ProbeMethod::UrlExtension,
            fallback: ProbeMethod::ContentSniff,
            category_confidence: 0.85,
        },
        ProviderPolicy {
            name: "object-storage",
            match_domains: vec![
                "amazonaws.com",
                "aliyuncs.com",
                "myqcloud.com",
                "myhuaweicloud.com",
                "ksyuncs.com",
                "bcebos.com",
                "storage.googleapis.com",
                "blob.core.windows.net",
            ],
            primary: ProbeMethod::ContentType,
            fallback: ProbeMethod::UrlExtension,
            category_confidence: 0.9,
        },
        ProviderPolicy {
            name: "generic-cdn",
            match_domains: vec![
                "cloudfront.net",
                "akamaized.net",
                "akamaihd.net",
                "akamaiedge.net",
                "fastly.net",
                "fastlylb.net",
                "cloudflare.net",
                "cloudflare.com",
                "googlevideo.com",
                "bilivideo.com",
                "tiktokcdn.com",
                "zjcdn.com",
            ],
            primary: ProbeMethod::ContentSniff,
            fallback: ProbeMethod::ContentType,
            category_confidence: 0.8,
        },
    ]
}

/// Ordered rule table mapping hostnames to provider policies.
#[derive(Debug, Clone)]
pub struct StrategySelector {
    policies: Arc<[ProviderPolicy]>,
    default_policy: ProviderPolicy,
}

impl StrategySelector {
    /// Selector over `policies`, evaluated in the given order.
    #[must_use]
    pub fn new(policies: impl Into<Arc<[ProviderPolicy]>>) -> Self {
        Self {
            policies: policies.into(),
            default_policy: ProviderPolicy::default_policy(),
        }
    }

    /// Selector over the shared builtin table.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(Arc::clone(&BUILTIN_POLICIES))
    }

    /// First policy matching `hostname`, or the default policy.
    #[must_use]
    pub fn select(&self, hostname: Option<&str>) -> &ProviderPolicy {
        let selected = hostname
            .and_then(|host| self.policies.iter().find(|policy| policy.matches(host)))
            .unwrap_or(&self.default_policy);
        debug!(
            host = hostname.unwrap_or("<none>"),
            policy = selected.name,
            primary = %selected.primary,
            fallback = %selected.fallback,
            "provider policy selected"
        );
        selected
    }

    /// Configured policies in evaluation order.
    #[must_use]
    pub fn policies(&self) -> &[ProviderPolicy] {
        &self.policies
    }
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::builtin()
    }
}
