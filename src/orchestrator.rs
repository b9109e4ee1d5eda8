//! Resolution orchestrator: runs probes and reconciles them into one decision.
//!
//! Two execution modes are supported, chosen at deployment time:
//!
//! - [`ExecutionMode::Concurrent`] runs every probe at once, waits for all of
//!   them to settle, and keeps the highest-confidence result. Agreement between
//!   independent probes adds [`CORROBORATION_BONUS`].
//! - [`ExecutionMode::StrategyGuided`] runs the provider policy's primary
//!   probe and only falls back to the second probe when the first fails.
//!
//! Neither mode returns an error. When every probe fails the decision is the
//! fixed fallback ([`FALLBACK_EXTENSION`], confidence `0`).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::fetch::Fetcher;
use crate::formats::{FALLBACK_EXTENSION, same_format};
use crate::probe::{ProbeMethod, ProbeResult, ProbeSet};
use crate::resource::ResourceRef;
use crate::size_guard::SizeEvidence;
use crate::strategy::ProviderPolicy;

/// Confidence added when two or more probes agree on the winning extension.
pub const CORROBORATION_BONUS: f64 = 0.1;

/// Upper bound for any decision confidence.
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Multiplier applied to a fallback probe hit in strategy-guided mode.
pub const CROSS_STRATEGY_PENALTY: f64 = 0.8;

/// How probes are scheduled for one URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// All probes in parallel, best result wins.
    Concurrent,
    /// Provider policy primary, then fallback.
    #[default]
    #[serde(alias = "strategy")]
    StrategyGuided,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent => write!(f, "concurrent"),
            Self::StrategyGuided => write!(f, "strategy"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "strategy" | "strategy_guided" | "strategy-guided" => Ok(Self::StrategyGuided),
            other => Err(format!(
                "unknown execution mode '{other}' (expected 'concurrent' or 'strategy')"
            )),
        }
    }
}

/// The orchestrator's single output per URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionDecision {
    /// Winning extension with a leading dot.
    pub extension: String,
    /// Trust in `[0, 1]`.
    pub confidence: f64,
    /// Method of the winning probe; `None` for the fallback decision.
    pub method: Option<ProbeMethod>,
}

impl ResolutionDecision {
    /// Decision used when no probe succeeds.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            extension: FALLBACK_EXTENSION.to_string(),
            confidence: 0.0,
            method: None,
        }
    }

    /// Returns true when a probe produced this decision.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.method.is_some()
    }

    fn from_probe(result: &ProbeResult, confidence: f64) -> Option<Self> {
        Some(Self {
            extension: result.extension()?.to_string(),
            confidence: confidence.clamp(0.0, MAX_CONFIDENCE),
            method: Some(result.method),
        })
    }
}

/// Decision plus the size evidence gathered by the probes that ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Winning decision.
    pub decision: ResolutionDecision,
    /// Merged size signals from every probe that ran.
    pub size: SizeEvidence,
}

/// Runs probes for one URL and reconciles their results.
pub struct Orchestrator {
    probes: ProbeSet,
    fetcher: Arc<dyn Fetcher>,
    mode: ExecutionMode,
}

impl Orchestrator {
    /// Creates an orchestrator over `probes`.
    #[must_use]
    pub fn new(probes: ProbeSet, fetcher: Arc<dyn Fetcher>, mode: ExecutionMode) -> Self {
        Self {
            probes,
            fetcher,
            mode,
        }
    }

    /// Resolves `resource` under `policy` (ignored in concurrent mode).
    #[instrument(skip(self, resource, policy), fields(url = %resource.as_str(), mode = %self.mode, policy = policy.name))]
    pub async fn resolve(&self, resource: &ResourceRef, policy: &ProviderPolicy) -> Resolution {
        let resolution = match self.mode {
            ExecutionMode::Concurrent => self.resolve_concurrent(resource).await,
            ExecutionMode::StrategyGuided => self.resolve_guided(resource, policy).await,
        };
        info!(
            extension = %resolution.decision.extension,
            confidence = resolution.decision.confidence,
            method = resolution.decision.method.map_or("fallback", ProbeMethod::as_str),
            "resolution decided"
        );
        resolution
    }

    async fn run(&self, method: ProbeMethod, resource: &ResourceRef) -> ProbeResult {
        let result = self
            .probes
            .get(method)
            .probe(resource, self.fetcher.as_ref())
            .await;
        debug!(
            probe = %method,
            succeeded = result.succeeded(),
            extension = result.extension().unwrap_or("-"),
            confidence = result.confidence(),
            "probe settled"
        );
        result
    }

    async fn resolve_concurrent(&self, resource: &ResourceRef) -> Resolution {
        let (content_type, url_extension, content_sniff) = tokio::join!(
            self.run(ProbeMethod::ContentType, resource),
            self.run(ProbeMethod::UrlExtension, resource),
            self.run(ProbeMethod::ContentSniff, resource),
        );
        let results = [content_type, url_extension, content_sniff];
        let size = merge_size(&results);
        Resolution {
            decision: pick_best(&results),
            size,
        }
    }

    async fn resolve_guided(&self, resource: &ResourceRef, policy: &ProviderPolicy) -> Resolution {
        let primary = self.run(policy.primary, resource).await;
        if let Some(decision) = ResolutionDecision::from_probe(
            &primary,
            primary.confidence() * policy.category_confidence,
        ) {
            return Resolution {
                decision,
                size: primary.size,
            };
        }

        let fallback = self.run(policy.fallback, resource).await;
        let size = primary.size.merge(fallback.size);
        let decision = ResolutionDecision::from_probe(
            &fallback,
            fallback.confidence() * CROSS_STRATEGY_PENALTY,
        )
        .unwrap_or_else(ResolutionDecision::fallback);
        Resolution { decision, size }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("mode", &self.mode)
            .field("probes", &self.probes)
            .finish_non_exhaustive()
    }
}

fn merge_size(results: &[ProbeResult]) -> SizeEvidence {
    results
        .iter()
        .fold(SizeEvidence::default(), |acc, r| acc.merge(r.size))
}

/// Reduces successful results to one decision.
///
/// Highest confidence wins and ties keep the first-encountered result. When
/// two or more successful results name the winner's format, the winner gains
/// [`CORROBORATION_BONUS`], capped at [`MAX_CONFIDENCE`].
#[must_use]
pub fn pick_best(results: &[ProbeResult]) -> ResolutionDecision {
    let mut winner: Option<&ProbeResult> = None;
    for result in results.iter().filter(|r| r.succeeded()) {
        if winner.is_none_or(|best| result.confidence() > best.confidence()) {
            winner = Some(result);
        }
    }
    let Some(winner) = winner else {
        return ResolutionDecision::fallback();
    };
    let Some(winning_ext) = winner.extension() else {
        return ResolutionDecision::fallback();
    };

    let agreeing = results
        .iter()
        .filter_map(ProbeResult::extension)
        .filter(|ext| same_format(ext, winning_ext))
        .count();
    let confidence = if agreeing >= 2 {
        (winner.confidence() + CORROBORATION_BONUS).min(MAX_CONFIDENCE)
    } else {
        winner.confidence()
    };
    ResolutionDecision::from_probe(winner, confidence).unwrap_or_else(ResolutionDecision::fallback)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::{FetchError, FetchMethod, FetchRequest, FetchResponse};
    use crate::probe::{
        CONTENT_SNIFF_CONFIDENCE, CONTENT_TYPE_CONFIDENCE, URL_EXTENSION_CONFIDENCE,
    };
    use crate::strategy::StrategySelector;

    const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ];

    /// Scripted fetcher: fixed HEAD and GET responses, records every call.
    #[derive(Default)]
    struct ScriptedFetcher {
        head: Option<FetchResponse>,
        get: Option<FetchResponse>,
        calls: Mutex<Vec<FetchMethod>>,
    }

    impl ScriptedFetcher {
        fn with_head(mut self, content_type: &str) -> Self {
            self.head = Some(response(200, &[("content-type", content_type)], &[]));
            self
        }

        fn with_get(mut self, body: &[u8]) -> Self {
            self.get = Some(response(200, &[], body));
            self
        }

        fn calls(&self) -> Vec<FetchMethod> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> FetchResponse {
        FetchResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<HashMap<_, _>>(),
            body: body.to_vec(),
            bytes_seen: body.len() as u64,
            truncated: false,
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            url: &str,
            request: &FetchRequest,
        ) -> Result<FetchResponse, FetchError> {
            self.calls.lock().unwrap().push(request.method);
            let scripted = match request.method {
                FetchMethod::Head => self.head.clone(),
                FetchMethod::Get => self.get.clone(),
            };
            scripted.ok_or_else(|| FetchError::timeout(url))
        }
    }

    fn orchestrator(fetcher: Arc<ScriptedFetcher>, mode: ExecutionMode) -> Orchestrator {
        Orchestrator::new(ProbeSet::default(), fetcher, mode)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_pick_best_highest_confidence_wins() {
        let results = [
            ProbeResult::detected(ProbeMethod::ContentType, ".jpg", 0.7),
            ProbeResult::detected(ProbeMethod::UrlExtension, ".bmp", 0.6),
            ProbeResult::detected(ProbeMethod::ContentSniff, ".png", 0.9),
        ];
        let decision = pick_best(&results);
        assert_eq!(decision.extension, ".png");
        assert_eq!(decision.method, Some(ProbeMethod::ContentSniff));
        assert!(approx(decision.confidence, 0.9));
    }

    #[test]
    fn test_pick_best_tie_keeps_first() {
        let results = [
            ProbeResult::detected(ProbeMethod::ContentType, ".gif", 0.7),
            ProbeResult::detected(ProbeMethod::UrlExtension, ".webp", 0.7),
        ];
        let decision = pick_best(&results);
        assert_eq!(decision.extension, ".gif");
        assert_eq!(decision.method, Some(ProbeMethod::ContentType));
    }

    #[test]
    fn test_pick_best_corroboration_is_strictly_greater_and_capped() {
        let results = [
            ProbeResult::detected(ProbeMethod::ContentType, ".png", CONTENT_TYPE_CONFIDENCE),
            ProbeResult::detected(ProbeMethod::ContentSniff, ".png", CONTENT_SNIFF_CONFIDENCE),
        ];
        let decision = pick_best(&results);
        assert!(decision.confidence > CONTENT_SNIFF_CONFIDENCE);
        assert!(decision.confidence > CONTENT_TYPE_CONFIDENCE);
        assert!(decision.confidence <= MAX_CONFIDENCE);

        let saturated = [
            ProbeResult::detected(ProbeMethod::ContentType, ".png", 0.95),
            ProbeResult::detected(ProbeMethod::ContentSniff, ".png", 0.98),
        ];
        assert!(approx(pick_best(&saturated).confidence, MAX_CONFIDENCE));
    }

    #[test]
    fn test_pick_best_aliases_corroborate() {
        let results = [
            ProbeResult::detected(ProbeMethod::UrlExtension, ".jpeg", 0.6),
            ProbeResult::detected(ProbeMethod::ContentSniff, ".jpg", 0.9),
        ];
        let decision = pick_best(&results);
        assert_eq!(decision.extension, ".jpg");
        assert!(approx(decision.confidence, 0.9 + CORROBORATION_BONUS));
    }

    #[test]
    fn test_pick_best_all_failed_is_fallback() {
        let results = [
            ProbeResult::failed(ProbeMethod::ContentType),
            ProbeResult::failed(ProbeMethod::UrlExtension),
        ];
        let decision = pick_best(&results);
        assert_eq!(decision, ResolutionDecision::fallback());
        assert!(!decision.succeeded());
        assert_eq!(decision.extension, ".file");
    }

    #[test]
    fn test_execution_mode_parse() {
        assert_eq!("concurrent".parse::<ExecutionMode>().unwrap(), ExecutionMode::Concurrent);
        assert_eq!("Strategy".parse::<ExecutionMode>().unwrap(), ExecutionMode::StrategyGuided);
        assert!("random".parse::<ExecutionMode>().is_err());
        assert_eq!(ExecutionMode::default(), ExecutionMode::StrategyGuided);
    }

    #[tokio::test]
    async fn test_concurrent_mode_runs_every_probe_and_boosts_agreement() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_head("image/png")
                .with_get(PNG_BYTES),
        );
        let orch = orchestrator(Arc::clone(&fetcher), ExecutionMode::Concurrent);
        let resource = ResourceRef::parse("https://example.com/a.png");
        let policy = ProviderPolicy::default_policy();

        let resolution = orch.resolve(&resource, &policy).await;

        assert_eq!(resolution.decision.extension, ".png");
        assert_eq!(resolution.decision.method, Some(ProbeMethod::ContentSniff));
        assert!(resolution.decision.confidence > CONTENT_SNIFF_CONFIDENCE);
        let calls = fetcher.calls();
        assert!(calls.contains(&FetchMethod::Head));
        assert!(calls.contains(&FetchMethod::Get));
    }

    #[tokio::test]
    async fn test_concurrent_mode_tolerates_partial_failure() {
        // No HEAD script: the header probe fails, the others still settle.
        let fetcher = Arc::new(ScriptedFetcher::default().with_get(PNG_BYTES));
        let orch = orchestrator(fetcher, ExecutionMode::Concurrent);
        let resource = ResourceRef::parse("https://example.com/picture.bmp");

        let resolution = orch
            .resolve(&resource, &ProviderPolicy::default_policy())
            .await;

        assert_eq!(resolution.decision.extension, ".png");
        assert!(approx(resolution.decision.confidence, CONTENT_SNIFF_CONFIDENCE));
    }

    #[tokio::test]
    async fn test_concurrent_mode_all_fail_returns_fallback() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let orch = orchestrator(fetcher, ExecutionMode::Concurrent);
        let resource = ResourceRef::parse("https://example.com/b");

        let resolution = orch
            .resolve(&resource, &ProviderPolicy::default_policy())
            .await;

        assert_eq!(resolution.decision, ResolutionDecision::fallback());
    }

    #[tokio::test]
    async fn test_guided_primary_hit_scaled_by_category() {
        let fetcher = Arc::new(ScriptedFetcher::default().with_head("application/pdf"));
        let orch = orchestrator(Arc::clone(&fetcher), ExecutionMode::StrategyGuided);
        let resource = ResourceRef::parse("https://example.com/doc");
        let policy = ProviderPolicy::default_policy();

        let resolution = orch.resolve(&resource, &policy).await;

        assert_eq!(resolution.decision.extension, ".pdf");
        assert_eq!(resolution.decision.method, Some(ProbeMethod::ContentType));
        assert!(approx(
            resolution.decision.confidence,
            CONTENT_TYPE_CONFIDENCE * policy.category_confidence
        ));
        assert_eq!(fetcher.calls(), vec![FetchMethod::Head]);
    }

    #[tokio::test]
    async fn test_guided_code_hosting_needs_no_network() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let orch = orchestrator(Arc::clone(&fetcher), ExecutionMode::StrategyGuided);
        let selector = StrategySelector::builtin();
        let resource = ResourceRef::parse("https://raw.githubusercontent.com/o/r/main/logo.svg");
        let policy = selector.select(resource.hostname().as_deref());

        let resolution = orch.resolve(&resource, policy).await;

        assert_eq!(resolution.decision.extension, ".svg");
        assert!(approx(
            resolution.decision.confidence,
            URL_EXTENSION_CONFIDENCE * 0.95
        ));
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_guided_fallback_hit_uses_penalty() {
        // HEAD returns a generic type, so the URL fallback decides.
        let fetcher = Arc::new(ScriptedFetcher::default().with_head("application/octet-stream"));
        let orch = orchestrator(fetcher, ExecutionMode::StrategyGuided);
        let resource = ResourceRef::parse("https://example.com/track.mp3");

        let resolution = orch
            .resolve(&resource, &ProviderPolicy::default_policy())
            .await;

        assert_eq!(resolution.decision.extension, ".mp3");
        assert_eq!(resolution.decision.method, Some(ProbeMethod::UrlExtension));
        assert!(approx(
            resolution.decision.confidence,
            URL_EXTENSION_CONFIDENCE * CROSS_STRATEGY_PENALTY
        ));
    }

    #[tokio::test]
    async fn test_guided_both_fail_returns_fallback() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let orch = orchestrator(fetcher, ExecutionMode::StrategyGuided);
        let resource = ResourceRef::parse("https://example.com/b");

        let resolution = orch
            .resolve(&resource, &ProviderPolicy::default_policy())
            .await;

        assert_eq!(resolution.decision, ResolutionDecision::fallback());
    }

    #[tokio::test]
    async fn test_resolution_is_repeatable() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_head("image/png")
                .with_get(PNG_BYTES),
        );
        let orch = orchestrator(fetcher, ExecutionMode::Concurrent);
        let resource = ResourceRef::parse("https://example.com/a.png");
        let policy = ProviderPolicy::default_policy();

        let first = orch.resolve(&resource, &policy).await;
        let second = orch.resolve(&resource, &policy).await;

        assert_eq!(first.decision, second.decision);
    }
}
