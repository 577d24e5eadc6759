//! Media source resolver
//!
//! One `resolve` call runs the whole pipeline for one video:
//! catalog fetch, scoring, fallback synthesis, policy placement, preflight
//! and assembly. The call never fails; problems end up in the report.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::assembler::ResultAssembler;
use super::observer::{PreflightObserver, TracingPreflightObserver};
use super::policy_candidate::PolicyInjector;
use super::preflight::{HttpSourceProber, PreflightValidator, SourceProber};
use super::scoring::{CandidateBuilder, rank_candidates};
use crate::catalog::{BridgeFormatCatalog, FormatCatalog, fetch_catalog};
use crate::config::{BridgeConfig, ResolutionPolicy};
use crate::errors::AppResult;
use crate::models::{ResolutionReport, ResolutionResult, VideoIdentifier};
use crate::observability::{KeyValue, metrics};
use crate::utils::{BridgeEndpoints, HttpClientFactory};

/// Resolves video ids into ordered playable sources
#[derive(Clone)]
pub struct MediaSourceResolver {
    catalog: Arc<dyn FormatCatalog>,
    validator: PreflightValidator,
    endpoints: BridgeEndpoints,
}

impl MediaSourceResolver {
    pub fn new(
        catalog: Arc<dyn FormatCatalog>,
        prober: Arc<dyn SourceProber>,
        endpoints: BridgeEndpoints,
    ) -> Self {
        Self {
            catalog,
            validator: PreflightValidator::new(prober, Arc::new(TracingPreflightObserver)),
            endpoints,
        }
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn PreflightObserver>) -> Self {
        self.validator = self.validator.with_observer(observer);
        self
    }

    /// Bridge-backed resolver sharing one HTTP client for fetch and preflight
    pub fn from_config(config: &BridgeConfig) -> AppResult<Self> {
        config.validate()?;
        let client = HttpClientFactory::from_config(config).create_client()?;
        let endpoints = BridgeEndpoints::new(&config.normalized_base_url());
        Ok(Self::new(
            Arc::new(BridgeFormatCatalog::new(client.clone(), endpoints.clone())),
            Arc::new(HttpSourceProber::new(client)),
            endpoints,
        ))
    }

    pub fn endpoints(&self) -> &BridgeEndpoints {
        &self.endpoints
    }

    /// Resolve `raw_video_id` (bare or `vid:`-prefixed) under `policy`.
    ///
    /// An empty result means "no playable source"; it only happens for a
    /// blank id or when the policy candidate is disabled and nothing else
    /// survived.
    pub async fn resolve(
        &self,
        raw_video_id: &str,
        policy: &ResolutionPolicy,
        cancel: &CancellationToken,
    ) -> ResolutionResult {
        let started = Instant::now();
        let Some(video_id) = VideoIdentifier::parse(raw_video_id) else {
            warn!(
                target = "resolver.assemble",
                raw_video_id,
                "Blank video id; no playable source"
            );
            metrics().empty_results_total.add(1, &[]);
            return ResolutionResult::empty(None);
        };

        let fetch = fetch_catalog(
            self.catalog.as_ref(),
            &video_id,
            policy.timeouts.fetch(),
            cancel,
        )
        .await;

        let builder = CandidateBuilder::new(&video_id, policy, &self.endpoints);
        let injector = PolicyInjector::new(&video_id, policy, &self.endpoints);

        let scored = builder.score_formats(&fetch.formats);
        let catalog_formats = scored.len();
        let suppress = injector.suppresses_fallbacks(fetch.failed(), catalog_formats);
        let mut ranked = rank_candidates(builder.add_fallbacks(scored, suppress));

        let policy_candidate = injector.candidate();
        injector.place_first(&mut ranked, &policy_candidate);

        let preflight = self
            .validator
            .validate(&video_id, &ranked, policy, cancel)
            .await;
        let probed = preflight.probed();
        let reachable = preflight.validated.len();
        let preflight_enabled = preflight.enabled;
        let preflight_cancelled = preflight.cancelled;

        let assembly = ResultAssembler::new(policy).assemble(&ranked, preflight, policy_candidate);
        if assembly.soft_fallback {
            self.validator
                .observer()
                .on_soft_fallback(&video_id, assembly.sources.len());
            metrics().soft_fallbacks_total.add(1, &[]);
        }

        let report = ResolutionReport {
            fetch_failure: fetch.failure_kind(),
            catalog_formats,
            candidates: ranked.len(),
            preflight_enabled,
            probed,
            reachable: if preflight_enabled { reachable } else { 0 },
            soft_fallback: assembly.soft_fallback,
            cancelled: preflight_cancelled || cancel.is_cancelled(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        let first = assembly
            .sources
            .first()
            .map(|c| c.source_id.clone())
            .unwrap_or_default();
        info!(
            target = "resolver.assemble",
            video_id = %video_id,
            fetch_failure = report.fetch_failure.map(|k| k.as_str()).unwrap_or("none"),
            catalog_formats = report.catalog_formats,
            candidates = report.candidates,
            preflight = report.preflight_enabled,
            preflight_max = policy.effective_preflight_max(),
            probed = report.probed,
            reachable = report.reachable,
            soft_fallback = report.soft_fallback,
            cancelled = report.cancelled,
            returned = assembly.sources.len(),
            first = %first,
            elapsed_ms = report.elapsed_ms,
            "Resolved media sources"
        );

        let outcome = match (assembly.sources.is_empty(), report.soft_fallback) {
            (true, _) => "empty",
            (false, true) => "soft_fallback",
            (false, false) => "validated",
        };
        metrics()
            .resolutions_total
            .add(1, &[KeyValue::new("outcome", outcome)]);
        metrics()
            .resolution_duration
            .record(started.elapsed().as_secs_f64(), &[]);
        if assembly.sources.is_empty() {
            metrics().empty_results_total.add(1, &[]);
        }

        ResolutionResult {
            video_id: Some(video_id),
            sources: assembly.sources,
            report,
            resolved_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CatalogError, CatalogResult, FetchFailureKind};
    use crate::models::{CandidateKind, CandidateSource, FormatDescriptor, PreflightOutcome};
    use crate::resolution::observer::RecordingPreflightObserver;
    use crate::resolution::preflight::ProbeRequest;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing_test::traced_test;

    enum Answer {
        Formats(Vec<FormatDescriptor>),
        Fail(CatalogError),
    }

    struct FakeCatalog {
        answer: Answer,
    }

    #[async_trait]
    impl FormatCatalog for FakeCatalog {
        async fn fetch_formats(
            &self,
            _: &VideoIdentifier,
            _: Duration,
            cancel: &CancellationToken,
        ) -> CatalogResult<Vec<FormatDescriptor>> {
            if cancel.is_cancelled() {
                return Err(CatalogError::Cancelled);
            }
            match &self.answer {
                Answer::Formats(formats) => Ok(formats.clone()),
                Answer::Fail(err) => Err(err.clone()),
            }
        }
    }

    /// Reachable when the source id is listed; `None` means everything passes
    struct FakeProber {
        reachable: Option<HashSet<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProber {
        fn all() -> Self {
            Self { reachable: None, calls: Mutex::new(Vec::new()) }
        }

        fn only(ids: &[&str]) -> Self {
            Self {
                reachable: Some(ids.iter().map(|s| s.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceProber for FakeProber {
        async fn probe(
            &self,
            candidate: &CandidateSource,
            _: ProbeRequest,
            _: &CancellationToken,
        ) -> PreflightOutcome {
            self.calls.lock().unwrap().push(candidate.source_id.clone());
            let ok = self
                .reachable
                .as_ref()
                .is_none_or(|ids| ids.contains(&candidate.source_id));
            if ok {
                PreflightOutcome {
                    source_id: candidate.source_id.clone(),
                    reachable: true,
                    status: Some(206),
                    bytes_read: 1,
                    ..Default::default()
                }
            } else {
                PreflightOutcome::unreachable(candidate.source_id.clone(), "HTTP 403")
            }
        }
    }

    fn resolver(answer: Answer, prober: Arc<FakeProber>) -> MediaSourceResolver {
        MediaSourceResolver::new(
            Arc::new(FakeCatalog { answer }),
            prober,
            BridgeEndpoints::new("http://bridge"),
        )
    }

    async fn run(resolver: &MediaSourceResolver, policy: &ResolutionPolicy) -> ResolutionResult {
        resolver.resolve("abc", policy, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_blocked_high_tier_with_reachable_baseline() {
        let prober = Arc::new(FakeProber::all());
        let resolver = resolver(
            Answer::Formats(vec![
                FormatDescriptor::progressive("18", "mp4", 360),
                FormatDescriptor::progressive("22", "mp4", 720),
            ]),
            prober.clone(),
        );
        let policy = ResolutionPolicy::default().with_blocked("22");

        let result = run(&resolver, &policy).await;

        assert_eq!(result.source_ids(), vec!["abc@18", "abc@policy"]);
        assert_eq!(prober.calls(), vec!["abc@18"]);
        assert_eq!(result.sources[1].url, "http://bridge/play/abc?policy=h264_mp4");
        assert!(!result.report.soft_fallback);
    }

    #[tokio::test]
    async fn test_fetch_timeout_with_policy_on_fetch_error() {
        let prober = Arc::new(FakeProber::all());
        let resolver = resolver(
            Answer::Fail(CatalogError::Timeout { timeout_ms: 20_000 }),
            prober.clone(),
        );
        let policy = ResolutionPolicy {
            policy_on_fetch_error: true,
            ..Default::default()
        };

        let result = run(&resolver, &policy).await;

        assert_eq!(result.source_ids(), vec!["abc@policy"]);
        assert_eq!(result.first().unwrap().kind, CandidateKind::Policy);
        assert!(prober.calls().is_empty());
        assert_eq!(result.report.fetch_failure, Some(FetchFailureKind::Transport));
    }

    #[tokio::test]
    async fn test_non_success_fetch_synthesizes_fallbacks() {
        let prober = Arc::new(FakeProber::all());
        let resolver = resolver(Answer::Fail(CatalogError::Status { status: 502 }), prober.clone());

        let result = run(&resolver, &ResolutionPolicy::default()).await;

        assert_eq!(prober.calls(), vec!["abc@22", "abc@18"]);
        assert_eq!(result.source_ids(), vec!["abc@18", "abc@22", "abc@policy"]);
        assert_eq!(result.report.fetch_failure, Some(FetchFailureKind::NonSuccess));
        assert!(
            result
                .sources
                .iter()
                .take(2)
                .all(|c| c.kind == CandidateKind::SynthesizedFallback)
        );
    }

    #[tokio::test]
    async fn test_forbidden_top_candidate_is_excluded() {
        let prober = Arc::new(FakeProber::only(&["abc@18"]));
        let resolver = resolver(
            Answer::Formats(vec![
                FormatDescriptor::progressive("22", "mp4", 720),
                FormatDescriptor::progressive("18", "mp4", 360),
            ]),
            prober.clone(),
        );

        let result = run(&resolver, &ResolutionPolicy::default()).await;

        assert_eq!(prober.calls(), vec!["abc@22", "abc@18"]);
        assert_eq!(result.source_ids(), vec!["abc@18", "abc@policy"]);
        assert_eq!(result.report.probed, 2);
        assert_eq!(result.report.reachable, 1);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_soft_fallback_when_nothing_reachable() {
        let prober = Arc::new(FakeProber::only(&[]));
        let observer = Arc::new(RecordingPreflightObserver::new());
        let resolver = resolver(
            Answer::Formats(vec![
                FormatDescriptor::progressive("22", "mp4", 720),
                FormatDescriptor::progressive("18", "mp4", 360),
            ]),
            prober,
        )
        .with_observer(observer.clone());

        let result = run(&resolver, &ResolutionPolicy::default()).await;

        assert!(result.report.soft_fallback);
        assert_eq!(result.source_ids(), vec!["abc@policy", "abc@22", "abc@18"]);
        assert_eq!(observer.soft_fallbacks(), vec![("abc".to_string(), 3)]);
        assert!(logs_contain("Resolved media sources"));
    }

    #[tokio::test]
    async fn test_preflight_disabled_takes_top_three() {
        let prober = Arc::new(FakeProber::only(&[]));
        let resolver = resolver(
            Answer::Formats(vec![
                FormatDescriptor::progressive("22", "mp4", 720),
                FormatDescriptor::progressive("18", "mp4", 360),
                FormatDescriptor::progressive("59", "mp4", 480),
                FormatDescriptor::progressive("43", "mp4", 240),
            ]),
            prober.clone(),
        );
        let policy = ResolutionPolicy {
            preflight_enabled: false,
            ..Default::default()
        };

        let result = run(&resolver, &policy).await;

        assert!(prober.calls().is_empty());
        assert_eq!(result.source_ids(), vec!["abc@18", "abc@22", "abc@59", "abc@policy"]);
        assert_eq!(result.report.probed, 0);
    }

    #[tokio::test]
    async fn test_policy_first_is_probed_and_leads() {
        let prober = Arc::new(FakeProber::all());
        let resolver = resolver(
            Answer::Formats(vec![FormatDescriptor::progressive("18", "mp4", 360)]),
            prober.clone(),
        );
        let policy = ResolutionPolicy {
            policy_first: true,
            ..Default::default()
        };

        let result = run(&resolver, &policy).await;

        assert_eq!(prober.calls()[0], "abc@policy");
        assert_eq!(result.source_ids(), vec!["abc@policy", "abc@18", "abc@22"]);
    }

    #[tokio::test]
    async fn test_policy_first_that_fails_preflight_never_displaces_validated() {
        let prober = Arc::new(FakeProber::only(&["abc@18"]));
        let resolver = resolver(
            Answer::Formats(vec![FormatDescriptor::progressive("18", "mp4", 360)]),
            prober.clone(),
        );
        let policy = ResolutionPolicy {
            policy_first: true,
            ..Default::default()
        };

        let result = run(&resolver, &policy).await;

        assert_eq!(prober.calls(), vec!["abc@policy", "abc@22", "abc@18"]);
        assert!(!result.report.soft_fallback);
        assert_eq!(result.source_ids(), vec!["abc@18", "abc@policy"]);
    }

    #[tokio::test]
    async fn test_blank_id_is_empty() {
        let resolver = resolver(Answer::Formats(Vec::new()), Arc::new(FakeProber::all()));
        let result = resolver
            .resolve("vid:  ", &ResolutionPolicy::default(), &CancellationToken::new())
            .await;
        assert!(result.is_empty());
        assert!(result.video_id.is_none());
    }

    #[tokio::test]
    async fn test_host_item_prefix_is_stripped() {
        let resolver = resolver(
            Answer::Formats(vec![FormatDescriptor::progressive("18", "mp4", 360)]),
            Arc::new(FakeProber::all()),
        );
        let result = resolver
            .resolve("vid:abc", &ResolutionPolicy::default(), &CancellationToken::new())
            .await;
        assert_eq!(result.video_id.as_ref().unwrap().as_str(), "abc");
        assert_eq!(result.first().unwrap().url, "http://bridge/play/abc?itag=18");
    }

    #[tokio::test]
    async fn test_cancelled_resolution_still_answers() {
        let prober = Arc::new(FakeProber::all());
        let resolver = resolver(
            Answer::Formats(vec![FormatDescriptor::progressive("18", "mp4", 360)]),
            prober.clone(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = resolver.resolve("abc", &ResolutionPolicy::default(), &cancel).await;

        assert!(result.report.cancelled);
        assert!(prober.calls().is_empty());
        assert_eq!(result.first().unwrap().kind, CandidateKind::Policy);
    }

    #[tokio::test]
    async fn test_empty_when_policy_disabled_and_nothing_survives() {
        let resolver = resolver(
            Answer::Formats(Vec::new()),
            Arc::new(FakeProber::all()),
        );
        let policy = ResolutionPolicy {
            include_policy_candidate: false,
            ..Default::default()
        }
        .with_blocked("18")
        .with_blocked("22");

        let result = run(&resolver, &policy).await;
        assert!(result.is_empty());
    }

    fn arb_format() -> impl Strategy<Value = FormatDescriptor> {
        (
            prop::sample::select(vec!["18", "22", "37", "43", "136", "137", " ", ""]),
            prop::sample::select(vec!["mp4", "webm", ""]),
            prop::sample::select(vec!["avc1.4d401f", "vp9", "none"]),
            any::<bool>(),
            any::<bool>(),
            0u32..2200,
        )
            .prop_map(|(id, ext, vcodec, has_video, has_audio, height)| FormatDescriptor {
                format_id: id.to_string(),
                container: Some(ext.to_string()),
                has_video,
                has_audio,
                video_codec: Some(vcodec.to_string()),
                audio_codec: has_audio.then(|| "mp4a.40.2".to_string()),
                height_pixels: Some(height),
                ..Default::default()
            })
    }

    fn arb_policy() -> impl Strategy<Value = ResolutionPolicy> {
        (
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            prop::collection::btree_set(prop::sample::select(vec!["18", "22", "137", "43"]), 0..3),
        )
            .prop_map(
                |(
                    progressive_only,
                    prefer_baseline,
                    policy_first,
                    on_fetch_error,
                    preflight,
                    blocked,
                )| {
                    let mut policy = ResolutionPolicy {
                        progressive_only,
                        prefer_baseline_stable: prefer_baseline,
                        policy_first,
                        policy_on_fetch_error: on_fetch_error,
                        preflight_enabled: preflight,
                        ..Default::default()
                    };
                    for id in blocked {
                        policy = policy.with_blocked(id);
                    }
                    policy
                },
            )
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #[test]
        fn prop_resolution_never_breaks_policy_rules(
            formats in prop::collection::vec(arb_format(), 0..8),
            policy in arb_policy(),
            reachable_mask in any::<u8>(),
            fail in any::<bool>(),
        ) {
            let answer = if fail {
                Answer::Fail(CatalogError::Transport { message: "refused".into() })
            } else {
                Answer::Formats(formats)
            };
            let reachable: Vec<String> = ["18", "22", "37", "43", "136", "137", "policy"]
                .iter()
                .enumerate()
                .filter(|(i, _)| reachable_mask & (1 << i) != 0)
                .map(|(_, id)| format!("abc@{id}"))
                .collect();
            let reachable_refs: Vec<&str> = reachable.iter().map(String::as_str).collect();
            let resolver = resolver(answer, Arc::new(FakeProber::only(&reachable_refs)));

            let result = block_on(run(&resolver, &policy));

            // Policy candidate enabled means never empty
            prop_assert!(!result.is_empty());

            let mut seen = HashSet::new();
            for source in &result.sources {
                prop_assert!(
                    seen.insert(source.source_id.clone()),
                    "duplicate {}",
                    source.source_id
                );
                if let Some(id) = &source.format_id {
                    prop_assert!(!policy.is_blocked(id), "blocked {} returned", id);
                }
                if policy.progressive_only {
                    prop_assert!(source.kind != CandidateKind::VideoOnly);
                }
            }

            if result.report.soft_fallback {
                prop_assert!(result.sources[0].is_policy());
            } else {
                let position = |id: &str| result.sources.iter().position(|s| s.has_format_id(id));
                if let (Some(baseline), Some(high_tier)) = (position("18"), position("22")) {
                    prop_assert!(baseline < high_tier);
                }
                let policy_passed = !policy.preflight_enabled
                    || reachable.iter().any(|id| id == "abc@policy");
                if !policy_passed {
                    let last = result.sources.last().map(|s| s.is_policy());
                    prop_assert_eq!(last, Some(true));
                }
            }
        }
    }
}
