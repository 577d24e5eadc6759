/*!
 * Preflight Validator
 * ===================
 *
 * Cheap liveness check of the top-ranked candidates before they reach the
 * player. Each candidate gets one ranged GET:
 *
 *   - `probe_bytes > 0`: `Range: bytes=0-(N-1)`; reachable when the status is
 *     200/206 and at least one body byte arrives before the deadline. Reading
 *     stops after N bytes.
 *   - `probe_bytes == 0`: `Range: bytes=0-0`; headers only. Reachable on 206,
 *     or on 200 with a positive Content-Length or chunked transfer encoding.
 *
 * Any other status, transport error or timeout marks the candidate
 * unreachable. Probes run in rank order and never reorder the list; with
 * concurrency above one they overlap but results are still consumed in order.
 */

use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::Client;
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_RANGE, HeaderMap, HeaderName, RANGE, TRANSFER_ENCODING,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::observer::PreflightObserver;
use crate::config::ResolutionPolicy;
use crate::config::defaults::UNPROBED_CANDIDATE_COUNT;
use crate::errors::{ProbeError, ProbeResult};
use crate::models::{CandidateSource, PreflightOutcome, VideoIdentifier};
use crate::observability::{KeyValue, metrics};
use crate::utils::UrlUtils;

/// Parameters of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Bytes to request; zero means a 1-byte header-only probe
    pub probe_bytes: u64,
    /// Deadline for headers and body together
    pub timeout: Duration,
}

impl ProbeRequest {
    pub fn from_policy(policy: &ResolutionPolicy) -> Self {
        Self {
            probe_bytes: policy.preflight_probe_bytes,
            timeout: policy.timeouts.preflight(),
        }
    }

    pub fn range_header(&self) -> String {
        match self.probe_bytes {
            0 => "bytes=0-0".to_string(),
            n => format!("bytes=0-{}", n - 1),
        }
    }
}

/// Probes one candidate URL; never fails, only reports
#[async_trait]
pub trait SourceProber: Send + Sync {
    async fn probe(
        &self,
        candidate: &CandidateSource,
        request: ProbeRequest,
        cancel: &CancellationToken,
    ) -> PreflightOutcome;
}

/// What the response headers alone say about reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderVerdict {
    Reachable,
    Unreachable,
    /// Status is fine; the body decides
    ReadBody,
}

/// Classify a probe response from its status line and framing headers.
pub fn classify_headers(
    status: u16,
    content_length: Option<u64>,
    chunked: bool,
    probe_bytes: u64,
) -> HeaderVerdict {
    if status != 200 && status != 206 {
        return HeaderVerdict::Unreachable;
    }
    if probe_bytes > 0 {
        return HeaderVerdict::ReadBody;
    }
    if status == 206 || content_length.unwrap_or(0) > 0 || chunked {
        HeaderVerdict::Reachable
    } else {
        HeaderVerdict::Unreachable
    }
}

/// Ranged-GET prober over the shared bridge client
#[derive(Debug, Clone)]
pub struct HttpSourceProber {
    client: Client,
}

impl HttpSourceProber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn run(
        &self,
        candidate: &CandidateSource,
        request: ProbeRequest,
        deadline: tokio::time::Instant,
        outcome: &mut PreflightOutcome,
    ) -> ProbeResult<()> {
        let timeout_ms = request.timeout.as_millis() as u64;

        let response = tokio::time::timeout_at(
            deadline,
            self.client
                .get(&candidate.url)
                .header(RANGE, request.range_header())
                .send(),
        )
        .await
        .map_err(|_| ProbeError::Timeout { timeout_ms })?
        .map_err(|e| ProbeError::Transport {
            message: UrlUtils::obfuscate_credentials(&e.to_string()),
        })?;

        let headers = response.headers();
        outcome.status = Some(response.status().as_u16());
        outcome.content_length = response.content_length();
        outcome.content_range = header_text(headers, CONTENT_RANGE);
        outcome.accept_ranges = header_text(headers, ACCEPT_RANGES);
        outcome.chunked = header_text(headers, TRANSFER_ENCODING)
            .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"));

        match classify_headers(
            response.status().as_u16(),
            outcome.content_length,
            outcome.chunked,
            request.probe_bytes,
        ) {
            HeaderVerdict::Reachable => {
                outcome.reachable = true;
                return Ok(());
            }
            HeaderVerdict::Unreachable => {
                outcome.error = Some(format!("HTTP {}", response.status().as_u16()));
                return Ok(());
            }
            HeaderVerdict::ReadBody => {}
        }

        let mut body = response.bytes_stream();
        while outcome.bytes_read < request.probe_bytes {
            match tokio::time::timeout_at(deadline, body.next()).await {
                // Deadline hit mid-body: whatever arrived counts
                Err(_) => {
                    if outcome.bytes_read == 0 {
                        return Err(ProbeError::Timeout { timeout_ms });
                    }
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    return Err(ProbeError::Body {
                        message: e.to_string(),
                    });
                }
                Ok(Some(Ok(chunk))) => {
                    let remaining = request.probe_bytes - outcome.bytes_read;
                    outcome.bytes_read += (chunk.len() as u64).min(remaining);
                }
            }
        }

        outcome.reachable = outcome.bytes_read > 0;
        if !outcome.reachable {
            outcome.error = Some("Empty body".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl SourceProber for HttpSourceProber {
    async fn probe(
        &self,
        candidate: &CandidateSource,
        request: ProbeRequest,
        cancel: &CancellationToken,
    ) -> PreflightOutcome {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + request.timeout;
        let mut outcome = PreflightOutcome {
            source_id: candidate.source_id.clone(),
            ..Default::default()
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            result = self.run(candidate, request, deadline, &mut outcome) => result,
        };

        if let Err(err) = result {
            debug!(
                target = "resolver.preflight",
                source_id = %candidate.source_id,
                host = %UrlUtils::extract_domain(&candidate.url).unwrap_or_default(),
                kind = err.label(),
                error = %err,
                "Probe failed"
            );
            outcome.reachable = false;
            outcome.error = Some(err.to_string());
        }
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        outcome
    }
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Result of validating a ranked list
#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    pub enabled: bool,
    /// Reachable candidates in rank order, or the unprobed head when disabled
    pub validated: Vec<CandidateSource>,
    pub outcomes: Vec<PreflightOutcome>,
    pub cancelled: bool,
}

impl PreflightReport {
    pub fn probed(&self) -> usize {
        self.outcomes.len()
    }

    /// Preflight ran and nothing passed
    pub fn nothing_reachable(&self) -> bool {
        self.enabled && self.validated.is_empty()
    }
}

/// Runs probes over the ranked list and reports every outcome
#[derive(Clone)]
pub struct PreflightValidator {
    prober: Arc<dyn SourceProber>,
    observer: Arc<dyn PreflightObserver>,
}

impl PreflightValidator {
    pub fn new(prober: Arc<dyn SourceProber>, observer: Arc<dyn PreflightObserver>) -> Self {
        Self { prober, observer }
    }

    /// Same prober, different observer
    pub fn with_observer(self, observer: Arc<dyn PreflightObserver>) -> Self {
        Self {
            prober: self.prober,
            observer,
        }
    }

    pub fn observer(&self) -> &Arc<dyn PreflightObserver> {
        &self.observer
    }

    pub async fn validate(
        &self,
        video_id: &VideoIdentifier,
        ranked: &[CandidateSource],
        policy: &ResolutionPolicy,
        cancel: &CancellationToken,
    ) -> PreflightReport {
        if !policy.preflight_enabled {
            return PreflightReport {
                enabled: false,
                validated: ranked
                    .iter()
                    .take(UNPROBED_CANDIDATE_COUNT)
                    .cloned()
                    .collect(),
                outcomes: Vec::new(),
                cancelled: false,
            };
        }

        let request = ProbeRequest::from_policy(policy);
        let targets: Vec<&CandidateSource> = ranked
            .iter()
            .filter(|c| !c.url.trim().is_empty())
            .take(policy.effective_preflight_max())
            .collect();

        debug!(
            target = "resolver.preflight",
            video_id = %video_id,
            targets = targets.len(),
            ranked = ranked.len(),
            range = %request.range_header(),
            timeout_ms = request.timeout.as_millis() as u64,
            concurrency = policy.effective_preflight_concurrency(),
            "Starting preflight"
        );

        let mut report = PreflightReport {
            enabled: true,
            ..Default::default()
        };

        let concurrency = policy.effective_preflight_concurrency();
        let outcomes: Vec<(&CandidateSource, PreflightOutcome)> = if concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(targets.len());
            for candidate in targets {
                if cancel.is_cancelled() {
                    break;
                }
                let outcome = self.prober.probe(candidate, request, cancel).await;
                outcomes.push((candidate, outcome));
            }
            outcomes
        } else {
            stream::iter(targets)
                .map(|candidate| async move {
                    let outcome = self.prober.probe(candidate, request, cancel).await;
                    (candidate, outcome)
                })
                .buffered(concurrency)
                .collect()
                .await
        };

        for (candidate, outcome) in outcomes {
            self.observer.on_probe(video_id, candidate, &outcome);
            let label = if outcome.reachable { "reachable" } else { "unreachable" };
            metrics()
                .preflight_probes_total
                .add(1, &[KeyValue::new("outcome", label)]);
            if outcome.reachable {
                report.validated.push(candidate.clone());
            }
            report.outcomes.push(outcome);
        }
        report.cancelled = cancel.is_cancelled();
        report
    }
}
