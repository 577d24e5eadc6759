//! Preflight observation hooks
//!
//! Probe outcomes are reported through a [`PreflightObserver`] so callers can
//! log, collect or assert on them without touching resolver control flow.

use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::models::{CandidateSource, PreflightOutcome, VideoIdentifier};

pub trait PreflightObserver: Send + Sync {
    /// Called once per probed candidate, in rank order
    fn on_probe(
        &self,
        video_id: &VideoIdentifier,
        candidate: &CandidateSource,
        outcome: &PreflightOutcome,
    );

    /// Called when no probe succeeded and the unvalidated list is returned
    fn on_soft_fallback(&self, _video_id: &VideoIdentifier, _returned: usize) {}
}

/// Emits each outcome as a structured tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPreflightObserver;

impl PreflightObserver for TracingPreflightObserver {
    fn on_probe(
        &self,
        video_id: &VideoIdentifier,
        candidate: &CandidateSource,
        outcome: &PreflightOutcome,
    ) {
        if outcome.reachable {
            debug!(
                target = "resolver.preflight",
                video_id = %video_id,
                source_id = %candidate.source_id,
                status = ?outcome.status,
                content_length = ?outcome.content_length,
                content_range = ?outcome.content_range,
                accept_ranges = ?outcome.accept_ranges,
                chunked = outcome.chunked,
                bytes_read = outcome.bytes_read,
                elapsed_ms = outcome.elapsed_ms,
                "Preflight OK"
            );
        } else {
            info!(
                target = "resolver.preflight",
                video_id = %video_id,
                source_id = %candidate.source_id,
                status = ?outcome.status,
                bytes_read = outcome.bytes_read,
                elapsed_ms = outcome.elapsed_ms,
                error = outcome.error.as_deref().unwrap_or(""),
                "Preflight rejected candidate"
            );
        }
    }

    fn on_soft_fallback(&self, video_id: &VideoIdentifier, returned: usize) {
        warn!(
            target = "resolver.preflight",
            video_id = %video_id,
            returned,
            "No candidate passed preflight; returning unvalidated list"
        );
    }
}

/// Keeps every outcome in memory; handy in tests and diagnostics tooling
#[derive(Debug, Default)]
pub struct RecordingPreflightObserver {
    outcomes: Mutex<Vec<PreflightOutcome>>,
    soft_fallbacks: Mutex<Vec<(String, usize)>>,
}

impl RecordingPreflightObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<PreflightOutcome> {
        lock(&self.outcomes).clone()
    }

    pub fn probed_ids(&self) -> Vec<String> {
        lock(&self.outcomes)
            .iter()
            .map(|o| o.source_id.clone())
            .collect()
    }

    pub fn soft_fallbacks(&self) -> Vec<(String, usize)> {
        lock(&self.soft_fallbacks).clone()
    }
}

impl PreflightObserver for RecordingPreflightObserver {
    fn on_probe(
        &self,
        _video_id: &VideoIdentifier,
        _candidate: &CandidateSource,
        outcome: &PreflightOutcome,
    ) {
        lock(&self.outcomes).push(outcome.clone());
    }

    fn on_soft_fallback(&self, video_id: &VideoIdentifier, returned: usize) {
        lock(&self.soft_fallbacks).push((video_id.to_string(), returned));
    }
}

// A panicking observer must not take the resolver down with it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateKind, DeliveryFlags};
    use tracing_test::traced_test;

    fn candidate() -> CandidateSource {
        CandidateSource {
            source_id: "abc@18".into(),
            format_id: Some("18".into()),
            url: "http://bridge/play/abc?itag=18".into(),
            container: "mp4".into(),
            name: "YouTube 360p progressive (itag 18)".into(),
            kind: CandidateKind::Progressive,
            priority_score: 560_360,
            streams_declared: true,
            streams: Vec::new(),
            delivery: DeliveryFlags::default(),
        }
    }

    #[test]
    fn test_recording_observer_keeps_order() {
        let video = VideoIdentifier::parse("abc").unwrap();
        let observer = RecordingPreflightObserver::new();
        let first = PreflightOutcome::unreachable("abc@22", "HTTP 403");
        let second = PreflightOutcome {
            source_id: "abc@18".into(),
            reachable: true,
            status: Some(206),
            ..Default::default()
        };

        observer.on_probe(&video, &candidate(), &first);
        observer.on_probe(&video, &candidate(), &second);
        observer.on_soft_fallback(&video, 3);

        assert_eq!(observer.probed_ids(), vec!["abc@22", "abc@18"]);
        assert!(observer.outcomes()[1].reachable);
        assert_eq!(observer.soft_fallbacks(), vec![("abc".to_string(), 3)]);
    }

    #[traced_test]
    #[test]
    fn test_tracing_observer_logs_rejections() {
        let video = VideoIdentifier::parse("abc").unwrap();
        TracingPreflightObserver.on_probe(
            &video,
            &candidate(),
            &PreflightOutcome::unreachable("abc@18", "HTTP 403"),
        );
        assert!(logs_contain("Preflight rejected candidate"));
        assert!(logs_contain("HTTP 403"));
    }
}
