//! Candidate Builder & Scorer
//!
//! Turns the raw catalog variant list into scored, deduplicated candidates.
//!
//! Scoring bands (higher is preferred):
//!
//! | variant                              | score                                        |
//! |--------------------------------------|----------------------------------------------|
//! | progressive                          | height + 50k (AVC) + 10k (mp4) + known bonus |
//! | known high-tier id                   | +1,000,000 (−100,000 with prefer-baseline)   |
//! | known baseline id                    | +500,000 (+1,000,000 more with prefer-baseline) |
//! | synthesized fallback                 | 900,000 / 800,000                            |
//! | video-only                           | (100k AVC + 10k at 720p + 5k mp4 + height) − 200k |
//!
//! The video-only band is shifted below zero so a silent variant can never
//! outrank any progressive one.

use std::collections::HashSet;
use tracing::{debug, trace};

use crate::config::ResolutionPolicy;
use crate::models::{
    CandidateKind, CandidateSource, DeclaredStream, DeliveryFlags, FormatClass, FormatDescriptor,
    StreamKind, VideoIdentifier, normalize_codec_name,
};
use crate::utils::BridgeEndpoints;

pub const HIGH_TIER_BONUS: i64 = 1_000_000;
pub const BASELINE_BONUS: i64 = 500_000;
pub const AVC_BONUS: i64 = 50_000;
pub const MP4_BONUS: i64 = 10_000;

/// Extra weight for the baseline id when `prefer_baseline_stable` is set
pub const PREFER_BASELINE_ADJUSTMENT: i64 = 1_000_000;
/// Weight removed from the high-tier id when `prefer_baseline_stable` is set
pub const HIGH_TIER_DEMOTION: i64 = -100_000;

pub const VIDEO_ONLY_AVC_BONUS: i64 = 100_000;
pub const VIDEO_ONLY_720P_BONUS: i64 = 10_000;
pub const VIDEO_ONLY_MP4_BONUS: i64 = 5_000;
pub const VIDEO_ONLY_BAND_OFFSET: i64 = -200_000;

pub const FALLBACK_PRIMARY_SCORE: i64 = 900_000;
pub const FALLBACK_SECONDARY_SCORE: i64 = 800_000;

/// Heights above this are treated as catalog noise
pub const MAX_SCORED_HEIGHT: u32 = 65_535;

const DEFAULT_VIDEO_CODEC: &str = "h264";
const DEFAULT_AUDIO_CODEC: &str = "aac";

/// Builds candidates for one video under one policy
pub struct CandidateBuilder<'a> {
    video_id: &'a VideoIdentifier,
    policy: &'a ResolutionPolicy,
    endpoints: &'a BridgeEndpoints,
}

impl<'a> CandidateBuilder<'a> {
    pub fn new(
        video_id: &'a VideoIdentifier,
        policy: &'a ResolutionPolicy,
        endpoints: &'a BridgeEndpoints,
    ) -> Self {
        Self {
            video_id,
            policy,
            endpoints,
        }
    }

    /// Score every usable catalog variant, progressive first, deduplicated by source id.
    pub fn score_formats(&self, formats: &[FormatDescriptor]) -> Vec<CandidateSource> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        let usable: Vec<(&str, &FormatDescriptor, FormatClass)> = formats
            .iter()
            .filter_map(|f| {
                let id = f.trimmed_id()?;
                if self.policy.is_blocked(id) {
                    trace!(target = "resolver.scoring", format_id = id, "Skipping blocked format");
                    return None;
                }
                Some((id, f, f.classify()))
            })
            .collect();

        for (id, format, _) in usable.iter().filter(|(_, _, c)| *c == FormatClass::Progressive) {
            let candidate = self.progressive_candidate(id, format);
            if seen.insert(candidate.source_id.clone()) {
                candidates.push(candidate);
            }
        }

        if !self.policy.progressive_only {
            for (id, format, _) in usable.iter().filter(|(_, _, c)| *c == FormatClass::VideoOnly) {
                let candidate = self.video_only_candidate(id, format);
                if seen.insert(candidate.source_id.clone()) {
                    candidates.push(candidate);
                }
            }
        }

        debug!(
            target = "resolver.scoring",
            video_id = %self.video_id,
            raw = formats.len(),
            scored = candidates.len(),
            progressive_only = self.policy.progressive_only,
            "Scored catalog formats"
        );
        candidates
    }

    /// Add the known-good variants the catalog did not report.
    ///
    /// `suppress` leaves the list untouched; the policy candidate then stands
    /// in for the missing variants.
    pub fn add_fallbacks(
        &self,
        mut candidates: Vec<CandidateSource>,
        suppress: bool,
    ) -> Vec<CandidateSource> {
        if suppress {
            debug!(
                target = "resolver.scoring",
                video_id = %self.video_id,
                "Synthesized fallbacks suppressed in favour of the policy candidate"
            );
            return candidates;
        }

        let (primary, secondary) = if self.policy.prefer_baseline_stable {
            (&self.policy.baseline_format_id, &self.policy.high_tier_format_id)
        } else {
            (&self.policy.high_tier_format_id, &self.policy.baseline_format_id)
        };

        for (format_id, score) in [
            (primary, FALLBACK_PRIMARY_SCORE),
            (secondary, FALLBACK_SECONDARY_SCORE),
        ] {
            if self.policy.is_blocked(format_id) {
                continue;
            }
            let source_id = self.source_id(format_id);
            if candidates.iter().any(|c| c.source_id == source_id) {
                continue;
            }
            debug!(
                target = "resolver.scoring",
                video_id = %self.video_id,
                format_id = %format_id,
                score,
                "Synthesizing missing known-good fallback"
            );
            candidates.push(self.fallback_candidate(format_id, score));
        }

        candidates
    }

    /// Priority score of a progressive variant
    pub fn progressive_score(&self, format_id: &str, format: &FormatDescriptor) -> i64 {
        let mut score = scored_height(format);
        if format.is_avc() {
            score += AVC_BONUS;
        }
        if format.is_mp4() {
            score += MP4_BONUS;
        }
        if format_id == self.policy.high_tier_format_id {
            score += HIGH_TIER_BONUS;
            if self.policy.prefer_baseline_stable {
                score += HIGH_TIER_DEMOTION;
            }
        }
        if format_id == self.policy.baseline_format_id {
            score += BASELINE_BONUS;
            if self.policy.prefer_baseline_stable {
                score += PREFER_BASELINE_ADJUSTMENT;
            }
        }
        score
    }

    /// Priority score of a video-only variant
    pub fn video_only_score(format: &FormatDescriptor) -> i64 {
        let mut score = scored_height(format);
        if format.is_avc() {
            score += VIDEO_ONLY_AVC_BONUS;
        }
        if format.height_pixels == Some(720) {
            score += VIDEO_ONLY_720P_BONUS;
        }
        if format.is_mp4() {
            score += VIDEO_ONLY_MP4_BONUS;
        }
        score + VIDEO_ONLY_BAND_OFFSET
    }

    fn source_id(&self, format_id: &str) -> String {
        format!("{}@{}", self.video_id, format_id)
    }

    fn progressive_candidate(&self, format_id: &str, format: &FormatDescriptor) -> CandidateSource {
        CandidateSource {
            source_id: self.source_id(format_id),
            format_id: Some(format_id.to_string()),
            url: self
                .endpoints
                .play_format_url(self.video_id.as_str(), format_id),
            container: format.container_or_default(),
            name: format!("YouTube {} progressive (itag {format_id})", height_label(format)),
            kind: CandidateKind::Progressive,
            priority_score: self.progressive_score(format_id, format),
            streams_declared: true,
            streams: vec![
                video_stream(format.video_codec.as_deref()),
                audio_stream(format.audio_codec.as_deref()),
            ],
            delivery: DeliveryFlags::default(),
        }
    }

    fn video_only_candidate(&self, format_id: &str, format: &FormatDescriptor) -> CandidateSource {
        CandidateSource {
            source_id: self.source_id(format_id),
            format_id: Some(format_id.to_string()),
            url: self
                .endpoints
                .play_format_url(self.video_id.as_str(), format_id),
            container: format.container_or_default(),
            name: format!("YouTube {} video-only (itag {format_id})", height_label(format)),
            kind: CandidateKind::VideoOnly,
            priority_score: Self::video_only_score(format),
            streams_declared: true,
            streams: vec![video_stream(format.video_codec.as_deref())],
            delivery: DeliveryFlags::default(),
        }
    }

    fn fallback_candidate(&self, format_id: &str, score: i64) -> CandidateSource {
        CandidateSource {
            source_id: self.source_id(format_id),
            format_id: Some(format_id.to_string()),
            url: self
                .endpoints
                .play_format_url(self.video_id.as_str(), format_id),
            container: "mp4".to_string(),
            name: format!("YouTube progressive fallback (itag {format_id})"),
            kind: CandidateKind::SynthesizedFallback,
            priority_score: score,
            streams_declared: true,
            streams: vec![video_stream(None), audio_stream(None)],
            delivery: DeliveryFlags::default(),
        }
    }
}

/// Order candidates by descending score; ties keep their build order.
pub fn rank_candidates(mut candidates: Vec<CandidateSource>) -> Vec<CandidateSource> {
    candidates.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
    candidates
}

fn scored_height(format: &FormatDescriptor) -> i64 {
    i64::from(format.height().min(MAX_SCORED_HEIGHT))
}

fn height_label(format: &FormatDescriptor) -> String {
    match format.height_pixels {
        Some(h) if h > 0 => format!("{h}p"),
        _ => "auto".to_string(),
    }
}

fn video_stream(codec: Option<&str>) -> DeclaredStream {
    DeclaredStream {
        kind: StreamKind::Video,
        codec: codec
            .and_then(normalize_codec_name)
            .unwrap_or_else(|| DEFAULT_VIDEO_CODEC.to_string()),
        index: 0,
    }
}

fn audio_stream(codec: Option<&str>) -> DeclaredStream {
    DeclaredStream {
        kind: StreamKind::Audio,
        codec: codec
            .and_then(normalize_codec_name)
            .unwrap_or_else(|| DEFAULT_AUDIO_CODEC.to_string()),
        index: 1,
    }
}
