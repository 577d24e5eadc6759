//! Resolution inputs and outputs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::candidate::CandidateSource;
use crate::errors::FetchFailureKind;

/// Host item id prefix for video rows
const VIDEO_ITEM_PREFIX: &str = "vid:";

/// Opaque key into the upstream catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoIdentifier(String);

impl VideoIdentifier {
    /// Accepts a bare id or a host item id (`vid:<id>`); blank ids yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let id = trimmed.strip_prefix(VIDEO_ITEM_PREFIX).unwrap_or(trimmed).trim();
        (!id.is_empty()).then(|| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of probing a single candidate.
///
/// Only `reachable` drives control flow; the other fields exist for logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreflightOutcome {
    pub source_id: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_ranges: Option<String>,
    pub chunked: bool,
    pub bytes_read: u64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreflightOutcome {
    pub fn unreachable<S: Into<String>>(source_id: S, error: impl fmt::Display) -> Self {
        Self {
            source_id: source_id.into(),
            reachable: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

/// How a resolution arrived at its answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_failure: Option<FetchFailureKind>,
    /// Usable formats reported by the catalog
    pub catalog_formats: usize,
    /// Ranked candidates before preflight, policy candidate included when ranked
    pub candidates: usize,
    pub preflight_enabled: bool,
    pub probed: usize,
    pub reachable: usize,
    /// No probe succeeded and the unvalidated list was returned instead
    pub soft_fallback: bool,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

/// Ordered playable sources; index 0 is the host's first choice
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoIdentifier>,
    pub sources: Vec<CandidateSource>,
    pub report: ResolutionReport,
    pub resolved_at: DateTime<Utc>,
}

impl ResolutionResult {
    /// "No playable source"
    pub fn empty(video_id: Option<VideoIdentifier>) -> Self {
        Self {
            video_id,
            sources: Vec::new(),
            report: ResolutionReport::default(),
            resolved_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn first(&self) -> Option<&CandidateSource> {
        self.sources.first()
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source_id.as_str()).collect()
    }

    pub fn into_sources(self) -> Vec<CandidateSource> {
        self.sources
    }
}
