//! Playable candidate sources handed to the host player

use serde::{Deserialize, Serialize};

/// Where a candidate came from and what stream layout it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// Catalog-reported audio+video variant
    Progressive,
    /// Catalog-reported video-only variant; the host must add silent audio
    VideoOnly,
    /// Known-good progressive variant synthesized because the catalog omitted it
    SynthesizedFallback,
    /// Server-side negotiated encoding under a named format policy
    Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

/// Stream metadata advertised to the host player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredStream {
    pub kind: StreamKind,
    pub codec: String,
    pub index: u32,
}

/// Constant delivery capabilities of every bridge source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryFlags {
    pub protocol: &'static str,
    pub supports_direct_play: bool,
    pub supports_direct_stream: bool,
    pub supports_transcoding: bool,
    pub is_infinite_stream: bool,
    pub requires_opening: bool,
}

impl Default for DeliveryFlags {
    fn default() -> Self {
        Self {
            protocol: "http",
            supports_direct_play: true,
            supports_direct_stream: true,
            supports_transcoding: true,
            is_infinite_stream: false,
            requires_opening: false,
        }
    }
}

/// One playable source offered to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSource {
    /// `<video>@<formatId>` or `<video>@policy`; unique within a resolution
    pub source_id: String,
    /// Catalog format id; `None` for the policy candidate
    pub format_id: Option<String>,
    pub url: String,
    pub container: String,
    /// Human readable label shown by the host
    pub name: String,
    pub kind: CandidateKind,
    /// Preflight ordering score, higher is preferred
    pub priority_score: i64,
    /// False when stream layout is unknown ahead of playback
    pub streams_declared: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<DeclaredStream>,
    pub delivery: DeliveryFlags,
}

impl CandidateSource {
    pub fn is_policy(&self) -> bool {
        self.kind == CandidateKind::Policy
    }

    /// Streams the host may rely on; `None` when nothing is declared
    pub fn declared_streams(&self) -> Option<&[DeclaredStream]> {
        self.streams_declared.then_some(self.streams.as_slice())
    }

    pub fn has_format_id(&self, format_id: &str) -> bool {
        self.format_id.as_deref() == Some(format_id)
    }
}
