//! Media source resolution pipeline
//!
//! ```text
//! catalog ─▶ scoring ─▶ fallbacks ─▶ policy placement ─▶ preflight ─▶ assembler
//! ```
//!
//! [`MediaSourceResolver`] drives the stages; each stage is usable on its own.

pub mod assembler;
pub mod engine;
pub mod observer;
pub mod policy_candidate;
pub mod preflight;
pub mod scoring;

pub use assembler::{Assembly, ResultAssembler};
pub use engine::MediaSourceResolver;
pub use observer::{PreflightObserver, RecordingPreflightObserver, TracingPreflightObserver};
pub use policy_candidate::{POLICY_CANDIDATE_SCORE, PolicyInjector, PolicyPlacement};
pub use preflight::{
    HeaderVerdict, HttpSourceProber, PreflightReport, PreflightValidator, ProbeRequest,
    SourceProber, classify_headers,
};
pub use scoring::{CandidateBuilder, rank_candidates};
