//! Domain models for media source resolution

pub mod candidate;
pub mod format;
pub mod resolution;

pub use candidate::{CandidateKind, CandidateSource, DeclaredStream, DeliveryFlags, StreamKind};
pub use format::{FormatClass, FormatDescriptor, FormatsResponse, normalize_codec_name};
pub use resolution::{PreflightOutcome, ResolutionReport, ResolutionResult, VideoIdentifier};
