pub mod catalog;
pub mod config;
pub mod errors;
pub mod models;
pub mod observability;
pub mod resolution;
pub mod utils;

pub use config::{Config, ResolutionPolicy};
pub use errors::{AppError, AppResult};
pub use models::{CandidateSource, ResolutionResult, VideoIdentifier};
pub use resolution::MediaSourceResolver;
