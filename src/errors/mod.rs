//! Centralized error handling for the resolver
//!
//! Resolution itself never fails: catalog and probe failures are captured as
//! values and degrade the candidate list instead of propagating. The error
//! types here describe *why* something degraded and are used for logging,
//! metrics and the fallible edges of the crate (configuration loading and
//! HTTP client construction).
//!
//! # Error Categories
//!
//! - **Catalog Errors**: the upstream format list could not be fetched
//! - **Probe Errors**: a single candidate failed its preflight probe
//! - **Application Errors**: configuration, client construction, I/O
//!
//! # Usage
//!
//! ```rust
//! use ytbridge_resolver::errors::{AppError, AppResult};
//!
//! fn load_base_url() -> AppResult<String> {
//!     Err(AppError::configuration("bridge.base_url must not be empty"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for catalog fetch Results
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Convenience type alias for preflight probe Results
pub type ProbeResult<T> = Result<T, ProbeError>;
