//! Error type definitions for the resolver
//!
//! This module defines the error hierarchy used throughout the crate. Only
//! [`AppError`] ever crosses a public fallible API; [`CatalogError`] and
//! [`ProbeError`] are folded into diagnostics by the resolution engine.

use serde::Serialize;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Catalog access errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration extraction errors from figment
    #[error("Configuration error: {0}")]
    ConfigExtract(#[from] Box<figment::Error>),

    /// Configuration rendering errors
    #[error("Configuration serialization error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URLs built from configuration
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },
}

/// Why a catalog fetch is considered failed.
///
/// The distinction is diagnostic only: every kind degrades the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailureKind {
    /// The catalog answered with a non-success status
    NonSuccess,
    /// Transport error, timeout, undecodable body or cancellation
    Transport,
}

impl FetchFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonSuccess => "non_success",
            Self::Transport => "transport",
        }
    }
}

/// Format catalog fetch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Catalog answered with a non-success status
    #[error("Catalog returned HTTP {status}")]
    Status { status: u16 },

    /// Connection or protocol failure
    #[error("Catalog transport error: {message}")]
    Transport { message: String },

    /// The fetch exceeded its timeout
    #[error("Catalog request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The body could not be decoded as a format list
    #[error("Catalog response could not be decoded: {message}")]
    Decode { message: String },

    /// The caller cancelled the resolution
    #[error("Catalog request cancelled")]
    Cancelled,
}

impl CatalogError {
    pub fn kind(&self) -> FetchFailureKind {
        match self {
            Self::Status { .. } => FetchFailureKind::NonSuccess,
            _ => FetchFailureKind::Transport,
        }
    }
}

/// Per-candidate preflight probe errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Connection or protocol failure before headers arrived
    #[error("Probe transport error: {message}")]
    Transport { message: String },

    /// Headers or first byte did not arrive in time
    #[error("Probe timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The body stream failed mid-read
    #[error("Probe body read failed: {message}")]
    Body { message: String },

    /// The caller cancelled the resolution
    #[error("Probe cancelled")]
    Cancelled,
}

impl ProbeError {
    /// Short machine-friendly label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Body { .. } => "body",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        Self::ConfigExtract(Box::new(err))
    }
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
