//! Format Catalog Fetcher
//!
//! Wraps a [`FormatCatalog`] so the rest of the resolver never sees an error:
//! every failure becomes an empty format list plus a failure marker.

pub mod bridge;
pub mod traits;

pub use bridge::BridgeFormatCatalog;
pub use traits::FormatCatalog;

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{CatalogError, FetchFailureKind};
use crate::models::{FormatDescriptor, VideoIdentifier};
use crate::observability::{KeyValue, metrics};

/// Outcome of one catalog fetch
#[derive(Debug, Clone, Default)]
pub struct CatalogFetch {
    pub formats: Vec<FormatDescriptor>,
    pub failure: Option<CatalogError>,
}

impl CatalogFetch {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure_kind(&self) -> Option<FetchFailureKind> {
        self.failure.as_ref().map(CatalogError::kind)
    }
}

/// Fetch the format list, folding every failure into [`CatalogFetch::failure`].
pub async fn fetch_catalog(
    catalog: &dyn FormatCatalog,
    video_id: &VideoIdentifier,
    timeout: Duration,
    cancel: &CancellationToken,
) -> CatalogFetch {
    match catalog.fetch_formats(video_id, timeout, cancel).await {
        Ok(formats) => {
            debug!(
                target = "resolver.catalog",
                catalog = catalog.name(),
                video_id = %video_id,
                formats = formats.len(),
                "Format catalog fetched"
            );
            CatalogFetch {
                formats,
                failure: None,
            }
        }
        Err(err) => {
            let kind = err.kind();
            warn!(
                target = "resolver.catalog",
                catalog = catalog.name(),
                video_id = %video_id,
                kind = kind.as_str(),
                error = %err,
                "Format catalog fetch failed"
            );
            metrics()
                .catalog_failures_total
                .add(1, &[KeyValue::new("kind", kind.as_str())]);
            CatalogFetch {
                formats: Vec::new(),
                failure: Some(err),
            }
        }
    }
}
