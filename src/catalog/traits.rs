//! Format catalog trait definitions

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::CatalogResult;
use crate::models::{FormatDescriptor, VideoIdentifier};

/// Source of per-video encoding variants.
///
/// Implementations make at most one outbound request per call and must
/// honour both the timeout and the cancellation token.
#[async_trait]
pub trait FormatCatalog: Send + Sync {
    /// Raw variant list for `video_id`, unfiltered
    async fn fetch_formats(
        &self,
        video_id: &VideoIdentifier,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<FormatDescriptor>>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "catalog"
    }
}
