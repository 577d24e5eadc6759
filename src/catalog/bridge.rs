//! Bridge-backed format catalog (`GET /formats/{videoId}`)

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::traits::FormatCatalog;
use crate::errors::{CatalogError, CatalogResult};
use crate::models::{FormatDescriptor, FormatsResponse, VideoIdentifier};
use crate::utils::{BridgeEndpoints, UrlUtils};

/// Format catalog served by the bridge over HTTP
#[derive(Debug, Clone)]
pub struct BridgeFormatCatalog {
    client: Client,
    endpoints: BridgeEndpoints,
}

impl BridgeFormatCatalog {
    pub fn new(client: Client, endpoints: BridgeEndpoints) -> Self {
        Self { client, endpoints }
    }

    async fn request(&self, url: &str) -> CatalogResult<Vec<FormatDescriptor>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::Transport {
                message: UrlUtils::obfuscate_credentials(&e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| CatalogError::Transport {
            message: format!("Failed to read response: {e}"),
        })?;

        let parsed: FormatsResponse =
            serde_json::from_slice(&body).map_err(|e| CatalogError::Decode {
                message: e.to_string(),
            })?;

        Ok(parsed.formats)
    }
}

#[async_trait]
impl FormatCatalog for BridgeFormatCatalog {
    async fn fetch_formats(
        &self,
        video_id: &VideoIdentifier,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<FormatDescriptor>> {
        let url = self.endpoints.formats_url(video_id.as_str());
        debug!(
            target = "resolver.catalog",
            url = %UrlUtils::obfuscate_credentials(&url),
            timeout_ms = timeout.as_millis() as u64,
            "Fetching format catalog"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CatalogError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.request(&url)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(CatalogError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }),
            },
        }
    }

    fn name(&self) -> &str {
        "bridge"
    }
}
