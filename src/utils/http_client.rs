//! HTTP Client Factory
//!
//! One reqwest [`Client`] is shared by the catalog fetcher and the preflight
//! prober. The client only carries a connection timeout; every request sets
//! its own deadline so catalog fetches and probes can be bounded separately.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::errors::AppResult;

/// Factory for the shared bridge HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    connect_timeout: Duration,
    user_agent: String,
}

impl HttpClientFactory {
    /// Create a factory with the standard `<crate>/<version>` user agent
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            user_agent: default_user_agent(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        let mut factory = Self::new(config.connect_timeout);
        if let Some(user_agent) = config.user_agent.as_deref().filter(|ua| !ua.trim().is_empty()) {
            factory.user_agent = user_agent.to_string();
        }
        factory
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Build a client with only a connection timeout (no total request timeout)
    pub fn create_client(&self) -> AppResult<Client> {
        debug!(
            connect_timeout_ms = self.connect_timeout.as_millis() as u64,
            user_agent = %self.user_agent,
            "Creating bridge HTTP client"
        );
        Ok(Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(&self.user_agent)
            .build()?)
    }
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(
            crate::config::defaults::DEFAULT_CONNECT_TIMEOUT_SECS,
        ))
    }
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
