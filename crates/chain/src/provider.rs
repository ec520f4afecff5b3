//! Provider management for HTTP and WebSocket connections.
//! Uses Alloy providers for type-safe RPC interactions.

use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{Context, Result};
use tracing::info;

/// Provider manager for the node connections.
///
/// Holds endpoint URLs only; providers are built per request.
#[derive(Debug, Clone)]
pub struct ProviderManager {
    /// HTTP URL for reads and transaction submission
    http_url: String,
    /// WebSocket URL for subscriptions
    ws_url: String,
}

impl ProviderManager {
    /// Create a provider manager and verify the HTTP endpoint answers.
    pub async fn new(http_url: &str, ws_url: &str) -> Result<Self> {
        info!(http = http_url, ws = ws_url, "Initializing provider manager");

        let manager = Self {
            http_url: http_url.to_string(),
            ws_url: ws_url.to_string(),
        };

        let block = manager
            .block_number()
            .await
            .with_context(|| format!("RPC endpoint {http_url} is not reachable"))?;
        info!(block = block, "Provider connection verified");

        Ok(manager)
    }

    /// Get the HTTP URL.
    pub fn http_url(&self) -> &str {
        &self.http_url
    }

    /// Get the WebSocket URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Build a read-only HTTP provider.
    pub fn http(&self) -> Result<impl Provider + Clone> {
        Ok(ProviderBuilder::new().on_http(self.http_url.parse()?))
    }

    /// Get current block number.
    pub async fn block_number(&self) -> Result<u64> {
        let block = self.http()?.get_block_number().await?;
        Ok(block)
    }

    /// Get chain ID.
    pub async fn chain_id(&self) -> Result<u64> {
        let chain_id = self.http()?.get_chain_id().await?;
        Ok(chain_id)
    }
}
