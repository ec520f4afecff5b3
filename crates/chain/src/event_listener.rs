//! WebSocket event listener for pool events and new blocks.

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::Filter;
use anyhow::Result;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use tracing::{debug, info};

use crate::protocol::{PoolEvent, ProtocolEventSignatures};

/// Boxed stream returned by the subscriptions.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// WebSocket event listener for real-time events.
#[derive(Debug, Clone)]
pub struct EventListener {
    /// WebSocket URL
    ws_url: String,
    /// Pool contract address
    pool_address: Address,
}

impl EventListener {
    pub fn new(ws_url: impl Into<String>, pool_address: Address) -> Self {
        Self { ws_url: ws_url.into(), pool_address }
    }

    /// Subscribe to Borrow/Supply/Repay/Withdraw logs of the pool.
    pub async fn subscribe_pool_events(&self) -> Result<EventStream<PoolEvent>> {
        info!(pool = %self.pool_address, ws_url = %self.ws_url, "Subscribing to pool events");

        let provider = ProviderBuilder::new().on_ws(WsConnect::new(&self.ws_url)).await?;
        info!("WebSocket connected for pool events");

        let filter = Filter::new()
            .address(self.pool_address)
            .event_signature(ProtocolEventSignatures::aave_v3().all_signatures());

        let sub = provider.subscribe_logs(&filter).await?;
        let inner_stream = sub.into_stream();

        // The provider lives in the stream state, otherwise the socket closes.
        let event_stream = futures::stream::unfold(
            (provider, inner_stream),
            |(provider, mut stream)| async move {
                loop {
                    let log = stream.next().await?;
                    if let Some(event) = PoolEvent::from_log(&log) {
                        debug!(kind = %event.kind, borrower = %event.borrower, block = event.block_number, "Pool event");
                        return Some((event, (provider, stream)));
                    }
                }
            },
        );

        Ok(Box::pin(event_stream))
    }

    /// Subscribe to new block headers. Yields block numbers.
    pub async fn subscribe_new_heads(&self) -> Result<EventStream<u64>> {
        info!(ws_url = %self.ws_url, "Subscribing to new block headers");

        let provider = ProviderBuilder::new().on_ws(WsConnect::new(&self.ws_url)).await?;
        info!("WebSocket connected for new block headers");

        let sub = provider.subscribe_blocks().await?;
        let inner_stream = sub.into_stream();

        let block_stream = futures::stream::unfold(
            (provider, inner_stream),
            |(provider, mut stream)| async move {
                let header = stream.next().await?;
                Some((header.number, (provider, stream)))
            },
        );

        Ok(Box::pin(block_stream))
    }
}
