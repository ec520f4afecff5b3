//! Liquidator chain interaction layer.
//!
//! This crate provides:
//! - Provider management for HTTP and WebSocket connections
//! - Contract bindings for the Aave V3 pool, data providers, oracle and Multicall3
//! - The [`PoolReader`] / [`LiquidationSubmitter`] seams used by the engine
//! - Event listeners for real-time pool events and new blocks
//! - Transaction signing and the flash-loan liquidation receiver

mod contracts;
mod event_listener;
pub mod protocol;
mod provider;
mod signer;

pub use contracts::{
    aave_v3_signatures, FlashLoanReceiver, MulticallBatch, MULTICALL3_ADDRESS,
};
pub use event_listener::{EventListener, EventStream};
pub use protocol::{
    AaveV3Config, AaveV3Protocol, BorrowLog, LiquidationCallParams, LiquidationSubmitter,
    PoolEvent, PoolEventKind, PoolReader, ProtocolEventSignatures, ReserveConfiguration,
    UserReserve, UserReserveBalance,
};
pub use provider::ProviderManager;
pub use signer::TransactionSender;
