//! Pool event types and decoding.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use std::fmt;
use tracing::warn;

use crate::contracts::{aave_v3_signatures, IPool};

/// Event signatures for log subscription.
#[derive(Debug, Clone)]
pub struct ProtocolEventSignatures {
    pub supply: B256,
    pub withdraw: B256,
    pub borrow: B256,
    pub repay: B256,
}

impl ProtocolEventSignatures {
    /// Signatures for AAVE V3 and forks.
    pub fn aave_v3() -> Self {
        Self {
            supply: aave_v3_signatures::SUPPLY,
            withdraw: aave_v3_signatures::WITHDRAW,
            borrow: aave_v3_signatures::BORROW,
            repay: aave_v3_signatures::REPAY,
        }
    }

    pub fn all_signatures(&self) -> Vec<B256> {
        vec![self.supply, self.withdraw, self.borrow, self.repay]
    }
}

/// Pool event kinds that move a borrower's health factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolEventKind {
    Borrow,
    Supply,
    Repay,
    Withdraw,
}

impl fmt::Display for PoolEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Borrow => "Borrow",
            Self::Supply => "Supply",
            Self::Repay => "Repay",
            Self::Withdraw => "Withdraw",
        };
        f.write_str(name)
    }
}

/// Decoded pool event reduced to the account it affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEvent {
    pub kind: PoolEventKind,
    /// Account whose position changed
    pub borrower: Address,
    pub block_number: u64,
    pub tx_hash: B256,
}

impl PoolEvent {
    pub fn new(kind: PoolEventKind, borrower: Address, block_number: u64) -> Self {
        Self { kind, borrower, block_number, tx_hash: B256::ZERO }
    }

    /// Decode a pool log.
    ///
    /// Borrow and Supply are attributed to `onBehalfOf`, Repay and Withdraw to `user`.
    /// Returns `None` for unrelated or malformed logs.
    pub fn from_log(log: &Log) -> Option<Self> {
        let topic0 = *log.topic0()?;
        let block_number = log.block_number.unwrap_or(0);
        let tx_hash = log.transaction_hash.unwrap_or_default();

        let (kind, borrower) = if topic0 == aave_v3_signatures::BORROW {
            let decoded = log.log_decode::<IPool::Borrow>().map_err(log_decode_error).ok()?;
            (PoolEventKind::Borrow, decoded.inner.data.onBehalfOf)
        } else if topic0 == aave_v3_signatures::SUPPLY {
            let decoded = log.log_decode::<IPool::Supply>().map_err(log_decode_error).ok()?;
            (PoolEventKind::Supply, decoded.inner.data.onBehalfOf)
        } else if topic0 == aave_v3_signatures::REPAY {
            let decoded = log.log_decode::<IPool::Repay>().map_err(log_decode_error).ok()?;
            (PoolEventKind::Repay, decoded.inner.data.user)
        } else if topic0 == aave_v3_signatures::WITHDRAW {
            let decoded = log.log_decode::<IPool::Withdraw>().map_err(log_decode_error).ok()?;
            (PoolEventKind::Withdraw, decoded.inner.data.user)
        } else {
            return None;
        };

        Some(Self { kind, borrower, block_number, tx_hash })
    }
}

fn log_decode_error(e: alloy::sol_types::Error) {
    warn!(error = %e, "Malformed pool log");
}
