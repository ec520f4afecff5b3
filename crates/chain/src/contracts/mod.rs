//! Contract bindings for the lending pool and the liquidation receiver.
//!
//! - [`aave_v3`]: pool, data providers, oracle and receiver interfaces
//! - [`multicall`]: Multicall3 batching used for every batched read

pub mod aave_v3;
pub mod multicall;

pub use aave_v3::{
    aave_v3_signatures, IAaveOracle, IFlashLoanLiquidator, IPool, IPoolAddressesProvider,
    IPoolDataProvider, IUiPoolDataProviderV3,
};
pub use multicall::{MulticallBatch, MULTICALL3_ADDRESS};

use alloy::primitives::{Address, Bytes, B256};
use alloy::sol_types::SolCall;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::protocol::{LiquidationCallParams, LiquidationSubmitter};
use crate::signer::TransactionSender;

/// Flash-loan liquidation receiver.
///
/// The receiver borrows the debt asset, repays the borrower's debt, seizes the
/// collateral and settles the flash loan in one transaction.
#[derive(Debug, Clone)]
pub struct FlashLoanReceiver {
    address: Address,
    sender: Arc<TransactionSender>,
}

impl FlashLoanReceiver {
    pub fn new(address: Address, sender: Arc<TransactionSender>) -> Self {
        Self { address, sender }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Encode `requestFlashLoan` calldata.
    pub fn encode(params: &LiquidationCallParams) -> Bytes {
        IFlashLoanLiquidator::requestFlashLoanCall {
            collateralAsset: params.collateral_asset,
            debtAsset: params.debt_asset,
            user: params.user,
            debtToCover: params.debt_to_cover,
        }
        .abi_encode()
        .into()
    }
}

#[async_trait]
impl LiquidationSubmitter for FlashLoanReceiver {
    #[instrument(skip(self, params), fields(user = %params.user))]
    async fn submit(&self, params: &LiquidationCallParams) -> Result<B256> {
        info!(
            receiver = %self.address,
            collateral = %params.collateral_asset,
            debt = %params.debt_asset,
            debt_to_cover = %params.debt_to_cover,
            "Requesting flash-loan liquidation"
        );
        self.sender.send_transaction(self.address, Self::encode(params)).await
    }
}
