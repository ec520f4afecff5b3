//! Transaction signer and sender for liquidations.
//!
//! Nonce, gas and chain id are filled by the provider's recommended fillers;
//! this type only owns the wallet and waits for the receipt.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Transaction sender backed by a local private key.
#[derive(Clone)]
pub struct TransactionSender {
    /// RPC URL for sending transactions
    rpc_url: String,
    /// Signer wallet
    wallet: EthereumWallet,
    /// Signer address
    pub address: Address,
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("rpc_url", &self.rpc_url)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl TransactionSender {
    /// Create a sender from a hex private key (with or without 0x prefix).
    pub fn new(private_key: &str, rpc_url: &str) -> Result<Self> {
        let key_str = private_key.trim().trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str.parse().context("invalid private key")?;
        let address = signer.address();

        info!(address = %address, "Transaction sender initialized");

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            wallet: EthereumWallet::from(signer),
            address,
        })
    }

    /// Send a transaction and wait for confirmation.
    /// A reverted receipt is returned as an error.
    pub async fn send_transaction(&self, to: Address, calldata: Bytes) -> Result<B256> {
        let start = Instant::now();
        debug!(to = %to, calldata_len = calldata.len(), "Preparing transaction");

        let tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(calldata);

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.parse()?);

        let pending = provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, "Transaction submitted, waiting for confirmation");

        let receipt = pending.get_receipt().await?;
        let elapsed_ms = start.elapsed().as_millis();

        if receipt.status() {
            info!(
                tx_hash = %tx_hash,
                block = receipt.block_number.unwrap_or(0),
                gas_used = receipt.gas_used,
                total_ms = elapsed_ms,
                "Transaction confirmed"
            );
            Ok(tx_hash)
        } else {
            warn!(tx_hash = %tx_hash, total_ms = elapsed_ms, "Transaction reverted");
            anyhow::bail!("Transaction reverted: {:?}", tx_hash)
        }
    }
}
