//! Multicall3 batching with per-call failure tolerance.
//!
//! Every batch goes out as a single `aggregate3` call with `allowFailure`
//! set, so one reverting sub-call only blanks its own slot.

use alloy::primitives::{address, Address, Bytes};
use alloy::providers::Provider;
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::Result;
use tracing::{debug, warn};

/// Canonical Multicall3 deployment (same address on every major EVM chain).
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    #[derive(Debug)]
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    #[derive(Debug)]
    struct Call3Result {
        bool success;
        bytes returnData;
    }

    #[sol(rpc)]
    interface IMulticall3 {
        function aggregate3(Call3[] calldata calls)
            external
            payable
            returns (Call3Result[] memory returnData);
    }
}

/// A batch of typed calls against one or more targets.
pub struct MulticallBatch<C: SolCall> {
    calls: Vec<(Address, C)>,
}

impl<C: SolCall> Default for MulticallBatch<C> {
    fn default() -> Self {
        Self { calls: Vec::new() }
    }
}

impl<C: SolCall> MulticallBatch<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a call.
    pub fn push(&mut self, target: Address, call: C) {
        self.calls.push((target, call));
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Encode the queued calls for `aggregate3`.
    pub fn encode(&self) -> Vec<Call3> {
        self.calls
            .iter()
            .map(|(target, call)| Call3 {
                target: *target,
                allowFailure: true,
                callData: Bytes::from(call.abi_encode()),
            })
            .collect()
    }

    /// Execute the batch. The result has one slot per queued call, in order;
    /// a slot is `None` when that call reverted or returned undecodable data.
    pub async fn execute<P: Provider>(
        &self,
        provider: &P,
        multicall: Address,
    ) -> Result<Vec<Option<C::Return>>> {
        if self.calls.is_empty() {
            return Ok(Vec::new());
        }

        let contract = IMulticall3::new(multicall, provider);
        let results = contract.aggregate3(self.encode()).call().await?.returnData;

        debug!(calls = self.calls.len(), results = results.len(), "Multicall batch executed");
        Ok(decode_results::<C>(&results, self.calls.len()))
    }
}

/// Decode raw `aggregate3` results into typed per-call slots.
///
/// A reverted call is expected and stays quiet. Return data that succeeded
/// but does not decode means the binding no longer matches the deployed
/// contract, so it is logged at warn level once per batch.
pub fn decode_results<C: SolCall>(results: &[Call3Result], expected: usize) -> Vec<Option<C::Return>> {
    let mut undecodable = 0usize;
    let mut last_error = None;
    let mut decoded: Vec<Option<C::Return>> = results
        .iter()
        .map(|result| {
            if !result.success {
                return None;
            }
            match C::abi_decode_returns(&result.returnData, true) {
                Ok(value) => Some(value),
                Err(e) => {
                    undecodable += 1;
                    last_error = Some(e);
                    None
                }
            }
        })
        .collect();

    if let Some(e) = last_error {
        warn!(
            call = C::SIGNATURE,
            undecodable = undecodable,
            error = %e,
            "Multicall return data does not match the contract binding"
        );
    }

    decoded.resize_with(expected, || None);
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::aave_v3::IPool;
    use alloy::primitives::U256;
    use alloy::sol_types::{sol_data, SolType, SolValue};

    fn account_data_return(health_factor: U256) -> Bytes {
        let zero = U256::ZERO;
        Bytes::from((zero, zero, zero, zero, zero, health_factor).abi_encode_params())
    }

    #[test]
    fn test_encode_allows_failure() {
        let mut batch = MulticallBatch::new();
        let pool = Address::repeat_byte(0x11);
        batch.push(pool, IPool::getUserAccountDataCall { user: Address::repeat_byte(0x22) });

        let encoded = batch.encode();
        assert_eq!(encoded.len(), 1);
        assert!(encoded[0].allowFailure);
        assert_eq!(encoded[0].target, pool);
        assert_eq!(&encoded[0].callData[..4], &IPool::getUserAccountDataCall::SELECTOR);
    }

    #[test]
    fn test_decode_results_blanks_failures() {
        let results = vec![
            Call3Result { success: true, returnData: account_data_return(U256::from(42)) },
            Call3Result { success: false, returnData: Bytes::new() },
            Call3Result { success: true, returnData: Bytes::from(vec![0x01, 0x02]) },
        ];

        let decoded = decode_results::<IPool::getUserAccountDataCall>(&results, 4);
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0].as_ref().map(|r| r.healthFactor), Some(U256::from(42)));
        assert!(decoded[1].is_none());
        assert!(decoded[2].is_none());
        assert!(decoded[3].is_none());
    }

    #[test]
    fn test_newer_ui_provider_layout_does_not_decode() {
        use crate::contracts::aave_v3::IUiPoolDataProviderV3;

        // Pool 3.2 dropped the stable-debt fields from UserReserveData
        sol! {
            struct UserReserveDataV32 {
                address underlyingAsset;
                uint256 scaledATokenBalance;
                bool usageAsCollateralEnabledOnUser;
                uint256 scaledVariableDebt;
            }
        }
        let reserves = vec![UserReserveDataV32 {
            underlyingAsset: Address::repeat_byte(0x33),
            scaledATokenBalance: U256::from(1000),
            usageAsCollateralEnabledOnUser: true,
            scaledVariableDebt: U256::from(10),
        }];
        let results = vec![Call3Result {
            success: true,
            returnData: Bytes::from(
                <(sol_data::Array<UserReserveDataV32>, sol_data::Uint<8>) as SolType>::abi_encode_params(
                    &(reserves, 0u8),
                ),
            ),
        }];

        let decoded = decode_results::<IUiPoolDataProviderV3::getUserReservesDataCall>(&results, 1);
        assert!(decoded[0].is_none());
    }
}
