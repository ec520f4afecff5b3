//! Liquidation executor: ranks candidates and submits them one by one.

use alloy::primitives::{Address, B256, U256};
use liquidator_chain::{LiquidationCallParams, LiquidationSubmitter};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::pair_finder::LiquidationCandidate;

/// Outcome of one liquidation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationOutcome {
    /// Mined successfully
    Executed { tx_hash: B256 },
    /// Submission errored or the transaction reverted
    Failed { reason: String },
    /// No submitter configured; reported only
    DryRun,
}

/// Result of a liquidation execution.
#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub user: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub debt_covered: U256,
    pub value_native: U256,
    pub outcome: LiquidationOutcome,
}

impl LiquidationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, LiquidationOutcome::Executed { .. })
    }
}

/// Per-pass execution summary, results in execution order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub attempted: usize,
    pub executed: usize,
    pub failed: usize,
    pub results: Vec<LiquidationResult>,
}

/// Liquidation executor.
#[derive(Clone, Default)]
pub struct Liquidator {
    /// Absent in dry-run mode
    submitter: Option<Arc<dyn LiquidationSubmitter>>,
}

impl std::fmt::Debug for Liquidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Liquidator").field("dry_run", &self.is_dry_run()).finish()
    }
}

impl Liquidator {
    pub fn new(submitter: Option<Arc<dyn LiquidationSubmitter>>) -> Self {
        Self { submitter }
    }

    /// Executor that only reports.
    pub fn dry_run() -> Self {
        Self { submitter: None }
    }

    pub fn is_dry_run(&self) -> bool {
        self.submitter.is_none()
    }

    /// Sort by native value, highest first. Stable: ties keep input order.
    pub fn rank(mut candidates: Vec<LiquidationCandidate>) -> Vec<LiquidationCandidate> {
        candidates.sort_by(|a, b| b.value_native.cmp(&a.value_native));
        candidates
    }

    /// Rank and execute. A failed liquidation is recorded and the queue continues.
    #[instrument(skip_all, fields(candidates = candidates.len(), dry_run = self.is_dry_run()))]
    pub async fn execute(&self, candidates: Vec<LiquidationCandidate>) -> ExecutionReport {
        let queue = Self::rank(candidates);
        let mut report = ExecutionReport::default();

        let Some(submitter) = &self.submitter else {
            report.attempted = queue.len();
            for candidate in queue {
                info!(
                    user = %candidate.borrower,
                    collateral = %candidate.collateral_asset,
                    debt = %candidate.debt_asset,
                    debt_to_cover = %candidate.debt_to_cover,
                    collateral_to_liquidate = %candidate.collateral_to_liquidate,
                    value_native = %candidate.value_native,
                    "[dry-run] Would liquidate"
                );
                report.results.push(result_for(&candidate, LiquidationOutcome::DryRun));
            }
            return report;
        };

        for candidate in queue {
            report.attempted += 1;
            let outcome = self.liquidate(submitter.as_ref(), &candidate).await;
            match &outcome {
                LiquidationOutcome::Executed { .. } => report.executed += 1,
                LiquidationOutcome::Failed { .. } => report.failed += 1,
                LiquidationOutcome::DryRun => {}
            }
            report.results.push(result_for(&candidate, outcome));
        }

        info!(
            attempted = report.attempted,
            executed = report.executed,
            failed = report.failed,
            "Liquidation queue processed"
        );
        report
    }

    async fn liquidate(
        &self,
        submitter: &dyn LiquidationSubmitter,
        candidate: &LiquidationCandidate,
    ) -> LiquidationOutcome {
        let start = Instant::now();
        let params = LiquidationCallParams {
            user: candidate.borrower,
            collateral_asset: candidate.collateral_asset,
            debt_asset: candidate.debt_asset,
            debt_to_cover: candidate.debt_to_cover,
        };

        match submitter.submit(&params).await {
            Ok(tx_hash) => {
                info!(
                    user = %candidate.borrower,
                    tx_hash = %tx_hash,
                    value_native = %candidate.value_native,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Liquidation executed"
                );
                LiquidationOutcome::Executed { tx_hash }
            }
            Err(e) => {
                warn!(
                    user = %candidate.borrower,
                    collateral = %candidate.collateral_asset,
                    debt = %candidate.debt_asset,
                    error = %format!("{e:#}"),
                    "Liquidation failed"
                );
                LiquidationOutcome::Failed { reason: format!("{e:#}") }
            }
        }
    }
}

fn result_for(candidate: &LiquidationCandidate, outcome: LiquidationOutcome) -> LiquidationResult {
    LiquidationResult {
        user: candidate.borrower,
        collateral_asset: candidate.collateral_asset,
        debt_asset: candidate.debt_asset,
        debt_covered: candidate.debt_to_cover,
        value_native: candidate.value_native,
        outcome,
    }
}
