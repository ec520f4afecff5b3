//! Liquidator core logic.
//!
//! This crate provides the risk-tracking and liquidation-decision engine:
//! - Borrower ledger with atomic snapshot persistence
//! - Event ingestion and historical Borrow backfill
//! - Two-tier periodic health factor sync
//! - Candidate selection and position loading
//! - Integer liquidation pricing and optimal pair search
//! - Value-ordered execution with per-item failure isolation
//! - Scanner orchestration of event and block triggers

pub mod config;
mod error;
mod ingestor;
mod ledger;
mod liquidator;
mod pair_finder;
mod position;
mod pricer;
mod reserves;
mod scanner;
mod selector;
mod store;
mod syncer;
pub mod u256_math;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    BatchingConfig, BotConfig, LiquidationConfig, SchedulingConfig, StorageConfig, ThresholdConfig,
    DEFAULT_NATIVE_ASSET,
};
pub use error::{EngineError, StoreError};
pub use ingestor::{BackfillStats, EventIngestor, IngestOutcome};
pub use ledger::{BorrowerLedger, BorrowerRecord, CommitSummary, LedgerUpdate, NO_DEBT_HEALTH_FACTOR};
pub use liquidator::{ExecutionReport, LiquidationOutcome, LiquidationResult, Liquidator};
pub use pair_finder::{find_optimal_pair, find_optimal_pairs, LiquidationCandidate};
pub use position::{BorrowerState, CollateralData, DebtData, PositionSnapshot, PriceSnapshot};
pub use pricer::{base_collateral_amount, LiquidationAmounts, LiquidationPricer};
pub use reserves::{RefreshStats, ReserveConfig, ReserveConfigStore};
pub use scanner::{BlockReport, PassStats, Scanner, StartupReport};
pub use selector::{classify_reserves, identify_liquidatable, CandidateSelector};
pub use store::{BorrowerStore, JsonFileStore};
pub use syncer::{partition_due, DueBorrowers, HealthFactorSyncer, SyncStats};
