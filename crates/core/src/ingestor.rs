//! Event-driven ledger maintenance.
//!
//! Borrow is the only event that brings a new borrower into the ledger.
//! Supply, Repay and Withdraw only refresh borrowers that are already tracked.
//! The chain is always re-read; event payloads are never trusted for the
//! health factor.

use alloy::primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use liquidator_chain::PoolReader;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::EngineError;
use crate::ledger::{BorrowerLedger, LedgerUpdate, NO_DEBT_HEALTH_FACTOR};

/// Effect of one event on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Borrower inserted or refreshed
    Tracked { health_factor: U256 },
    /// Borrower had no debt left and was dropped
    Removed,
    /// Nothing changed
    Ignored,
}

/// Counters from a historical backfill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillStats {
    pub logs: usize,
    pub unique_borrowers: usize,
    pub merged: usize,
    /// No debt, or the health factor read failed
    pub skipped: usize,
}

pub struct EventIngestor {
    ledger: Arc<BorrowerLedger>,
    reader: Arc<dyn PoolReader>,
    batch_size: usize,
    concurrency: usize,
}

impl EventIngestor {
    pub fn new(
        ledger: Arc<BorrowerLedger>,
        reader: Arc<dyn PoolReader>,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            reader,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Track `borrower` with its current health factor.
    #[instrument(skip_all, fields(borrower = %borrower, block = block))]
    pub async fn on_borrow(&self, borrower: Address, block: u64) -> Result<IngestOutcome, EngineError> {
        let health_factor = self.reader.health_factor(borrower).await?;
        let summary = self.ledger.commit([LedgerUpdate::Upsert { borrower, health_factor, block }]).await?;

        if health_factor == NO_DEBT_HEALTH_FACTOR {
            debug!("Borrower has no debt, not tracked");
            return Ok(if summary.removed > 0 { IngestOutcome::Removed } else { IngestOutcome::Ignored });
        }
        debug!(health_factor = %health_factor, new = summary.inserted > 0, "Borrower tracked");
        Ok(IngestOutcome::Tracked { health_factor })
    }

    pub async fn on_supply(&self, borrower: Address, block: u64) -> Result<IngestOutcome, EngineError> {
        self.refresh_tracked(borrower, block).await
    }

    pub async fn on_repay(&self, borrower: Address, block: u64) -> Result<IngestOutcome, EngineError> {
        self.refresh_tracked(borrower, block).await
    }

    pub async fn on_withdraw(&self, borrower: Address, block: u64) -> Result<IngestOutcome, EngineError> {
        self.refresh_tracked(borrower, block).await
    }

    async fn refresh_tracked(&self, borrower: Address, block: u64) -> Result<IngestOutcome, EngineError> {
        if !self.ledger.contains(&borrower) {
            return Ok(IngestOutcome::Ignored);
        }

        let health_factor = self.reader.health_factor(borrower).await?;
        let summary = self.ledger.commit([LedgerUpdate::Refresh { borrower, health_factor, block }]).await?;

        if summary.removed > 0 {
            info!(borrower = %borrower, block = block, "Debt cleared, borrower removed");
            Ok(IngestOutcome::Removed)
        } else if summary.updated > 0 {
            debug!(borrower = %borrower, health_factor = %health_factor, "Borrower refreshed");
            Ok(IngestOutcome::Tracked { health_factor })
        } else {
            // Removed concurrently between the check and the commit
            Ok(IngestOutcome::Ignored)
        }
    }

    /// Merge every Borrow beneficiary of `[from_block, to_block]` into the ledger.
    ///
    /// A borrower seen several times keeps the latest log block as its
    /// last-checked marker. Borrowers without debt are skipped, never removed.
    #[instrument(skip(self))]
    pub async fn backfill(&self, from_block: u64, to_block: u64) -> Result<BackfillStats, EngineError> {
        let logs = self.reader.borrow_logs(from_block, to_block).await?;

        let mut latest: BTreeMap<Address, u64> = BTreeMap::new();
        for log in &logs {
            let block = latest.entry(log.on_behalf_of).or_insert(log.block_number);
            *block = (*block).max(log.block_number);
        }
        let borrowers: Vec<(Address, u64)> = latest.into_iter().collect();

        let mut stats = BackfillStats {
            logs: logs.len(),
            unique_borrowers: borrowers.len(),
            ..Default::default()
        };

        let reader = &self.reader;
        let mut batches = stream::iter(borrowers.chunks(self.batch_size))
            .map(|chunk| async move {
                let users: Vec<Address> = chunk.iter().map(|(user, _)| *user).collect();
                (chunk, reader.health_factors(&users).await)
            })
            .buffered(self.concurrency);

        while let Some((chunk, result)) = batches.next().await {
            let mut updates = Vec::with_capacity(chunk.len());
            for ((borrower, block), health_factor) in chunk.iter().zip(result?) {
                match health_factor {
                    Some(hf) if hf != NO_DEBT_HEALTH_FACTOR => {
                        updates.push(LedgerUpdate::Upsert { borrower: *borrower, health_factor: hf, block: *block });
                        stats.merged += 1;
                    }
                    _ => stats.skipped += 1,
                }
            }
            self.ledger.commit(updates).await?;
        }

        info!(
            from_block = from_block,
            to_block = to_block,
            logs = stats.logs,
            unique = stats.unique_borrowers,
            merged = stats.merged,
            skipped = stats.skipped,
            tracked = self.ledger.len(),
            "Backfill complete"
        );
        Ok(stats)
    }
}
