//! Periodic health factor rechecks.
//!
//! Borrowers below the at-risk threshold are rechecked every
//! `at_risk_interval` blocks, the others every `regular_interval` blocks.

use alloy::primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use liquidator_chain::PoolReader;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::EngineError;
use crate::ledger::{BorrowerLedger, BorrowerRecord, LedgerUpdate};

/// Borrowers due for a recheck, split by tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueBorrowers {
    pub at_risk: Vec<Address>,
    pub safe: Vec<Address>,
}

impl DueBorrowers {
    pub fn len(&self) -> usize {
        self.at_risk.len() + self.safe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.at_risk.is_empty() && self.safe.is_empty()
    }
}

/// Counters of one sync round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub updated: usize,
    pub removed: usize,
    pub at_risk_checked: usize,
    pub safe_checked: usize,
    pub total_checked: usize,
    /// Items whose read failed; retried next round
    pub failed: usize,
}

/// Split `records` into due at-risk and due safe borrowers.
pub fn partition_due(
    records: &[(Address, BorrowerRecord)],
    current_block: u64,
    at_risk_threshold: U256,
    at_risk_interval: u64,
    regular_interval: u64,
) -> DueBorrowers {
    let mut due = DueBorrowers::default();
    for (borrower, record) in records {
        let elapsed = current_block.saturating_sub(record.last_checked_block);
        if record.health_factor < at_risk_threshold {
            if elapsed > at_risk_interval {
                due.at_risk.push(*borrower);
            }
        } else if elapsed > regular_interval {
            due.safe.push(*borrower);
        }
    }
    due
}

pub struct HealthFactorSyncer {
    ledger: Arc<BorrowerLedger>,
    reader: Arc<dyn PoolReader>,
    at_risk_threshold: U256,
    at_risk_interval: u64,
    regular_interval: u64,
    batch_size: usize,
    concurrency: usize,
}

impl HealthFactorSyncer {
    pub fn new(
        ledger: Arc<BorrowerLedger>,
        reader: Arc<dyn PoolReader>,
        at_risk_threshold: U256,
        at_risk_interval: u64,
        regular_interval: u64,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            reader,
            at_risk_threshold,
            at_risk_interval,
            regular_interval,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn due_borrowers(&self, current_block: u64) -> DueBorrowers {
        partition_due(
            &self.ledger.all(),
            current_block,
            self.at_risk_threshold,
            self.at_risk_interval,
            self.regular_interval,
        )
    }

    /// Recheck every due borrower, at-risk first. One ledger commit per batch.
    #[instrument(skip(self))]
    pub async fn sync(&self, current_block: u64) -> Result<SyncStats, EngineError> {
        let due = self.due_borrowers(current_block);
        let mut stats = SyncStats {
            at_risk_checked: due.at_risk.len(),
            safe_checked: due.safe.len(),
            total_checked: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            return Ok(stats);
        }

        let queue: Vec<Address> = due.at_risk.into_iter().chain(due.safe).collect();
        let reader = &self.reader;
        let mut batches = stream::iter(queue.chunks(self.batch_size))
            .map(|chunk| async move { (chunk, reader.health_factors(chunk).await) })
            .buffered(self.concurrency);

        while let Some((chunk, result)) = batches.next().await {
            let mut updates = Vec::with_capacity(chunk.len());
            for (borrower, health_factor) in chunk.iter().zip(result?) {
                match health_factor {
                    Some(hf) => updates.push(LedgerUpdate::Refresh {
                        borrower: *borrower,
                        health_factor: hf,
                        block: current_block,
                    }),
                    None => {
                        debug!(borrower = %borrower, "Health factor read failed, retrying next round");
                        stats.failed += 1;
                    }
                }
            }

            let summary = self.ledger.commit(updates).await?;
            stats.updated += summary.updated;
            stats.removed += summary.removed;
        }

        info!(
            block = current_block,
            updated = stats.updated,
            removed = stats.removed,
            at_risk = stats.at_risk_checked,
            safe = stats.safe_checked,
            total = stats.total_checked,
            failed = stats.failed,
            "Health factors synced"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NO_DEBT_HEALTH_FACTOR;
    use crate::testing::{FakePool, MemoryStore};
    use crate::u256_math::{bps_to_wad, WAD};

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn record(hf_bps: u16, block: u64) -> BorrowerRecord {
        BorrowerRecord { health_factor: bps_to_wad(hf_bps), last_checked_block: block }
    }

    #[test]
    fn test_partition_by_tier_and_interval() {
        let threshold = bps_to_wad(15000);
        let records = vec![
            (addr(1), record(12000, 0)),    // at-risk, 1000 blocks old
            (addr(2), record(12000, 900)),  // at-risk, too recent
            (addr(3), record(20000, 0)),    // safe, 1000 blocks old
            (addr(4), record(15000, 0)),    // exactly at threshold counts as safe
            (addr(5), record(20000, 5000)), // safe, checked after current block
        ];

        let due = partition_due(&records, 1000, threshold, 100, 999);
        assert_eq!(due.at_risk, vec![addr(1)]);
        assert_eq!(due.safe, vec![addr(3), addr(4)]);

        // Interval is strict: 1000 blocks elapsed is not > 1000
        let due = partition_due(&records, 1000, threshold, 100, 1000);
        assert!(due.safe.is_empty());
    }

    #[tokio::test]
    async fn test_sync_updates_and_removes() {
        let store = Arc::new(MemoryStore::default());
        let ledger = Arc::new(BorrowerLedger::load(store.clone()).unwrap());
        ledger
            .commit((1..=5).map(|b| LedgerUpdate::Upsert {
                borrower: addr(b),
                health_factor: WAD,
                block: 0,
            }))
            .await
            .unwrap();
        ledger.upsert(addr(6), WAD * U256::from(3), 0).await.unwrap();
        let saves_before = store.save_count();

        let pool = Arc::new(FakePool::new());
        pool.set_health_factor(addr(1), WAD / U256::from(2));
        pool.set_health_factor(addr(2), NO_DEBT_HEALTH_FACTOR);
        pool.set_health_factor(addr(3), WAD);
        pool.set_health_factor(addr(4), WAD);
        // addr(5) read fails
        pool.set_health_factor(addr(6), WAD * U256::from(4));

        let syncer = HealthFactorSyncer::new(ledger.clone(), pool.clone(), bps_to_wad(15000), 10, 100, 2, 1);
        let stats = syncer.sync(50).await.unwrap();

        // addr(6) is safe and not due for another 50 blocks
        assert_eq!(stats.at_risk_checked, 5);
        assert_eq!(stats.safe_checked, 0);
        assert_eq!(stats.total_checked, 5);
        assert_eq!(stats.updated, 3);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(pool.health_factor_batches(), vec![2, 2, 1]);
        // The last batch only holds a failed read, so it saves nothing
        assert_eq!(store.save_count() - saves_before, 2);

        assert!(!ledger.contains(&addr(2)));
        assert_eq!(ledger.get(&addr(1)).unwrap().health_factor, WAD / U256::from(2));
        assert_eq!(ledger.get(&addr(3)).unwrap().last_checked_block, 50);
        assert_eq!(ledger.get(&addr(5)).unwrap().last_checked_block, 0);
        assert_eq!(ledger.get(&addr(6)).unwrap().health_factor, WAD * U256::from(3));
    }

    #[tokio::test]
    async fn test_nothing_due_makes_no_reads() {
        let store = Arc::new(MemoryStore::default());
        let ledger = Arc::new(BorrowerLedger::load(store).unwrap());
        ledger.upsert(addr(1), WAD, 100).await.unwrap();

        let pool = Arc::new(FakePool::new());
        let syncer = HealthFactorSyncer::new(ledger, pool.clone(), bps_to_wad(15000), 480, 3600, 50, 4);
        let stats = syncer.sync(120).await.unwrap();

        assert_eq!(stats, SyncStats::default());
        assert!(pool.health_factor_batches().is_empty());
    }
}
