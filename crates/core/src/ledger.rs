//! Borrower ledger: borrower → latest known health factor.
//!
//! All mutations go through [`BorrowerLedger::commit`], which applies the
//! updates to a copy, persists the copy and only then swaps it in. A failed
//! save leaves the in-memory ledger untouched. Commits are serialized by an
//! async mutex; the save runs on the blocking pool and readers keep seeing
//! the previous snapshot until the swap.

use alloy::primitives::{Address, U256};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::BorrowerStore;

/// Sentinel health factor the pool reports for accounts without debt.
pub const NO_DEBT_HEALTH_FACTOR: U256 = U256::MAX;

/// Risk record of one tracked borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowerRecord {
    /// Health factor (18-decimal fixed point), never the no-debt sentinel
    pub health_factor: U256,
    /// Block at which `health_factor` was read
    pub last_checked_block: u64,
}

/// A single ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUpdate {
    /// Insert or overwrite. A sentinel health factor removes the record instead.
    Upsert { borrower: Address, health_factor: U256, block: u64 },
    /// Overwrite an already tracked borrower; ignored if untracked.
    /// A sentinel health factor removes the record.
    Refresh { borrower: Address, health_factor: U256, block: u64 },
    /// Drop the record if present.
    Remove { borrower: Address },
}

/// What a commit changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

impl CommitSummary {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.removed > 0
    }
}

/// The authoritative set of tracked borrowers.
pub struct BorrowerLedger {
    records: RwLock<BTreeMap<Address, BorrowerRecord>>,
    store: Arc<dyn BorrowerStore>,
    commit_lock: Mutex<()>,
}

impl std::fmt::Debug for BorrowerLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BorrowerLedger").field("borrowers", &self.len()).finish()
    }
}

impl BorrowerLedger {
    /// Load the ledger from `store`. Sentinel records left by older files are dropped.
    pub fn load(store: Arc<dyn BorrowerStore>) -> Result<Self, StoreError> {
        let mut records = store.load_borrowers()?;
        let before = records.len();
        records.retain(|_, record| record.health_factor != NO_DEBT_HEALTH_FACTOR);
        if records.len() != before {
            warn!(dropped = before - records.len(), "Dropped persisted borrowers without debt");
        }

        debug!(borrowers = records.len(), "Borrower ledger loaded");
        Ok(Self {
            records: RwLock::new(records),
            store,
            commit_lock: Mutex::new(()),
        })
    }

    pub fn get(&self, borrower: &Address) -> Option<BorrowerRecord> {
        self.records.read().get(borrower).copied()
    }

    pub fn contains(&self, borrower: &Address) -> bool {
        self.records.read().contains_key(borrower)
    }

    /// Snapshot of all records, ordered by address.
    pub fn all(&self) -> Vec<(Address, BorrowerRecord)> {
        self.records.read().iter().map(|(a, r)| (*a, *r)).collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Insert or overwrite one borrower, then persist.
    pub async fn upsert(
        &self,
        borrower: Address,
        health_factor: U256,
        block: u64,
    ) -> Result<CommitSummary, StoreError> {
        self.commit([LedgerUpdate::Upsert { borrower, health_factor, block }]).await
    }

    /// Remove one borrower, then persist. Returns whether it was tracked.
    pub async fn remove(&self, borrower: Address) -> Result<bool, StoreError> {
        Ok(self.commit([LedgerUpdate::Remove { borrower }]).await?.removed > 0)
    }

    /// Apply `updates` atomically: one save for the whole batch, skipped when
    /// nothing changed.
    pub async fn commit<I>(&self, updates: I) -> Result<CommitSummary, StoreError>
    where
        I: IntoIterator<Item = LedgerUpdate>,
    {
        let _guard = self.commit_lock.lock().await;
        let mut next = self.records.read().clone();
        let mut summary = CommitSummary::default();

        for update in updates {
            apply(&mut next, update, &mut summary);
        }

        if !summary.changed() {
            return Ok(summary);
        }

        let store = self.store.clone();
        let next = tokio::task::spawn_blocking(move || store.save_borrowers(&next).map(|()| next)).await??;
        let borrowers = next.len();
        *self.records.write() = next;

        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            removed = summary.removed,
            borrowers = borrowers,
            "Ledger committed"
        );
        Ok(summary)
    }
}

fn apply(records: &mut BTreeMap<Address, BorrowerRecord>, update: LedgerUpdate, summary: &mut CommitSummary) {
    match update {
        LedgerUpdate::Upsert { borrower, health_factor, block } => {
            if health_factor == NO_DEBT_HEALTH_FACTOR {
                if records.remove(&borrower).is_some() {
                    summary.removed += 1;
                }
                return;
            }
            let record = BorrowerRecord { health_factor, last_checked_block: block };
            if records.insert(borrower, record).is_some() {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }
        LedgerUpdate::Refresh { borrower, health_factor, block } => {
            if !records.contains_key(&borrower) {
                return;
            }
            if health_factor == NO_DEBT_HEALTH_FACTOR {
                records.remove(&borrower);
                summary.removed += 1;
            } else {
                records.insert(borrower, BorrowerRecord { health_factor, last_checked_block: block });
                summary.updated += 1;
            }
        }
        LedgerUpdate::Remove { borrower } => {
            if records.remove(&borrower).is_some() {
                summary.removed += 1;
            }
        }
    }
}
