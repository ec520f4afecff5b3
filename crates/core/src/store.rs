//! Persistence of the borrower ledger and the block cursor.
//!
//! Saves replace the whole file: the snapshot is written to a sibling temp
//! file, fsynced and renamed over the target. A missing file loads as empty.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StoreError;
use crate::ledger::BorrowerRecord;

/// Durable storage for the engine's state.
pub trait BorrowerStore: Send + Sync {
    /// Load the ledger snapshot. Empty when nothing was saved yet.
    fn load_borrowers(&self) -> Result<BTreeMap<Address, BorrowerRecord>, StoreError>;

    /// Replace the ledger snapshot.
    fn save_borrowers(&self, borrowers: &BTreeMap<Address, BorrowerRecord>) -> Result<(), StoreError>;

    /// Last processed block, if one was saved.
    fn load_block_cursor(&self) -> Result<Option<u64>, StoreError>;

    fn save_block_cursor(&self, block: u64) -> Result<(), StoreError>;
}

/// One persisted ledger row. Numbers are decimal strings so the file stays
/// readable and independent of U256 serde formats.
#[derive(Debug, Serialize, Deserialize)]
struct BorrowerRow {
    address: String,
    health_factor: String,
    last_checked_block: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct BlockCursor {
    last_processed_block: u64,
}

/// JSON files on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    borrowers_path: PathBuf,
    block_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(borrowers_path: impl Into<PathBuf>, block_path: impl Into<PathBuf>) -> Self {
        Self {
            borrowers_path: borrowers_path.into(),
            block_path: block_path.into(),
        }
    }
}

impl BorrowerStore for JsonFileStore {
    fn load_borrowers(&self) -> Result<BTreeMap<Address, BorrowerRecord>, StoreError> {
        let path = &self.borrowers_path;
        let Some(bytes) = read_if_exists(path)? else {
            return Ok(BTreeMap::new());
        };

        let rows: Vec<BorrowerRow> = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;

        let mut borrowers = BTreeMap::new();
        for row in rows {
            let address: Address = row.address.parse().map_err(|_| StoreError::InvalidRecord {
                path: path.clone(),
                reason: format!("bad address {}", row.address),
            })?;
            let health_factor = U256::from_str_radix(&row.health_factor, 10).map_err(|_| {
                StoreError::InvalidRecord {
                    path: path.clone(),
                    reason: format!("bad health factor {} for {address}", row.health_factor),
                }
            })?;
            borrowers.insert(
                address,
                BorrowerRecord { health_factor, last_checked_block: row.last_checked_block },
            );
        }

        debug!(path = %path.display(), borrowers = borrowers.len(), "Loaded borrower ledger");
        Ok(borrowers)
    }

    fn save_borrowers(&self, borrowers: &BTreeMap<Address, BorrowerRecord>) -> Result<(), StoreError> {
        let rows: Vec<BorrowerRow> = borrowers
            .iter()
            .map(|(address, record)| BorrowerRow {
                address: address.to_string(),
                health_factor: record.health_factor.to_string(),
                last_checked_block: record.last_checked_block,
            })
            .collect();

        let bytes = serde_json::to_vec_pretty(&rows)
            .map_err(|source| StoreError::Json { path: self.borrowers_path.clone(), source })?;
        write_atomic(&self.borrowers_path, &bytes)
    }

    fn load_block_cursor(&self) -> Result<Option<u64>, StoreError> {
        let path = &self.block_path;
        let Some(bytes) = read_if_exists(path)? else {
            return Ok(None);
        };

        let cursor: BlockCursor = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        Ok(Some(cursor.last_processed_block))
    }

    fn save_block_cursor(&self, block: u64) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&BlockCursor { last_processed_block: block })
            .map_err(|source| StoreError::Json { path: self.block_path.clone(), source })?;
        write_atomic(&self.block_path, &bytes)
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io { path: path.to_path_buf(), source }),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp_path).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(io_err)
}
