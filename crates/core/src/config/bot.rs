//! Bot runtime configuration.
//!
//! Every field has a serde default, so a partial TOML file (or none at all)
//! yields a complete configuration. Health-factor thresholds are expressed in
//! basis points of 1.0 and converted to WAD by the engine.

use alloy::primitives::{address, Address, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::u256_math::bps_to_wad;

/// Arbitrum WETH, the native asset of the default deployment.
pub const DEFAULT_NATIVE_ASSET: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");

/// Main configuration structure containing all bot parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Health-factor thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Recheck cadence
    #[serde(default)]
    pub scheduling: SchedulingConfig,

    /// Batched read sizing
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Liquidation sizing and execution
    #[serde(default)]
    pub liquidation: LiquidationConfig,

    /// Persisted state locations
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Health-factor thresholds in basis points of 1.0 (10000 = 1.0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Below this a borrower is liquidatable
    #[serde(default = "default_liquidation_bps")]
    pub liquidation_bps: u16,

    /// Below this the whole debt may be covered in one liquidation
    #[serde(default = "default_max_liquidation_bps")]
    pub max_liquidation_bps: u16,

    /// Below this a borrower is rechecked on the at-risk cadence
    #[serde(default = "default_at_risk_bps")]
    pub at_risk_bps: u16,
}

fn default_liquidation_bps() -> u16 {
    10_000
}
fn default_max_liquidation_bps() -> u16 {
    9_500
}
fn default_at_risk_bps() -> u16 {
    15_000
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            liquidation_bps: default_liquidation_bps(),
            max_liquidation_bps: default_max_liquidation_bps(),
            at_risk_bps: default_at_risk_bps(),
        }
    }
}

impl ThresholdConfig {
    pub fn liquidation_wad(&self) -> U256 {
        bps_to_wad(self.liquidation_bps)
    }

    pub fn max_liquidation_wad(&self) -> U256 {
        bps_to_wad(self.max_liquidation_bps)
    }

    pub fn at_risk_wad(&self) -> U256 {
        bps_to_wad(self.at_risk_bps)
    }
}

/// Recheck cadence, in blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Blocks between rechecks of at-risk borrowers
    #[serde(default = "default_at_risk_block_interval")]
    pub at_risk_block_interval: u64,

    /// Blocks between rechecks of safe borrowers
    #[serde(default = "default_regular_block_interval")]
    pub regular_block_interval: u64,

    /// Blocks between reserve configuration refreshes (0 = startup only)
    #[serde(default)]
    pub reserve_refresh_block_interval: u64,
}

fn default_at_risk_block_interval() -> u64 {
    480
}
fn default_regular_block_interval() -> u64 {
    3_600
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            at_risk_block_interval: default_at_risk_block_interval(),
            regular_block_interval: default_regular_block_interval(),
            reserve_refresh_block_interval: 0,
        }
    }
}

/// Batched read sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Calls per Multicall3 batch
    #[serde(default = "default_multicall_batch_size")]
    pub multicall_batch_size: usize,

    /// Batches in flight at once
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
}

fn default_multicall_batch_size() -> usize {
    50
}
fn default_max_concurrent_batches() -> usize {
    4
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            multicall_batch_size: default_multicall_batch_size(),
            max_concurrent_batches: default_max_concurrent_batches(),
        }
    }
}

/// Liquidation sizing and execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationConfig {
    /// Share of the debt coverable when full liquidation is not allowed (bps)
    #[serde(default = "default_close_factor_bps")]
    pub close_factor_bps: u16,

    /// Share of the debt coverable below the max-liquidation threshold (bps)
    #[serde(default = "default_max_close_factor_bps")]
    pub max_close_factor_bps: u16,

    /// Wrapped native asset used to rank candidates (hex address)
    #[serde(default = "default_native_asset")]
    pub native_asset: String,

    /// Run a liquidation pass right after the startup backfill
    #[serde(default)]
    pub snapshot_on_backfill: bool,
}

fn default_close_factor_bps() -> u16 {
    5_000
}
fn default_max_close_factor_bps() -> u16 {
    10_000
}
fn default_native_asset() -> String {
    DEFAULT_NATIVE_ASSET.to_string()
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            close_factor_bps: default_close_factor_bps(),
            max_close_factor_bps: default_max_close_factor_bps(),
            native_asset: default_native_asset(),
            snapshot_on_backfill: false,
        }
    }
}

impl LiquidationConfig {
    /// Parsed native asset address.
    pub fn native_asset(&self) -> anyhow::Result<Address> {
        self.native_asset
            .trim()
            .parse()
            .with_context(|| format!("invalid native asset address: {}", self.native_asset))
    }
}

/// Persisted state locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Borrower ledger snapshot
    #[serde(default = "default_borrowers_path")]
    pub borrowers_path: PathBuf,

    /// Last processed block
    #[serde(default = "default_block_path")]
    pub block_path: PathBuf,

    /// First block to backfill when no cursor is stored (default: chain head)
    #[serde(default)]
    pub start_block: Option<u64>,
}

fn default_borrowers_path() -> PathBuf {
    PathBuf::from(".db/borrowers.json")
}
fn default_block_path() -> PathBuf {
    PathBuf::from(".db/block.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            borrowers_path: default_borrowers_path(),
            block_path: default_block_path(),
            start_block: None,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            thresholds: ThresholdConfig::default(),
            scheduling: SchedulingConfig::default(),
            batching: BatchingConfig::default(),
            liquidation: LiquidationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from `BOT_CONFIG` (a TOML path) or defaults, then apply
    /// environment overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("BOT_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("BORROWERS_FILEPATH") {
            self.storage.borrowers_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("BLOCK_FILEPATH") {
            self.storage.block_path = PathBuf::from(path);
        }
        if let Some(block) = lookup("START_BLOCK") {
            let block = block
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid START_BLOCK: {block}"))?;
            self.storage.start_block = Some(block);
        }
        if let Some(asset) = lookup("NATIVE_ASSET_ADDRESS") {
            self.liquidation.native_asset = asset;
        }
        self.liquidation.native_asset()?;
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Bot configuration loaded");
        tracing::info!(
            liquidation_bps = self.thresholds.liquidation_bps,
            max_liquidation_bps = self.thresholds.max_liquidation_bps,
            at_risk_bps = self.thresholds.at_risk_bps,
            "Health factor thresholds"
        );
        tracing::info!(
            at_risk_interval = self.scheduling.at_risk_block_interval,
            regular_interval = self.scheduling.regular_block_interval,
            reserve_refresh_interval = self.scheduling.reserve_refresh_block_interval,
            "Recheck cadence (blocks)"
        );
        tracing::info!(
            batch_size = self.batching.multicall_batch_size,
            concurrency = self.batching.max_concurrent_batches,
            "Batching"
        );
        tracing::info!(
            close_factor_bps = self.liquidation.close_factor_bps,
            max_close_factor_bps = self.liquidation.max_close_factor_bps,
            native_asset = %self.liquidation.native_asset,
            snapshot_on_backfill = self.liquidation.snapshot_on_backfill,
            "Liquidation parameters"
        );
        tracing::info!(
            borrowers = %self.storage.borrowers_path.display(),
            block = %self.storage.block_path.display(),
            start_block = ?self.storage.start_block,
            "Storage"
        );
    }
}
