//! Configuration for the liquidation bot.
//!
//! Only runtime parameters live here. Deployment addresses and RPC endpoints
//! are read from the environment by the binary.

mod bot;

pub use bot::{
    BatchingConfig, BotConfig, LiquidationConfig, SchedulingConfig, StorageConfig,
    ThresholdConfig, DEFAULT_NATIVE_ASSET,
};
