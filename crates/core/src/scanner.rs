//! Scanner: the engine object.
//!
//! Owns the borrower ledger and the reserve config cache and dispatches the
//! two triggers: decoded pool events and new block ticks. Each trigger is
//! handled to completion before the next one starts.

use alloy::primitives::Address;
use futures::{FutureExt, StreamExt};
use liquidator_chain::{EventStream, LiquidationSubmitter, PoolEvent, PoolEventKind, PoolReader};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BotConfig;
use crate::error::{EngineError, StoreError};
use crate::ingestor::{BackfillStats, EventIngestor, IngestOutcome};
use crate::ledger::BorrowerLedger;
use crate::liquidator::Liquidator;
use crate::pair_finder::find_optimal_pairs;
use crate::position::PriceSnapshot;
use crate::pricer::LiquidationPricer;
use crate::reserves::{RefreshStats, ReserveConfigStore};
use crate::selector::CandidateSelector;
use crate::store::BorrowerStore;
use crate::syncer::{HealthFactorSyncer, SyncStats};

/// Cap on pool events handled ahead of a block tick.
const MAX_QUEUED_EVENTS_PER_BLOCK: usize = 256;

/// Counters of one liquidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub liquidatable_borrowers: usize,
    pub positions_processed: usize,
    pub optimal_pairs_found: usize,
    pub liquidations_attempted: usize,
    pub liquidations_executed: usize,
}

/// Result of one block tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReport {
    pub block: u64,
    pub sync: SyncStats,
    pub pass: PassStats,
}

/// Result of the startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    pub head: u64,
    pub from_block: u64,
    pub reserves: RefreshStats,
    pub backfill: BackfillStats,
    /// Present when `snapshot_on_backfill` is set
    pub pass: Option<PassStats>,
}

pub struct Scanner {
    config: BotConfig,
    reader: Arc<dyn PoolReader>,
    store: Arc<dyn BorrowerStore>,
    ledger: Arc<BorrowerLedger>,
    reserves: Arc<ReserveConfigStore>,
    ingestor: EventIngestor,
    syncer: HealthFactorSyncer,
    selector: CandidateSelector,
    liquidator: Liquidator,
    native_asset: Address,
    /// Block of the last reserve refresh
    reserves_block: AtomicU64,
    /// Last block tick handled by `run`
    last_block: AtomicU64,
}

impl Scanner {
    /// Build the engine and load the persisted ledger.
    /// Without a submitter, liquidations are only reported.
    pub fn new(
        config: BotConfig,
        reader: Arc<dyn PoolReader>,
        store: Arc<dyn BorrowerStore>,
        submitter: Option<Arc<dyn LiquidationSubmitter>>,
    ) -> Result<Self, EngineError> {
        let native_asset = config
            .liquidation
            .native_asset()
            .map_err(|e| EngineError::Config(format!("{e:#}")))?;

        let ledger = Arc::new(BorrowerLedger::load(store.clone())?);
        let reserves = Arc::new(ReserveConfigStore::new());
        let batch_size = config.batching.multicall_batch_size;
        let concurrency = config.batching.max_concurrent_batches;

        let ingestor = EventIngestor::new(ledger.clone(), reader.clone(), batch_size, concurrency);
        let syncer = HealthFactorSyncer::new(
            ledger.clone(),
            reader.clone(),
            config.thresholds.at_risk_wad(),
            config.scheduling.at_risk_block_interval,
            config.scheduling.regular_block_interval,
            batch_size,
            concurrency,
        );
        let selector = CandidateSelector::new(
            ledger.clone(),
            reader.clone(),
            reserves.clone(),
            config.thresholds.liquidation_wad(),
            config.thresholds.max_liquidation_wad(),
            batch_size,
            concurrency,
        );

        info!(
            borrowers = ledger.len(),
            native_asset = %native_asset,
            dry_run = submitter.is_none(),
            "Scanner initialized"
        );

        Ok(Self {
            config,
            reader,
            store,
            ledger,
            reserves,
            ingestor,
            syncer,
            selector,
            liquidator: Liquidator::new(submitter),
            native_asset,
            reserves_block: AtomicU64::new(0),
            last_block: AtomicU64::new(0),
        })
    }

    pub fn ledger(&self) -> &BorrowerLedger {
        &self.ledger
    }

    pub fn reserves(&self) -> &ReserveConfigStore {
        &self.reserves
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Load reserves, backfill Borrow logs since the saved cursor and move
    /// the cursor to the current head.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<StartupReport, EngineError> {
        let start = Instant::now();
        let head = self.reader.block_number().await?;
        let reserves = self.refresh_reserves(head).await?;

        let from_block = match self.store.load_block_cursor()? {
            Some(cursor) => cursor,
            None => self.config.storage.start_block.unwrap_or(head),
        };

        let backfill = if from_block <= head {
            self.ingestor.backfill(from_block, head).await?
        } else {
            warn!(from_block = from_block, head = head, "Block cursor ahead of chain head, skipping backfill");
            BackfillStats::default()
        };
        self.save_cursor(head).await?;
        self.last_block.store(head, Ordering::SeqCst);

        let pass = if self.config.liquidation.snapshot_on_backfill {
            Some(self.liquidation_pass().await?)
        } else {
            None
        };

        info!(
            head = head,
            from_block = from_block,
            borrowers = self.ledger.len(),
            reserves = self.reserves.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Bootstrap complete"
        );
        Ok(StartupReport { head, from_block, reserves, backfill, pass })
    }

    /// Dispatch one decoded pool event.
    #[instrument(skip_all, fields(kind = %event.kind, borrower = %event.borrower, block = event.block_number))]
    pub async fn on_event(&self, event: &PoolEvent) -> Result<IngestOutcome, EngineError> {
        let (borrower, block) = (event.borrower, event.block_number);
        match event.kind {
            PoolEventKind::Borrow => self.ingestor.on_borrow(borrower, block).await,
            PoolEventKind::Supply => self.ingestor.on_supply(borrower, block).await,
            PoolEventKind::Repay => self.ingestor.on_repay(borrower, block).await,
            PoolEventKind::Withdraw => self.ingestor.on_withdraw(borrower, block).await,
        }
    }

    /// Per-block pipeline: optional reserve refresh, health factor sync,
    /// liquidation pass, cursor save.
    #[instrument(skip(self))]
    pub async fn on_block(&self, block: u64) -> Result<BlockReport, EngineError> {
        let interval = self.config.scheduling.reserve_refresh_block_interval;
        if interval > 0 && block.saturating_sub(self.reserves_block.load(Ordering::SeqCst)) >= interval {
            if let Err(e) = self.refresh_reserves(block).await {
                warn!(error = %e, "Reserve refresh failed, keeping cached configs");
            }
        }

        let sync = self.syncer.sync(block).await?;
        let pass = self.liquidation_pass().await?;
        self.save_cursor(block).await?;

        debug!(
            block = block,
            synced = sync.total_checked,
            liquidatable = pass.liquidatable_borrowers,
            executed = pass.liquidations_executed,
            "Block processed"
        );
        Ok(BlockReport { block, sync, pass })
    }

    /// identify → snapshots → prices → states → optimal pairs → execute.
    #[instrument(skip(self))]
    pub async fn liquidation_pass(&self) -> Result<PassStats, EngineError> {
        let borrowers = self.selector.identify();
        let mut stats = PassStats { liquidatable_borrowers: borrowers.len(), ..Default::default() };
        if borrowers.is_empty() {
            return Ok(stats);
        }

        let snapshots = self.selector.snapshots(&borrowers).await?;

        let mut assets = self.reserves.assets();
        if !assets.contains(&self.native_asset) {
            assets.push(self.native_asset);
        }
        let prices = PriceSnapshot::new(&assets, &self.reader.asset_prices(&assets).await?);
        let Some(native_price) = prices.get(&self.native_asset) else {
            warn!(native_asset = %self.native_asset, "No native asset price, skipping liquidation pass");
            return Ok(stats);
        };

        let states = self.selector.borrower_states(&snapshots, &prices).await?;
        stats.positions_processed = states.len();

        let pricer = LiquidationPricer::new(
            self.native_asset,
            native_price,
            self.config.liquidation.close_factor_bps,
            self.config.liquidation.max_close_factor_bps,
        );
        let candidates = find_optimal_pairs(&states, &pricer);
        stats.optimal_pairs_found = candidates.len();

        let report = self.liquidator.execute(candidates).await;
        stats.liquidations_attempted = report.attempted;
        stats.liquidations_executed = report.executed;

        info!(
            liquidatable = stats.liquidatable_borrowers,
            positions = stats.positions_processed,
            pairs = stats.optimal_pairs_found,
            attempted = stats.liquidations_attempted,
            executed = stats.liquidations_executed,
            "Liquidation pass complete"
        );
        Ok(stats)
    }

    async fn save_cursor(&self, block: u64) -> Result<(), StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save_block_cursor(block)).await?
    }

    async fn refresh_reserves(&self, block: u64) -> Result<RefreshStats, EngineError> {
        let stats = self
            .reserves
            .refresh(
                self.reader.as_ref(),
                self.config.batching.multicall_batch_size,
                self.config.batching.max_concurrent_batches,
                block,
            )
            .await?;
        self.reserves_block.store(block, Ordering::SeqCst);
        Ok(stats)
    }

    /// Drive the engine from the two trigger streams until either ends.
    /// A failed trigger is logged and the loop keeps going.
    ///
    /// Block ticks are polled first so a burst of pool events cannot delay
    /// them. Events already queued when a tick arrives are handled before
    /// the tick, up to `MAX_QUEUED_EVENTS_PER_BLOCK`.
    pub async fn run(&self, mut events: EventStream<PoolEvent>, mut blocks: EventStream<u64>) {
        info!("Scanner event loop started");

        loop {
            tokio::select! {
                biased;

                block = blocks.next() => {
                    let Some(block) = block else {
                        warn!("Block stream ended");
                        return;
                    };
                    if block <= self.last_block.load(Ordering::SeqCst) {
                        debug!(block = block, "Block already processed");
                    } else {
                        if !self.drain_queued_events(&mut events).await {
                            warn!("Pool event stream ended");
                            return;
                        }
                        match self.on_block(block).await {
                            Ok(_) => self.last_block.store(block, Ordering::SeqCst),
                            Err(e) => error!(block = block, error = %e, "Failed to process block"),
                        }
                    }
                }

                event = events.next() => {
                    let Some(event) = event else {
                        warn!("Pool event stream ended");
                        return;
                    };
                    self.handle_event(&event).await;
                }
            }
        }
    }

    /// Returns `false` once the event stream has ended.
    async fn drain_queued_events(&self, events: &mut EventStream<PoolEvent>) -> bool {
        for _ in 0..MAX_QUEUED_EVENTS_PER_BLOCK {
            match events.next().now_or_never() {
                Some(Some(event)) => self.handle_event(&event).await,
                Some(None) => return false,
                None => break,
            }
        }
        true
    }

    async fn handle_event(&self, event: &PoolEvent) {
        if let Err(e) = self.on_event(event).await {
            error!(
                kind = %event.kind,
                borrower = %event.borrower,
                error = %e,
                "Failed to process pool event"
            );
        }
    }
}
