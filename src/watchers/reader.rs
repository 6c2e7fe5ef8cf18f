//! Chain reader: scans one chain's bridge contract in fixed-size block windows

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{self, NewBridgeEvent};
use crate::metrics;
use crate::types::{EventKind, DISTRIBUTION_SENDER};

/// Blocks behind the chain head scanned when a chain has no checkpoint yet
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 5000;

/// Blocks per `eth_getLogs` window
pub const DEFAULT_BATCH_SIZE: u64 = 500;

/// A bridge event decoded from a chain log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEvent {
    pub tx_hash: String,
    pub token: Address,
    /// `None` for distributions, which carry no sender
    pub sender: Option<Address>,
    pub recipient: Address,
    pub amount: U256,
    pub nonce: U256,
    pub block_number: Option<u64>,
}

impl ObservedEvent {
    /// Map to a store row for `chain`
    pub fn to_new_event(&self, chain: &str, kind: EventKind) -> NewBridgeEvent {
        let sender = match kind {
            EventKind::Deposit => self.sender.map(|a| format!("0x{:x}", a)),
            EventKind::Distribution => Some(DISTRIBUTION_SENDER.to_string()),
        };

        NewBridgeEvent {
            chain: chain.to_string(),
            event_kind: kind,
            tx_hash: self.tx_hash.clone(),
            sender,
            recipient: Some(format!("0x{:x}", self.recipient)),
            token: Some(format!("0x{:x}", self.token)),
            amount: Some(self.amount.to_string()),
            event_nonce: Some(self.nonce.to_string()),
            block_number: self.block_number.and_then(|b| i64::try_from(b).ok()),
        }
    }
}

/// Read access to one chain's bridge contract logs
#[async_trait]
pub trait BridgeLogSource: Send + Sync {
    /// Current head block number
    async fn latest_block(&self) -> Result<u64>;

    /// `Deposit` events in `[from_block, to_block]`
    async fn deposit_events(&self, from_block: u64, to_block: u64) -> Result<Vec<ObservedEvent>>;

    /// `Distribution` events in `[from_block, to_block]`
    async fn distribution_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ObservedEvent>>;
}

/// Block range to scan this cycle, or `None` when already caught up.
///
/// Without a checkpoint the range is the recent window
/// `[max(0, latest - lookback), latest]`; with one, scanning resumes right
/// after it so downtime never drops events.
pub fn scan_range(checkpoint: Option<u64>, latest: u64, lookback: u64) -> Option<(u64, u64)> {
    match checkpoint {
        None => Some((latest.saturating_sub(lookback), latest)),
        Some(last) if last >= latest => None,
        Some(last) => Some((last + 1, latest)),
    }
}

/// Split `[from_block, to_block]` into contiguous windows of at most
/// `batch_size` blocks, with no gaps and no overlaps.
pub fn scan_windows(from_block: u64, to_block: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let batch_size = batch_size.max(1);
    let mut windows = Vec::new();
    let mut start = from_block;

    while start <= to_block {
        let end = start.saturating_add(batch_size - 1).min(to_block);
        windows.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }

    windows
}

/// Summary of one chain scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub from_block: u64,
    pub to_block: u64,
    pub windows: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

/// Reads `Deposit` and `Distribution` events from one chain into the store
pub struct ChainReader {
    chain: String,
    source: Arc<dyn BridgeLogSource>,
    db: SqlitePool,
    lookback_blocks: u64,
    batch_size: u64,
}

impl ChainReader {
    pub fn new(
        chain: impl Into<String>,
        source: Arc<dyn BridgeLogSource>,
        db: SqlitePool,
        lookback_blocks: u64,
        batch_size: u64,
    ) -> Self {
        Self {
            chain: chain.into(),
            source,
            db,
            lookback_blocks,
            batch_size,
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Scan from the checkpoint (or the lookback window) up to the chain head.
    ///
    /// The checkpoint advances after every completed window, so an error
    /// part way through only repeats the failed window on the next cycle.
    pub async fn scan(&self) -> Result<ScanReport> {
        let latest = self
            .source
            .latest_block()
            .await
            .wrap_err_with(|| format!("Failed to get latest block for {}", self.chain))?;
        let checkpoint = db::get_last_scanned_block(&self.db, &self.chain).await?;

        let Some((from_block, to_block)) = scan_range(checkpoint, latest, self.lookback_blocks)
        else {
            debug!(chain = %self.chain, latest, "No new blocks to scan");
            return Ok(ScanReport {
                from_block: latest,
                to_block: latest,
                ..Default::default()
            });
        };

        info!(
            chain = %self.chain,
            from_block,
            to_block,
            resumed = checkpoint.is_some(),
            "Scanning bridge events"
        );

        let mut report = ScanReport {
            from_block,
            to_block,
            ..Default::default()
        };

        for (window_from, window_to) in scan_windows(from_block, to_block, self.batch_size) {
            debug!(chain = %self.chain, window_from, window_to, "Querying window");

            let deposits = self
                .source
                .deposit_events(window_from, window_to)
                .await
                .wrap_err_with(|| {
                    format!(
                        "Failed to get Deposit events on {} from block {} to {}",
                        self.chain, window_from, window_to
                    )
                })?;
            self.store(&deposits, EventKind::Deposit, &mut report).await?;

            let distributions = self
                .source
                .distribution_events(window_from, window_to)
                .await
                .wrap_err_with(|| {
                    format!(
                        "Failed to get Distribution events on {} from block {} to {}",
                        self.chain, window_from, window_to
                    )
                })?;
            self.store(&distributions, EventKind::Distribution, &mut report)
                .await?;

            db::update_last_scanned_block(&self.db, &self.chain, window_to).await?;
            metrics::record_window_scanned(&self.chain, window_to);
            report.windows += 1;
        }

        Ok(report)
    }

    async fn store(
        &self,
        events: &[ObservedEvent],
        kind: EventKind,
        report: &mut ScanReport,
    ) -> Result<()> {
        for event in events {
            let new_event = event.to_new_event(&self.chain, kind);
            if db::insert_event_if_absent(&self.db, &new_event).await? {
                info!(
                    chain = %self.chain,
                    event_kind = %kind,
                    tx_hash = %new_event.tx_hash,
                    amount = %event.amount,
                    "New bridge event stored"
                );
                metrics::record_event_indexed(&self.chain, kind.as_str());
                report.inserted += 1;
            } else {
                report.duplicates += 1;
            }
        }
        Ok(())
    }
}
