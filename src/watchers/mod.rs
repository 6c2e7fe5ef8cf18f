use async_trait::async_trait;
use eyre::Result;
use sqlx::SqlitePool;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::metrics;
use crate::schedule::{PeriodicJob, RunGuard, TickOutcome};

pub mod evm;
pub mod reader;

pub use evm::EvmLogSource;
pub use reader::{BridgeLogSource, ChainReader, ObservedEvent, ScanReport};

/// Scans every configured chain into the event store, one cycle per tick
pub struct Indexer {
    readers: Vec<ChainReader>,
    running: AtomicBool,
}

impl Indexer {
    /// Create an indexer over `readers`, scanned in order each cycle
    pub fn new(readers: Vec<ChainReader>) -> Self {
        Self {
            readers,
            running: AtomicBool::new(false),
        }
    }

    /// Build readers for the source then the destination chain
    pub fn from_config(config: &Config, db: SqlitePool) -> Result<Self> {
        let mut readers = Vec::with_capacity(2);
        for chain in [&config.source, &config.destination] {
            let source: Arc<dyn BridgeLogSource> = Arc::new(EvmLogSource::new(chain)?);
            readers.push(ChainReader::new(
                chain.name.clone(),
                source,
                db.clone(),
                config.indexer.lookback_blocks,
                config.indexer.batch_size,
            ));
        }

        info!(
            chains = ?readers.iter().map(|r| r.chain()).collect::<Vec<_>>(),
            lookback_blocks = config.indexer.lookback_blocks,
            batch_size = config.indexer.batch_size,
            "Indexer created"
        );

        Ok(Self::new(readers))
    }

    /// Run one indexing cycle.
    ///
    /// Returns [`TickOutcome::Skipped`] without touching any chain when the
    /// previous cycle is still running. A chain whose scan fails is logged
    /// and the next chain is still scanned.
    pub async fn run_once(&self) -> TickOutcome {
        let Some(_guard) = RunGuard::try_acquire(&self.running) else {
            debug!("Previous indexing cycle still running, skipping tick");
            metrics::record_skipped_tick("indexer");
            return TickOutcome::Skipped;
        };

        for reader in &self.readers {
            match reader.scan().await {
                Ok(report) => {
                    if report.inserted > 0 {
                        info!(
                            chain = %reader.chain(),
                            from_block = report.from_block,
                            to_block = report.to_block,
                            inserted = report.inserted,
                            duplicates = report.duplicates,
                            "Indexed new bridge events"
                        );
                    } else {
                        debug!(
                            chain = %reader.chain(),
                            windows = report.windows,
                            to_block = report.to_block,
                            "Chain scan complete"
                        );
                    }
                }
                Err(e) => {
                    error!(chain = %reader.chain(), error = ?e, "Chain scan failed");
                    metrics::record_scan_error(reader.chain(), "scan");
                }
            }
        }

        TickOutcome::Completed
    }
}

#[async_trait]
impl PeriodicJob for Indexer {
    fn name(&self) -> &'static str {
        "indexer"
    }

    async fn tick(&self) -> TickOutcome {
        self.run_once().await
    }
}
