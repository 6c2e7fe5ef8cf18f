use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::watchers::reader::{DEFAULT_BATCH_SIZE, DEFAULT_LOOKBACK_BLOCKS};

/// Main configuration for the relay
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Chain users deposit on
    pub source: ChainConfig,
    /// Chain `distribute` is called on
    pub destination: ChainConfig,
    pub indexer: IndexerConfig,
    pub relayer: RelayerConfig,
    /// Bind address for the status API; disabled when unset
    #[serde(default)]
    pub api_addr: Option<SocketAddr>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// One chain's RPC endpoint and bridge contract
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Label stored in the `chain` column and used in logs
    pub name: String,
    pub rpc_url: String,
    pub bridge_address: String,
}

/// Indexer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_indexer_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_lookback_blocks")]
    pub lookback_blocks: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

/// Relay worker configuration
#[derive(Clone, Deserialize)]
pub struct RelayerConfig {
    /// Signs `distribute` transactions on the destination chain
    pub private_key: String,
    #[serde(default = "default_relay_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_interval")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for RelayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerConfig")
            .field("private_key", &"<redacted>")
            .field("interval_ms", &self.interval_ms)
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .field("receipt_poll_interval_ms", &self.receipt_poll_interval_ms)
            .field("claim_lease_secs", &self.claim_lease_secs)
            .finish()
    }
}

impl IndexerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl RelayerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }
}

/// Default functions
fn default_database_url() -> String {
    "sqlite://indexer/events.db".to_string()
}

fn default_source_name() -> String {
    "Holesky".to_string()
}

fn default_destination_name() -> String {
    "Sepolia".to_string()
}

fn default_indexer_interval() -> u64 {
    15_000
}

fn default_relay_interval() -> u64 {
    20_000
}

fn default_lookback_blocks() -> u64 {
    DEFAULT_LOOKBACK_BLOCKS
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

fn default_confirmation_timeout() -> u64 {
    120
}

fn default_receipt_poll_interval() -> u64 {
    2_000
}

fn default_claim_lease() -> u64 {
    600
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| eyre!("{} environment variable is required", name))
}

/// Read an optional numeric variable. Set but unparseable is an error.
fn optional<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .wrap_err_with(|| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    fn load_from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url()),
        };

        let source = ChainConfig {
            name: env::var("SOURCE_CHAIN_NAME").unwrap_or_else(|_| default_source_name()),
            rpc_url: required("SOURCE_RPC_URL")?,
            bridge_address: required("SOURCE_BRIDGE_ADDRESS")?,
        };

        let destination = ChainConfig {
            name: env::var("DESTINATION_CHAIN_NAME")
                .unwrap_or_else(|_| default_destination_name()),
            rpc_url: required("DESTINATION_RPC_URL")?,
            bridge_address: required("DESTINATION_BRIDGE_ADDRESS")?,
        };

        let indexer = IndexerConfig {
            interval_ms: optional("INDEXER_INTERVAL_MS", default_indexer_interval())?,
            lookback_blocks: optional("LOOKBACK_BLOCKS", default_lookback_blocks())?,
            batch_size: optional("SCAN_BATCH_SIZE", default_batch_size())?,
        };

        let relayer = RelayerConfig {
            private_key: required("PRIVATE_KEY")?,
            interval_ms: optional("RELAY_INTERVAL_MS", default_relay_interval())?,
            confirmation_timeout_secs: optional(
                "CONFIRMATION_TIMEOUT_SECS",
                default_confirmation_timeout(),
            )?,
            receipt_poll_interval_ms: optional(
                "RECEIPT_POLL_INTERVAL_MS",
                default_receipt_poll_interval(),
            )?,
            claim_lease_secs: optional("CLAIM_LEASE_SECS", default_claim_lease())?,
        };

        let api_addr = match env::var("API_ADDR") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse()
                    .wrap_err_with(|| format!("API_ADDR is not a valid socket address: {}", raw))?,
            ),
            _ => None,
        };

        let config = Config {
            database,
            source,
            destination,
            indexer,
            relayer,
            api_addr,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(eyre!("database.url cannot be empty"));
        }

        for (role, chain) in [("source", &self.source), ("destination", &self.destination)] {
            if chain.name.trim().is_empty() {
                return Err(eyre!("{}.name cannot be empty", role));
            }
            if chain.rpc_url.is_empty() {
                return Err(eyre!("{}.rpc_url cannot be empty", role));
            }
            if !is_hex_address(&chain.bridge_address) {
                return Err(eyre!(
                    "{}.bridge_address must be a valid hex address (42 chars with 0x prefix)",
                    role
                ));
            }
        }

        // Checkpoints are keyed by chain name
        if self.source.name == self.destination.name {
            return Err(eyre!(
                "source and destination chain names must differ (both are {})",
                self.source.name
            ));
        }

        let key = self
            .relayer
            .private_key
            .strip_prefix("0x")
            .unwrap_or(&self.relayer.private_key);
        if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(eyre!("relayer.private_key must be 64 hex chars (0x prefix optional)"));
        }

        if self.indexer.interval_ms == 0 || self.relayer.interval_ms == 0 {
            return Err(eyre!("indexer and relayer intervals must be greater than zero"));
        }
        if self.indexer.batch_size == 0 {
            return Err(eyre!("indexer.batch_size must be greater than zero"));
        }
        if self.relayer.confirmation_timeout_secs == 0 {
            return Err(eyre!("relayer.confirmation_timeout_secs must be greater than zero"));
        }
        if self.relayer.receipt_poll_interval_ms == 0 {
            return Err(eyre!("relayer.receipt_poll_interval_ms must be greater than zero"));
        }
        // A lease shorter than the confirmation wait would let a second
        // attempt claim a row whose transaction is still pending
        if self.relayer.claim_lease_secs <= self.relayer.confirmation_timeout_secs {
            return Err(eyre!(
                "relayer.claim_lease_secs must exceed relayer.confirmation_timeout_secs"
            ));
        }

        Ok(())
    }
}

fn is_hex_address(s: &str) -> bool {
    s.len() == 42
        && s.starts_with("0x")
        && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}
