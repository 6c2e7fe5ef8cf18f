use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use std::str::FromStr;
use tracing::error;

use super::reader::{BridgeLogSource, ObservedEvent};
use crate::config::ChainConfig;
use crate::contracts::bridge::BridgeContract;
use crate::metrics;

/// Reads bridge contract logs from an EVM chain over HTTP JSON-RPC
pub struct EvmLogSource {
    provider: RootProvider<Http<Client>>,
    bridge_address: Address,
    chain: String,
}

impl EvmLogSource {
    /// Create a new EVM log source
    pub fn new(config: &ChainConfig) -> Result<Self> {
        let url = config
            .rpc_url
            .parse()
            .wrap_err_with(|| format!("Failed to parse RPC URL for {}", config.name))?;
        let provider = ProviderBuilder::new().on_http(url);

        let bridge_address = Address::from_str(&config.bridge_address)
            .wrap_err_with(|| format!("Invalid bridge address for {}", config.name))?;

        Ok(Self {
            provider,
            bridge_address,
            chain: config.name.clone(),
        })
    }

    async fn fetch_logs(&self, signature: B256, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(self.bridge_address)
            .event_signature(signature)
            .from_block(from_block)
            .to_block(to_block);

        self.provider
            .get_logs(&filter)
            .await
            .wrap_err("Failed to get logs")
    }

    fn parse_logs(
        &self,
        logs: Vec<Log>,
        parse: fn(&Log) -> Result<ObservedEvent>,
    ) -> Vec<ObservedEvent> {
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            match parse(&log) {
                Ok(event) => events.push(event),
                Err(e) => {
                    // The window's checkpoint still advances, so this event is not re-read
                    error!(
                        chain = %self.chain,
                        tx_hash = ?log.transaction_hash,
                        block_number = ?log.block_number,
                        log_index = ?log.log_index,
                        error = %e,
                        "Failed to decode bridge log, event dropped"
                    );
                    metrics::record_scan_error(&self.chain, "decode");
                }
            }
        }
        events
    }
}

#[async_trait]
impl BridgeLogSource for EvmLogSource {
    async fn latest_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .wrap_err("Failed to get block number")
    }

    async fn deposit_events(&self, from_block: u64, to_block: u64) -> Result<Vec<ObservedEvent>> {
        let logs = self
            .fetch_logs(BridgeContract::Deposit::SIGNATURE_HASH, from_block, to_block)
            .await?;
        Ok(self.parse_logs(logs, parse_deposit_log))
    }

    async fn distribution_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ObservedEvent>> {
        let logs = self
            .fetch_logs(BridgeContract::Distribution::SIGNATURE_HASH, from_block, to_block)
            .await?;
        Ok(self.parse_logs(logs, parse_distribution_log))
    }
}

/// Parse a `Deposit(token, from, to, amount, nonce)` log
pub fn parse_deposit_log(log: &Log) -> Result<ObservedEvent> {
    let decoded = log
        .log_decode::<BridgeContract::Deposit>()
        .map_err(|e| eyre!("Failed to decode Deposit log: {}", e))?;
    let event = decoded.inner.data;

    Ok(ObservedEvent {
        tx_hash: tx_hash_of(log)?,
        token: event.token,
        sender: Some(event.from),
        recipient: event.to,
        amount: event.amount,
        nonce: event.nonce,
        block_number: log.block_number,
    })
}

/// Parse a `Distribution(token, to, amount, nonce)` log
pub fn parse_distribution_log(log: &Log) -> Result<ObservedEvent> {
    let decoded = log
        .log_decode::<BridgeContract::Distribution>()
        .map_err(|e| eyre!("Failed to decode Distribution log: {}", e))?;
    let event = decoded.inner.data;

    Ok(ObservedEvent {
        tx_hash: tx_hash_of(log)?,
        token: event.token,
        sender: None,
        recipient: event.to,
        amount: event.amount,
        nonce: event.nonce,
        block_number: log.block_number,
    })
}

fn tx_hash_of(log: &Log) -> Result<String> {
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| eyre!("Missing transaction hash"))?;
    Ok(format!("0x{:x}", tx_hash))
}
