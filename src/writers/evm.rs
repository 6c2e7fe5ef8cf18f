//! EVM distributor - submits `distribute` calls to the destination bridge

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{DistributeRequest, DistributionSubmitter, ReceiptStatus};
use crate::config::{ChainConfig, RelayerConfig};
use crate::contracts::bridge::BridgeContract;

/// Signs and sends `distribute` transactions with the relayer key
pub struct EvmDistributor {
    rpc_url: String,
    bridge_address: Address,
    signer: PrivateKeySigner,
    /// Read-only provider for receipt polling
    provider: RootProvider<Http<Client>>,
    receipt_poll_interval: Duration,
}

impl EvmDistributor {
    /// Create a distributor for the destination chain
    pub fn new(chain: &ChainConfig, relayer: &RelayerConfig) -> Result<Self> {
        let bridge_address = Address::from_str(&chain.bridge_address)
            .wrap_err_with(|| format!("Invalid bridge address for {}", chain.name))?;

        // Parse the private key
        let signer: PrivateKeySigner = relayer
            .private_key
            .parse()
            .wrap_err("Invalid private key")?;

        let provider = ProviderBuilder::new().on_http(
            chain
                .rpc_url
                .parse()
                .wrap_err_with(|| format!("Invalid RPC URL for {}", chain.name))?,
        );

        info!(
            relayer_address = %signer.address(),
            chain = %chain.name,
            bridge_address = %bridge_address,
            "EVM distributor initialized"
        );

        Ok(Self {
            rpc_url: chain.rpc_url.clone(),
            bridge_address,
            signer,
            provider,
            receipt_poll_interval: relayer.receipt_poll_interval(),
        })
    }

    /// Address that signs `distribute` transactions
    pub fn relayer_address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl DistributionSubmitter for EvmDistributor {
    async fn submit_distribute(&self, request: &DistributeRequest) -> Result<B256> {
        // Build provider with signer
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.parse().wrap_err("Invalid RPC URL")?);

        let contract = BridgeContract::new(self.bridge_address, &provider);
        let call = contract.distribute(
            request.token,
            request.recipient,
            request.amount,
            request.deposit_nonce,
        );

        let pending_tx = call
            .send()
            .await
            .map_err(|e| eyre!("Failed to send transaction: {}", e))?;

        let tx_hash = *pending_tx.tx_hash();
        debug!(tx_hash = %tx_hash, "Transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: B256) -> Result<ReceiptStatus> {
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        warn!(tx_hash = %tx_hash, "Transaction reverted");
                        return Ok(ReceiptStatus::Reverted);
                    }
                    debug!(
                        tx_hash = %tx_hash,
                        block_number = ?receipt.block_number,
                        "Transaction confirmed"
                    );
                    return Ok(ReceiptStatus::Success);
                }
                Ok(None) => {}
                // Transient RPC errors are retried until the caller's deadline
                Err(e) => warn!(tx_hash = %tx_hash, error = %e, "Failed to get receipt"),
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}
