//! Local-key EVM wallet
//!
//! A private-key account on one RPC endpoint, exposed through the same wallet
//! ports a browser wallet would fill: session info, chain change notifications
//! and approval signing.
//!
//! The endpoint's chain can change under us (a local node restarted on another
//! id, a load balancer flipping networks). [`EvmWallet::watch_network`] polls
//! for that and emits [`WalletEvent::ChainChanged`].

use alloy::{
    network::EthereumWallet,
    primitives::{Address, TxHash, U256},
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chains;
use crate::evm::client::{http_provider, HttpProvider};
use crate::evm::contracts::ERC20;
use crate::ports::{NetworkInfo, TransactionSigner, WalletChain, WalletEvent, WalletSession};
use crate::redact::SecretString;

/// Configuration for the local wallet
#[derive(Debug, Clone)]
pub struct EvmWalletConfig {
    /// RPC URL of the wallet's network
    pub rpc_url: String,
    /// Private key (hex string, with or without 0x prefix)
    pub private_key: SecretString,
    /// Give up waiting for a receipt after this long
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub network_poll_interval: Duration,
}

impl EvmWalletConfig {
    pub fn new(rpc_url: &str, private_key: SecretString) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            private_key,
            confirmation_timeout: Duration::from_secs(300),
            receipt_poll_interval: Duration::from_millis(500),
            network_poll_interval: Duration::from_secs(4),
        }
    }
}

pub struct EvmWallet {
    signer: PrivateKeySigner,
    address: Address,
    config: EvmWalletConfig,
    provider: HttpProvider,
    /// Last chain id seen on the endpoint, 0 before the first read
    chain_id: AtomicU64,
    events: broadcast::Sender<WalletEvent>,
}

impl EvmWallet {
    /// Parse the key and read the endpoint's chain id
    pub async fn connect(config: EvmWalletConfig) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .expose()
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;
        let address = signer.address();
        let provider = http_provider(&config.rpc_url)?;

        let chain_id = provider
            .get_chain_id()
            .await
            .wrap_err("Failed to get chain id from wallet RPC")?;

        info!(address = %address, chain_id = chain_id, "EVM wallet connected");

        let (events, _) = broadcast::channel(16);
        Ok(Self {
            signer,
            address,
            config,
            provider,
            chain_id: AtomicU64::new(chain_id),
            events,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    /// Poll the endpoint's chain id and report changes to subscribers.
    ///
    /// The task ends when the wallet is dropped.
    pub fn watch_network(self: &Arc<Self>) -> JoinHandle<()> {
        let wallet: Weak<EvmWallet> = Arc::downgrade(self);
        let interval = self.config.network_poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(wallet) = wallet.upgrade() else {
                    break;
                };
                match wallet.provider.get_chain_id().await {
                    Ok(current) => {
                        let previous = wallet.chain_id.swap(current, Ordering::SeqCst);
                        if previous != current {
                            info!(from = previous, to = current, "Wallet network changed");
                            let _ = wallet
                                .events
                                .send(WalletEvent::ChainChanged(format!("{:#x}", current)));
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to poll wallet network"),
                }
            }
        })
    }
}

#[async_trait]
impl WalletSession for EvmWallet {
    fn address(&self) -> Option<Address> {
        Some(self.address)
    }

    fn chain(&self) -> Option<WalletChain> {
        let chain_id = self.chain_id();
        if chain_id == 0 {
            return None;
        }
        let name = chains::lookup(&chain_id.to_string())
            .map(|c| c.name.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Some(WalletChain { chain_id, name })
    }

    async fn provider_network(&self) -> Result<NetworkInfo> {
        let chain_id = self.provider.get_chain_id().await?;
        Ok(NetworkInfo {
            chain_id,
            name: chains::lookup(&chain_id.to_string()).map(|c| c.name.to_string()),
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl TransactionSigner for EvmWallet {
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        // Nonce, gas and chain id must be filled before the wallet filler can sign
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .on_http(self.config.rpc_url.parse().wrap_err("Invalid RPC URL")?);

        let contract = ERC20::new(token, &provider);
        debug!(token = %token, spender = %spender, amount = %amount, "Submitting approve");

        let pending = contract
            .approve(spender, amount)
            .send()
            .await
            .map_err(|e| eyre!("Failed to send approve transaction: {}", e))?;

        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, "Approve sent, waiting for confirmation");
        Ok(tx_hash)
    }

    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<bool> {
        let start = tokio::time::Instant::now();
        let timeout = self.config.confirmation_timeout;

        while start.elapsed() < timeout {
            if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                return Ok(receipt.status());
            }
            tokio::time::sleep(self.config.receipt_poll_interval).await;
        }

        Err(eyre!(
            "Transaction {} not confirmed after {:?}",
            tx_hash,
            timeout
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EvmWalletConfig::new("http://localhost:8545", SecretString::new("0x01"));
        assert_eq!(config.confirmation_timeout, Duration::from_secs(300));
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(500));
        assert!(!format!("{:?}", config).contains("0x01"));
    }

    #[tokio::test]
    async fn test_invalid_private_key_rejected() {
        let config = EvmWalletConfig::new("http://localhost:8545", SecretString::new("not-a-key"));
        let err = EvmWallet::connect(config).await.err().unwrap();
        assert!(err.to_string().contains("Invalid private key"));
    }
}
