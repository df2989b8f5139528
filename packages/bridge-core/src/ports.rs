//! Interfaces to the collaborators the core talks to
//!
//! The wallet, chain RPC endpoints and the journal store are passed into each
//! component explicitly. `crate::evm` implements them over alloy; the
//! `testing` module provides in-memory doubles.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use eyre::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::TokenPairSetEvent;

// ============================================================================
// Wallet
// ============================================================================

/// Chain as reported by the wallet's primary info source.
///
/// `name` is `"unknown"` for networks the wallet does not recognise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletChain {
    pub chain_id: u64,
    pub name: String,
}

/// Network as reported directly by the wallet's provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub chain_id: u64,
    /// `None` when the provider has no name for the network
    pub name: Option<String>,
}

/// Notifications pushed by the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// Raw chain id as carried by the event (often hex)
    ChainChanged(String),
    AccountsChanged(Option<Address>),
}

/// Connected wallet session
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Connected account, `None` when no session is active
    fn address(&self) -> Option<Address>;

    /// Primary wallet-info source. `None` until the wallet reports a chain.
    fn chain(&self) -> Option<WalletChain>;

    /// Fallback: ask the provider for its network directly
    async fn provider_network(&self) -> Result<NetworkInfo>;

    /// Subscribe to chain/account change notifications
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Signing side of the wallet
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Ask the wallet to approve `spender` for `amount` of `token`.
    ///
    /// Resolves as soon as the wallet hands back the transaction hash, before
    /// the transaction is mined.
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash>;

    /// Wait until `tx_hash` is included. `Ok(false)` means it reverted.
    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<bool>;
}

// ============================================================================
// Chain reads
// ============================================================================

/// Read-only connection to one chain
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    /// `TokenPairSet` logs emitted by `bridge` in `[from_block, to_block]`,
    /// in chain order
    async fn token_pair_set_events(
        &self,
        bridge: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenPairSetEvent>>;

    /// `getDestinationToken(originToken)`; the zero address means no mapping
    async fn destination_token(&self, bridge: Address, origin_token: Address) -> Result<Address>;

    /// `lockedTokens(user, token)`
    async fn locked_tokens(&self, bridge: Address, user: Address, token: Address) -> Result<U256>;

    async fn token_symbol(&self, token: Address) -> Result<String>;

    async fn token_name(&self, token: Address) -> Result<String>;

    async fn token_decimals(&self, token: Address) -> Result<u8>;
}

/// Hands out readers per chain id
pub trait ChainConnector: Send + Sync {
    fn reader(&self, chain_id: &str) -> Result<Arc<dyn ChainReader>>;
}

// ============================================================================
// Storage
// ============================================================================

/// Persistent string key-value store backing the transaction journal
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}
