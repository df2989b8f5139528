//! EVM Chain Support Module
//!
//! alloy-backed implementations of the core's ports.
//!
//! ## Submodules
//!
//! - `client` - Read-only RPC client (`ChainReader`)
//! - `connector` - Chain id to RPC endpoint mapping (`ChainConnector`)
//! - `contracts` - Bridge and ERC20 bindings using alloy sol! macro
//! - `events` - `TokenPairSet` log parsing
//! - `tokens` - ERC20 read helpers
//! - `wallet` - Private-key wallet (`WalletSession` + `TransactionSigner`)

pub mod client;
pub mod connector;
pub mod contracts;
pub mod events;
pub mod tokens;
pub mod wallet;

// Re-export commonly used items
pub use client::{http_provider, EvmChainReader, HttpProvider};
pub use connector::RpcConnector;
pub use contracts::{Bridge, ERC20};
pub use events::parse_token_pair_set_log;
pub use tokens::format_token_amount;
pub use wallet::{EvmWallet, EvmWalletConfig};
