//! Bridge-Core: chain-pair routing and approval tracking for the Reactive token bridge
//!
//! This crate holds everything behind the bridge form that is not presentation:
//!
//! - **Chain Registry** - Display metadata for known chains
//! - **Route Table** - Which bridge contract serves an (origin, destination) pair
//! - **Chain Context** - Which chain the wallet is on, with a provider fallback
//! - **Discovery** - Valid token pairs replayed from `TokenPairSet` history
//! - **Balances** - Per-user locked amounts held by the bridge
//! - **Lifecycle** - Approval submission, `pending -> confirmed | failed`, delayed refresh
//! - **Journal** - Per-wallet persisted transaction history
//! - **Session** - Generation-gated state for one bridge form
//! - **EVM Module** - alloy implementations of the wallet and chain ports
//! - **Testing Module** - In-memory wallet and chain doubles
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! bridge-core = { path = "../bridge-core" }
//! ```
//!
//! ## Feature Flags
//!
//! - `evm` - Enable the alloy-backed adapters (default)
//! - `testing` - Enable the in-memory doubles for scenario tests
//! - `full` - Enable all features

// Core modules (always available)
pub mod balances;
pub mod chain_context;
pub mod chains;
pub mod discovery;
pub mod error;
pub mod journal;
pub mod lifecycle;
pub mod ports;
pub mod redact;
pub mod routes;
pub mod session;
pub mod store;
pub mod types;
pub mod watcher;

// Chain-specific modules (feature-gated)
#[cfg(feature = "evm")]
pub mod evm;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items at the crate root
pub use balances::load_locked_balances;
pub use chain_context::{resolve_current_chain, ChainContext, ChainContextWatcher};
pub use chains::ChainDescriptor;
pub use discovery::{discover_pairs, resolve_metadata, LogScanConfig};
pub use error::{BridgeError, BridgeResult};
pub use journal::TransactionJournal;
pub use lifecycle::{
    parse_amount, LifecycleEvent, SubmitOutcome, SubmitRequest, TransactionTracker,
    BALANCE_REFRESH_DELAY,
};
pub use ports::{
    ChainConnector, ChainReader, KeyValueStore, NetworkInfo, TransactionSigner, WalletChain,
    WalletEvent, WalletSession,
};
pub use routes::{canonical_chain_id, RouteTable};
pub use session::{BridgeSession, SessionConfig, SessionSnapshot};
pub use store::{FileStore, MemoryStore};
pub use types::{
    shorten_address, LockedBalances, PendingTransaction, TokenMetadata, TokenPair, TxStatus,
};
pub use watcher::{PairEventWatcher, WatcherConfig};
