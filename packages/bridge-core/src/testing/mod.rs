//! Testing Utilities Module
//!
//! In-memory stand-ins for the wallet, chain RPC endpoints and connector so the
//! core can be driven end-to-end without a node.
//!
//! ## Submodules
//!
//! - `mock_chain` - Scriptable bridge + ERC20 state for one chain, and a connector
//! - `mock_wallet` - Scriptable wallet session and signer

pub mod mock_chain;
pub mod mock_wallet;

// Re-export commonly used items
pub use mock_chain::*;
pub use mock_wallet::*;
