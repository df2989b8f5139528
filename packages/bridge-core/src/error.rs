//! Error types surfaced by the bridge core
//!
//! Collaborator code (RPC clients, wallet, storage backends) reports failures as
//! `eyre::Report`; the core components translate them into these typed kinds at
//! their public boundary.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // ========================================================================
    // Routing
    // ========================================================================
    /// No bridge contract is deployed for the ordered chain pair.
    #[error("No bridge contract available for chain pair {origin} -> {destination}")]
    RouteNotFound { origin: String, destination: String },

    // ========================================================================
    // Discovery
    // ========================================================================
    /// Pair or balance loading failed (contract unreachable or malformed).
    #[error("Failed to load token pairs: {0}")]
    Discovery(String),

    // ========================================================================
    // Submission
    // ========================================================================
    /// Required selection missing; nothing was sent to the wallet.
    #[error("Invalid bridge parameters: {0}")]
    Precondition(&'static str),

    /// Amount is not a valid decimal or token decimals could not be read.
    #[error("Invalid amount: {0}")]
    AmountParse(String),

    /// Wallet rejected the approval or it reverted on-chain.
    #[error("Approval failed: {0}")]
    Submission(String),

    // ========================================================================
    // Journal
    // ========================================================================
    #[error("Transaction journal error: {0}")]
    Storage(String),
}

impl BridgeError {
    /// Short message suitable for inline display next to the bridge form.
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::RouteNotFound { .. } => {
                "No bridge contract available for selected chain pair".to_string()
            }
            BridgeError::Discovery(_) => "Failed to load token pairs".to_string(),
            other => other.to_string(),
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
