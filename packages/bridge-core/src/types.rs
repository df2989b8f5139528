//! Common types shared by the bridge core components

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Token Pairs
// ============================================================================

/// Shorten an address for display: `0x1234...abcd`.
///
/// Used as the placeholder whenever token metadata could not be resolved.
pub fn shorten_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// `TokenPairSet(address indexed originToken, address indexed destinationToken)`
/// as read back from the bridge contract's logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPairSetEvent {
    pub origin_token: Address,
    pub destination_token: Address,
    pub block_number: u64,
    pub log_index: u64,
}

/// Display metadata for one side of a pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: Option<String>,
    pub name: Option<String>,
}

/// An origin-chain token and its registered counterpart on the destination chain.
///
/// Symbol/name fields arrive after the pair itself and may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub origin_token: Address,
    pub destination_token: Address,
    pub origin: TokenMetadata,
    pub destination: TokenMetadata,
}

impl TokenPair {
    pub fn new(origin_token: Address, destination_token: Address) -> Self {
        Self {
            origin_token,
            destination_token,
            origin: TokenMetadata::default(),
            destination: TokenMetadata::default(),
        }
    }

    /// Origin symbol, or the shortened origin address while unresolved
    pub fn origin_label(&self) -> String {
        self.origin
            .symbol
            .clone()
            .unwrap_or_else(|| shorten_address(&self.origin_token))
    }

    /// Destination symbol, or the shortened destination address while unresolved
    pub fn destination_label(&self) -> String {
        self.destination
            .symbol
            .clone()
            .unwrap_or_else(|| shorten_address(&self.destination_token))
    }
}

/// Locked amount per origin token for the connected user. Zero entries never appear.
pub type LockedBalances = BTreeMap<Address, U256>;

// ============================================================================
// Transactions
// ============================================================================

/// Lifecycle status of a submitted approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    /// Get the status as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One journal record for a submitted approval.
///
/// Every status change is a new record sharing the same `hash`. `hash` is
/// absent only when the wallet failed before returning a transaction handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub from_chain_id: String,
    pub to_chain_id: String,
    pub token_symbol: String,
    /// Decimal amount as the user typed it
    pub amount: String,
    pub status: TxStatus,
    /// RFC 3339 / ISO-8601 timestamp
    pub timestamp: String,
    pub user_address: String,
}

impl PendingTransaction {
    /// Abbreviated hash for list display: `0x123456...abcdef`
    pub fn short_hash(&self) -> String {
        match &self.hash {
            Some(h) if h.len() > 14 => match (h.get(..8), h.get(h.len() - 6..)) {
                (Some(head), Some(tail)) => format!("{}...{}", head, tail),
                _ => h.clone(),
            },
            Some(h) => h.clone(),
            None => "<no hash>".to_string(),
        }
    }
}
