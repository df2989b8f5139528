//! Chain Registry
//!
//! Static table of the chains the bridge front end knows how to display.
//! Wallets may sit on chains outside this table; callers fall back to the
//! numeric id for those.

use serde::Serialize;

use crate::routes::canonical_chain_id;

/// Display metadata for one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainDescriptor {
    pub id: u64,
    pub name: &'static str,
    /// Public RPC endpoint used when reading this chain as a destination
    pub rpc_url: Option<&'static str>,
    /// Block explorer base URL (no trailing slash)
    pub explorer_url: Option<&'static str>,
}

pub const ETHEREUM: ChainDescriptor = ChainDescriptor {
    id: 1,
    name: "Ethereum",
    rpc_url: None,
    explorer_url: None,
};

pub const POLYGON: ChainDescriptor = ChainDescriptor {
    id: 137,
    name: "Polygon",
    rpc_url: None,
    explorer_url: None,
};

pub const SEPOLIA: ChainDescriptor = ChainDescriptor {
    id: 11155111,
    name: "Sepolia",
    rpc_url: None,
    explorer_url: Some("https://sepolia.etherscan.io"),
};

pub const KOPLI: ChainDescriptor = ChainDescriptor {
    id: 5318008,
    name: "Reactive-Kopli-Testnet",
    rpc_url: Some("https://5318008.rpc.thirdweb.com"),
    explorer_url: Some("https://explorer.kopli.io"),
};

/// Destination choices offered by the bridge form, in display order.
pub const SUPPORTED_CHAINS: &[ChainDescriptor] = &[ETHEREUM, POLYGON, KOPLI];

const ALL_CHAINS: &[ChainDescriptor] = &[ETHEREUM, POLYGON, SEPOLIA, KOPLI];

/// Look up a chain by id. Accepts the same spellings as the route table
/// (`"5318008"`, `" 5318008 "`, `"0x512578"`).
pub fn lookup(chain_id: &str) -> Option<&'static ChainDescriptor> {
    let id: u64 = canonical_chain_id(chain_id).parse().ok()?;
    ALL_CHAINS.iter().find(|c| c.id == id)
}

/// Every known chain, including origin-only networks.
pub fn all() -> &'static [ChainDescriptor] {
    ALL_CHAINS
}

/// Supported destinations excluding the wallet's current chain.
pub fn destination_options(exclude_chain_id: &str) -> Vec<&'static ChainDescriptor> {
    let exclude = canonical_chain_id(exclude_chain_id);
    SUPPORTED_CHAINS
        .iter()
        .filter(|c| c.id.to_string() != exclude)
        .collect()
}

/// Explorer link for a transaction, if the chain has an explorer configured.
pub fn explorer_tx_url(chain_id: &str, tx_hash: &str) -> Option<String> {
    let chain = lookup(chain_id)?;
    chain
        .explorer_url
        .map(|base| format!("{}/tx/{}", base, tx_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_chain() {
        let kopli = lookup("5318008").unwrap();
        assert_eq!(kopli.name, "Reactive-Kopli-Testnet");
        assert_eq!(lookup(" 137 ").unwrap().name, "Polygon");
    }

    #[test]
    fn test_lookup_hex_chain_id() {
        // Wallet chainChanged events carry hex ids
        assert_eq!(lookup("0xaa36a7").unwrap().id, 11155111);
    }

    #[test]
    fn test_lookup_unknown_chain() {
        assert!(lookup("999999").is_none());
        assert!(lookup("").is_none());
        assert!(lookup("not-a-chain").is_none());
    }

    #[test]
    fn test_destination_options_excludes_current() {
        let options = destination_options("137");
        assert_eq!(options.len(), 2);
        assert!(options.iter().all(|c| c.id != 137));

        let options = destination_options("11155111");
        assert_eq!(options.len(), SUPPORTED_CHAINS.len());
    }

    #[test]
    fn test_explorer_tx_url() {
        assert_eq!(
            explorer_tx_url("11155111", "0xabc").as_deref(),
            Some("https://sepolia.etherscan.io/tx/0xabc")
        );
        assert_eq!(
            explorer_tx_url("5318008", "0xdef").as_deref(),
            Some("https://explorer.kopli.io/tx/0xdef")
        );
        assert!(explorer_tx_url("1", "0xabc").is_none());
    }
}
