//! Bridge Route Table
//!
//! Maps an ordered (origin chain, destination chain) pair to the bridge
//! contract deployed for it. Routes are directional: `A -> B` says nothing
//! about `B -> A`.

use alloy::primitives::{address, Address};
use std::collections::HashMap;
use tracing::debug;

/// Sepolia -> Kopli bridge deployment
pub const SEPOLIA_KOPLI_BRIDGE: Address = address!("BE90D22f0ddC740e60101DDf02a8a396d09733D2");

/// Normalize a chain id to its decimal string form.
///
/// Integers, decimal strings and `0x`-prefixed hex all collapse to the same
/// key. Input that is not a number is returned trimmed so lookups on it simply
/// miss.
pub fn canonical_chain_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => trimmed.parse::<u64>().ok(),
    };
    match parsed {
        Some(id) => id.to_string(),
        None => trimmed.to_string(),
    }
}

fn route_key(origin: &str, destination: &str) -> (String, String) {
    (canonical_chain_id(origin), canonical_chain_id(destination))
}

/// Directional chain-pair -> bridge contract table
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<(String, String), Address>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RouteTable {
    /// Table with no routes
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Routes shipped with the bridge front end
    pub fn builtin() -> Self {
        Self::empty().with_route("11155111", "5318008", SEPOLIA_KOPLI_BRIDGE)
    }

    /// Add (or replace) a route
    pub fn with_route(mut self, origin: &str, destination: &str, contract: Address) -> Self {
        self.routes.insert(route_key(origin, destination), contract);
        self
    }

    /// Bridge contract for the pair, if one is deployed
    pub fn get_contract_address(&self, origin: &str, destination: &str) -> Option<Address> {
        let key = route_key(origin, destination);
        let contract = self.routes.get(&key).copied();
        debug!(
            origin = %key.0,
            destination = %key.1,
            contract = ?contract,
            "Bridge contract lookup"
        );
        contract
    }

    pub fn route_exists(&self, origin: &str, destination: &str) -> bool {
        self.get_contract_address(origin, destination).is_some()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// All configured routes as `(origin, destination, contract)`, sorted by key
    pub fn routes(&self) -> Vec<(String, String, Address)> {
        let mut out: Vec<_> = self
            .routes
            .iter()
            .map(|((o, d), a)| (o.clone(), d.clone(), *a))
            .collect();
        out.sort();
        out
    }
}
