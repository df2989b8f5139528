//! RPC connector
//!
//! Maps chain ids to RPC endpoints and hands out cached [`EvmChainReader`]s.
//! Registry chains with a well-known public endpoint are configured by default;
//! anything else needs an explicit endpoint.

use eyre::{eyre, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::chains;
use crate::evm::client::EvmChainReader;
use crate::ports::{ChainConnector, ChainReader};
use crate::routes::canonical_chain_id;

#[derive(Default)]
pub struct RpcConnector {
    endpoints: HashMap<String, String>,
    readers: Mutex<HashMap<String, Arc<EvmChainReader>>>,
}

impl RpcConnector {
    /// No endpoints configured
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoints for every registry chain that ships one
    pub fn with_registry_defaults() -> Self {
        let mut connector = Self::new();
        for chain in chains::all() {
            if let Some(url) = chain.rpc_url {
                connector
                    .endpoints
                    .insert(chain.id.to_string(), url.to_string());
            }
        }
        connector
    }

    /// Add or override the endpoint for `chain_id`
    pub fn with_endpoint(mut self, chain_id: &str, rpc_url: &str) -> Self {
        self.endpoints
            .insert(canonical_chain_id(chain_id), rpc_url.to_string());
        self
    }

    pub fn endpoint(&self, chain_id: &str) -> Option<&str> {
        self.endpoints
            .get(&canonical_chain_id(chain_id))
            .map(String::as_str)
    }
}

impl ChainConnector for RpcConnector {
    fn reader(&self, chain_id: &str) -> Result<Arc<dyn ChainReader>> {
        let key = canonical_chain_id(chain_id);
        let mut readers = self.readers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(reader) = readers.get(&key) {
            return Ok(reader.clone() as Arc<dyn ChainReader>);
        }

        let url = self
            .endpoints
            .get(&key)
            .ok_or_else(|| eyre!("No RPC endpoint configured for chain {}", key))?;
        let numeric_id: u64 = key
            .parse()
            .map_err(|_| eyre!("Invalid chain id: {}", chain_id))?;

        let reader = Arc::new(EvmChainReader::new(url, numeric_id)?);
        readers.insert(key, reader.clone());
        Ok(reader as Arc<dyn ChainReader>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults_include_kopli() {
        let connector = RpcConnector::with_registry_defaults();
        assert_eq!(
            connector.endpoint("5318008"),
            Some("https://5318008.rpc.thirdweb.com")
        );
        assert!(connector.endpoint("999").is_none());
    }

    #[test]
    fn test_override_accepts_hex_id() {
        let connector = RpcConnector::new().with_endpoint("0xaa36a7", "http://localhost:8545");
        assert_eq!(connector.endpoint("11155111"), Some("http://localhost:8545"));
        assert!(connector.reader("11155111").is_ok());
    }

    #[test]
    fn test_missing_endpoint_is_error() {
        let connector = RpcConnector::new();
        let err = connector.reader("137").err().unwrap();
        assert!(err.to_string().contains("No RPC endpoint configured for chain 137"));
    }
}
