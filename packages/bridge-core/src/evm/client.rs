//! EVM RPC Client
//!
//! Read-only JSON-RPC client for one chain, implementing [`ChainReader`] for
//! the bridge and token contracts.

use alloy::{
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::Filter,
    sol_types::SolEvent,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use tracing::{debug, info};

use crate::evm::contracts::Bridge;
use crate::evm::events::parse_token_pair_set_logs;
use crate::evm::tokens;
use crate::ports::ChainReader;
use crate::types::TokenPairSetEvent;

/// Plain HTTP provider
pub type HttpProvider = RootProvider<Http<Client>>;

/// Build an HTTP provider for `rpc_url`
pub fn http_provider(rpc_url: &str) -> Result<HttpProvider> {
    Ok(ProviderBuilder::new().on_http(
        rpc_url
            .parse()
            .map_err(|e| eyre!("Invalid RPC URL: {}", e))?,
    ))
}

/// Read-only EVM RPC client
pub struct EvmChainReader {
    provider: HttpProvider,
    /// Chain ID this endpoint is configured for
    chain_id: u64,
}

impl EvmChainReader {
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = http_provider(rpc_url)?;
        info!(rpc_url = %rpc_url, chain_id = chain_id, "Created read-only EVM client");
        Ok(Self { provider, chain_id })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl ChainReader for EvmChainReader {
    async fn latest_block(&self) -> Result<u64> {
        let block = self.provider.get_block_number().await?;
        Ok(block)
    }

    async fn token_pair_set_events(
        &self,
        bridge: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenPairSetEvent>> {
        let filter = Filter::new()
            .address(bridge)
            .event_signature(Bridge::TokenPairSet::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await.wrap_err_with(|| {
            format!(
                "Failed to get TokenPairSet logs from block {} to {}",
                from_block, to_block
            )
        })?;
        let events = parse_token_pair_set_logs(&logs);

        if !events.is_empty() {
            debug!(
                chain_id = self.chain_id,
                count = events.len(),
                from = from_block,
                to = to_block,
                "Found TokenPairSet events"
            );
        }
        Ok(events)
    }

    async fn destination_token(&self, bridge: Address, origin_token: Address) -> Result<Address> {
        let contract = Bridge::new(bridge, &self.provider);
        let result = contract
            .getDestinationToken(origin_token)
            .call()
            .await
            .map_err(|e| eyre!("Failed to get destination token: {}", e))?;
        Ok(result._0)
    }

    async fn locked_tokens(&self, bridge: Address, user: Address, token: Address) -> Result<U256> {
        let contract = Bridge::new(bridge, &self.provider);
        let result = contract
            .lockedTokens(user, token)
            .call()
            .await
            .map_err(|e| eyre!("Failed to get locked tokens: {}", e))?;
        Ok(result._0)
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        tokens::get_token_symbol(&self.provider, token).await
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        tokens::get_token_name(&self.provider, token).await
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        tokens::get_token_decimals(&self.provider, token).await
    }
}
