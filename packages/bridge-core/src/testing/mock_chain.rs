//! Mock Chain Helpers
//!
//! A single chain's worth of bridge and token state behind the `ChainReader`
//! port, plus a `ChainConnector` that hands those chains out by id.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::ports::{ChainConnector, ChainReader};
use crate::routes::canonical_chain_id;
use crate::types::TokenPairSetEvent;

#[derive(Default)]
struct ChainState {
    block: u64,
    events: Vec<(Address, TokenPairSetEvent)>,
    mappings: HashMap<(Address, Address), Address>,
    locked: HashMap<(Address, Address, Address), U256>,
    tokens: HashMap<Address, (String, String, u8)>,
    fail_reads: bool,
    delay: Option<Duration>,
    log_queries: usize,
    locked_queries: usize,
}

/// Scriptable chain state
#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Set the chain head
    pub fn set_block(&self, block: u64) {
        self.state().block = block;
    }

    pub fn block(&self) -> u64 {
        self.state().block
    }

    /// Emit `TokenPairSet(origin, destination)` at the current head
    pub fn push_pair_event(&self, bridge: Address, origin: Address, destination: Address) {
        let block = self.block();
        self.push_pair_event_at(bridge, origin, destination, block);
    }

    /// Emit `TokenPairSet(origin, destination)` at `block` (advancing the head if needed)
    pub fn push_pair_event_at(
        &self,
        bridge: Address,
        origin: Address,
        destination: Address,
        block: u64,
    ) {
        let mut state = self.state();
        let log_index = state.events.len() as u64;
        state.events.push((
            bridge,
            TokenPairSetEvent {
                origin_token: origin,
                destination_token: destination,
                block_number: block,
                log_index,
            },
        ));
        state.block = state.block.max(block);
    }

    /// Set `getDestinationToken(origin)` on `bridge`
    pub fn set_mapping(&self, bridge: Address, origin: Address, destination: Address) {
        self.state().mappings.insert((bridge, origin), destination);
    }

    /// Register a token and emit its `TokenPairSet` in one go
    pub fn register_pair(&self, bridge: Address, origin: Address, destination: Address) {
        self.push_pair_event(bridge, origin, destination);
        self.set_mapping(bridge, origin, destination);
    }

    pub fn set_locked(&self, bridge: Address, user: Address, token: Address, amount: U256) {
        self.state().locked.insert((bridge, user, token), amount);
    }

    pub fn set_token(&self, token: Address, symbol: &str, name: &str, decimals: u8) {
        self.state()
            .tokens
            .insert(token, (symbol.to_string(), name.to_string(), decimals));
    }

    /// Make every read fail as if the RPC were down
    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    /// Delay every read by `delay` (tokio time, so paused clocks apply)
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// Number of log queries served
    pub fn log_queries(&self) -> usize {
        self.state().log_queries
    }

    /// Number of `lockedTokens` reads served
    pub fn locked_queries(&self) -> usize {
        self.state().locked_queries
    }

    async fn before_read(&self) -> Result<()> {
        let (delay, fail) = {
            let state = self.state();
            (state.delay, state.fail_reads)
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if fail {
            return Err(eyre!("mock RPC unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn latest_block(&self) -> Result<u64> {
        self.before_read().await?;
        Ok(self.block())
    }

    async fn token_pair_set_events(
        &self,
        bridge: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TokenPairSetEvent>> {
        self.before_read().await?;
        let mut state = self.state();
        state.log_queries += 1;
        Ok(state
            .events
            .iter()
            .filter(|(b, e)| {
                *b == bridge && e.block_number >= from_block && e.block_number <= to_block
            })
            .map(|(_, e)| *e)
            .collect())
    }

    async fn destination_token(&self, bridge: Address, origin_token: Address) -> Result<Address> {
        self.before_read().await?;
        Ok(self
            .state()
            .mappings
            .get(&(bridge, origin_token))
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn locked_tokens(&self, bridge: Address, user: Address, token: Address) -> Result<U256> {
        self.before_read().await?;
        let mut state = self.state();
        state.locked_queries += 1;
        Ok(state
            .locked
            .get(&(bridge, user, token))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        self.before_read().await?;
        self.state()
            .tokens
            .get(&token)
            .map(|t| t.0.clone())
            .ok_or_else(|| eyre!("execution reverted: {} has no symbol()", token))
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        self.before_read().await?;
        self.state()
            .tokens
            .get(&token)
            .map(|t| t.1.clone())
            .ok_or_else(|| eyre!("execution reverted: {} has no name()", token))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        self.before_read().await?;
        self.state()
            .tokens
            .get(&token)
            .map(|t| t.2)
            .ok_or_else(|| eyre!("execution reverted: {} has no decimals()", token))
    }
}

/// Connector over a fixed set of mock chains
#[derive(Default, Clone)]
pub struct MockConnector {
    chains: HashMap<String, Arc<MockChain>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, chain_id: &str, chain: Arc<MockChain>) -> Self {
        self.chains.insert(canonical_chain_id(chain_id), chain);
        self
    }
}

impl ChainConnector for MockConnector {
    fn reader(&self, chain_id: &str) -> Result<Arc<dyn ChainReader>> {
        let chain = self
            .chains
            .get(&canonical_chain_id(chain_id))
            .ok_or_else(|| eyre!("No RPC endpoint configured for chain {}", chain_id))?;
        Ok(chain.clone() as Arc<dyn ChainReader>)
    }
}
