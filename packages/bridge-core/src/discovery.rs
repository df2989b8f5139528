//! Token Pair Discovery
//!
//! Rebuilds the list of bridgeable token pairs for a bridge contract by
//! replaying its `TokenPairSet` history. Each event is checked against the
//! contract's *current* `getDestinationToken` mapping, so pairs that were later
//! overwritten are dropped (the contract is last-write-wins).
//!
//! Symbol/name metadata is fetched afterwards from both chains. A failed
//! metadata read degrades to the shortened token address; it never drops the
//! pair.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_core::discovery::{discover_pairs, resolve_metadata, LogScanConfig};
//!
//! let pairs = discover_pairs(origin.as_ref(), bridge, &LogScanConfig::default()).await?;
//! let pairs = resolve_metadata(pairs, origin.as_ref(), destination.as_ref()).await;
//! ```

use alloy::primitives::Address;
use eyre::{eyre, Result, WrapErr};
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::ports::ChainReader;
use crate::types::{shorten_address, TokenMetadata, TokenPair, TokenPairSetEvent};

/// Where the historical `TokenPairSet` scan starts and how it is chunked
#[derive(Debug, Clone, Default)]
pub struct LogScanConfig {
    /// First block to scan (usually the bridge deployment block)
    pub from_block: u64,
    /// Maximum block range per log query; `None` issues one query for the
    /// whole history
    pub max_block_range: Option<u64>,
}

/// Fetch every `TokenPairSet` event from `from_block` to the chain head.
pub async fn fetch_pair_events(
    reader: &dyn ChainReader,
    bridge: Address,
    scan: &LogScanConfig,
) -> Result<Vec<TokenPairSetEvent>> {
    let head = reader
        .latest_block()
        .await
        .wrap_err("Failed to get latest block")?;
    fetch_pair_events_in_range(reader, bridge, scan.from_block, head, scan.max_block_range).await
}

/// Fetch `TokenPairSet` events in `[from_block, to_block]`, chunked if requested.
pub async fn fetch_pair_events_in_range(
    reader: &dyn ChainReader,
    bridge: Address,
    from_block: u64,
    to_block: u64,
    max_block_range: Option<u64>,
) -> Result<Vec<TokenPairSetEvent>> {
    if from_block > to_block {
        return Ok(Vec::new());
    }

    let step = max_block_range.filter(|&r| r > 0).unwrap_or(u64::MAX);
    let mut events = Vec::new();
    let mut current_from = from_block;

    loop {
        let current_to = current_from.saturating_add(step - 1).min(to_block);
        let chunk = reader
            .token_pair_set_events(bridge, current_from, current_to)
            .await
            .wrap_err_with(|| {
                format!(
                    "Failed to get TokenPairSet logs from block {} to {}",
                    current_from, current_to
                )
            })?;
        events.extend(chunk);

        if current_to >= to_block {
            break;
        }
        current_from = current_to + 1;
    }

    Ok(events)
}

/// Keep the events whose pair the contract still holds.
///
/// Result order follows the events; an origin token appears at most once.
pub async fn validate_pairs(
    reader: &dyn ChainReader,
    bridge: Address,
    events: &[TokenPairSetEvent],
) -> Result<Vec<TokenPair>> {
    let mut pairs = Vec::new();
    let mut seen: HashSet<Address> = HashSet::new();

    for event in events {
        if seen.contains(&event.origin_token) {
            continue;
        }

        let current = reader
            .destination_token(bridge, event.origin_token)
            .await
            .map_err(|e| eyre!("getDestinationToken({}) failed: {}", event.origin_token, e))?;

        if current == Address::ZERO || current != event.destination_token {
            debug!(
                origin = %event.origin_token,
                event_destination = %event.destination_token,
                current_destination = %current,
                "Skipping superseded token pair"
            );
            continue;
        }

        seen.insert(event.origin_token);
        pairs.push(TokenPair::new(event.origin_token, current));
    }

    Ok(pairs)
}

/// Discover the currently valid token pairs of `bridge` (metadata unresolved).
pub async fn discover_pairs(
    reader: &dyn ChainReader,
    bridge: Address,
    scan: &LogScanConfig,
) -> BridgeResult<Vec<TokenPair>> {
    let run = async {
        let events = fetch_pair_events(reader, bridge, scan).await?;
        debug!(bridge = %bridge, count = events.len(), "Found token pair events");
        validate_pairs(reader, bridge, &events).await
    };

    match run.await {
        Ok(pairs) => {
            info!(bridge = %bridge, pairs = pairs.len(), "Loaded token pairs");
            Ok(pairs)
        }
        Err(e) => {
            warn!(bridge = %bridge, error = %e, "Token pair discovery failed");
            Err(BridgeError::Discovery(format!("{:#}", e)))
        }
    }
}

async fn token_metadata(reader: &dyn ChainReader, token: Address) -> TokenMetadata {
    let (symbol, name) = tokio::join!(reader.token_symbol(token), reader.token_name(token));

    let symbol = symbol.unwrap_or_else(|e| {
        warn!(token = %token, error = %e, "Failed to fetch token symbol");
        shorten_address(&token)
    });
    let name = name.unwrap_or_else(|e| {
        warn!(token = %token, error = %e, "Failed to fetch token name");
        shorten_address(&token)
    });

    TokenMetadata {
        symbol: Some(symbol),
        name: Some(name),
    }
}

/// Fill in symbol/name for every pair, reading origin tokens from `origin`
/// and destination tokens from `destination`.
///
/// All reads run concurrently; the returned list is published only once every
/// read has settled.
pub async fn resolve_metadata(
    pairs: Vec<TokenPair>,
    origin: &dyn ChainReader,
    destination: &dyn ChainReader,
) -> Vec<TokenPair> {
    let lookups = pairs.into_iter().map(|mut pair| async move {
        let (origin_meta, destination_meta) = tokio::join!(
            token_metadata(origin, pair.origin_token),
            token_metadata(destination, pair.destination_token)
        );
        pair.origin = origin_meta;
        pair.destination = destination_meta;
        pair
    });

    join_all(lookups).await
}
