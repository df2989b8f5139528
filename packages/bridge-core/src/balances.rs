//! Locked Balance Tracker
//!
//! Reads the bridge contract's `lockedTokens(user, token)` record for every
//! discovered origin token. The map is rebuilt from scratch each cycle.

use alloy::primitives::Address;
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::ports::ChainReader;
use crate::types::{LockedBalances, TokenPair};

/// Locked amounts held by `bridge` for `user`, zero entries omitted.
///
/// Returns an empty map without touching the chain when no wallet is connected.
/// Any failed read fails the whole load.
pub async fn load_locked_balances(
    reader: &dyn ChainReader,
    bridge: Address,
    pairs: &[TokenPair],
    user: Option<Address>,
) -> BridgeResult<LockedBalances> {
    let mut locked = LockedBalances::new();
    let Some(user) = user else {
        return Ok(locked);
    };

    for pair in pairs {
        let amount = reader
            .locked_tokens(bridge, user, pair.origin_token)
            .await
            .map_err(|e| {
                warn!(
                    bridge = %bridge,
                    user = %user,
                    token = %pair.origin_token,
                    error = %e,
                    "Failed to read locked tokens"
                );
                BridgeError::Discovery(format!(
                    "lockedTokens({}, {}) failed: {:#}",
                    user, pair.origin_token, e
                ))
            })?;

        if !amount.is_zero() {
            locked.insert(pair.origin_token, amount);
        }
    }

    debug!(user = %user, tokens = locked.len(), "Loaded locked balances");
    Ok(locked)
}
