//! EVM Event Parsing
//!
//! Decodes raw `TokenPairSet` logs into [`TokenPairSetEvent`].

use alloy::primitives::Address;
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use tracing::warn;

use crate::evm::contracts::Bridge;
use crate::types::TokenPairSetEvent;

/// Parse a `TokenPairSet` event from a raw log
///
/// Event: TokenPairSet(address indexed originToken, address indexed destinationToken)
///
/// Both fields are indexed, so they live in `topics[1]` and `topics[2]`
/// (right-aligned in 32 bytes); the data section is empty.
pub fn parse_token_pair_set_log(log: &Log) -> Option<TokenPairSetEvent> {
    let topics = log.topics();
    if topics.len() < 3 || topics[0] != Bridge::TokenPairSet::SIGNATURE_HASH {
        return None;
    }

    let block_number = log.block_number?;
    let log_index = log.log_index?;

    Some(TokenPairSetEvent {
        origin_token: Address::from_word(topics[1]),
        destination_token: Address::from_word(topics[2]),
        block_number,
        log_index,
    })
}

/// Parse a batch of logs, skipping (and logging) anything malformed
pub fn parse_token_pair_set_logs(logs: &[Log]) -> Vec<TokenPairSetEvent> {
    let mut events = Vec::with_capacity(logs.len());
    for log in logs {
        match parse_token_pair_set_log(log) {
            Some(event) => events.push(event),
            None => warn!(
                block = ?log.block_number,
                tx = ?log.transaction_hash,
                topics = log.topics().len(),
                "Failed to parse TokenPairSet event from log"
            ),
        }
    }
    events.sort_by_key(|e| (e.block_number, e.log_index));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData, B256};

    fn pair_log(origin: Address, destination: Address, block: Option<u64>, index: u64) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0xB0),
                data: LogData::new_unchecked(
                    vec![
                        Bridge::TokenPairSet::SIGNATURE_HASH,
                        origin.into_word(),
                        destination.into_word(),
                    ],
                    Bytes::new(),
                ),
            },
            block_number: block,
            log_index: Some(index),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_token_pair_set_log() {
        let origin = Address::repeat_byte(0x0A);
        let destination = Address::repeat_byte(0x0B);
        let event = parse_token_pair_set_log(&pair_log(origin, destination, Some(42), 3)).unwrap();

        assert_eq!(event.origin_token, origin);
        assert_eq!(event.destination_token, destination);
        assert_eq!(event.block_number, 42);
        assert_eq!(event.log_index, 3);
    }

    #[test]
    fn test_rejects_other_events_and_pending_logs() {
        let mut other = pair_log(Address::ZERO, Address::ZERO, Some(1), 0);
        other.inner.data = LogData::new_unchecked(
            vec![B256::repeat_byte(0x11), B256::ZERO, B256::ZERO],
            Bytes::new(),
        );
        assert!(parse_token_pair_set_log(&other).is_none());

        let pending = pair_log(Address::ZERO, Address::ZERO, None, 0);
        assert!(parse_token_pair_set_log(&pending).is_none());
    }

    #[test]
    fn test_batch_is_chain_ordered() {
        let a = Address::repeat_byte(0x0A);
        let logs = vec![
            pair_log(a, Address::repeat_byte(2), Some(9), 0),
            pair_log(a, Address::repeat_byte(1), Some(5), 4),
            pair_log(a, Address::repeat_byte(3), None, 0),
        ];
        let events = parse_token_pair_set_logs(&logs);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].destination_token, Address::repeat_byte(1));
        assert_eq!(events[1].destination_token, Address::repeat_byte(2));
    }
}
