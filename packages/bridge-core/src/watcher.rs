//! TokenPairSet Watching
//!
//! Polling watcher that notices new `TokenPairSet` registrations after the last
//! seen block. It only reports that something changed; callers re-run discovery
//! in full rather than merging events.
//!
//! ## Usage
//!
//! ```ignore
//! let watcher = PairEventWatcher::new(reader, bridge, head);
//! let (handle, mut rx) = watcher.spawn();
//! while let Some(events) = rx.recv().await {
//!     // re-run discovery
//! }
//! ```

use alloy::primitives::Address;
use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::discovery::fetch_pair_events_in_range;
use crate::ports::ChainReader;
use crate::types::TokenPairSetEvent;

/// Default poll interval for new pair registrations
pub const DEFAULT_PAIR_POLL_INTERVAL: Duration = Duration::from_millis(4000);

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Poll interval between checks
    pub poll_interval: Duration,
    /// Blocks to stay behind the head
    pub confirmations: u64,
    /// Maximum block range per query (to avoid RPC limits)
    pub max_block_range: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_PAIR_POLL_INTERVAL,
            confirmations: 0,
            max_block_range: 10_000,
        }
    }
}

/// Watches one bridge contract for new `TokenPairSet` events
pub struct PairEventWatcher {
    reader: Arc<dyn ChainReader>,
    bridge: Address,
    config: WatcherConfig,
    last_block: u64,
}

impl PairEventWatcher {
    /// Watch for events strictly after `last_block`
    pub fn new(reader: Arc<dyn ChainReader>, bridge: Address, last_block: u64) -> Self {
        Self::with_config(reader, bridge, last_block, WatcherConfig::default())
    }

    pub fn with_config(
        reader: Arc<dyn ChainReader>,
        bridge: Address,
        last_block: u64,
        config: WatcherConfig,
    ) -> Self {
        Self {
            reader,
            bridge,
            config,
            last_block,
        }
    }

    /// Last block already covered
    pub fn last_block(&self) -> u64 {
        self.last_block
    }

    /// Fetch events between the last seen block and the (confirmed) head.
    ///
    /// The cursor only advances when the fetch succeeds.
    pub async fn poll_once(&mut self) -> Result<Vec<TokenPairSetEvent>> {
        let head = self
            .reader
            .latest_block()
            .await
            .wrap_err("Failed to get latest block")?;
        let safe = head.saturating_sub(self.config.confirmations);
        if safe <= self.last_block {
            return Ok(Vec::new());
        }

        let events = fetch_pair_events_in_range(
            self.reader.as_ref(),
            self.bridge,
            self.last_block + 1,
            safe,
            Some(self.config.max_block_range),
        )
        .await?;

        if !events.is_empty() {
            debug!(
                bridge = %self.bridge,
                count = events.len(),
                from = self.last_block + 1,
                to = safe,
                "Found new TokenPairSet events"
            );
        }
        self.last_block = safe;
        Ok(events)
    }

    /// Poll in the background, sending each non-empty batch.
    ///
    /// The task stops once the receiver is dropped; callers may also abort it.
    pub fn spawn(mut self) -> (JoinHandle<()>, mpsc::UnboundedReceiver<Vec<TokenPairSetEvent>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.config.poll_interval).await;
                if tx.is_closed() {
                    break;
                }
                match self.poll_once().await {
                    Ok(events) if events.is_empty() => {}
                    Ok(events) => {
                        if tx.send(events).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(bridge = %self.bridge, error = %e, "Pair event poll failed");
                    }
                }
            }
        });
        (handle, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;

    const BRIDGE: Address = Address::repeat_byte(0xB0);
    const A: Address = Address::repeat_byte(0x0A);
    const B: Address = Address::repeat_byte(0x0B);

    #[test]
    fn test_watcher_config_default() {
        let config = WatcherConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(4));
        assert_eq!(config.confirmations, 0);
        assert_eq!(config.max_block_range, 10_000);
    }

    #[tokio::test]
    async fn test_poll_once_advances_cursor() {
        let chain = Arc::new(MockChain::new());
        chain.set_block(10);
        chain.push_pair_event_at(BRIDGE, A, B, 5);

        let mut watcher = PairEventWatcher::new(chain.clone(), BRIDGE, 10);
        assert!(watcher.poll_once().await.unwrap().is_empty());

        chain.push_pair_event_at(BRIDGE, A, B, 12);
        let events = watcher.poll_once().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].block_number, 12);
        assert_eq!(watcher.last_block(), 12);

        // Already seen
        assert!(watcher.poll_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_cursor() {
        let chain = Arc::new(MockChain::new());
        chain.set_block(3);
        let mut watcher = PairEventWatcher::new(chain.clone(), BRIDGE, 3);

        chain.push_pair_event_at(BRIDGE, A, B, 4);
        chain.fail_reads(true);
        assert!(watcher.poll_once().await.is_err());
        assert_eq!(watcher.last_block(), 3);

        chain.fail_reads(false);
        assert_eq!(watcher.poll_once().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmations_hold_back_head() {
        let chain = Arc::new(MockChain::new());
        chain.set_block(0);
        let config = WatcherConfig {
            confirmations: 2,
            ..Default::default()
        };
        let mut watcher = PairEventWatcher::with_config(chain.clone(), BRIDGE, 0, config);

        chain.push_pair_event_at(BRIDGE, A, B, 2);
        assert!(watcher.poll_once().await.unwrap().is_empty());

        chain.set_block(4);
        assert_eq!(watcher.poll_once().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_watcher_reports_new_events() {
        let chain = Arc::new(MockChain::new());
        chain.set_block(1);
        let watcher = PairEventWatcher::new(chain.clone(), BRIDGE, 1);
        let (handle, mut rx) = watcher.spawn();

        chain.push_pair_event_at(BRIDGE, A, B, 2);
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch[0].origin_token, A);

        handle.abort();
    }
}
