//! Chain Context Resolver
//!
//! Works out which chain the wallet is on and what to call it. The wallet's
//! own chain info is preferred; when it reports `"unknown"` (typical right
//! after adding a custom network) the provider is asked directly.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chains;
use crate::ports::{WalletEvent, WalletSession};

pub const NOT_CONNECTED: &str = "Not Connected";
pub const UNKNOWN_CHAIN: &str = "Unknown Chain";

/// Delay before re-resolving after a chain change, giving the wallet's own
/// chain info time to catch up before falling back to the provider
pub const DEFAULT_CHAIN_CHANGE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Resolved chain for display and routing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChainContext {
    /// Decimal chain id, empty when unknown or disconnected
    pub id: String,
    pub display_name: String,
}

impl ChainContext {
    fn not_connected() -> Self {
        Self {
            id: String::new(),
            display_name: NOT_CONNECTED.to_string(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.display_name != NOT_CONNECTED
    }
}

fn is_unknown(name: &str) -> bool {
    name.trim().is_empty() || name.eq_ignore_ascii_case("unknown")
}

/// Resolve the wallet's current chain.
pub async fn resolve_current_chain(wallet: &dyn WalletSession) -> ChainContext {
    if wallet.address().is_none() {
        return ChainContext::not_connected();
    }

    let primary = wallet.chain();
    if let Some(chain) = &primary {
        if !is_unknown(&chain.name) {
            return ChainContext {
                id: chain.chain_id.to_string(),
                display_name: chain.name.clone(),
            };
        }
    }

    // Primary source has no usable name: ask the provider
    let primary_id = primary.map(|c| c.chain_id.to_string()).unwrap_or_default();
    match wallet.provider_network().await {
        Ok(network) => {
            let id = network.chain_id.to_string();
            let display_name = match network.name.filter(|n| !is_unknown(n)) {
                Some(name) => name,
                None => match chains::lookup(&id) {
                    Some(known) => known.name.to_string(),
                    None => format!("Chain ID: {}", id),
                },
            };
            debug!(chain_id = %id, name = %display_name, "Resolved chain via provider fallback");
            ChainContext { id, display_name }
        }
        Err(e) => {
            warn!(error = %e, "Provider network lookup failed");
            ChainContext {
                id: primary_id,
                display_name: UNKNOWN_CHAIN.to_string(),
            }
        }
    }
}

/// Keeps a [`ChainContext`] current as the wallet switches networks.
pub struct ChainContextWatcher {
    receiver: watch::Receiver<ChainContext>,
    handle: JoinHandle<()>,
}

impl ChainContextWatcher {
    /// Resolve once, then re-resolve `debounce` after every wallet event.
    pub async fn spawn(wallet: Arc<dyn WalletSession>, debounce: Duration) -> Self {
        let mut events = wallet.subscribe();
        let initial = resolve_current_chain(wallet.as_ref()).await;
        let (tx, receiver) = watch::channel(initial);

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let WalletEvent::ChainChanged(raw) = &event {
                            debug!(chain_id = %raw, "Wallet chain changed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Chain watcher lagged, re-resolving");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                tokio::time::sleep(debounce).await;
                // Collapse events that arrived during the debounce window
                while let Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) =
                    events.try_recv()
                {}

                let context = resolve_current_chain(wallet.as_ref()).await;
                tx.send_if_modified(|current| {
                    if *current != context {
                        *current = context;
                        true
                    } else {
                        false
                    }
                });
            }
        });

        Self { receiver, handle }
    }

    pub fn current(&self) -> ChainContext {
        self.receiver.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChainContext> {
        self.receiver.clone()
    }
}

impl Drop for ChainContextWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{NetworkInfo, WalletChain};
    use crate::testing::MockWallet;
    use alloy::primitives::Address;

    fn connected() -> MockWallet {
        MockWallet::new(Some(Address::repeat_byte(0xAA)))
    }

    #[tokio::test]
    async fn test_not_connected() {
        let wallet = MockWallet::new(None);
        let ctx = resolve_current_chain(&wallet).await;
        assert_eq!(ctx.display_name, NOT_CONNECTED);
        assert!(ctx.id.is_empty());
        assert!(!ctx.is_connected());
    }

    #[tokio::test]
    async fn test_known_chain_from_primary_source() {
        let wallet = connected();
        wallet.set_chain(Some(WalletChain {
            chain_id: 11155111,
            name: "Sepolia".into(),
        }));
        let ctx = resolve_current_chain(&wallet).await;
        assert_eq!(ctx.id, "11155111");
        assert_eq!(ctx.display_name, "Sepolia");
        assert_eq!(wallet.provider_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_name_uses_provider_fallback() {
        let wallet = connected();
        wallet.set_chain(Some(WalletChain {
            chain_id: 5318008,
            name: "unknown".into(),
        }));
        wallet.set_network(Ok(NetworkInfo {
            chain_id: 5318008,
            name: Some("kopli".into()),
        }));
        let ctx = resolve_current_chain(&wallet).await;
        assert_eq!(ctx.id, "5318008");
        assert_eq!(ctx.display_name, "kopli");
        assert_eq!(wallet.provider_calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_without_name_uses_registry_then_id() {
        let wallet = connected();
        wallet.set_chain(None);
        wallet.set_network(Ok(NetworkInfo {
            chain_id: 5318008,
            name: None,
        }));
        let ctx = resolve_current_chain(&wallet).await;
        assert_eq!(ctx.display_name, "Reactive-Kopli-Testnet");

        wallet.set_network(Ok(NetworkInfo {
            chain_id: 424242,
            name: Some("unknown".into()),
        }));
        let ctx = resolve_current_chain(&wallet).await;
        assert_eq!(ctx.id, "424242");
        assert_eq!(ctx.display_name, "Chain ID: 424242");
    }

    #[tokio::test]
    async fn test_fallback_failure_reports_unknown_chain() {
        let wallet = connected();
        wallet.set_chain(Some(WalletChain {
            chain_id: 777,
            name: "unknown".into(),
        }));
        wallet.set_network(Err("provider unavailable".into()));
        let ctx = resolve_current_chain(&wallet).await;
        assert_eq!(ctx.display_name, UNKNOWN_CHAIN);
        assert_eq!(ctx.id, "777");

        wallet.set_chain(None);
        let ctx = resolve_current_chain(&wallet).await;
        assert_eq!(ctx.display_name, UNKNOWN_CHAIN);
        assert!(ctx.id.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_re_resolves_after_debounce() {
        let wallet = Arc::new(connected());
        wallet.set_chain(Some(WalletChain {
            chain_id: 11155111,
            name: "Sepolia".into(),
        }));

        let watcher =
            ChainContextWatcher::spawn(wallet.clone(), DEFAULT_CHAIN_CHANGE_DEBOUNCE).await;
        assert_eq!(watcher.current().id, "11155111");
        let mut rx = watcher.subscribe();

        wallet.set_chain(Some(WalletChain {
            chain_id: 137,
            name: "Polygon".into(),
        }));
        wallet.emit(WalletEvent::ChainChanged("0x89".into()));

        // Nothing applied before the debounce window elapses
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(watcher.current().id, "11155111");

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().id, "137");
        assert_eq!(rx.borrow().display_name, "Polygon");
    }
}
