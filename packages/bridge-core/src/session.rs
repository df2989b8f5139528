//! Bridge Session
//!
//! Per-selection state for the bridge form: the resolved contract, the token
//! pair list and the locked balances, plus loading and error flags. State is
//! published through a `watch` channel so any number of views can follow it.
//!
//! Every selection change, refresh or live pair update takes a new generation
//! number. A load only writes its result back if its generation is still the
//! latest one issued, so a slow response for an old chain pair can never
//! overwrite the current one.

use alloy::primitives::Address;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::balances::load_locked_balances;
use crate::discovery::{discover_pairs, resolve_metadata, LogScanConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::SubmitRequest;
use crate::ports::{ChainConnector, ChainReader};
use crate::routes::{canonical_chain_id, RouteTable};
use crate::types::{LockedBalances, TokenPair};
use crate::watcher::{PairEventWatcher, WatcherConfig};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Historical `TokenPairSet` scan
    pub scan: LogScanConfig,
    /// Live pair updates; `None` disables the watcher
    pub pair_watch: Option<WatcherConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan: LogScanConfig::default(),
            pair_watch: Some(WatcherConfig::default()),
        }
    }
}

/// What the bridge form shows for the current chain pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub origin_chain_id: String,
    pub destination_chain_id: String,
    /// Bridge contract for the pair, `None` when unsupported or unselected
    pub bridge: Option<Address>,
    pub pairs: Vec<TokenPair>,
    pub balances: LockedBalances,
    pub loading: bool,
    /// Inline error text
    pub error: Option<String>,
}

impl SessionSnapshot {
    /// Pair whose origin token is `token`
    pub fn pair(&self, token: Address) -> Option<&TokenPair> {
        self.pairs.iter().find(|p| p.origin_token == token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selection {
    origin: String,
    destination: String,
    user: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// New chain pair or user: start from empty
    Select,
    /// Same selection, keep showing the old data while loading
    Refresh,
}

struct Loaded {
    pairs: Vec<TokenPair>,
    balances: LockedBalances,
    head: u64,
    origin: Arc<dyn ChainReader>,
}

struct SessionInner {
    routes: RouteTable,
    connector: Arc<dyn ChainConnector>,
    config: SessionConfig,
    generation: AtomicU64,
    state: watch::Sender<SessionSnapshot>,
    selection: Mutex<Option<Selection>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl SessionInner {
    /// Write to the snapshot if `generation` is still the latest issued
    fn apply(&self, generation: u64, f: impl FnOnce(&mut SessionSnapshot)) -> bool {
        self.state.send_if_modified(|snapshot| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            f(snapshot);
            true
        })
    }

    fn stop_watcher(&self) {
        if let Some(handle) = self
            .watcher
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            handle.abort();
        }
    }

    async fn run(self: Arc<Self>, selection: Selection, trigger: Trigger) -> BridgeResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if trigger == Trigger::Select {
            self.stop_watcher();
        }

        let bridge = if selection.destination.is_empty() {
            None
        } else {
            self.routes
                .get_contract_address(&selection.origin, &selection.destination)
        };

        self.apply(generation, |s| {
            s.generation = generation;
            s.origin_chain_id = selection.origin.clone();
            s.destination_chain_id = selection.destination.clone();
            s.bridge = bridge;
            s.loading = bridge.is_some();
            s.error = None;
            if trigger == Trigger::Select || bridge.is_none() {
                s.pairs.clear();
                s.balances.clear();
            }
        });

        if selection.destination.is_empty() {
            return Ok(());
        }
        let Some(bridge) = bridge else {
            let err = BridgeError::RouteNotFound {
                origin: selection.origin.clone(),
                destination: selection.destination.clone(),
            };
            warn!(
                origin = %selection.origin,
                destination = %selection.destination,
                "No bridge contract for chain pair"
            );
            self.apply(generation, |s| s.error = Some(err.user_message()));
            return Err(err);
        };

        debug!(generation, bridge = %bridge, "Loading token pairs");
        match self.load(&selection, bridge).await {
            Ok(loaded) => {
                let Loaded {
                    pairs,
                    balances,
                    head,
                    origin,
                } = loaded;
                let applied = self.apply(generation, |s| {
                    s.pairs = pairs;
                    s.balances = balances;
                    s.loading = false;
                });
                if applied {
                    self.start_watcher(origin, bridge, head, selection);
                } else {
                    debug!(generation, "Discarding stale discovery result");
                }
                Ok(())
            }
            Err(e) => {
                self.apply(generation, |s| {
                    s.pairs.clear();
                    s.balances.clear();
                    s.loading = false;
                    s.error = Some(e.user_message());
                });
                Err(e)
            }
        }
    }

    fn run_boxed(self: Arc<Self>, selection: Selection) -> BoxFuture<'static, BridgeResult<()>> {
        Box::pin(self.run(selection, Trigger::Refresh))
    }

    async fn load(&self, selection: &Selection, bridge: Address) -> BridgeResult<Loaded> {
        let connect = |chain_id: &str| {
            self.connector
                .reader(chain_id)
                .map_err(|e| BridgeError::Discovery(format!("{:#}", e)))
        };
        let origin = connect(&selection.origin)?;
        let destination = connect(&selection.destination)?;

        // Taken before the scan so the watcher never skips a block
        let head = origin
            .latest_block()
            .await
            .map_err(|e| BridgeError::Discovery(format!("{:#}", e)))?;

        let pairs = discover_pairs(origin.as_ref(), bridge, &self.config.scan).await?;
        let pairs = resolve_metadata(pairs, origin.as_ref(), destination.as_ref()).await;
        let balances =
            load_locked_balances(origin.as_ref(), bridge, &pairs, selection.user).await?;

        info!(
            bridge = %bridge,
            pairs = pairs.len(),
            locked = balances.len(),
            "Bridge state loaded"
        );
        Ok(Loaded {
            pairs,
            balances,
            head,
            origin,
        })
    }

    fn start_watcher(
        self: &Arc<Self>,
        origin: Arc<dyn ChainReader>,
        bridge: Address,
        head: u64,
        selection: Selection,
    ) {
        let Some(config) = self.config.pair_watch.clone() else {
            return;
        };
        let mut slot = self.watcher.lock().unwrap_or_else(|p| p.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let (poller, mut batches) =
            PairEventWatcher::with_config(origin, bridge, head, config).spawn();
        let session: Weak<SessionInner> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(events) = batches.recv().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                info!(bridge = %bridge, count = events.len(), "Token pairs changed, reloading");
                if let Err(e) = session.run_boxed(selection.clone()).await {
                    warn!(error = %e, "Reload after TokenPairSet failed");
                }
            }
            poller.abort();
        });
        *slot = Some(handle);
    }
}

/// State holder for one bridge form
pub struct BridgeSession {
    inner: Arc<SessionInner>,
}

impl BridgeSession {
    pub fn new(routes: RouteTable, connector: Arc<dyn ChainConnector>) -> Self {
        Self::with_config(routes, connector, SessionConfig::default())
    }

    pub fn with_config(
        routes: RouteTable,
        connector: Arc<dyn ChainConnector>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(SessionInner {
                routes,
                connector,
                config,
                generation: AtomicU64::new(0),
                state,
                selection: Mutex::new(None),
                watcher: Mutex::new(None),
            }),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// Current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Follow state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Latest generation handed out
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Switch to a chain pair and load its pairs and balances.
    ///
    /// An empty `destination` clears the form without error. A pair with no
    /// deployed contract sets the route error and returns
    /// [`BridgeError::RouteNotFound`].
    pub async fn select(
        &self,
        origin: &str,
        destination: &str,
        user: Option<Address>,
    ) -> BridgeResult<()> {
        let selection = Selection {
            origin: canonical_chain_id(origin),
            destination: canonical_chain_id(destination),
            user,
        };
        *self
            .inner
            .selection
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(selection.clone());
        self.inner.clone().run(selection, Trigger::Select).await
    }

    /// Reload the current selection (e.g. once the post-approval delay elapses)
    pub async fn refresh(&self) -> BridgeResult<()> {
        let selection = self
            .inner
            .selection
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        match selection {
            Some(selection) => self.inner.clone().run(selection, Trigger::Refresh).await,
            None => Ok(()),
        }
    }

    /// Build a submission from the form inputs and the current state
    pub fn submit_request(
        &self,
        user: Option<Address>,
        origin_token: Option<Address>,
        amount: &str,
    ) -> SubmitRequest {
        let snapshot = self.snapshot();
        let token_symbol = origin_token
            .and_then(|t| snapshot.pair(t))
            .and_then(|p| p.origin.symbol.clone());
        SubmitRequest {
            user,
            origin_chain_id: snapshot.origin_chain_id,
            destination_chain_id: snapshot.destination_chain_id,
            bridge: snapshot.bridge,
            origin_token,
            token_symbol,
            amount: amount.to_string(),
        }
    }

    /// Whether the submit control should be enabled.
    ///
    /// Disabled while loading, on a route or discovery error, while an
    /// approval is in flight, or when any form input is missing.
    pub fn can_submit(&self, request: &SubmitRequest, in_flight: bool) -> bool {
        let snapshot = self.snapshot();
        !in_flight
            && !snapshot.loading
            && snapshot.error.is_none()
            && snapshot.bridge.is_some()
            && request.bridge == snapshot.bridge
            && request.missing_precondition().is_none()
            && request
                .origin_token
                .is_some_and(|t| snapshot.pair(t).is_some())
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.inner.stop_watcher();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::SEPOLIA_KOPLI_BRIDGE;
    use crate::testing::{MockChain, MockConnector};
    use alloy::primitives::U256;
    use std::time::Duration;

    const USER: Address = Address::repeat_byte(0x55);
    const A: Address = Address::repeat_byte(0x0A);
    const B: Address = Address::repeat_byte(0x0B);
    const C: Address = Address::repeat_byte(0x0C);
    const D: Address = Address::repeat_byte(0x0D);

    struct Fixture {
        sepolia: Arc<MockChain>,
        kopli: Arc<MockChain>,
        connector: MockConnector,
    }

    fn fixture() -> Fixture {
        let sepolia = Arc::new(MockChain::new());
        let kopli = Arc::new(MockChain::new());
        sepolia.set_block(100);
        sepolia.register_pair(SEPOLIA_KOPLI_BRIDGE, A, B);
        sepolia.set_token(A, "USDC", "USD Coin", 6);
        kopli.set_token(B, "kUSDC", "Kopli USD Coin", 6);
        sepolia.set_locked(SEPOLIA_KOPLI_BRIDGE, USER, A, U256::from(7_000_000u64));

        let connector = MockConnector::new()
            .with_chain("11155111", sepolia.clone())
            .with_chain("5318008", kopli.clone());
        Fixture {
            sepolia,
            kopli,
            connector,
        }
    }

    fn no_watch() -> SessionConfig {
        SessionConfig {
            pair_watch: None,
            ..Default::default()
        }
    }

    fn session(f: &Fixture) -> BridgeSession {
        BridgeSession::with_config(RouteTable::builtin(), Arc::new(f.connector.clone()), no_watch())
    }

    #[tokio::test]
    async fn test_select_loads_pairs_and_balances() {
        let f = fixture();
        let session = session(&f);

        session.select("11155111", "5318008", Some(USER)).await.unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.bridge, Some(SEPOLIA_KOPLI_BRIDGE));
        assert!(!snap.loading);
        assert!(snap.error.is_none());
        assert_eq!(snap.pairs.len(), 1);
        assert_eq!(snap.pairs[0].origin.symbol.as_deref(), Some("USDC"));
        assert_eq!(snap.pairs[0].destination.symbol.as_deref(), Some("kUSDC"));
        assert_eq!(snap.balances.get(&A), Some(&U256::from(7_000_000u64)));
    }

    #[tokio::test]
    async fn test_hex_chain_id_selects_same_route() {
        let f = fixture();
        let session = session(&f);

        session.select("0xaa36a7", "5318008", None).await.unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.origin_chain_id, "11155111");
        assert_eq!(snap.bridge, Some(SEPOLIA_KOPLI_BRIDGE));
        assert!(snap.balances.is_empty(), "no user, no balances");
    }

    #[tokio::test]
    async fn test_unknown_route_sets_error() {
        let f = fixture();
        let session = session(&f);

        let err = session.select("5318008", "11155111", Some(USER)).await.unwrap_err();
        assert!(matches!(err, BridgeError::RouteNotFound { .. }));
        let snap = session.snapshot();
        assert_eq!(
            snap.error.as_deref(),
            Some("No bridge contract available for selected chain pair")
        );
        assert!(snap.bridge.is_none());
        assert!(snap.pairs.is_empty());
        assert!(!snap.loading);
    }

    #[tokio::test]
    async fn test_empty_destination_clears_without_error() {
        let f = fixture();
        let session = session(&f);
        session.select("11155111", "5318008", Some(USER)).await.unwrap();

        session.select("11155111", "", Some(USER)).await.unwrap();
        let snap = session.snapshot();
        assert!(snap.error.is_none());
        assert!(snap.bridge.is_none());
        assert!(snap.pairs.is_empty());
        assert!(snap.balances.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_failure_resets_state() {
        let f = fixture();
        let session = session(&f);
        session.select("11155111", "5318008", Some(USER)).await.unwrap();
        assert_eq!(session.snapshot().pairs.len(), 1);

        f.sepolia.fail_reads(true);
        let err = session.refresh().await.unwrap_err();
        assert!(matches!(err, BridgeError::Discovery(_)));

        let snap = session.snapshot();
        assert_eq!(snap.error.as_deref(), Some("Failed to load token pairs"));
        assert!(snap.pairs.is_empty());
        assert!(snap.balances.is_empty());
        assert!(!snap.loading);
    }

    #[tokio::test]
    async fn test_missing_destination_metadata_degrades() {
        let f = fixture();
        f.sepolia.register_pair(SEPOLIA_KOPLI_BRIDGE, C, D);
        f.kopli.fail_reads(true);
        let session = session(&f);

        session.select("11155111", "5318008", Some(USER)).await.unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.pairs.len(), 2);
        assert!(snap.error.is_none());
        assert_eq!(
            snap.pairs[1].destination.symbol,
            Some(crate::types::shorten_address(&D))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_selection_result_is_discarded() {
        let f = fixture();
        let ethereum = Arc::new(MockChain::new());
        let other_bridge = Address::repeat_byte(0xE1);
        ethereum.register_pair(other_bridge, C, D);
        let connector = f.connector.clone().with_chain("1", ethereum);
        let routes = RouteTable::builtin().with_route("1", "5318008", other_bridge);
        let session = Arc::new(BridgeSession::with_config(
            routes,
            Arc::new(connector),
            no_watch(),
        ));

        // First selection is slow to answer
        f.sepolia.set_delay(Some(Duration::from_secs(5)));
        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.select("11155111", "5318008", Some(USER)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        session.select("1", "5318008", Some(USER)).await.unwrap();
        slow.await.unwrap().unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.origin_chain_id, "1");
        assert_eq!(snap.bridge, Some(other_bridge));
        assert_eq!(snap.pairs.len(), 1);
        assert_eq!(snap.pairs[0].origin_token, C);
        assert_eq!(snap.generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_pair_event_triggers_reload() {
        let f = fixture();
        let config = SessionConfig {
            pair_watch: Some(WatcherConfig {
                poll_interval: Duration::from_secs(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        let session =
            BridgeSession::with_config(RouteTable::builtin(), Arc::new(f.connector.clone()), config);
        session.select("11155111", "5318008", Some(USER)).await.unwrap();
        let mut rx = session.subscribe();

        f.sepolia.set_block(101);
        f.sepolia.register_pair(SEPOLIA_KOPLI_BRIDGE, C, D);

        let snap = tokio::time::timeout(
            Duration::from_secs(10),
            rx.wait_for(|s| s.pairs.len() == 2 && !s.loading),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(snap.pairs[1].origin_token, C);
    }

    #[tokio::test]
    async fn test_can_submit_rules() {
        let f = fixture();
        let session = session(&f);
        session.select("11155111", "5318008", Some(USER)).await.unwrap();

        let request = session.submit_request(Some(USER), Some(A), "10");
        assert_eq!(request.token_symbol.as_deref(), Some("USDC"));
        assert_eq!(request.bridge, Some(SEPOLIA_KOPLI_BRIDGE));
        assert!(session.can_submit(&request, false));
        assert!(!session.can_submit(&request, true), "approval in flight");

        let empty_amount = session.submit_request(Some(USER), Some(A), "");
        assert!(!session.can_submit(&empty_amount, false));

        let unknown_token = session.submit_request(Some(USER), Some(C), "10");
        assert!(!session.can_submit(&unknown_token, false));

        session.select("5318008", "11155111", Some(USER)).await.unwrap_err();
        let no_route = session.submit_request(Some(USER), Some(A), "10");
        assert!(!session.can_submit(&no_route, false));
    }
}
