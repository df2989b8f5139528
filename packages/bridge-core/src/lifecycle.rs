//! Transaction Lifecycle Tracker
//!
//! Drives the origin-chain approval step of a bridge transfer and reports its
//! progress: `pending` once the wallet returns a hash, then exactly one of
//! `confirmed` or `failed`. After a confirmation a one-shot timer signals that
//! balances should be reloaded. The relay itself happens off-chain and is not
//! observed; the timer is a fixed wait, not a settlement check.

use alloy::primitives::{utils::parse_units, Address, TxHash, U256};
use chrono::{SecondsFormat, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::journal::TransactionJournal;
use crate::ports::{ChainReader, TransactionSigner};
use crate::types::{shorten_address, PendingTransaction, TxStatus};

/// Wait between a confirmed approval and the balance refresh signal
pub const BALANCE_REFRESH_DELAY: Duration = Duration::from_secs(30);

/// Convert a user-entered decimal string into smallest token units.
pub fn parse_amount(amount: &str, decimals: u8) -> BridgeResult<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::AmountParse("amount is empty".into()));
    }

    // parse_units truncates extra fraction digits, so precision is checked first
    let mut parts = trimmed.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    if let Some(fraction) = parts.next() {
        if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
            return Err(BridgeError::AmountParse(format!(
                "{:?} is not a valid amount",
                trimmed
            )));
        }
        if fraction.len() > decimals as usize {
            return Err(BridgeError::AmountParse(format!(
                "{:?} has more than {} decimal places",
                trimmed, decimals
            )));
        }
    }

    let parsed = parse_units(trimmed, decimals)
        .map_err(|e| BridgeError::AmountParse(format!("{:?} is not a valid amount: {}", trimmed, e)))?;
    if parsed.is_negative() {
        return Err(BridgeError::AmountParse(format!(
            "{:?} is negative",
            trimmed
        )));
    }
    Ok(parsed.get_absolute())
}

/// Everything the bridge form holds at the moment the user submits
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub user: Option<Address>,
    pub origin_chain_id: String,
    /// Empty when no destination has been chosen
    pub destination_chain_id: String,
    /// Resolved bridge contract for the pair
    pub bridge: Option<Address>,
    pub origin_token: Option<Address>,
    /// Symbol recorded in the journal; falls back to the short token address
    pub token_symbol: Option<String>,
    pub amount: String,
}

impl SubmitRequest {
    /// First missing input, if any
    pub fn missing_precondition(&self) -> Option<&'static str> {
        if self.user.is_none() {
            Some("wallet not connected")
        } else if self.bridge.is_none() {
            Some("bridge contract not resolved")
        } else if self.origin_token.is_none() {
            Some("origin token not selected")
        } else if self.destination_chain_id.trim().is_empty() {
            Some("destination chain not selected")
        } else if self.amount.trim().is_empty() {
            Some("amount is empty")
        } else {
            None
        }
    }
}

/// Notifications produced by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Status(PendingTransaction),
    /// The post-confirmation delay elapsed; reload locked balances
    BalancesRefreshed,
}

/// Successful approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub tx_hash: TxHash,
    /// Approved amount in smallest units
    pub amount: U256,
}

#[derive(Default)]
struct RefreshState {
    deadline: Mutex<Option<Instant>>,
    updated: AtomicBool,
}

/// Clears the in-flight flag however `submit` exits
struct SubmittingGuard<'a>(&'a AtomicBool);

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TransactionTracker {
    signer: Arc<dyn TransactionSigner>,
    /// Origin chain, for `decimals()`
    reader: Arc<dyn ChainReader>,
    journal: Option<Arc<TransactionJournal>>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    refresh_delay: Duration,
    refresh: Arc<RefreshState>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    submitting: AtomicBool,
}

impl TransactionTracker {
    /// Create a tracker and the receiver its lifecycle events arrive on
    pub fn new(
        signer: Arc<dyn TransactionSigner>,
        reader: Arc<dyn ChainReader>,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let tracker = Self {
            signer,
            reader,
            journal: None,
            events,
            refresh_delay: BALANCE_REFRESH_DELAY,
            refresh: Arc::new(RefreshState::default()),
            timers: Mutex::new(Vec::new()),
            submitting: AtomicBool::new(false),
        };
        (tracker, rx)
    }

    /// Append every status record to `journal`
    pub fn with_journal(mut self, journal: Arc<TransactionJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// True while an approval is between submission and its terminal status
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// Time left before the balance refresh fires, if one is scheduled
    pub fn refresh_countdown(&self) -> Option<Duration> {
        let deadline = *self
            .refresh
            .deadline
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the last refresh timer has fired since the form last changed
    pub fn balances_updated(&self) -> bool {
        self.refresh.updated.load(Ordering::SeqCst)
    }

    /// Clear the "balances updated" marker (selection, token or amount changed)
    pub fn reset_balances_updated(&self) {
        self.refresh.updated.store(false, Ordering::SeqCst);
    }

    /// Approve the bridge contract to spend the requested amount.
    ///
    /// Precondition and amount errors return before the wallet is touched and
    /// emit nothing. Wallet rejection or an on-chain revert emits `failed` and
    /// returns [`BridgeError::Submission`].
    pub async fn submit(&self, request: &SubmitRequest) -> BridgeResult<SubmitOutcome> {
        if let Some(missing) = request.missing_precondition() {
            error!(reason = missing, "Invalid bridge parameters");
            return Err(BridgeError::Precondition(missing));
        }
        let (Some(user), Some(bridge), Some(token)) =
            (request.user, request.bridge, request.origin_token)
        else {
            return Err(BridgeError::Precondition("incomplete request"));
        };

        self.submitting.store(true, Ordering::SeqCst);
        let _guard = SubmittingGuard(&self.submitting);

        let decimals = self.reader.token_decimals(token).await.map_err(|e| {
            warn!(token = %token, error = %e, "Failed to read token decimals");
            BridgeError::AmountParse(format!("could not read decimals of {}: {:#}", token, e))
        })?;
        let amount = parse_amount(&request.amount, decimals)?;

        let symbol = request
            .token_symbol
            .clone()
            .unwrap_or_else(|| shorten_address(&token));
        let entry = |hash: Option<String>, status: TxStatus| PendingTransaction {
            hash,
            from_chain_id: request.origin_chain_id.clone(),
            to_chain_id: request.destination_chain_id.clone(),
            token_symbol: symbol.clone(),
            amount: request.amount.trim().to_string(),
            status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_address: user.to_string(),
        };

        let tx_hash = match self.signer.approve(token, bridge, amount).await {
            Ok(hash) => hash,
            Err(e) => {
                error!(token = %token, bridge = %bridge, error = %e, "Approval was not sent");
                // No hash exists yet; the failure is still journaled
                self.record(entry(None, TxStatus::Failed));
                return Err(BridgeError::Submission(format!("{:#}", e)));
            }
        };
        let hash_str = tx_hash.to_string();

        info!(tx_hash = %hash_str, token = %token, amount = %amount, "Approval transaction sent");
        self.record(entry(Some(hash_str.clone()), TxStatus::Pending));

        match self.signer.wait_for_inclusion(tx_hash).await {
            Ok(true) => {
                info!(tx_hash = %hash_str, "Tokens approved for bridge contract");
                self.record(entry(Some(hash_str), TxStatus::Confirmed));
                self.schedule_refresh();
                Ok(SubmitOutcome { tx_hash, amount })
            }
            Ok(false) => {
                error!(tx_hash = %hash_str, "Approval transaction reverted");
                self.record(entry(Some(hash_str), TxStatus::Failed));
                Err(BridgeError::Submission("approval transaction reverted".into()))
            }
            Err(e) => {
                error!(tx_hash = %hash_str, error = %e, "Error during bridge operation");
                self.record(entry(Some(hash_str), TxStatus::Failed));
                Err(BridgeError::Submission(format!("{:#}", e)))
            }
        }
    }

    fn record(&self, tx: PendingTransaction) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(tx.clone()) {
                warn!(error = %e, "Failed to journal transaction status");
            }
        }
        let _ = self.events.send(LifecycleEvent::Status(tx));
    }

    fn schedule_refresh(&self) {
        let deadline = Instant::now() + self.refresh_delay;
        *self
            .refresh
            .deadline
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(deadline);
        self.refresh.updated.store(false, Ordering::SeqCst);

        let refresh = self.refresh.clone();
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            info!("Updating token balances");
            refresh.updated.store(true, Ordering::SeqCst);
            {
                let mut current = refresh.deadline.lock().unwrap_or_else(|p| p.into_inner());
                // A later confirmation owns the countdown now
                if *current == Some(deadline) {
                    *current = None;
                }
            }
            let _ = events.send(LifecycleEvent::BalancesRefreshed);
        });

        let mut timers = self.timers.lock().unwrap_or_else(|p| p.into_inner());
        timers.retain(|h| !h.is_finished());
        timers.push(handle);
    }
}

impl Drop for TransactionTracker {
    fn drop(&mut self) {
        let timers = self.timers.get_mut().unwrap_or_else(|p| p.into_inner());
        for handle in timers.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{ApproveOutcome, InclusionOutcome, MockChain, MockWallet};

    const USER: Address = Address::repeat_byte(0x55);
    const BRIDGE: Address = Address::repeat_byte(0xB0);
    const TOKEN: Address = Address::repeat_byte(0x0A);

    fn request(amount: &str) -> SubmitRequest {
        SubmitRequest {
            user: Some(USER),
            origin_chain_id: "11155111".into(),
            destination_chain_id: "5318008".into(),
            bridge: Some(BRIDGE),
            origin_token: Some(TOKEN),
            token_symbol: Some("USDC".into()),
            amount: amount.into(),
        }
    }

    fn setup() -> (
        Arc<MockWallet>,
        TransactionTracker,
        mpsc::UnboundedReceiver<LifecycleEvent>,
    ) {
        let wallet = Arc::new(MockWallet::new(Some(USER)));
        let chain = Arc::new(MockChain::new());
        chain.set_token(TOKEN, "USDC", "USD Coin", 6);
        let (tracker, rx) = TransactionTracker::new(wallet.clone(), chain);
        (wallet, tracker, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    fn statuses(events: &[LifecycleEvent]) -> Vec<(Option<String>, TxStatus)> {
        events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Status(tx) => Some((tx.hash.clone(), tx.status)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12.5", 6).unwrap(), U256::from(12_500_000u64));
        assert_eq!(parse_amount("10", 6).unwrap(), U256::from(10_000_000u64));
        assert_eq!(
            parse_amount(" 1 ", 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert_eq!(parse_amount("0.000001", 6).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_amount_rejects_invalid_input() {
        assert!(matches!(parse_amount("abc", 6), Err(BridgeError::AmountParse(_))));
        assert!(matches!(parse_amount("", 6), Err(BridgeError::AmountParse(_))));
        assert!(matches!(parse_amount("-5", 6), Err(BridgeError::AmountParse(_))));
        assert!(matches!(parse_amount(".", 6), Err(BridgeError::AmountParse(_))));
        assert!(matches!(parse_amount("1.2.3", 6), Err(BridgeError::AmountParse(_))));
    }

    #[test]
    fn test_parse_amount_rejects_excess_precision() {
        assert!(matches!(
            parse_amount("1.1234567", 6),
            Err(BridgeError::AmountParse(_))
        ));
        assert!(matches!(
            parse_amount("0.0000001", 6),
            Err(BridgeError::AmountParse(_))
        ));
        assert!(matches!(parse_amount("1.5", 0), Err(BridgeError::AmountParse(_))));

        assert_eq!(parse_amount("1.123456", 6).unwrap(), U256::from(1_123_456u64));
        assert_eq!(parse_amount("0", 6).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_missing_preconditions() {
        assert!(request("1").missing_precondition().is_none());

        let mut r = request("1");
        r.bridge = None;
        assert_eq!(r.missing_precondition(), Some("bridge contract not resolved"));

        let mut r = request("1");
        r.origin_token = None;
        assert_eq!(r.missing_precondition(), Some("origin token not selected"));

        let mut r = request("1");
        r.destination_chain_id = String::new();
        assert_eq!(r.missing_precondition(), Some("destination chain not selected"));

        assert_eq!(request("  ").missing_precondition(), Some("amount is empty"));
    }

    #[tokio::test]
    async fn test_precondition_failure_has_no_side_effects() {
        let (wallet, tracker, mut rx) = setup();
        let mut r = request("10");
        r.origin_token = None;

        let err = tracker.submit(&r).await.unwrap_err();
        assert!(matches!(err, BridgeError::Precondition(_)));
        assert!(drain(&mut rx).is_empty());
        assert!(wallet.approvals().is_empty());
        assert!(!tracker.is_submitting());
    }

    #[tokio::test]
    async fn test_invalid_amount_blocks_wallet() {
        let (wallet, tracker, mut rx) = setup();
        let err = tracker.submit(&request("abc")).await.unwrap_err();
        assert!(matches!(err, BridgeError::AmountParse(_)));
        assert!(drain(&mut rx).is_empty());
        assert!(wallet.approvals().is_empty());
    }

    #[tokio::test]
    async fn test_excess_precision_blocks_wallet() {
        let (wallet, tracker, mut rx) = setup();
        for amount in ["1.1234567", "0.0000001"] {
            let err = tracker.submit(&request(amount)).await.unwrap_err();
            assert!(matches!(err, BridgeError::AmountParse(_)));
        }
        assert!(drain(&mut rx).is_empty());
        assert!(wallet.approvals().is_empty());
        assert!(!tracker.is_submitting());
    }

    #[tokio::test]
    async fn test_decimals_failure_is_amount_error() {
        let wallet = Arc::new(MockWallet::new(Some(USER)));
        let chain = Arc::new(MockChain::new()); // token unknown: decimals() reverts
        let (tracker, mut rx) = TransactionTracker::new(wallet.clone(), chain);

        let err = tracker.submit(&request("1")).await.unwrap_err();
        assert!(matches!(err, BridgeError::AmountParse(_)));
        assert!(drain(&mut rx).is_empty());
        assert!(wallet.approvals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_then_refresh_after_delay() {
        let (wallet, tracker, mut rx) = setup();
        let hash = TxHash::repeat_byte(0xAB);
        wallet.set_approve(ApproveOutcome::Sign(hash));

        let outcome = tracker.submit(&request("10")).await.unwrap();
        assert_eq!(outcome.tx_hash, hash);
        assert_eq!(outcome.amount, U256::from(10_000_000u64));
        assert_eq!(
            wallet.approvals()[0].spender,
            BRIDGE,
            "bridge contract is the spender"
        );

        let events = drain(&mut rx);
        assert_eq!(
            statuses(&events),
            vec![
                (Some(hash.to_string()), TxStatus::Pending),
                (Some(hash.to_string()), TxStatus::Confirmed),
            ]
        );
        assert!(!tracker.balances_updated());
        assert_eq!(tracker.refresh_countdown(), Some(BALANCE_REFRESH_DELAY));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(tracker.refresh_countdown(), Some(Duration::from_secs(20)));
        assert!(drain(&mut rx).is_empty());

        assert_eq!(rx.recv().await, Some(LifecycleEvent::BalancesRefreshed));
        assert!(tracker.balances_updated());
        assert!(tracker.refresh_countdown().is_none());

        tracker.reset_balances_updated();
        assert!(!tracker.balances_updated());
    }

    #[tokio::test]
    async fn test_wallet_rejection_records_failed_without_hash() {
        let (wallet, tracker, mut rx) = setup();
        wallet.set_approve(ApproveOutcome::Reject("User denied transaction signature".into()));

        let err = tracker.submit(&request("10")).await.unwrap_err();
        assert!(matches!(err, BridgeError::Submission(_)));
        assert_eq!(statuses(&drain(&mut rx)), vec![(None, TxStatus::Failed)]);
        assert!(tracker.refresh_countdown().is_none());
        assert!(!tracker.is_submitting());
    }

    #[tokio::test]
    async fn test_revert_records_pending_then_failed() {
        let (wallet, tracker, mut rx) = setup();
        wallet.set_inclusion(InclusionOutcome::Revert);

        let err = tracker.submit(&request("10")).await.unwrap_err();
        assert!(matches!(err, BridgeError::Submission(_)));
        let seen: Vec<_> = statuses(&drain(&mut rx)).into_iter().map(|(_, s)| s).collect();
        assert_eq!(seen, vec![TxStatus::Pending, TxStatus::Failed]);
    }

    #[tokio::test]
    async fn test_receipt_error_records_failed() {
        let (wallet, tracker, mut rx) = setup();
        wallet.set_inclusion(InclusionOutcome::Error("replacement transaction underpriced".into()));

        assert!(tracker.submit(&request("10")).await.is_err());
        let seen: Vec<_> = statuses(&drain(&mut rx)).into_iter().map(|(_, s)| s).collect();
        assert_eq!(seen, vec![TxStatus::Pending, TxStatus::Failed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_submitting_while_waiting_for_receipt() {
        let (wallet, tracker, _rx) = setup();
        wallet.set_inclusion_delay(Duration::from_secs(5));
        let tracker = Arc::new(tracker);

        let t = tracker.clone();
        let task = tokio::spawn(async move { t.submit(&request("1")).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(tracker.is_submitting());

        task.await.unwrap().unwrap();
        assert!(!tracker.is_submitting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_tracker_discards_pending_refresh() {
        let (_wallet, tracker, mut rx) = setup();
        tracker.submit(&request("1")).await.unwrap();
        assert_eq!(drain(&mut rx).len(), 2);

        drop(tracker);
        tokio::time::sleep(BALANCE_REFRESH_DELAY * 2).await;
        // All senders are gone and the refresh never fired
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_statuses_are_journaled_newest_first() {
        let (_wallet, tracker, _rx) = setup();
        let journal = Arc::new(TransactionJournal::new(Arc::new(MemoryStore::new())));
        let tracker = tracker.with_journal(journal.clone());

        tracker.submit(&request("2.5")).await.unwrap();

        let history = journal.load_all(&USER.to_string()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, TxStatus::Confirmed);
        assert_eq!(history[1].status, TxStatus::Pending);
        assert_eq!(history[0].hash, history[1].hash);
        assert_eq!(history[0].amount, "2.5");
        assert_eq!(history[0].token_symbol, "USDC");
        assert_eq!(history[0].from_chain_id, "11155111");
        assert_eq!(history[0].to_chain_id, "5318008");
    }
}
