//! Subcommand handlers
//!
//! Each handler wires the bridge core to the RPC endpoints from [`Config`] and
//! prints a plain-text view of what the bridge form would show.

use alloy::primitives::Address;
use bridge_core::chain_context::NOT_CONNECTED;
use bridge_core::evm::{format_token_amount, EvmWallet, RpcConnector};
use bridge_core::{
    chains, canonical_chain_id, resolve_current_chain, BridgeSession, ChainConnector,
    ChainContextWatcher, FileStore, LifecycleEvent, RouteTable, SessionSnapshot,
    TransactionJournal, TransactionTracker, WalletSession,
};
use eyre::{bail, eyre, Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::Config;
use crate::wait_for_shutdown_signal;

pub struct App {
    config: Config,
    routes: RouteTable,
    wallet: Option<Arc<EvmWallet>>,
}

impl App {
    /// Connect the wallet when a key is configured; read-only otherwise
    pub async fn connect(config: Config) -> Result<Self> {
        let wallet = match config.wallet_config() {
            Some(wallet_config) => Some(Arc::new(EvmWallet::connect(wallet_config).await?)),
            None => {
                debug!("No wallet key configured, running read-only");
                None
            }
        };

        Ok(Self {
            routes: config.routes(),
            config,
            wallet,
        })
    }

    fn wallet(&self) -> Result<&Arc<EvmWallet>> {
        self.wallet
            .as_ref()
            .ok_or_else(|| eyre!("WALLET_PRIVATE_KEY is required for this command"))
    }

    fn user(&self, explicit: Option<Address>) -> Result<Address> {
        explicit
            .or_else(|| self.wallet.as_ref().and_then(|w| w.address()))
            .ok_or_else(|| eyre!("Pass --user or configure WALLET_PRIVATE_KEY"))
    }

    /// Explicit origin, or the chain the wallet is on
    async fn origin(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(origin) = explicit {
            return Ok(canonical_chain_id(origin));
        }
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| eyre!("Pass --origin or configure WALLET_PRIVATE_KEY"))?;
        let context = resolve_current_chain(wallet.as_ref()).await;
        if context.id.is_empty() {
            bail!("Wallet network could not be resolved ({})", context.display_name);
        }
        Ok(context.id)
    }

    /// `ORIGIN_RPC_URL` serves the wallet's chain when there is a wallet
    fn connector(&self, origin: &str) -> Arc<RpcConnector> {
        let rpc_chain = match &self.wallet {
            Some(wallet) => wallet.chain_id().to_string(),
            None => origin.to_string(),
        };
        Arc::new(self.config.connector(Some(&rpc_chain)))
    }

    fn session(&self, connector: Arc<RpcConnector>) -> BridgeSession {
        BridgeSession::with_config(
            self.routes.clone(),
            connector,
            self.config.session_config(),
        )
    }

    fn journal(&self) -> Result<Arc<TransactionJournal>> {
        let store = FileStore::open(&self.config.journal_dir).wrap_err_with(|| {
            format!(
                "Failed to open journal directory {}",
                self.config.journal_dir.display()
            )
        })?;
        Ok(Arc::new(
            TransactionJournal::new(Arc::new(store))
                .with_max_entries(self.config.journal_max_entries),
        ))
    }

    pub async fn chains(&self, origin: Option<&str>) -> Result<()> {
        println!("Known chains:");
        for chain in chains::all() {
            println!(
                "  {:<10} {:<18} {}",
                chain.id,
                chain.name,
                chain.explorer_url.unwrap_or("-")
            );
        }

        let origin = match origin {
            Some(origin) => Some(canonical_chain_id(origin)),
            None if self.wallet.is_some() => Some(self.origin(None).await?),
            None => None,
        };

        if let Some(origin) = origin {
            let name = chains::lookup(&origin)
                .map(|c| c.name.to_string())
                .unwrap_or_else(|| format!("Chain ID: {}", origin));
            println!();
            println!("Destinations from {}:", name);
            for chain in chains::destination_options(&origin) {
                let id = chain.id.to_string();
                let marker = if self.routes.route_exists(&origin, &id) {
                    "bridge available"
                } else {
                    "no bridge"
                };
                println!("  {:<10} {:<18} {}", id, chain.name, marker);
            }
        }
        Ok(())
    }

    pub fn route(&self, origin: &str, destination: &str) -> Result<()> {
        match self.routes.get_contract_address(origin, destination) {
            Some(contract) => println!("{}", contract),
            None => bail!(
                "No bridge contract available for chain pair {} -> {}",
                canonical_chain_id(origin),
                canonical_chain_id(destination)
            ),
        }
        Ok(())
    }

    pub async fn pairs(&self, origin: Option<&str>, destination: &str) -> Result<()> {
        let origin = self.origin(origin).await?;
        let session = self.session(self.connector(&origin));
        session.select(&origin, destination, None).await?;

        let snapshot = session.snapshot();
        if snapshot.pairs.is_empty() {
            println!("No token pairs registered");
            return Ok(());
        }
        for pair in &snapshot.pairs {
            println!(
                "{:<12} -> {:<12} {} -> {}",
                pair.origin_label(),
                pair.destination_label(),
                pair.origin_token,
                pair.destination_token
            );
        }
        Ok(())
    }

    pub async fn balances(
        &self,
        origin: Option<&str>,
        destination: &str,
        user: Option<Address>,
    ) -> Result<()> {
        let user = self.user(user)?;
        let origin = self.origin(origin).await?;
        let connector = self.connector(&origin);
        let session = self.session(connector.clone());
        session.select(&origin, destination, Some(user)).await?;

        print_balances(&session.snapshot(), connector.as_ref(), None).await;
        Ok(())
    }

    pub async fn approve(
        &self,
        destination: &str,
        token: Address,
        amount: &str,
        wait_for_refresh: bool,
    ) -> Result<()> {
        let wallet = self.wallet()?.clone();
        let user = wallet.address();
        let origin = self.origin(None).await?;
        let connector = self.connector(&origin);
        let session = self.session(connector.clone());
        session.select(&origin, destination, user).await?;

        let (tracker, mut events) =
            TransactionTracker::new(wallet.clone(), connector.reader(&origin)?);
        let tracker = tracker
            .with_journal(self.journal()?)
            .with_refresh_delay(self.config.refresh_delay);

        let request = session.submit_request(user, Some(token), amount);
        if !session.can_submit(&request, tracker.is_submitting()) {
            let snapshot = session.snapshot();
            let reason = request
                .missing_precondition()
                .map(str::to_string)
                .or(snapshot.error)
                .unwrap_or_else(|| format!("{} is not a registered pair on this route", token));
            bail!("Cannot submit: {}", reason);
        }

        let submit = tracker.submit(&request);
        tokio::pin!(submit);
        let outcome = loop {
            tokio::select! {
                result = &mut submit => break result,
                Some(event) = events.recv() => print_event(&event),
            }
        };
        while let Ok(event) = events.try_recv() {
            print_event(&event);
        }
        let outcome = outcome?;
        info!(tx_hash = %outcome.tx_hash, amount = %outcome.amount, "Approval confirmed");

        if !wait_for_refresh {
            return Ok(());
        }

        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(LifecycleEvent::BalancesRefreshed) => break,
                    Some(event) => print_event(&event),
                    None => return Ok(()),
                },
                _ = ticker.tick() => {
                    if let Some(remaining) = tracker.refresh_countdown() {
                        println!("Balances refresh in {}s", remaining.as_secs());
                    }
                }
                _ = &mut shutdown => return Ok(()),
            }
        }

        tracker.reset_balances_updated();
        session.refresh().await?;
        print_balances(&session.snapshot(), connector.as_ref(), Some(token)).await;
        Ok(())
    }

    pub fn history(&self, user: Option<Address>, latest: bool) -> Result<()> {
        let user = self.user(user)?.to_string();
        let journal = self.journal()?;
        let entries = if latest {
            journal.latest_by_hash(&user)?
        } else {
            journal.load_all(&user)?
        };

        if entries.is_empty() {
            println!("No transactions recorded for {}", user);
            return Ok(());
        }

        for tx in entries {
            println!(
                "{}  {:<9} {} {}  {} -> {}  {}",
                tx.timestamp,
                tx.status,
                tx.amount,
                tx.token_symbol,
                tx.from_chain_id,
                tx.to_chain_id,
                tx.short_hash()
            );
            if let Some(url) = tx
                .hash
                .as_deref()
                .and_then(|hash| chains::explorer_tx_url(&tx.from_chain_id, hash))
            {
                println!("    {}", url);
            }
        }
        Ok(())
    }

    /// Re-select whenever the wallet changes network until interrupted
    pub async fn watch(&self, destination: &str) -> Result<()> {
        let wallet = self.wallet()?.clone();
        let user = wallet.address();
        let _network = wallet.watch_network();
        let watcher =
            ChainContextWatcher::spawn(wallet.clone(), self.config.chain_change_debounce).await;
        let mut contexts = watcher.subscribe();

        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            let context = contexts.borrow_and_update().clone();
            println!("Wallet network: {}", context.display_name);

            let connected = context.is_connected() && !context.id.is_empty();
            let connector = self.connector(&context.id);
            let session = connected.then(|| self.session(connector.clone()));
            let mut snapshots = match &session {
                Some(session) => {
                    if let Err(e) = session.select(&context.id, destination, user).await {
                        println!("  {}", e.user_message());
                    }
                    print_snapshot(&session.snapshot(), connector.as_ref()).await;
                    Some(session.subscribe())
                }
                None => {
                    if context.display_name != NOT_CONNECTED {
                        println!("  Network not recognised, waiting for a switch");
                    }
                    None
                }
            };

            loop {
                tokio::select! {
                    changed = contexts.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                        break;
                    }
                    snapshot = next_snapshot(&mut snapshots) => {
                        if !snapshot.loading {
                            print_snapshot(&snapshot, connector.as_ref()).await;
                        }
                    }
                    _ = &mut shutdown => return Ok(()),
                }
            }
        }
    }
}

async fn next_snapshot(rx: &mut Option<watch::Receiver<SessionSnapshot>>) -> SessionSnapshot {
    match rx {
        Some(rx) => {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
            rx.borrow_and_update().clone()
        }
        None => std::future::pending().await,
    }
}

fn print_event(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::Status(tx) => {
            println!(
                "[{}] {} {} {}",
                tx.status,
                tx.amount,
                tx.token_symbol,
                tx.short_hash()
            );
        }
        LifecycleEvent::BalancesRefreshed => println!("Balances refreshed"),
    }
}

async fn print_snapshot(snapshot: &SessionSnapshot, connector: &dyn ChainConnector) {
    if let Some(error) = &snapshot.error {
        println!("  {}", error);
        return;
    }
    match snapshot.bridge {
        Some(bridge) => println!(
            "  {} -> {} via {} ({} pairs)",
            snapshot.origin_chain_id,
            snapshot.destination_chain_id,
            bridge,
            snapshot.pairs.len()
        ),
        None => {
            println!("  Select a destination chain");
            return;
        }
    }
    print_balances(snapshot, connector, None).await;
}

/// Locked amounts, formatted with the origin token's decimals when readable
async fn print_balances(
    snapshot: &SessionSnapshot,
    connector: &dyn ChainConnector,
    only: Option<Address>,
) {
    let reader = connector.reader(&snapshot.origin_chain_id).ok();
    let mut printed = false;

    for pair in &snapshot.pairs {
        if only.is_some_and(|token| token != pair.origin_token) {
            continue;
        }
        let Some(raw) = snapshot.balances.get(&pair.origin_token) else {
            continue;
        };
        let decimals = match &reader {
            Some(reader) => reader.token_decimals(pair.origin_token).await.ok(),
            None => None,
        };
        let amount = match decimals {
            Some(decimals) => format_token_amount(*raw, decimals),
            None => raw.to_string(),
        };
        println!("  Locked: {} {}", amount, pair.origin_label());
        printed = true;
    }

    if !printed {
        println!("  Locked: none");
    }
}
