//! Mock Wallet Helpers
//!
//! Simulates a browser wallet: a connected account, the wallet's own chain
//! info, a provider fallback, change notifications and approval signing.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::ports::{NetworkInfo, TransactionSigner, WalletChain, WalletEvent, WalletSession};

/// What the wallet does when asked to approve
#[derive(Debug, Clone)]
pub enum ApproveOutcome {
    /// Signs and returns this hash
    Sign(TxHash),
    /// User rejects the prompt
    Reject(String),
}

/// How the approval transaction ends up on-chain
#[derive(Debug, Clone)]
pub enum InclusionOutcome {
    Success,
    Revert,
    Error(String),
}

/// An approval the wallet was asked to sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub token: Address,
    pub spender: Address,
    pub amount: U256,
}

struct WalletState {
    address: Option<Address>,
    chain: Option<WalletChain>,
    network: std::result::Result<NetworkInfo, String>,
    provider_calls: usize,
    approve: ApproveOutcome,
    inclusion: InclusionOutcome,
    inclusion_delay: Duration,
    approvals: Vec<ApprovalRequest>,
}

/// Scriptable wallet session + signer
pub struct MockWallet {
    state: Mutex<WalletState>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub fn new(address: Option<Address>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(WalletState {
                address,
                chain: None,
                network: Err("no provider".to_string()),
                provider_calls: 0,
                approve: ApproveOutcome::Sign(TxHash::repeat_byte(0xAB)),
                inclusion: InclusionOutcome::Success,
                inclusion_delay: Duration::ZERO,
                approvals: Vec::new(),
            }),
            events,
        }
    }

    /// Connected wallet already on `chain_id` with a known name
    pub fn on_chain(address: Address, chain_id: u64, name: &str) -> Self {
        let wallet = Self::new(Some(address));
        wallet.set_chain(Some(WalletChain {
            chain_id,
            name: name.to_string(),
        }));
        wallet
    }

    fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_address(&self, address: Option<Address>) {
        self.state().address = address;
    }

    pub fn set_chain(&self, chain: Option<WalletChain>) {
        self.state().chain = chain;
    }

    pub fn set_network(&self, network: std::result::Result<NetworkInfo, String>) {
        self.state().network = network;
    }

    pub fn set_approve(&self, outcome: ApproveOutcome) {
        self.state().approve = outcome;
    }

    pub fn set_inclusion(&self, outcome: InclusionOutcome) {
        self.state().inclusion = outcome;
    }

    /// Time between the wallet returning a hash and the receipt arriving
    pub fn set_inclusion_delay(&self, delay: Duration) {
        self.state().inclusion_delay = delay;
    }

    pub fn provider_calls(&self) -> usize {
        self.state().provider_calls
    }

    pub fn approvals(&self) -> Vec<ApprovalRequest> {
        self.state().approvals.clone()
    }

    /// Push a wallet notification to subscribers
    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletSession for MockWallet {
    fn address(&self) -> Option<Address> {
        self.state().address
    }

    fn chain(&self) -> Option<WalletChain> {
        self.state().chain.clone()
    }

    async fn provider_network(&self) -> Result<NetworkInfo> {
        let mut state = self.state();
        state.provider_calls += 1;
        state.network.clone().map_err(|e| eyre!(e))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl TransactionSigner for MockWallet {
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        let mut state = self.state();
        state.approvals.push(ApprovalRequest {
            token,
            spender,
            amount,
        });
        match &state.approve {
            ApproveOutcome::Sign(hash) => Ok(*hash),
            ApproveOutcome::Reject(reason) => Err(eyre!("{}", reason)),
        }
    }

    async fn wait_for_inclusion(&self, _tx_hash: TxHash) -> Result<bool> {
        let (delay, outcome) = {
            let state = self.state();
            (state.inclusion_delay, state.inclusion.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            InclusionOutcome::Success => Ok(true),
            InclusionOutcome::Revert => Ok(false),
            InclusionOutcome::Error(e) => Err(eyre!(e)),
        }
    }
}
