//! Transaction Journal
//!
//! Append-only, per-wallet history of submitted approvals, newest first.
//! Status updates are new entries; nothing is rewritten or deduplicated.

use alloy::primitives::Address;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::ports::KeyValueStore;
use crate::types::PendingTransaction;

/// Storage key for a wallet's journal
pub fn journal_key(user: &str) -> String {
    format!("transactions_{}", user.trim().to_lowercase())
}

/// Storage key for an address
pub fn journal_key_for(user: &Address) -> String {
    journal_key(&user.to_string())
}

pub struct TransactionJournal {
    store: Arc<dyn KeyValueStore>,
    /// Oldest entries beyond this are dropped on append; `None` keeps everything
    max_entries: Option<usize>,
    /// Serializes read-modify-write appends
    write_lock: Mutex<()>,
}

impl TransactionJournal {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            max_entries: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries.filter(|&n| n > 0);
        self
    }

    /// All entries for `user`, newest first
    pub fn load_all(&self, user: &str) -> BridgeResult<Vec<PendingTransaction>> {
        let key = journal_key(user);
        let Some(raw) = self.read_raw(&key)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // An unreadable journal is treated as empty rather than blocking the UI
                warn!(key = %key, error = %e, "Discarding unreadable transaction journal");
                Ok(Vec::new())
            }
        }
    }

    /// Prepend `entry` to its user's journal
    pub fn append(&self, entry: PendingTransaction) -> BridgeResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BridgeError::Storage("journal lock poisoned".into()))?;

        let key = journal_key(&entry.user_address);
        // Unlike load_all, an unreadable journal is an error here so it is never overwritten
        let mut entries: Vec<PendingTransaction> = match self.read_raw(&key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                BridgeError::Storage(format!("journal {} is unreadable: {}", key, e))
            })?,
            None => Vec::new(),
        };

        debug!(
            key = %key,
            hash = ?entry.hash,
            status = %entry.status,
            "Appending journal entry"
        );

        entries.insert(0, entry);
        if let Some(max) = self.max_entries {
            entries.truncate(max);
        }

        let raw = serde_json::to_string(&entries)
            .map_err(|e| BridgeError::Storage(e.to_string()))?;
        self.store
            .set(&key, &raw)
            .map_err(|e| BridgeError::Storage(format!("{:#}", e)))
    }

    fn read_raw(&self, key: &str) -> BridgeResult<Option<String>> {
        self.store
            .get(key)
            .map_err(|e| BridgeError::Storage(format!("{:#}", e)))
    }

    /// Latest status per hash, newest first (entries without a hash are kept as-is)
    pub fn latest_by_hash(&self, user: &str) -> BridgeResult<Vec<PendingTransaction>> {
        let mut seen = std::collections::HashSet::new();
        Ok(self
            .load_all(user)?
            .into_iter()
            .filter(|tx| match &tx.hash {
                Some(h) => seen.insert(h.clone()),
                None => true,
            })
            .collect())
    }
}
