//! Unsettled exchange entries, queued per (account, destination asset).
//!
//! Each queue is kept in append order, which is also `sequence` order, so
//! "oldest first" is simply iteration order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use synthex_types::{AccountId, AssetKey, EntryId, ExchangeEntry};

/// Entries selected for one settlement pass.
#[derive(Debug, Clone, Default)]
pub struct EligibleEntries {
    /// Oldest first.
    pub entries: Vec<ExchangeEntry>,
    /// Entries skipped because their waiting period has not elapsed.
    pub deferred: usize,
}

/// Queues of unsettled entries keyed by (account, destination asset).
#[derive(Debug, Default)]
pub struct PendingExchangeLedger {
    queues: BTreeMap<(AccountId, AssetKey), Vec<ExchangeEntry>>,
    next_sequence: u64,
}

impl PendingExchangeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `entry` under (account, destination) and stamp its sequence.
    pub fn append(&mut self, mut entry: ExchangeEntry) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        entry.sequence = sequence;
        tracing::debug!(
            entry = %entry.id,
            account = %entry.account,
            asset = %entry.destination,
            sequence,
            "Exchange entry queued"
        );
        self.queues
            .entry((entry.account.clone(), entry.destination.clone()))
            .or_default()
            .push(entry);
        sequence
    }

    /// Pending entries for (account, asset), oldest first.
    #[must_use]
    pub fn entries(&self, account: &AccountId, asset: &AssetKey) -> &[ExchangeEntry] {
        self.queues
            .get(&(account.clone(), asset.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Entries ready to settle. With `force`, every entry is ready.
    #[must_use]
    pub fn eligible(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        now: DateTime<Utc>,
        waiting_period_secs: u64,
        force: bool,
    ) -> EligibleEntries {
        let mut selected = EligibleEntries::default();
        for entry in self.entries(account, asset) {
            if force || entry.is_mature(now, waiting_period_secs) {
                selected.entries.push(entry.clone());
            } else {
                selected.deferred += 1;
            }
        }
        selected
    }

    /// Delete the given entries. Returns how many were removed.
    pub fn remove(&mut self, account: &AccountId, asset: &AssetKey, ids: &[EntryId]) -> usize {
        let key = (account.clone(), asset.clone());
        let Some(queue) = self.queues.get_mut(&key) else {
            return 0;
        };
        let before = queue.len();
        queue.retain(|entry| !ids.contains(&entry.id));
        let removed = before - queue.len();
        if queue.is_empty() {
            self.queues.remove(&key);
        }
        removed
    }

    /// Largest wait remaining across the queue. Zero when empty or mature.
    #[must_use]
    pub fn max_secs_left(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        now: DateTime<Utc>,
        waiting_period_secs: u64,
    ) -> u64 {
        self.entries(account, asset)
            .iter()
            .map(|entry| entry.secs_left(now, waiting_period_secs))
            .max()
            .unwrap_or(0)
    }
}
