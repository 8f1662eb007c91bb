use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::fingerprint::Fingerprint;
use crate::models::Transaction;

/// Candidate transactions keyed by fingerprint, ready to merge.
pub type Batch = BTreeMap<Fingerprint, Transaction>;

/// Key transactions by fingerprint. When two share one, the later wins.
pub fn batch_from<I: IntoIterator<Item = Transaction>>(transactions: I) -> Batch {
    transactions
        .into_iter()
        .map(|txn| (txn.fingerprint(), txn))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeResult {
    /// Incoming records that replaced an existing entry.
    pub merged: usize,
    /// Incoming records with a fingerprint not seen before.
    pub added: usize,
}

/// Deduplicating ledger keyed by fingerprint. The only way to change its
/// contents is [`TransactionStore::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionStore {
    transactions: BTreeMap<Fingerprint, Transaction>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(transactions: BTreeMap<Fingerprint, Transaction>) -> Self {
        Self { transactions }
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<Fingerprint, Transaction> {
        &self.transactions
    }

    /// Apply a whole batch. A matching fingerprint replaces the stored record,
    /// annotations included; anything else is inserted.
    pub fn merge(&mut self, incoming: Batch) -> MergeResult {
        let mut result = MergeResult::default();
        for (fingerprint, txn) in incoming {
            match self.transactions.insert(fingerprint, txn) {
                Some(_) => {
                    debug!("replaced {}", fingerprint.short());
                    result.merged += 1;
                }
                None => result.added += 1,
            }
        }
        info!(
            "merge: {} replaced, {} added, {} total",
            result.merged,
            result.added,
            self.count()
        );
        result
    }

    /// Number of distinct fingerprints held.
    pub fn count(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// How many distinct candidates would be new if merged now.
    pub fn new_entry_count<'a, I>(&self, candidates: I) -> usize
    where
        I: IntoIterator<Item = &'a Fingerprint>,
    {
        candidates
            .into_iter()
            .filter(|fp| !self.transactions.contains_key(*fp))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Transaction> {
        self.transactions.get(fingerprint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &Transaction)> {
        self.transactions.iter()
    }

    /// Read-only view ordered by date, then description.
    pub fn by_date(&self) -> Vec<(&Fingerprint, &Transaction)> {
        let mut rows: Vec<_> = self.transactions.iter().collect();
        rows.sort_by(|(_, a), (_, b)| {
            a.date()
                .cmp(&b.date())
                .then_with(|| a.description().cmp(b.description()))
        });
        rows
    }
}
