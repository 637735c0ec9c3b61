//! Confirmed-transaction history.
//!
//! The ledger file is append-only and authoritative. Alongside it we keep a
//! per-address net-delta index, rebuilt from the file on open and updated on
//! every append, so unspent-balance checks do not rescan history. The full
//! replay is still available for audits.

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};
use crate::{
    crypto::Address,
    error::Result,
    storage::{Store, LEDGER_FILE},
    transaction::Transaction,
};

const AUDIT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub transaction: Transaction,
    pub direction: Direction,
}

/// Ledger position taken before an append, for [`Ledger::rollback`].
#[derive(Debug, Clone, Copy)]
pub struct LedgerMark {
    bytes: u64,
    len: usize,
}

pub struct Ledger {
    store: Store,
    baseline: f64,
    deltas: HashMap<Address, f64>,
    len: usize,
}

impl Ledger {
    /// Opens the ledger file and builds the balance index from it.
    /// `baseline` is the balance every address starts from.
    pub fn open(store: Store, baseline: f64) -> Result<Self> {
        let mut ledger = Ledger { store, baseline, deltas: HashMap::new(), len: 0 };
        for tx in ledger.transactions()? {
            ledger.index(&tx);
        }
        debug!(records = ledger.len, "ledger index built");
        Ok(ledger)
    }

    fn index(&mut self, tx: &Transaction) {
        *self.deltas.entry(tx.from.clone()).or_insert(0.0) -= tx.amount;
        *self.deltas.entry(tx.to.clone()).or_insert(0.0) += tx.amount;
        self.len += 1;
    }

    fn unindex(&mut self, tx: &Transaction) {
        *self.deltas.entry(tx.from.clone()).or_insert(0.0) += tx.amount;
        *self.deltas.entry(tx.to.clone()).or_insert(0.0) -= tx.amount;
        self.len -= 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Records a confirmed transaction.
    pub fn append(&mut self, tx: &Transaction) -> Result<()> {
        self.store.append(LEDGER_FILE, tx)?;
        self.index(tx);
        Ok(())
    }

    pub fn mark(&self) -> Result<LedgerMark> {
        Ok(LedgerMark { bytes: self.store.len_of(LEDGER_FILE)?, len: self.len })
    }

    /// Forgets `tx`, which must be the only record appended since `mark`
    /// was taken. Safe to call whether or not that append succeeded.
    pub fn rollback(&mut self, mark: LedgerMark, tx: &Transaction) -> Result<()> {
        self.store.cut_to(LEDGER_FILE, mark.bytes)?;
        if self.len > mark.len {
            self.unindex(tx);
        }
        warn!(records = self.len, "ledger append rolled back");
        Ok(())
    }

    /// Every confirmed transaction, oldest first.
    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        self.store.read_all(LEDGER_FILE)
    }

    /// Baseline plus everything received minus everything sent, from the index.
    pub fn unspent_balance(&self, address: &str) -> f64 {
        self.baseline + self.deltas.get(address).copied().unwrap_or(0.0)
    }

    /// Same figure as [`Ledger::unspent_balance`], recomputed by replaying the file.
    pub fn replay_unspent_balance(&self, address: &str) -> Result<f64> {
        let replayed = self
            .transactions()?
            .iter()
            .fold(self.baseline, |bal, tx| bal + tx.delta_for(address));
        Ok(replayed)
    }

    /// Transactions touching `address`, oldest first. A self-transfer is
    /// reported once, as sent.
    pub fn history(&self, address: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .transactions()?
            .into_iter()
            .filter_map(|tx| {
                let direction = if tx.from == address {
                    Direction::Sent
                } else if tx.to == address {
                    Direction::Received
                } else {
                    return None;
                };
                Some(HistoryEntry { transaction: tx, direction })
            })
            .collect())
    }

    /// Replays the ledger file and returns every address whose indexed
    /// balance disagrees with the replay.
    pub fn audit(&self) -> Result<Vec<Address>> {
        let txs = self.transactions()?;
        let mut replayed: HashMap<&str, f64> = HashMap::new();
        for tx in &txs {
            *replayed.entry(tx.from.as_str()).or_insert(0.0) -= tx.amount;
            *replayed.entry(tx.to.as_str()).or_insert(0.0) += tx.amount;
        }
        let addresses: BTreeSet<&str> = replayed
            .keys()
            .copied()
            .chain(self.deltas.keys().map(String::as_str))
            .collect();
        let mismatched: Vec<Address> = addresses
            .into_iter()
            .filter(|a| {
                let r = replayed.get(a).copied().unwrap_or(0.0);
                let i = self.deltas.get(*a).copied().unwrap_or(0.0);
                (r - i).abs() > AUDIT_EPSILON
            })
            .map(str::to_string)
            .collect();
        if !mismatched.is_empty() {
            warn!(count = mismatched.len(), "ledger index disagrees with replay");
        }
        Ok(mismatched)
    }
}
