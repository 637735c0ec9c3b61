use serde::{Serialize, Deserialize};
use crate::{crypto::{self, ZERO_HASH}, transaction::Transaction};

/// Wall-clock format stamped on every block.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Token descriptor carried by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub symbol: String,
    pub total_supply: u64,
    pub circulating_supply: u64,
}

impl Token {
    pub const NAME: &'static str = "Leaders Token";
    pub const SYMBOL: &'static str = "LT";

    pub fn new(supply: u64) -> Self {
        Token {
            name: Self::NAME.into(),
            symbol: Self::SYMBOL.into(),
            total_supply: supply,
            circulating_supply: supply,
        }
    }
}

/// One link of the chain.
///
/// The header hash covers `index`, `previous_hash`, `timestamp` and `nonce`
/// only. Transactions are bound separately through `tx_digest`, which is
/// filled in when the block is sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub timestamp: String,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
    pub current_hash: String,
    pub reward: u64,
    pub tx_digest: String,
}

impl Block {
    /// `Hash(decimal(index) ∥ previous_hash ∥ timestamp ∥ decimal(nonce))`.
    pub fn compute_hash(index: u64, previous_hash: &str, timestamp: &str, nonce: u64) -> String {
        crypto::hash_hex(&format!("{index}{previous_hash}{timestamp}{nonce}"))
    }

    /// Digest over every field of every transaction in `txs`, in order.
    /// Amounts enter as their exact bit pattern.
    pub fn digest_transactions(txs: &[Transaction]) -> String {
        let joined: String = txs
            .iter()
            .map(|t| {
                format!(
                    "{}|{}|{:016x}|{}|{}|{}\n",
                    t.from,
                    t.to,
                    t.amount.to_bits(),
                    t.kind.label(),
                    t.timestamp,
                    t.signature
                )
            })
            .collect();
        crypto::hash_hex(&joined)
    }

    /// An unlinked block with no transactions and its header hash computed.
    pub fn candidate(index: u64, previous_hash: &str, timestamp: String, reward: u64) -> Self {
        let nonce = 0;
        let current_hash = Self::compute_hash(index, previous_hash, &timestamp, nonce);
        Block {
            index,
            previous_hash: previous_hash.to_string(),
            timestamp,
            nonce,
            transactions: Vec::new(),
            current_hash,
            reward,
            tx_digest: Self::digest_transactions(&[]),
        }
    }

    pub fn genesis(timestamp: String, reward: u64) -> Self {
        Self::candidate(0, ZERO_HASH, timestamp, reward)
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Recomputes the header hash from the stored fields.
    pub fn recompute_hash(&self) -> String {
        Self::compute_hash(self.index, &self.previous_hash, &self.timestamp, self.nonce)
    }

    pub fn has_valid_hash(&self) -> bool {
        self.recompute_hash() == self.current_hash
    }

    /// True if the digest matches the transaction set and every transaction
    /// still matches its own fingerprint.
    pub fn has_valid_tx_digest(&self) -> bool {
        Self::digest_transactions(&self.transactions) == self.tx_digest
            && self.transactions.iter().all(Transaction::verify)
    }

    /// Appends `tx` unless the block already holds `cap` transactions.
    pub fn add_transaction(&mut self, tx: Transaction, cap: usize) -> bool {
        if self.transactions.len() >= cap {
            return false;
        }
        self.transactions.push(tx);
        true
    }

    /// Fixes the transaction set by recording its digest.
    pub fn seal(&mut self) {
        self.tx_digest = Self::digest_transactions(&self.transactions);
    }
}

/// Local wall-clock time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionType;

    #[test]
    fn genesis_shape() {
        let g = Block::genesis("2024-01-01 00:00:00".into(), 2);
        assert_eq!(g.index, 0);
        assert_eq!(g.previous_hash, ZERO_HASH);
        assert_eq!(g.nonce, 0);
        assert_eq!(g.transaction_count(), 0);
        assert_eq!(
            g.current_hash,
            crypto::hash_hex(&format!("0{ZERO_HASH}2024-01-01 00:00:000"))
        );
        assert!(g.has_valid_hash());
    }

    #[test]
    fn cap_is_enforced() {
        let mut b = Block::candidate(1, "p", "t".into(), 2);
        let tx = Transaction::new("a".into(), "b".into(), 1.0, TransactionType::TokenTransfer, 0);
        assert!(b.add_transaction(tx.clone(), 1));
        assert!(!b.add_transaction(tx, 1));
        assert_eq!(b.transaction_count(), 1);
    }

    #[test]
    fn seal_binds_transactions() {
        let mut b = Block::candidate(1, "p", "t".into(), 2);
        let tx = Transaction::new("a".into(), "b".into(), 1.0, TransactionType::TokenTransfer, 0);
        b.add_transaction(tx, 10);
        assert!(!b.has_valid_tx_digest(), "unsealed block carries the empty digest");
        b.seal();
        assert!(b.has_valid_tx_digest());
        assert!(b.has_valid_hash(), "sealing leaves the header hash alone");
    }

    #[test]
    fn digest_covers_every_field() {
        let mut b = Block::candidate(1, "p", "t".into(), 2);
        let tx = Transaction::new("a".into(), "b".into(), 2.0, TransactionType::Tuition, 5);
        b.add_transaction(tx, 10);
        b.seal();

        let mut kind = b.clone();
        kind.transactions[0].kind = TransactionType::TokenTransfer;
        assert!(!kind.has_valid_tx_digest(), "kind is not in the fingerprint but is in the digest");

        let mut cents = b.clone();
        cents.transactions[0].amount = 2.004;
        assert!(cents.transactions[0].verify(), "rounds to the same fingerprint");
        assert!(!cents.has_valid_tx_digest());
    }
}
