use serde::{Serialize, Deserialize};
use crate::crypto::{self, Address};

/// The closed set of payment purposes a transaction can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Tuition,
    Cafeteria,
    LibraryFine,
    HealthInsurance,
    TokenTransfer,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::Tuition,
        TransactionType::Cafeteria,
        TransactionType::LibraryFine,
        TransactionType::HealthInsurance,
        TransactionType::TokenTransfer,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Tuition => "Tuition Fee",
            TransactionType::Cafeteria => "Cafeteria Payment",
            TransactionType::LibraryFine => "Library Fine",
            TransactionType::HealthInsurance => "Health Insurance",
            TransactionType::TokenTransfer => "Token Transfer",
        }
    }
}

/// A value transfer between two wallets.
///
/// `signature` is a tamper-evident fingerprint over the payload, not a
/// signature anyone could verify against a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub amount: f64,
    pub kind: TransactionType,
    /// Unix seconds.
    pub timestamp: i64,
    pub signature: String,
}

impl Transaction {
    /// Builds a transaction and fingerprints it.
    pub fn new(from: Address, to: Address, amount: f64, kind: TransactionType, timestamp: i64) -> Self {
        let signature = Self::fingerprint(&from, &to, amount, timestamp);
        Self { from, to, amount, kind, timestamp, signature }
    }

    /// `Hash(from ∥ to ∥ amount with two decimals ∥ timestamp)`.
    pub fn fingerprint(from: &str, to: &str, amount: f64, timestamp: i64) -> String {
        crypto::hash_hex(&format!("{from}{to}{amount:.2}{timestamp}"))
    }

    /// True if the stored fingerprint still matches the payload.
    pub fn verify(&self) -> bool {
        self.signature == Self::fingerprint(&self.from, &self.to, self.amount, self.timestamp)
    }

    /// Signed view of this transaction from the perspective of `address`.
    pub fn delta_for(&self, address: &str) -> f64 {
        let mut delta = 0.0;
        if self.from == address { delta -= self.amount; }
        if self.to == address { delta += self.amount; }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_covers_payload() {
        let tx = Transaction::new("a".into(), "b".into(), 12.5, TransactionType::Tuition, 42);
        assert!(tx.verify());
        assert_eq!(tx.signature, crypto::hash_hex("ab12.5042"));

        let mut tampered = tx.clone();
        tampered.amount = 125.0;
        assert!(!tampered.verify());
    }

    #[test]
    fn self_transfer_nets_to_zero() {
        let tx = Transaction::new("a".into(), "a".into(), 5.0, TransactionType::TokenTransfer, 1);
        assert_eq!(tx.delta_for("a"), 0.0);
        assert_eq!(tx.delta_for("z"), 0.0);
    }
}
