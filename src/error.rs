use thiserror::Error;

/// Every way a ledger operation can be refused or fail.
///
/// Validation variants are ordinary outcomes: nothing was mutated and the
/// caller may retry or report. `Io` and `Codec` mean a file could not be
/// written or decoded.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(f64),

    #[error("insufficient balance: requested {requested:.2}, available {available:.2}")]
    InsufficientBalance { available: f64, requested: f64 },

    #[error("double spend detected: requested {requested:.2}, unspent {unspent:.2}")]
    DoubleSpend { unspent: f64, requested: f64 },

    #[error("sender wallet {0} not found")]
    UnknownSender(String),

    #[error("recipient wallet {0} not found")]
    UnknownRecipient(String),

    #[error("previous hash mismatch: expected {expected}, found {found}")]
    PreviousHashMismatch { expected: String, found: String },

    #[error("hash mismatch: computed {computed}, stored {stored}")]
    HashMismatch { computed: String, stored: String },

    #[error("no restore available")]
    NoRestoreAvailable,

    #[error("unsupported snapshot version {0}")]
    SnapshotVersion(u32),

    #[error("invalid email domain: {0}")]
    InvalidEmailDomain(String),

    #[error("email already registered: {0}")]
    EmailAlreadyRegistered(String),

    #[error("kitchen name is required for vendors")]
    KitchenRequired,

    #[error("no wallet matches the given key")]
    UnknownWallet,

    #[error("no kitchen at position {0}")]
    UnknownKitchen(usize),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl LedgerError {
    /// Validation outcomes leave every file untouched.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LedgerError::Io(_) | LedgerError::Codec(_))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
