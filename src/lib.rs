// Library interface for the Leaders Token campus ledger
// The binary and the integration tests both drive the engine through here

pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;
pub mod transaction;
pub mod block;
pub mod chain;
pub mod wallet;
pub mod directory;
pub mod profile;
pub mod ledger;
pub mod pool;
pub mod validator;
pub mod backup;
pub mod metrics;
pub mod engine;

pub use block::{Block, Token};
pub use chain::Blockchain;
pub use config::Config;
pub use crypto::{Address, hash_hex};
pub use engine::{Engine, MinedBlock, Payment, Submission};
pub use error::{LedgerError, Result};
pub use storage::Store;
pub use transaction::{Transaction, TransactionType};
pub use wallet::{UserType, Wallet, WalletStore};
