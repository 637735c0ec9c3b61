//! The ledger engine: one owner for the chain, the wallet store, the
//! confirmed-transaction ledger, the pool and the snapshot directory.
//!
//! Every mutating operation takes `&mut self`, so a single engine is a single
//! writer. Callers that share one across threads wrap it in a `Mutex`.

use std::{path::PathBuf, thread, time::Duration};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, error, info, warn};
use crate::{
    block::{self, Block, Token},
    chain::Blockchain,
    config::Config,
    crypto::Address,
    directory::{self, Institution},
    error::{LedgerError, Result},
    ledger::{HistoryEntry, Ledger, LedgerMark},
    metrics,
    pool::{PoolMark, TxPool},
    profile::{Profile, ProfileBook, Registration},
    storage::Store,
    transaction::{Transaction, TransactionType},
    validator,
    wallet::{Wallet, WalletStore},
    backup::SnapshotStore,
};

/// What a wallet owner wants to pay for.
#[derive(Debug, Clone, PartialEq)]
pub enum Payment {
    Tuition,
    LibraryFine,
    HealthInsurance,
    /// 0-based position in the kitchen list.
    Cafeteria { kitchen: usize },
    Transfer { to: Address },
}

/// Outcome of a mining round.
#[derive(Debug, Clone, PartialEq)]
pub struct MinedBlock {
    pub index: u64,
    pub hash: String,
    pub transaction_count: usize,
    pub validator: Option<Address>,
    pub reward: u64,
    pub snapshot: Option<PathBuf>,
}

/// Outcome of an accepted submission. `mined` is set when the submission
/// filled the pool and a block was cut. `mining_error` is set when the pool
/// filled but the block could not be cut; the transaction stays recorded and
/// queued either way.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub transaction: Transaction,
    pub mined: Option<MinedBlock>,
    pub mining_error: Option<String>,
}

pub struct Engine {
    config: Config,
    chain: Blockchain,
    wallets: WalletStore,
    ledger: Ledger,
    pool: TxPool,
    profiles: ProfileBook,
    snapshots: SnapshotStore,
    rng: StdRng,
}

impl Engine {
    /// Opens every store under the configured data directory and brings the
    /// chain up: restored from the newest snapshot when one is readable,
    /// otherwise a fresh genesis block. A snapshot is written only when the
    /// backup directory held none; unreadable snapshots are left in place.
    pub fn initialize(config: Config) -> Result<Self> {
        let store = Store::open(config.data_dir())?;
        let mut wallets = WalletStore::open(store.clone(), config.default_balance)?;
        directory::seed_wallets(&mut wallets)?;
        let ledger = Ledger::open(store.clone(), config.default_balance)?;
        let pool = TxPool::open(store.clone(), config.pool_threshold)?;
        let profiles = ProfileBook::open(store)?;
        let snapshots = SnapshotStore::new(config.backup_dir());

        let (chain, fresh) = match snapshots.restore() {
            Ok(chain) => {
                if !chain.validate_integrity() {
                    warn!("restored chain fails its integrity check");
                }
                (chain, false)
            }
            Err(LedgerError::NoRestoreAvailable) => {
                info!("no snapshot found, starting from genesis");
                (Self::genesis_chain(&config), true)
            }
            Err(e) => {
                warn!(error = %e, "no readable snapshot, starting from genesis without writing one");
                (Self::genesis_chain(&config), false)
            }
        };

        let mut engine = Engine {
            config,
            chain,
            wallets,
            ledger,
            pool,
            profiles,
            snapshots,
            rng: StdRng::from_entropy(),
        };
        if fresh {
            engine.backup()?;
        }
        metrics::set_pool_pending(engine.pool.pending());
        info!(
            blocks = engine.chain.block_count(),
            wallets = engine.wallets.len(),
            pending = engine.pool.pending(),
            "ledger engine ready"
        );
        Ok(engine)
    }

    fn genesis_chain(config: &Config) -> Blockchain {
        Blockchain::with_genesis(
            Token::new(config.initial_supply),
            config.block_reward,
            block::now_timestamp(),
        )
    }

    /// Replaces the validator-selection randomness with a seeded generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn chain(&self) -> &Blockchain { &self.chain }
    pub fn wallets(&self) -> &WalletStore { &self.wallets }
    pub fn ledger(&self) -> &Ledger { &self.ledger }
    pub fn pool(&self) -> &TxPool { &self.pool }
    pub fn profiles(&self) -> &ProfileBook { &self.profiles }
    pub fn snapshots(&self) -> &SnapshotStore { &self.snapshots }

    /// Finds the wallet owning `private_key`.
    pub fn authenticate(&self, private_key: &str) -> Result<&Wallet> {
        self.wallets.by_private_key(private_key).ok_or(LedgerError::UnknownWallet)
    }

    /// Creates a member's wallet together with their profile.
    pub fn register(&mut self, reg: Registration) -> Result<(Profile, Wallet)> {
        let now = chrono::Utc::now().timestamp();
        self.profiles.register(&mut self.wallets, reg, now)
    }

    pub fn history(&self, address: &str) -> Result<Vec<HistoryEntry>> {
        self.ledger.history(address)
    }

    /// Resolves `payment` to a recipient and transaction type and submits it.
    pub fn pay(&mut self, from: &str, payment: Payment, amount: f64) -> Result<Submission> {
        let (to, kind) = match payment {
            Payment::Tuition => (Institution::Tuition.address(), TransactionType::Tuition),
            Payment::LibraryFine => (Institution::Library.address(), TransactionType::LibraryFine),
            Payment::HealthInsurance => (Institution::HealthInsurance.address(), TransactionType::HealthInsurance),
            Payment::Cafeteria { kitchen } => {
                (directory::resolve_kitchen(&self.wallets, kitchen)?, TransactionType::Cafeteria)
            }
            Payment::Transfer { to } => (to, TransactionType::TokenTransfer),
        };
        self.submit_transaction(from, &to, amount, kind)
    }

    /// Validates and records a transfer, moving `amount` between the two
    /// wallets. Mines a block once the pool reaches its threshold.
    ///
    /// Checks run in this order and the first failure wins:
    /// * `InvalidAmount` for a non-positive or non-finite amount
    /// * `UnknownSender` if `from` owns no wallet
    /// * `InsufficientBalance` if the sender's wallet balance is short
    /// * `DoubleSpend` if the sender's unspent balance is short
    /// * `UnknownRecipient` if `to` owns no wallet
    ///
    /// A rejected transfer leaves every file untouched. If writing the
    /// ledger, the pool or the wallet file fails, the writes already made are
    /// undone and the I/O error is returned.
    ///
    /// Once the transfer is recorded the submission succeeds, even when the
    /// automatic mining round fails; see [`Submission::mining_error`].
    pub fn submit_transaction(&mut self, from: &str, to: &str, amount: f64, kind: TransactionType) -> Result<Submission> {
        if let Err(e) = self.check_transfer(from, to, amount) {
            metrics::tx_rejected();
            warn!(%from, %to, amount, reason = %e, "transaction rejected");
            return Err(e);
        }

        let tx = Transaction::new(from.to_string(), to.to_string(), amount, kind, chrono::Utc::now().timestamp());
        let ledger_mark = self.ledger.mark()?;
        let pool_mark = self.pool.mark()?;
        let mut moved = false;
        let written = self
            .ledger
            .append(&tx)
            .and_then(|()| self.pool.push(&tx))
            .and_then(|()| {
                self.wallets.adjust_balance(from, -amount);
                self.wallets.adjust_balance(to, amount);
                moved = true;
                self.wallets.flush()
            });
        if let Err(e) = written {
            warn!(%from, %to, amount, error = %e, "transaction not recorded");
            self.undo_transfer(&tx, moved, ledger_mark, pool_mark);
            return Err(e);
        }

        metrics::tx_accepted();
        metrics::set_pool_pending(self.pool.pending());
        info!(%from, %to, amount, kind = kind.label(), pending = self.pool.pending(), "transaction accepted");

        let (mined, mining_error) = if self.pool.is_full() {
            match self.mine_block() {
                Ok(m) => (Some(m), None),
                Err(e) => {
                    warn!(error = %e, pending = self.pool.pending(), "automatic mining failed, transactions stay queued");
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };
        Ok(Submission { transaction: tx, mined, mining_error })
    }

    // Rollback failures are only logged.
    fn undo_transfer(&mut self, tx: &Transaction, moved: bool, ledger_mark: LedgerMark, pool_mark: PoolMark) {
        if moved {
            // the failed flush left the wallet file at the old balances
            self.wallets.adjust_balance(&tx.from, tx.amount);
            self.wallets.adjust_balance(&tx.to, -tx.amount);
        }
        if let Err(e) = self.pool.rollback(pool_mark) {
            error!(error = %e, "could not roll back the pool");
        }
        if let Err(e) = self.ledger.rollback(ledger_mark, tx) {
            error!(error = %e, "could not roll back the ledger");
        }
    }

    fn check_transfer(&self, from: &str, to: &str, amount: f64) -> Result<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let sender = self
            .wallets
            .by_address(from)
            .ok_or_else(|| LedgerError::UnknownSender(from.to_string()))?;
        if sender.balance < amount {
            return Err(LedgerError::InsufficientBalance { available: sender.balance, requested: amount });
        }
        let unspent = self.ledger.unspent_balance(from);
        if unspent < amount {
            return Err(LedgerError::DoubleSpend { unspent, requested: amount });
        }
        if self.wallets.by_address(to).is_none() {
            return Err(LedgerError::UnknownRecipient(to.to_string()));
        }
        Ok(())
    }

    /// Cuts a block from the pool and links it.
    pub fn mine_block(&mut self) -> Result<MinedBlock> {
        if self.config.mining_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.mining_delay_ms));
        }
        let candidate = self.chain.create_block(self.config.block_reward);
        self.mine_candidate(candidate)
    }

    /// Validates `candidate`, fills it from the pool, rewards a validator and
    /// links it. If validation fails the candidate is discarded and the pool
    /// is left as it was. If paying the reward or linking fails, the drained
    /// transactions go back to the pool and the reward is taken back.
    ///
    /// Pool records beyond `max_transactions` are dropped once the block is
    /// linked.
    pub fn mine_candidate(&mut self, mut candidate: Block) -> Result<MinedBlock> {
        self.chain.validate_block(&candidate)?;

        let cap = self.config.max_transactions;
        let queued = self.pool.drain_all()?;
        for tx in queued.iter().take(cap) {
            if !candidate.add_transaction(tx.clone(), cap) {
                break;
            }
        }
        candidate.seal();

        let validator = validator::select(self.wallets.as_slice(), &mut self.rng).map(|w| w.address.clone());
        let reward = candidate.reward as f64;
        match &validator {
            Some(address) => {
                self.wallets.adjust_balance(address, reward);
                if let Err(e) = self.wallets.flush() {
                    warn!(index = candidate.index, error = %e, "validator reward not saved, block abandoned");
                    self.wallets.adjust_balance(address, -reward);
                    self.requeue(&queued);
                    return Err(e);
                }
            }
            None => warn!(index = candidate.index, "no wallet holds stake, reward not paid"),
        }

        let mut mined = MinedBlock {
            index: candidate.index,
            hash: candidate.current_hash.clone(),
            transaction_count: candidate.transaction_count(),
            validator,
            reward: candidate.reward,
            snapshot: None,
        };
        if let Err(e) = self.chain.link(candidate) {
            if let Some(address) = &mined.validator {
                self.wallets.adjust_balance(address, -reward);
                if let Err(e) = self.wallets.flush() {
                    error!(error = %e, "could not take back the validator reward");
                }
            }
            self.requeue(&queued);
            return Err(e);
        }
        if queued.len() > mined.transaction_count {
            info!(dropped = queued.len() - mined.transaction_count, cap, "pool overflow dropped");
        }
        metrics::block_mined();
        metrics::set_pool_pending(0);
        info!(
            index = mined.index,
            transactions = mined.transaction_count,
            validator = mined.validator.as_deref().unwrap_or("-"),
            "block mined"
        );

        if self.config.snapshot_due(self.chain.block_count()) {
            match self.backup() {
                Ok(path) => mined.snapshot = Some(path),
                Err(e) => warn!(error = %e, "automatic snapshot failed"),
            }
        } else {
            debug!(blocks = self.chain.block_count(), "snapshot not due");
        }
        Ok(mined)
    }

    fn requeue(&mut self, queued: &[Transaction]) {
        if let Err(e) = self.pool.restore(queued) {
            error!(error = %e, lost = queued.len(), "could not return drained transactions to the pool");
        }
    }

    pub fn validate_chain_integrity(&self) -> bool {
        self.chain.validate_integrity()
    }

    /// Writes a snapshot of the current chain.
    pub fn backup(&self) -> Result<PathBuf> {
        let path = self.snapshots.backup(&self.chain)?;
        metrics::snapshot_written();
        Ok(path)
    }
}
