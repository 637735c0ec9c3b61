use tracing::{debug, warn};
use crate::{
    error::Result,
    storage::{Store, POOL_FILE},
    transaction::Transaction,
};

/// FIFO staging area for transactions that are not yet in a block.
///
/// `pending` counts submissions since the last drain and is what the mining
/// threshold is compared against. It starts at the number of records already
/// in the pool file, so a restart does not forget queued work.
pub struct TxPool {
    store: Store,
    pending: usize,
    threshold: usize,
}

/// Pool position taken before a push, for [`TxPool::rollback`].
#[derive(Debug, Clone, Copy)]
pub struct PoolMark {
    bytes: u64,
    pending: usize,
}

impl TxPool {
    pub fn open(store: Store, threshold: usize) -> Result<Self> {
        let pending = store.count::<Transaction>(POOL_FILE)?;
        debug!(pending, threshold, "transaction pool opened");
        Ok(TxPool { store, pending, threshold })
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether enough transactions are waiting to cut a block.
    pub fn is_full(&self) -> bool {
        self.threshold > 0 && self.pending >= self.threshold
    }

    pub fn push(&mut self, tx: &Transaction) -> Result<()> {
        self.store.append(POOL_FILE, tx)?;
        self.pending += 1;
        Ok(())
    }

    pub fn mark(&self) -> Result<PoolMark> {
        Ok(PoolMark { bytes: self.store.len_of(POOL_FILE)?, pending: self.pending })
    }

    /// Drops whatever was pushed since `mark` was taken.
    pub fn rollback(&mut self, mark: PoolMark) -> Result<()> {
        self.pending = mark.pending;
        self.store.cut_to(POOL_FILE, mark.bytes)?;
        warn!(pending = self.pending, "pool push rolled back");
        Ok(())
    }

    /// Pool contents without removing them.
    pub fn peek(&self) -> Result<Vec<Transaction>> {
        self.store.read_all(POOL_FILE)
    }

    /// Takes every queued transaction and empties the pool file.
    ///
    /// The empty file is swapped in with a rename, so a failed drain leaves
    /// the pool exactly as it was.
    pub fn drain_all(&mut self) -> Result<Vec<Transaction>> {
        let queued: Vec<Transaction> = self.store.read_all(POOL_FILE)?;
        self.store.truncate(POOL_FILE)?;
        self.pending = 0;
        debug!(taken = queued.len(), "pool drained");
        Ok(queued)
    }

    /// Puts drained records back, replacing the pool contents.
    pub fn restore(&mut self, records: &[Transaction]) -> Result<()> {
        self.store.rewrite_all(POOL_FILE, records)?;
        self.pending = records.len();
        warn!(pending = self.pending, "drained transactions returned to the pool");
        Ok(())
    }
}
