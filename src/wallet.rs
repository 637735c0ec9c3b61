use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};
use crate::{
    crypto::{self, Address},
    directory,
    error::{LedgerError, Result},
    storage::{Store, WALLETS_FILE},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    Student,
    Staff,
    Vendor,
    Intern,
    Institution,
}

impl UserType {
    pub fn label(&self) -> &'static str {
        match self {
            UserType::Student => "student",
            UserType::Staff => "staff",
            UserType::Vendor => "vendor",
            UserType::Intern => "intern",
            UserType::Institution => "institution",
        }
    }
}

/// One wallet record, identical in memory and on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: Address,
    /// Sole authentication factor for the CLI.
    pub private_key: String,
    pub email: String,
    pub balance: f64,
    pub user_type: UserType,
    pub kitchen_name: Option<String>,
}

/// Address-keyed view of the wallet file.
///
/// New wallets are appended to the file immediately. Balance changes only
/// touch memory until [`WalletStore::flush`] rewrites the whole file.
pub struct WalletStore {
    store: Store,
    wallets: Vec<Wallet>,
    by_address: HashMap<Address, usize>,
    dirty: bool,
    default_balance: f64,
}

impl WalletStore {
    /// Loads every wallet record from the data directory. A missing wallet
    /// file is an empty store.
    pub fn open(store: Store, default_balance: f64) -> Result<Self> {
        let mut ws = WalletStore {
            store,
            wallets: Vec::new(),
            by_address: HashMap::new(),
            dirty: false,
            default_balance,
        };
        ws.reload()?;
        Ok(ws)
    }

    /// Discards in-memory state and re-reads the wallet file.
    pub fn reload(&mut self) -> Result<()> {
        let wallets: Vec<Wallet> = self.store.read_all(WALLETS_FILE)?;
        let mut by_address = HashMap::with_capacity(wallets.len());
        for (i, w) in wallets.iter().enumerate() {
            // first record wins if the file ever holds a duplicate
            by_address.entry(w.address.clone()).or_insert(i);
        }
        self.wallets = wallets;
        self.by_address = by_address;
        self.dirty = false;
        debug!(count = self.wallets.len(), "wallet store loaded");
        Ok(())
    }

    pub fn default_balance(&self) -> f64 {
        self.default_balance
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Wallets in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.iter()
    }

    pub fn as_slice(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn by_address(&self, address: &str) -> Option<&Wallet> {
        self.by_address.get(address).map(|&i| &self.wallets[i])
    }

    pub fn by_email(&self, email: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.email == email)
    }

    pub fn by_private_key(&self, key: &str) -> Option<&Wallet> {
        if key.is_empty() {
            return None;
        }
        self.wallets.iter().find(|w| w.private_key == key)
    }

    pub fn email_exists(&self, email: &str) -> bool {
        self.by_email(email).is_some()
    }

    pub fn total_balance(&self) -> f64 {
        self.wallets.iter().map(|w| w.balance).sum()
    }

    /// Registers a wallet for a campus email at unix time `now`.
    ///
    /// # Errors
    /// * `InvalidEmailDomain` for non-campus addresses
    /// * `EmailAlreadyRegistered` if the email already owns a wallet
    /// * `KitchenRequired` for a vendor without a kitchen name
    pub fn create_wallet(&mut self, email: &str, kitchen_name: Option<&str>, now: i64) -> Result<Wallet> {
        let user_type = directory::user_type_from_email(email)
            .ok_or_else(|| LedgerError::InvalidEmailDomain(email.to_string()))?;
        if self.email_exists(email) {
            return Err(LedgerError::EmailAlreadyRegistered(email.to_string()));
        }
        let kitchen_name = match (user_type, kitchen_name.map(str::trim)) {
            (UserType::Vendor, Some(k)) if !k.is_empty() => Some(k.to_string()),
            (UserType::Vendor, _) => return Err(LedgerError::KitchenRequired),
            _ => None,
        };
        let (address, private_key) = crypto::derive_keys(email, now);
        if self.by_address.contains_key(&address) {
            return Err(LedgerError::EmailAlreadyRegistered(email.to_string()));
        }
        let wallet = Wallet {
            address,
            private_key,
            email: email.to_string(),
            balance: self.default_balance,
            user_type,
            kitchen_name,
        };
        self.push(wallet.clone())?;
        info!(address = %wallet.address, user_type = wallet.user_type.label(), "wallet created");
        Ok(wallet)
    }

    /// Appends `wallet` unless its address is already taken.
    /// Returns whether it was added.
    pub fn insert_if_absent(&mut self, wallet: Wallet) -> Result<bool> {
        if self.by_address.contains_key(&wallet.address) {
            return Ok(false);
        }
        self.push(wallet)?;
        Ok(true)
    }

    fn push(&mut self, wallet: Wallet) -> Result<()> {
        self.store.append(WALLETS_FILE, &wallet)?;
        self.by_address.insert(wallet.address.clone(), self.wallets.len());
        self.wallets.push(wallet);
        Ok(())
    }

    /// Adds `delta` (which may be negative) to a wallet's cached balance.
    /// Returns the new balance, or `None` for an unknown address.
    pub fn adjust_balance(&mut self, address: &str, delta: f64) -> Option<f64> {
        let &i = self.by_address.get(address)?;
        let w = &mut self.wallets[i];
        w.balance += delta;
        self.dirty = true;
        Some(w.balance)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rewrites the wallet file if any balance changed since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.store.rewrite_all(WALLETS_FILE, &self.wallets)?;
        self.dirty = false;
        Ok(())
    }
}
