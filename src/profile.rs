//! Identity records for wallet owners.
//!
//! Each profile is created together with its wallet and never exists without
//! one. The whole book is rewritten on every change.

use serde::{Serialize, Deserialize};
use tracing::info;
use crate::{
    crypto::Address,
    directory,
    error::{LedgerError, Result},
    storage::{Store, PROFILES_FILE},
    wallet::{UserType, Wallet, WalletStore},
};

const FIRST_STUDENT_ID: u32 = 1000;
const FIRST_STAFF_ID: u32 = 5000;
const FIRST_VENDOR_ID: u32 = 9000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileKind {
    Student { year_of_study: u8, program: String },
    Staff { department: String, role: String },
    Vendor { kitchen_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub wallet_address: Address,
    pub kind: ProfileKind,
}

/// What a new member supplies at sign-up.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub kind: ProfileKind,
}

impl Registration {
    fn user_type(&self) -> UserType {
        match self.kind {
            ProfileKind::Student { .. } => UserType::Student,
            ProfileKind::Staff { .. } => UserType::Staff,
            ProfileKind::Vendor { .. } => UserType::Vendor,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Book {
    next_student_id: u32,
    next_staff_id: u32,
    next_vendor_id: u32,
    profiles: Vec<Profile>,
}

impl Default for Book {
    fn default() -> Self {
        Book {
            next_student_id: FIRST_STUDENT_ID,
            next_staff_id: FIRST_STAFF_ID,
            next_vendor_id: FIRST_VENDOR_ID,
            profiles: Vec::new(),
        }
    }
}

pub struct ProfileBook {
    store: Store,
    book: Book,
}

impl ProfileBook {
    pub fn open(store: Store) -> Result<Self> {
        let book: Book = store.get(PROFILES_FILE)?.unwrap_or_default();
        Ok(ProfileBook { store, book })
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.book.profiles
    }

    pub fn by_email(&self, email: &str) -> Option<&Profile> {
        self.book.profiles.iter().find(|p| p.email == email)
    }

    pub fn by_address(&self, address: &str) -> Option<&Profile> {
        self.book.profiles.iter().find(|p| p.wallet_address == address)
    }

    /// Creates the member's wallet and profile.
    ///
    /// # Errors
    /// * `InvalidEmailDomain` if the email's domain does not match the
    ///   requested profile kind, plus every error of
    ///   [`WalletStore::create_wallet`].
    pub fn register(&mut self, wallets: &mut WalletStore, reg: Registration, now: i64) -> Result<(Profile, Wallet)> {
        if directory::user_type_from_email(&reg.email) != Some(reg.user_type()) {
            return Err(LedgerError::InvalidEmailDomain(reg.email));
        }
        let kitchen = match &reg.kind {
            ProfileKind::Vendor { kitchen_name } => Some(kitchen_name.as_str()),
            _ => None,
        };
        let wallet = wallets.create_wallet(&reg.email, kitchen, now)?;

        let counter = match reg.kind {
            ProfileKind::Student { .. } => &mut self.book.next_student_id,
            ProfileKind::Staff { .. } => &mut self.book.next_staff_id,
            ProfileKind::Vendor { .. } => &mut self.book.next_vendor_id,
        };
        let id = *counter;
        *counter += 1;

        let profile = Profile {
            id,
            name: reg.name,
            email: reg.email,
            wallet_address: wallet.address.clone(),
            kind: reg.kind,
        };
        self.book.profiles.push(profile.clone());
        self.store.put(PROFILES_FILE, &self.book)?;
        info!(id, email = %profile.email, "profile registered");
        Ok((profile, wallet))
    }
}
