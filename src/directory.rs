//! Campus directory: which emails may register, which wallets receive
//! institutional payments, and which kitchens take cafeteria payments.

use crate::{
    crypto::{self, Address},
    error::{LedgerError, Result},
    wallet::{UserType, Wallet, WalletStore},
};

pub const STUDENT_DOMAIN: &str = "@alustudent.com";
pub const STAFF_DOMAIN: &str = "@alueducation.com";
pub const VENDOR_DOMAIN: &str = "@aluvendor.com";

/// True if everything from the first `@` on is a recognised campus domain.
pub fn verify_email_domain(email: &str) -> bool {
    user_type_from_email(email).is_some()
}

pub fn user_type_from_email(email: &str) -> Option<UserType> {
    let domain = &email[email.find('@')?..];
    match domain {
        STUDENT_DOMAIN => Some(UserType::Student),
        STAFF_DOMAIN => Some(UserType::Staff),
        VENDOR_DOMAIN => Some(UserType::Vendor),
        _ => None,
    }
}

/// Wallets owned by the school itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Institution {
    Tuition,
    Library,
    HealthInsurance,
}

impl Institution {
    pub const ALL: [Institution; 3] = [Institution::Tuition, Institution::Library, Institution::HealthInsurance];

    pub fn address(&self) -> Address {
        let tail = match self {
            Institution::Tuition => '1',
            Institution::Library => '2',
            Institution::HealthInsurance => '3',
        };
        format!("{}{tail}", "0".repeat(crypto::HASH_HEX_LEN - 1))
    }

    pub fn email(&self) -> &'static str {
        match self {
            Institution::Tuition => "tuition@alu.edu",
            Institution::Library => "library@alu.edu",
            Institution::HealthInsurance => "insurance@alu.edu",
        }
    }
}

/// A kitchen that is preloaded into every wallet store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kitchen {
    pub name: &'static str,
    pub email: &'static str,
}

pub const KITCHENS: [Kitchen; 3] = [
    Kitchen { name: "Pascal's Kitchen", email: "pascal@aluvendor.com" },
    Kitchen { name: "Pius' Kitchen", email: "pius@aluvendor.com" },
    Kitchen { name: "Joshua's Kitchen", email: "joshua@aluvendor.com" },
];

impl Kitchen {
    pub fn address(&self) -> Address {
        crypto::hash_hex(&format!("kitchen:{}", self.email))
    }
}

/// Private key handed to preloaded wallets.
pub fn seed_key(email: &str) -> String {
    crypto::hash_hex(&format!("seed:{email}"))
}

/// Creates the institutional and kitchen wallets that are not yet present.
/// Returns how many wallets were added.
pub fn seed_wallets(wallets: &mut WalletStore) -> Result<usize> {
    let balance = wallets.default_balance();
    let mut added = 0;
    for inst in Institution::ALL {
        let w = Wallet {
            address: inst.address(),
            private_key: seed_key(inst.email()),
            email: inst.email().into(),
            balance,
            user_type: UserType::Institution,
            kitchen_name: None,
        };
        if wallets.insert_if_absent(w)? { added += 1; }
    }
    for k in KITCHENS {
        let w = Wallet {
            address: k.address(),
            private_key: seed_key(k.email),
            email: k.email.into(),
            balance,
            user_type: UserType::Vendor,
            kitchen_name: Some(k.name.into()),
        };
        if wallets.insert_if_absent(w)? { added += 1; }
    }
    if added > 0 {
        tracing::info!(added, "seeded directory wallets");
    }
    Ok(added)
}

/// Vendor wallets with a kitchen name, in wallet-file order.
pub fn kitchens(wallets: &WalletStore) -> Vec<&Wallet> {
    wallets
        .iter()
        .filter(|w| w.user_type == UserType::Vendor && w.kitchen_name.is_some())
        .collect()
}

/// Maps a 0-based cafeteria menu position to the kitchen's address.
pub fn resolve_kitchen(wallets: &WalletStore, position: usize) -> Result<Address> {
    kitchens(wallets)
        .get(position)
        .map(|w| w.address.clone())
        .ok_or(LedgerError::UnknownKitchen(position))
}
