use blake3::Hasher;

/// Length of every digest rendered by [`hash_hex`].
pub const HASH_HEX_LEN: usize = 64;

/// Previous-hash sentinel carried by the genesis block.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A wallet address: the lowercase hex digest that doubles as the public key.
pub type Address = String;

/// Hashes arbitrary text with a domain-specific key and renders it as
/// 64 lowercase hex characters. Deterministic and side-effect free.
pub fn hash_hex(input: &str) -> String {
    let digest = Hasher::new_derive_key("leaderchain-v1")
        .update(input.as_bytes())
        .finalize();
    hex::encode(digest.as_bytes())
}

/// Derives `(address, private_key)` for a wallet registered by `email` at
/// unix time `created_at`.
///
/// Neither value is secret in any cryptographic sense: anyone who knows the
/// email and the registration second can recompute both.
pub fn derive_keys(email: &str, created_at: i64) -> (Address, String) {
    let address = hash_hex(&format!("{email}{created_at}"));
    let private_key = hash_hex(&format!("{email}{created_at}{address}"));
    (address, private_key)
}

/// True when `s` looks like a digest produced by [`hash_hex`].
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
