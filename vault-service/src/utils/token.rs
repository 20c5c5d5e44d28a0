use rand::RngCore;
use sha2::{Digest, Sha256};

/// 32 random bytes, hex encoded. Returns the raw token (mailed to the user)
/// and its SHA-256 digest (the only form that is stored).
pub fn generate_reset_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hashed = hash_token(&raw);
    (raw, hashed)
}

pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.trim().as_bytes()))
}
