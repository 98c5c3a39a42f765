//! Group join-code derivation
//!
//! Join codes are short shareable strings, not secrets. They are derived by
//! hashing the group name, creator, a timestamp, and an attempt counter, so a
//! code can be regenerated on the rare uniqueness collision.

use sha2::{Digest, Sha256};

/// Number of derivation attempts before giving up on a unique code
pub const MAX_ATTEMPTS: u32 = 8;

/// Length of a join code in hex characters
pub const CODE_LEN: usize = 8;

/// Derive a join code for a group
pub fn generate(name: &str, created_by: &str, attempt: u32) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(created_by.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(attempt.to_le_bytes());

    hex::encode(hasher.finalize())[..CODE_LEN].to_uppercase()
}
