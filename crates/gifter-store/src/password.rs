//! One-way credential hashing (Argon2, encoded form).

use argon2::Config;
use rand::Rng;

use crate::error::{Result, StoreError};

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt: [u8; 16] = rand::thread_rng().gen();
    argon2::hash_encoded(password.as_bytes(), &salt, &Config::default())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

/// Check `password` against an encoded hash.  Malformed hashes never match.
pub fn verify_password(encoded: &str, password: &str) -> bool {
    argon2::verify_encoded(encoded, password.as_bytes()).unwrap_or(false)
}
