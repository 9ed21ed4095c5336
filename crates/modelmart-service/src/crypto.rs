//! API key generation and hashing.
//!
//! Plaintext API keys are shown once at account creation. The store only
//! ever sees `HMAC-SHA256(pepper, key)`, so a leaked database does not leak
//! usable keys.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of every generated API key.
pub const API_KEY_PREFIX: &str = "mm_";

/// Compute HMAC-SHA256 and return the hex-encoded result (64 characters).
///
/// # Errors
///
/// Returns an error only if the HMAC implementation rejects the key length,
/// which HMAC-SHA256 never does for byte keys.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Hash an API key for storage and lookup.
///
/// # Errors
///
/// See [`hmac_sha256_hex`].
pub fn hash_api_key(pepper: &str, api_key: &str) -> Result<String, hmac::digest::InvalidLength> {
    hmac_sha256_hex(pepper, api_key)
}

/// Generate a new random API key.
#[must_use]
pub fn generate_api_key() -> String {
    format!(
        "{API_KEY_PREFIX}{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_produces_correct_length() {
        let result = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(result.len(), 64);
        assert_eq!(
            result,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn api_key_hash_depends_on_pepper() {
        let key = generate_api_key();
        let a = hash_api_key("pepper-a", &key).unwrap();
        let b = hash_api_key("pepper-b", &key).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, hash_api_key("pepper-a", &key).unwrap());
    }

    #[test]
    fn generated_keys_are_unique_and_prefixed() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a, b);
        assert!(a.starts_with(API_KEY_PREFIX));
        assert_eq!(a.len(), API_KEY_PREFIX.len() + 64);
    }

    #[test]
    fn constant_time_eq_compares() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }
}
