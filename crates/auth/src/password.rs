//! Salted, iterated SHA-256 password hashing.
//!
//! Encoded form: `sha256$<iterations>$<salt-hex>$<digest-hex>`.

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

const SCHEME: &str = "sha256";
const DEFAULT_ITERATIONS: u32 = 10_000;
const MIN_LEN: usize = 6;
const MAX_LEN: usize = 128;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be between {MIN_LEN} and {MAX_LEN} characters")]
    Length,

    #[error("malformed password hash")]
    MalformedHash,
}

/// Check the password policy without hashing.
pub fn check_policy(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
        return Err(PasswordError::Length);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    check_policy(password)?;
    let salt = *Uuid::new_v4().as_bytes();
    let digest = derive(password.as_bytes(), &salt, DEFAULT_ITERATIONS);
    Ok(format!(
        "{SCHEME}${DEFAULT_ITERATIONS}${}${}",
        hex::encode(salt),
        hex::encode(digest)
    ))
}

/// Verify a password against an encoded hash. Comparison is constant-time over
/// the digest bytes.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, PasswordError> {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(PasswordError::MalformedHash);
    };
    if scheme != SCHEME {
        return Err(PasswordError::MalformedHash);
    }
    let iterations: u32 = iterations.parse().map_err(|_| PasswordError::MalformedHash)?;
    if iterations == 0 {
        return Err(PasswordError::MalformedHash);
    }
    let salt = decode_hex(salt)?;
    let expected = decode_hex(expected)?;

    let actual = derive(password.as_bytes(), &salt, iterations);
    if actual.len() != expected.len() {
        return Ok(false);
    }
    let diff = actual
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    Ok(diff == 0)
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password)
        .finalize()
        .into();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt)
            .finalize()
            .into();
    }
    digest
}

fn decode_hex(s: &str) -> Result<Vec<u8>, PasswordError> {
    match hex::decode(s) {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(PasswordError::MalformedHash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("123456").unwrap();
        assert!(hash.starts_with("sha256$10000$"));
        assert!(verify_password("123456", &hash).unwrap());
        assert!(!verify_password("1234567", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("secret-pass").unwrap();
        let b = hash_password("secret-pass").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn enforces_length_policy() {
        assert_eq!(hash_password("12345"), Err(PasswordError::Length));
        assert_eq!(hash_password(&"x".repeat(129)), Err(PasswordError::Length));
        assert!(check_policy("密码密码密码").is_ok());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert_eq!(verify_password("x", "plain"), Err(PasswordError::MalformedHash));
        assert_eq!(
            verify_password("x", "md5$1$00$00"),
            Err(PasswordError::MalformedHash)
        );
        assert_eq!(
            verify_password("x", "sha256$10$zz$00"),
            Err(PasswordError::MalformedHash)
        );
        assert_eq!(
            verify_password("x", "sha256$10$abc$00"),
            Err(PasswordError::MalformedHash)
        );
        assert_eq!(
            verify_password("x", "sha256$10$$00"),
            Err(PasswordError::MalformedHash)
        );
    }
}
