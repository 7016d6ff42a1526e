//! Salted PBKDF2-SHA256 password hashes.
//!
//! Encoded as `pbkdf2-sha256$<iterations>$<salt>$<hash>` with standard
//! base64 for salt and hash, so the iteration count can be raised without
//! invalidating stored accounts.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

#[cfg(not(test))]
const ITERATIONS: u32 = 210_000;
#[cfg(test)]
const ITERATIONS: u32 = 1_000;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, ITERATIONS, &mut hash);

    format!(
        "{SCHEME}${ITERATIONS}${salt}${hash}",
        salt = STANDARD.encode(salt),
        hash = STANDARD.encode(hash)
    )
}

/// Check a password against an encoded hash. Malformed hashes never match.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt), STANDARD.decode(expected)) else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LENGTH {
        return false;
    }

    let mut actual = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies() {
        let encoded = hash_password("doc123");
        assert!(encoded.starts_with("pbkdf2-sha256$"));
        assert!(verify_password("doc123", &encoded));
        assert!(!verify_password("doc124", &encoded));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_malformed_hash_rejected() {
        assert!(!verify_password("admin123", "admin123"));
        assert!(!verify_password("x", "pbkdf2-sha256$abc$AA==$AA=="));
        assert!(!verify_password("x", "md5$1000$AA==$AA=="));
    }
}
