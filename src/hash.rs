//! Password hashing engine with versioned digests.
//!
//! Digests are self-describing strings of the form
//! `pbkdf2-sha256:<iterations>:<salt-hex>:<key-hex>` so the verification
//! parameters always travel with the digest. Anything without the scheme
//! tag is treated as a legacy digest: a bare, unsalted, single-pass
//! SHA-256 of the password, hex-encoded. Legacy digests still verify, and
//! the auth service rewrites them to the versioned format on the next
//! successful sign-in.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Scheme tag carried by every versioned digest.
const SCHEME_TAG: &str = "pbkdf2-sha256";

/// Number of PBKDF2 rounds for newly created digests.
const HASH_ITERATIONS: u32 = 100_000;

/// Salt length in bytes (hex-doubled on the wire).
const SALT_BYTES: usize = 16;

/// Derived key length in bytes.
const KEY_BYTES: usize = 32;

/// Hash a password into a fresh versioned digest.
///
/// Fails only if the OS random source is unavailable; there is no
/// fallback to weaker hashing.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_BYTES];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| AuthError::HashingUnavailable(e.to_string()))?;

    let key = derive_key(password, &salt, HASH_ITERATIONS);
    Ok(format!(
        "{SCHEME_TAG}:{HASH_ITERATIONS}:{}:{}",
        hex::encode(salt),
        hex::encode(key)
    ))
}

/// Verify a password against a stored digest, versioned or legacy.
///
/// Malformed digests verify as `false`; this never panics on untrusted
/// input.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match parse_versioned(stored) {
        Some((iterations, salt, expected_hex)) => {
            let key = derive_key(password, &salt, iterations);
            constant_time_eq(hex::encode(key).as_bytes(), expected_hex.as_bytes())
        }
        None => {
            // Legacy path: unsalted single-pass SHA-256, hex-encoded.
            let digest = hex::encode(Sha256::digest(password.as_bytes()));
            constant_time_eq(digest.as_bytes(), stored.as_bytes())
        }
    }
}

/// Whether a stored digest predates the versioned scheme.
pub fn is_legacy_digest(stored: &str) -> bool {
    !stored.starts_with(SCHEME_TAG)
}

/// Split a versioned digest into (iterations, salt, expected key hex).
/// Returns `None` for anything that does not parse cleanly.
fn parse_versioned(stored: &str) -> Option<(u32, Vec<u8>, &str)> {
    let mut parts = stored.split(':');
    if parts.next()? != SCHEME_TAG {
        return None;
    }
    let iterations: u32 = parts.next()?.parse().ok()?;
    let salt = hex::decode(parts.next()?).ok()?;
    let expected_hex = parts.next()?;
    if iterations == 0 || salt.is_empty() || parts.next().is_some() {
        return None;
    }
    Some((iterations, salt, expected_hex))
}

/// PBKDF2-HMAC-SHA256 key derivation.
fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_BYTES] {
    let mut key = [0u8; KEY_BYTES];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let digest = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &digest));
        assert!(!verify_password("wrong horse battery", &digest));
    }

    #[test]
    fn digest_is_versioned_and_salted() {
        let digest = hash_password("secret123").unwrap();
        assert!(digest.starts_with("pbkdf2-sha256:100000:"));
        assert!(!is_legacy_digest(&digest));

        // Same password, different salt, different digest.
        let other = hash_password("secret123").unwrap();
        assert_ne!(digest, other);
    }

    #[test]
    fn legacy_digest_verifies_by_bare_sha256() {
        let legacy = hex::encode(Sha256::digest(b"oldpassword"));
        assert!(is_legacy_digest(&legacy));
        assert!(verify_password("oldpassword", &legacy));
        assert!(!verify_password("newpassword", &legacy));
    }

    #[test]
    fn verify_honors_iteration_count_in_digest() {
        // Build a low-round digest by hand; verify must re-derive with the
        // count carried in the digest, not the current default.
        let salt = [7u8; SALT_BYTES];
        let key = derive_key("pw", &salt, 1_000);
        let digest = format!(
            "pbkdf2-sha256:1000:{}:{}",
            hex::encode(salt),
            hex::encode(key)
        );
        assert!(verify_password("pw", &digest));
        assert!(!verify_password("pw2", &digest));
    }

    #[test]
    fn malformed_versioned_digests_verify_false() {
        for bad in [
            "pbkdf2-sha256",
            "pbkdf2-sha256:abc:00ff:00ff",
            "pbkdf2-sha256:0:00ff:00ff",
            "pbkdf2-sha256:1000::00ff",
            "pbkdf2-sha256:1000:zzzz:00ff",
            "pbkdf2-sha256:1000:00ff:00ff:extra",
        ] {
            assert!(!verify_password("pw", bad), "accepted: {bad}");
        }
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
