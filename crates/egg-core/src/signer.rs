//! Ed25519 signing and verification for egg archives.
//!
//! Key material is seed-based: any byte string works as a seed, with 32-byte
//! seeds used verbatim and everything else reduced with SHA-256 first. The
//! seed itself is never logged.

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::errors::{EggError, EggResult};

/// Built-in demonstration seed, used only when no key material is configured.
pub const DEFAULT_SEED: &[u8] = b"egg-signing-key";

pub const ENV_SIGNING_KEY: &str = "EGG_SIGNING_KEY";
pub const ENV_PRIVATE_KEY: &str = "EGG_PRIVATE_KEY";
pub const ENV_PUBLIC_KEY: &str = "EGG_PUBLIC_KEY";

/// Derive a signing key from arbitrary seed bytes.
pub fn signing_key_from_seed(seed: &[u8]) -> SigningKey {
    let seed: [u8; 32] = match seed.try_into() {
        Ok(exact) => exact,
        Err(_) => Sha256::digest(seed).into(),
    };
    SigningKey::from_bytes(&seed)
}

/// Resolve the signing seed: explicit value, then `EGG_SIGNING_KEY`, then
/// `EGG_PRIVATE_KEY`, then the built-in seed.
pub fn resolve_signing_seed(explicit: Option<&str>) -> Vec<u8> {
    if let Some(seed) = explicit {
        return seed.as_bytes().to_vec();
    }
    for var in [ENV_SIGNING_KEY, ENV_PRIVATE_KEY] {
        if let Ok(seed) = std::env::var(var) {
            if !seed.is_empty() {
                return seed.into_bytes();
            }
        }
    }
    DEFAULT_SEED.to_vec()
}

/// Build a verifying key from raw material.
///
/// 64 hex characters are decoded, raw 32 bytes pass through, and anything
/// else is reduced with SHA-256 first.
pub fn verifying_key_from_material(raw: &[u8]) -> EggResult<VerifyingKey> {
    let bytes = normalize_verify_bytes(raw);
    VerifyingKey::from_bytes(&bytes).map_err(|e| EggError::Signature {
        reason: format!("invalid verify key material: {e}"),
    })
}

/// Resolve the verifying key: explicit value, then `EGG_PUBLIC_KEY`, then the
/// key derived from `signing_seed`.
pub fn resolve_verifying_key(
    explicit: Option<&str>,
    signing_seed: &[u8],
) -> EggResult<VerifyingKey> {
    if let Some(raw) = explicit {
        return verifying_key_from_material(raw.as_bytes());
    }
    if let Ok(raw) = std::env::var(ENV_PUBLIC_KEY) {
        if !raw.is_empty() {
            return verifying_key_from_material(raw.as_bytes());
        }
    }
    Ok(signing_key_from_seed(signing_seed).verifying_key())
}

fn normalize_verify_bytes(raw: &[u8]) -> [u8; 32] {
    if raw.len() == 64 {
        if let Ok(decoded) = hex::decode(raw) {
            if let Ok(exact) = <[u8; 32]>::try_from(decoded.as_slice()) {
                return exact;
            }
        }
    }
    match raw.try_into() {
        Ok(exact) => exact,
        Err(_) => Sha256::digest(raw).into(),
    }
}

/// Sign a byte string.
pub fn sign(key: &SigningKey, bytes: &[u8]) -> Signature {
    key.sign(bytes)
}

/// Verify a signature over a byte string (constant-time).
pub fn verify(key: &VerifyingKey, bytes: &[u8], signature: &Signature) -> bool {
    key.verify_strict(bytes, signature).is_ok()
}
