//! Streaming SHA-256 digests.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::{EggError, EggResult};

const BLOCK_SIZE: usize = 8192;

/// Hash a reader in fixed-size blocks, returning the lowercase hex digest.
pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; BLOCK_SIZE];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash a file's contents.
pub fn digest_file(path: &Path) -> EggResult<String> {
    let file = File::open(path).map_err(|e| EggError::io(path, e))?;
    digest_reader(file).map_err(|e| EggError::io(path, e))
}

/// Hash an in-memory buffer.
pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Constant-time comparison of two hex digests.
///
/// Returns false when either side is not a well-formed 32-byte hex digest.
pub fn digests_match(a: &str, b: &str) -> bool {
    match (decode_digest(a), decode_digest(b)) {
        (Some(a), Some(b)) => a.as_slice().ct_eq(b.as_slice()).into(),
        _ => false,
    }
}

fn decode_digest(hex_digest: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(hex_digest.trim()).ok()?;
    bytes.try_into().ok()
}
