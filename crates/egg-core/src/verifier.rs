//! Fail-closed egg archive verification.
//!
//! Verification is pure over bytes and runs a fixed sequence: scan every
//! entry name for path safety, check the Ed25519 signature over the exact
//! serialized hash index, stream-hash every listed entry, then require the
//! entry set and the index key set to be identical. The first violation
//! terminates the run; nothing in the archive is executed or followed
//! symbolically.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use ed25519_dalek::{Signature, VerifyingKey};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::composer::zip_err;
use crate::digest;
use crate::errors::{EggError, EggResult};
use crate::hashindex::{HashIndex, HASHES_FILE, SIGNATURE_FILE};
use crate::pathguard;
use crate::signer;

/// Verify an egg archive end to end.
///
/// Returns the number of content entries checked.
pub fn verify_archive(archive_path: &Path, verify_key: &VerifyingKey) -> EggResult<usize> {
    let file = File::open(archive_path).map_err(|e| EggError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| zip_err(archive_path, e))?;

    // Enumerate real entries, not the deduplicated name map: a name that
    // appears twice can shadow a verified entry.
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(|e| zip_err(archive_path, e))?;
        names.push(entry.name().to_string());
    }
    let mut present = BTreeSet::new();
    for name in &names {
        if !pathguard::is_safe_archive_path(name) {
            return Err(EggError::UnsafePath {
                entry: name.clone(),
            });
        }
        if !present.insert(name.as_str()) {
            return Err(EggError::Closure {
                extra: vec![name.clone()],
                missing: vec![],
            });
        }
    }

    let index_bytes = read_entry(&mut archive, HASHES_FILE, archive_path)?.ok_or_else(|| {
        EggError::Unsigned {
            archive: archive_path.to_path_buf(),
            reason: format!("{HASHES_FILE} missing"),
        }
    })?;
    let signature = read_signature(&mut archive, archive_path)?;

    if !signer::verify(verify_key, &index_bytes, &signature) {
        return Err(EggError::Signature {
            reason: format!(
                "signature verification failed for {}",
                archive_path.display()
            ),
        });
    }

    let index = HashIndex::parse(&index_bytes)?;

    for (entry_name, expected) in index.iter() {
        let observed = match archive.by_name(entry_name) {
            Ok(entry) => digest::digest_reader(entry).map_err(|e| EggError::io(archive_path, e))?,
            Err(ZipError::FileNotFound) => {
                return Err(EggError::MissingEntry {
                    entry: entry_name.to_string(),
                })
            }
            Err(e) => return Err(zip_err(archive_path, e)),
        };
        if !digest::digests_match(expected, &observed) {
            return Err(EggError::Digest {
                entry: entry_name.to_string(),
                expected: expected.to_string(),
                observed,
            });
        }
    }

    present.remove(HASHES_FILE);
    present.remove(SIGNATURE_FILE);
    let listed: BTreeSet<&str> = index.keys().collect();
    if present != listed {
        return Err(EggError::Closure {
            extra: present.difference(&listed).map(ToString::to_string).collect(),
            missing: listed.difference(&present).map(ToString::to_string).collect(),
        });
    }

    debug!(
        archive = %archive_path.display(),
        entries = index.len(),
        "archive verified"
    );
    Ok(index.len())
}

fn read_signature(
    archive: &mut ZipArchive<File>,
    archive_path: &Path,
) -> EggResult<Signature> {
    let unsigned = |reason: String| EggError::Unsigned {
        archive: archive_path.to_path_buf(),
        reason,
    };

    let raw = read_entry(archive, SIGNATURE_FILE, archive_path)?
        .ok_or_else(|| unsigned(format!("{SIGNATURE_FILE} missing")))?;
    let text = String::from_utf8(raw)
        .map_err(|_| unsigned(format!("{SIGNATURE_FILE} is not valid UTF-8")))?;
    let bytes = hex::decode(text.trim())
        .map_err(|_| unsigned(format!("{SIGNATURE_FILE} is not valid hex")))?;
    let bytes: [u8; 64] = bytes
        .try_into()
        .map_err(|_| unsigned("signature must be 64 bytes".into()))?;
    Ok(Signature::from_bytes(&bytes))
}

fn read_entry(
    archive: &mut ZipArchive<File>,
    name: &str,
    archive_path: &Path,
) -> EggResult<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| EggError::io(archive_path, e))?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(zip_err(archive_path, e)),
    }
}

/// Read a single entry of an already verified archive.
pub fn read_archive_entry(archive_path: &Path, name: &str) -> EggResult<Vec<u8>> {
    let file = File::open(archive_path).map_err(|e| EggError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| zip_err(archive_path, e))?;
    read_entry(&mut archive, name, archive_path)?.ok_or_else(|| EggError::MissingEntry {
        entry: name.to_string(),
    })
}

/// Extract a verified archive into `dest`.
///
/// Call only after [`verify_archive`] has accepted the archive; entry names
/// are still re-checked before any file is written.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> EggResult<()> {
    let file = File::open(archive_path).map_err(|e| EggError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| zip_err(archive_path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| zip_err(archive_path, e))?;
        let name = entry.name().to_string();
        if !pathguard::is_safe_archive_path(&name) {
            return Err(EggError::UnsafePath { entry: name });
        }
        let out = dest.join(&name);
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| EggError::io(parent, e))?;
        }
        let mut target = File::create(&out).map_err(|e| EggError::io(&out, e))?;
        std::io::copy(&mut entry, &mut target).map_err(|e| EggError::io(&out, e))?;
    }
    Ok(())
}
