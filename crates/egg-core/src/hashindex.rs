//! The per-archive digest map.
//!
//! The hash index is the authoritative contents manifest of an egg: a total
//! mapping from archive-internal POSIX path to lowercase hex SHA-256,
//! serialized as a YAML mapping with sorted keys. The same codec backs the
//! precompute cache stored next to a manifest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::digest;
use crate::errors::{EggError, EggResult};
use crate::pathguard;

/// Archive entry holding the serialized index.
pub const HASHES_FILE: &str = "hashes.yaml";
/// Archive entry holding the hex Ed25519 signature over [`HASHES_FILE`].
pub const SIGNATURE_FILE: &str = "hashes.sig";

/// Sorted mapping of POSIX path to 64-hex SHA-256.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashIndex {
    entries: BTreeMap<String, String>,
}

impl HashIndex {
    /// Hash `files`, keyed by path relative to `base` (basename when absent).
    ///
    /// Duplicate keys are an error: two staged files must never collapse to
    /// one index entry.
    pub fn compute(files: &[PathBuf], base: Option<&Path>) -> EggResult<Self> {
        let mut entries = BTreeMap::new();
        for file in files {
            let key = match base {
                Some(base) => {
                    let rel = file.strip_prefix(base).map_err(|_| EggError::HashIndex {
                        reason: format!("{} is outside the staging base", file.display()),
                    })?;
                    pathguard::to_posix(rel)
                }
                None => match file.file_name() {
                    Some(name) => name.to_string_lossy().into_owned(),
                    None => {
                        return Err(EggError::HashIndex {
                            reason: format!("{} has no file name", file.display()),
                        })
                    }
                },
            };
            if entries.contains_key(&key) {
                return Err(EggError::HashIndex {
                    reason: format!("duplicate entry: {key}"),
                });
            }
            entries.insert(key, digest::digest_file(file)?);
        }
        Ok(Self { entries })
    }

    /// Record a digest, replacing any previous value for the key.
    pub fn set(&mut self, key: String, hex_digest: String) {
        self.entries.insert(key, hex_digest);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Serialize as a sorted YAML mapping.
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.entries).expect("string map serializes as YAML")
    }

    /// Parse serialized index bytes.
    ///
    /// An empty document is an empty index; anything other than a mapping of
    /// strings to strings is rejected.
    pub fn parse(bytes: &[u8]) -> EggResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_slice(bytes).map_err(|e| EggError::HashIndex {
            reason: format!("invalid YAML: {e}"),
        })?;
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(map) => map,
            _ => {
                return Err(EggError::HashIndex {
                    reason: "must contain a mapping".into(),
                })
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in map {
            let (Value::String(key), Value::String(value)) = (key, value) else {
                return Err(EggError::HashIndex {
                    reason: "keys and values must be strings".into(),
                });
            };
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    /// Load an index file from disk.
    pub fn load(path: &Path) -> EggResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| EggError::io(path, e))?;
        Self::parse(&bytes)
    }

    /// Persist atomically: write a temp sibling, then rename into place.
    pub fn write_atomic(&self, path: &Path) -> EggResult<()> {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.to_yaml()).map_err(|e| EggError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| EggError::io(path, e))
    }
}
