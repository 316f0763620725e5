//! Deterministic egg archive composition.
//!
//! The composer stages every packaged file in a scoped temporary tree,
//! computes the hash index over it, signs the serialized index, and emits a
//! ZIP whose bytes depend only on the input bytes and the signing key: fixed
//! entry timestamp and mode, DEFLATE, entries sorted by POSIX path, no
//! directory entries. The output is written to a temp sibling and renamed,
//! so an interrupted build never leaves a partial archive.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ed25519_dalek::SigningKey;
use tempfile::TempDir;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::deps::RuntimeDep;
use crate::errors::{EggError, EggResult};
use crate::hashindex::{HashIndex, HASHES_FILE, SIGNATURE_FILE};
use crate::manifest::{self, Manifest};
use crate::pathguard;
use crate::signer;

/// Fixed archive name of the manifest, independent of its filename on disk.
pub const MANIFEST_FILE: &str = "manifest.yaml";
/// Archive directory holding packaged runtime dependencies.
pub const RUNTIME_DIR: &str = "runtime";

/// Build a signed egg archive at `output_path`.
///
/// `dependencies` come from the runtime resolver; unresolved image
/// references are skipped. Returns the validated manifest.
pub fn compose(
    manifest_path: &Path,
    output_path: &Path,
    dependencies: &[RuntimeDep],
    signing_key: &SigningKey,
) -> EggResult<Manifest> {
    let manifest = manifest::load_manifest(manifest_path)?;
    let manifest_dir = manifest::manifest_dir(manifest_path);

    // Scoped staging tree, removed on success, failure and panic alike.
    let staging = TempDir::new().map_err(|e| EggError::io("staging directory", e))?;
    let root = staging.path();
    let mut staged: Vec<PathBuf> = Vec::new();

    let manifest_copy = root.join(MANIFEST_FILE);
    copy_file(manifest_path, &manifest_copy)?;
    staged.push(manifest_copy);

    for cell in &manifest.cells {
        if [MANIFEST_FILE, HASHES_FILE, SIGNATURE_FILE].contains(&cell.source.as_str()) {
            return Err(EggError::Path {
                path: cell.source.clone(),
                reason: "cell source collides with a reserved archive name".into(),
            });
        }
        let src = manifest_dir.join(&cell.source);
        if !src.is_file() {
            return Err(EggError::MissingSource {
                path: src,
                manifest: manifest_path.to_path_buf(),
            });
        }
        let dest = root.join(&cell.source);
        copy_file(&src, &dest)?;
        staged.push(dest);
    }

    let mut dep_names = BTreeSet::new();
    for dep in dependencies {
        let RuntimeDep::Local(path) = dep else {
            debug!(reference = ?dep, "unresolved image reference not packaged");
            continue;
        };
        let name = path.file_name().ok_or_else(|| EggError::Path {
            path: path.display().to_string(),
            reason: "dependency has no file name".into(),
        })?;
        let name_str = name.to_string_lossy().into_owned();
        if !dep_names.insert(name_str.clone()) {
            return Err(EggError::DuplicateDependency { name: name_str });
        }
        let dest = root.join(RUNTIME_DIR).join(name);
        copy_file(path, &dest)?;
        staged.push(dest);
    }

    let index = HashIndex::compute(&staged, Some(root))?;
    let index_bytes = index.to_yaml().into_bytes();
    let hashes_path = root.join(HASHES_FILE);
    fs::write(&hashes_path, &index_bytes).map_err(|e| EggError::io(&hashes_path, e))?;
    staged.push(hashes_path);

    let signature = signer::sign(signing_key, &index_bytes);
    let sig_path = root.join(SIGNATURE_FILE);
    fs::write(&sig_path, hex::encode(signature.to_bytes()))
        .map_err(|e| EggError::io(&sig_path, e))?;
    staged.push(sig_path);

    write_archive(root, &staged, output_path)?;
    debug!(
        output = %output_path.display(),
        entries = staged.len(),
        "composed egg archive"
    );
    Ok(manifest)
}

fn copy_file(src: &Path, dest: &Path) -> EggResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| EggError::io(parent, e))?;
    }
    fs::copy(src, dest).map_err(|e| EggError::io(src, e))?;
    Ok(())
}

/// Emit the staged tree as a deterministic ZIP.
fn write_archive(root: &Path, staged: &[PathBuf], output: &Path) -> EggResult<()> {
    let mut entries = Vec::with_capacity(staged.len());
    for path in staged {
        let rel = path.strip_prefix(root).map_err(|_| EggError::Path {
            path: path.display().to_string(),
            reason: "staged file outside the staging tree".into(),
        })?;
        entries.push((pathguard::to_posix(rel), path));
    }
    // Explicit sort: archive bytes must not depend on enumeration order.
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let tmp = tmp_sibling(output);
    let guard = TmpGuard::new(tmp.clone());
    let file = File::create(&tmp).map_err(|e| EggError::io(&tmp, e))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut buf = Vec::new();
    for (name, path) in &entries {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| zip_err(output, e))?;
        buf.clear();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut buf))
            .map_err(|e| EggError::io(path.as_path(), e))?;
        writer.write_all(&buf).map_err(|e| EggError::io(output, e))?;
    }
    writer.finish().map_err(|e| zip_err(output, e))?;

    fs::rename(&tmp, output).map_err(|e| EggError::io(output, e))?;
    guard.disarm();
    Ok(())
}

fn tmp_sibling(output: &Path) -> PathBuf {
    let mut os = output.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

pub(crate) fn zip_err(path: &Path, err: zip::result::ZipError) -> EggError {
    match err {
        zip::result::ZipError::Io(source) => EggError::io(path, source),
        other => EggError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        ),
    }
}

/// Removes the temp output unless disarmed; keeps failed builds partial-free.
struct TmpGuard {
    path: PathBuf,
    armed: bool,
}

impl TmpGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TmpGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
