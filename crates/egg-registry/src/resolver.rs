//! Ordered dependency resolution.
//!
//! Walks a manifest's `dependencies` in order, rejecting duplicates, and
//! resolves each entry: entries containing `:` are image references (fetched
//! when a registry is configured, otherwise left unresolved), everything
//! else is a confined local path that must exist.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use tracing::debug;

use egg_core::deps::RuntimeDep;
use egg_core::manifest::{self, load_manifest};
use egg_core::pathguard;
use egg_core::EggError;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::fetch;

/// Resolves a manifest's dependency list against a registry configuration.
#[derive(Debug)]
pub struct RuntimeResolver {
    config: RegistryConfig,
    expected_digests: BTreeMap<String, String>,
}

impl RuntimeResolver {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            expected_digests: BTreeMap::new(),
        }
    }

    /// Resolver configured from the environment (see crate docs).
    pub fn from_env() -> RegistryResult<Self> {
        Ok(Self::new(RegistryConfig::from_env()?))
    }

    /// Pin the expected SHA-256 of an image entry. A destination file that
    /// already matches is reused without any HTTP request.
    pub fn expect_digest(mut self, entry: impl Into<String>, digest: impl Into<String>) -> Self {
        self.expected_digests.insert(entry.into(), digest.into());
        self
    }

    /// Resolve every dependency of `manifest_path`, order preserved.
    pub fn resolve(&self, manifest_path: &Path) -> RegistryResult<Vec<RuntimeDep>> {
        let manifest = load_manifest(manifest_path)?;
        let manifest_dir = manifest::manifest_dir(manifest_path);

        let mut seen_entries: HashSet<&str> = HashSet::new();
        let mut packaged_names: BTreeMap<String, String> = BTreeMap::new();
        let mut resolved = Vec::with_capacity(manifest.dependencies.len());

        for entry in &manifest.dependencies {
            if !seen_entries.insert(entry.as_str()) {
                return Err(EggError::DuplicateDependency {
                    name: entry.clone(),
                }
                .into());
            }
            let dep = if entry.contains(':') {
                self.resolve_image(entry, &manifest_dir, &mut packaged_names)?
            } else {
                resolve_local(entry, &manifest_dir, manifest_path)?
            };
            resolved.push(dep);
        }
        Ok(resolved)
    }

    fn resolve_image(
        &self,
        entry: &str,
        manifest_dir: &Path,
        packaged_names: &mut BTreeMap<String, String>,
    ) -> RegistryResult<RuntimeDep> {
        let (repo, tag) = validate_image_ref(entry)?;

        let Some(base) = &self.config.base_url else {
            debug!(entry, "no registry configured, leaving image reference unresolved");
            return Ok(RuntimeDep::Image {
                repo: repo.to_string(),
                tag: tag.to_string(),
                raw: entry.to_string(),
            });
        };

        let file_name = sanitized_image_name(entry);
        if let Some(previous) = packaged_names.insert(file_name.clone(), entry.to_string()) {
            return Err(EggError::DuplicateDependency {
                name: format!("{entry} collides with {previous} as {file_name}"),
            }
            .into());
        }
        // The sanitized name must land inside the manifest directory.
        pathguard::normalize(manifest_dir, Path::new(&file_name))?;
        let dest = manifest_dir.join(&file_name);

        let expected = self.expected_digests.get(entry).map(String::as_str);
        fetch::download_image(base, entry, &dest, expected, self.config.timeout)?;
        Ok(RuntimeDep::Local(dest))
    }
}

fn resolve_local(
    entry: &str,
    manifest_dir: &Path,
    manifest_path: &Path,
) -> RegistryResult<RuntimeDep> {
    let rel = pathguard::normalize(manifest_dir, Path::new(entry))?;
    let path = manifest_dir.join(rel);
    if !path.is_file() {
        return Err(EggError::MissingSource {
            path,
            manifest: manifest_path.to_path_buf(),
        }
        .into());
    }
    debug!(entry, path = %path.display(), "resolved local dependency");
    Ok(RuntimeDep::Local(path))
}

fn validate_image_ref(entry: &str) -> Result<(&str, &str), RegistryError> {
    let path_err = |reason: &str| -> RegistryError {
        EggError::Path {
            path: entry.to_string(),
            reason: reason.to_string(),
        }
        .into()
    };

    if entry.contains('\\') {
        return Err(path_err("backslashes are not allowed in image references"));
    }
    let Some((repo, tag)) = entry.split_once(':') else {
        return Err(path_err("image reference must be <repo>:<tag>"));
    };
    if repo.is_empty() {
        return Err(path_err("image repository must not be empty"));
    }
    if !pathguard::is_safe_archive_path(repo) {
        return Err(path_err("image repository must be a safe relative path"));
    }
    Ok((repo, tag))
}

/// Packaged file name for an image entry: `/ \ :` become `_`, plus `.img`.
fn sanitized_image_name(entry: &str) -> String {
    let mut name: String = entry
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    name.push_str(".img");
    name
}
