//! Checksummed registry image download.
//!
//! Blobs stream into `<dest>.tmp` while a SHA-256 runs over the bytes; the
//! temp file is renamed into place only after length and digest checks pass
//! and is unlinked on every failure path. A destination that already matches
//! the expected digest is kept without any request.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use egg_core::digest::{digest_file, digests_match};
use egg_core::EggError;

use crate::error::{RegistryError, RegistryResult};

/// Progress is logged once per this many bytes.
const PROGRESS_GRANULARITY: u64 = 1024 * 1024;

const IMAGE_SUFFIX: &str = ".img";

/// Everything outside the URL-unreserved set (ALPHA / DIGIT / `-._~`).
const IMAGE_ID: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Blob URL for an image entry: `<base>/<percent-encoded entry>.img`.
pub fn image_url(base: &str, entry: &str) -> String {
    format!(
        "{}/{}{IMAGE_SUFFIX}",
        base.trim_end_matches('/'),
        utf8_percent_encode(entry, IMAGE_ID)
    )
}

/// Result of a [`download_image`] call.
#[derive(Debug)]
pub struct DownloadReport {
    pub url: String,
    pub bytes: u64,
    /// SHA-256 of the bytes now at the destination.
    pub digest: String,
    /// False when an existing destination matched the expected digest.
    pub fetched: bool,
}

/// Fetch `entry` from the registry into `dest`.
///
/// With `expected_digest`, an existing destination that matches is reused
/// without any HTTP request, and a downloaded body that does not match is a
/// checksum failure.
pub fn download_image(
    base: &str,
    entry: &str,
    dest: &Path,
    expected_digest: Option<&str>,
    timeout: Duration,
) -> RegistryResult<DownloadReport> {
    let url = image_url(base, entry);

    if dest.is_file() {
        if let Some(expected) = expected_digest {
            let observed = digest_file(dest)?;
            if digests_match(expected, &observed) {
                debug!(dest = %dest.display(), "existing image matches expected digest");
                let bytes = fs::metadata(dest)
                    .map_err(|e| EggError::io(dest, e))?
                    .len();
                return Ok(DownloadReport {
                    url,
                    bytes,
                    digest: observed,
                    fetched: false,
                });
            }
            info!(dest = %dest.display(), "existing image digest differs, re-fetching");
        }
    }

    let fetch_err = |cause: String| RegistryError::Fetch {
        url: url.clone(),
        cause,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| fetch_err(format!("failed to build HTTP client: {e}")))?;
    let mut response = client
        .get(&url)
        .send()
        .map_err(|e| fetch_err(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fetch_err(format!("HTTP {}", response.status())));
    }
    let advertised_len = response.content_length();

    let tmp = TmpGuard::new(dest);
    let mut file = File::create(tmp.path()).map_err(|e| EggError::io(tmp.path(), e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];
    let mut total: u64 = 0;
    let mut next_mark = PROGRESS_GRANULARITY;

    loop {
        let n = response
            .read(&mut buf)
            .map_err(|e| fetch_err(format!("read failed after {total} bytes: {e}")))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])
            .map_err(|e| EggError::io(tmp.path(), e))?;
        total += n as u64;
        while total >= next_mark {
            debug!(url = %url, "downloaded {} MiB", next_mark / PROGRESS_GRANULARITY);
            next_mark += PROGRESS_GRANULARITY;
        }
    }
    file.flush().map_err(|e| EggError::io(tmp.path(), e))?;
    drop(file);

    if let Some(expected) = advertised_len {
        if total != expected {
            return Err(RegistryError::Truncated {
                url,
                expected,
                got: total,
            });
        }
    }

    let observed = hex::encode(hasher.finalize());
    if let Some(expected) = expected_digest {
        if !digests_match(expected, &observed) {
            return Err(RegistryError::Checksum {
                url,
                expected: expected.to_string(),
                got: observed,
            });
        }
    }

    fs::rename(tmp.path(), dest).map_err(|e| EggError::io(dest, e))?;
    tmp.disarm();
    info!(url = %url, dest = %dest.display(), bytes = total, "fetched runtime image");
    Ok(DownloadReport {
        url,
        bytes: total,
        digest: observed,
        fetched: true,
    })
}

/// `<dest>.tmp`, unlinked on drop unless the download completed.
struct TmpGuard {
    path: PathBuf,
    armed: bool,
}

impl TmpGuard {
    fn new(dest: &Path) -> Self {
        let mut os = dest.as_os_str().to_os_string();
        os.push(".tmp");
        Self {
            path: PathBuf::from(os),
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
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
