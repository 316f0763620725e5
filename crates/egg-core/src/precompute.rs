//! Incremental precomputation of cell outputs.
//!
//! Each cell's stdout is captured to `<source>.out`, keyed by the SHA-256 of
//! the source at the time the output was produced. The cache lives next to
//! the manifest and is a pure optimization: a run with unchanged sources
//! spawns no processes, and a stale or missing cache only costs re-execution.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::digest;
use crate::errors::{EggError, EggResult};
use crate::hashindex::HashIndex;
use crate::lang::LanguageTable;
use crate::manifest;

/// Cache file stored next to the manifest.
pub const CACHE_FILE: &str = "precompute_hashes.yaml";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What a precompute run did.
#[derive(Debug)]
pub struct PrecomputeOutcome {
    /// `<source>.out` paths in manifest order.
    pub outputs: Vec<PathBuf>,
    pub executed: usize,
    pub reused: usize,
}

/// Execute every cell of `manifest_path`, reusing cached outputs where the
/// source digest is unchanged.
pub fn precompute_cells(
    manifest_path: &Path,
    table: &LanguageTable,
    timeout: Duration,
) -> EggResult<PrecomputeOutcome> {
    let manifest = manifest::load_manifest(manifest_path)?;
    let manifest_dir = manifest::manifest_dir(manifest_path);

    let cache_path = manifest_dir.join(CACHE_FILE);
    let previous = if cache_path.is_file() {
        HashIndex::load(&cache_path)?
    } else {
        HashIndex::default()
    };

    let mut next = HashIndex::default();
    let mut outcome = PrecomputeOutcome {
        outputs: Vec::with_capacity(manifest.cells.len()),
        executed: 0,
        reused: 0,
    };

    for cell in &manifest.cells {
        let command = table
            .command(&cell.language)
            .ok_or_else(|| EggError::UnsupportedLanguage {
                language: cell.language.clone(),
            })?;
        if which::which(&command[0]).is_err() {
            return Err(EggError::RuntimeMissing {
                binary: command[0].clone(),
                language: cell.language.clone(),
            });
        }

        let source = manifest_dir.join(&cell.source);
        let source_digest = digest::digest_file(&source)?;
        let out_file = output_path(&source);
        next.set(cell.source.clone(), source_digest.clone());

        if previous.get(&cell.source) == Some(source_digest.as_str()) && out_file.is_file() {
            debug!(source = %cell.source, "cached output up to date");
            outcome.reused += 1;
            outcome.outputs.push(out_file);
            continue;
        }

        run_cell(command, &source, &out_file, timeout)?;
        info!(source = %cell.source, output = %out_file.display(), "precomputed cell");
        outcome.executed += 1;
        outcome.outputs.push(out_file);
    }

    next.write_atomic(&cache_path)?;
    Ok(outcome)
}

/// `<source>.out`, next to the source file.
pub fn output_path(source: &Path) -> PathBuf {
    let mut name = source.file_name().unwrap_or_default().to_os_string();
    name.push(".out");
    source.with_file_name(name)
}

fn run_cell(
    command: &[String],
    source: &Path,
    out_file: &Path,
    timeout: Duration,
) -> EggResult<()> {
    let cell_err = |reason: String| EggError::CellExec {
        path: source.to_path_buf(),
        reason,
    };

    let stdout = File::create(out_file).map_err(|e| EggError::io(out_file, e))?;
    let mut child = Command::new(&command[0])
        .args(&command[1..])
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .spawn()
        .map_err(|e| cell_err(format!("failed to spawn {}: {e}", command[0])))?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = fs::remove_file(out_file);
                return Err(cell_err(format!(
                    "timed out after {:.1}s",
                    timeout.as_secs_f64()
                )));
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = fs::remove_file(out_file);
                return Err(cell_err(format!("failed to wait for {}: {e}", command[0])));
            }
        }
    };

    if !status.success() {
        let _ = fs::remove_file(out_file);
        return Err(cell_err(format!("exited with {status}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cat_table() -> LanguageTable {
        LanguageTable::defaults().with_commands([("text".to_string(), vec!["cat".to_string()])])
    }

    fn write_manifest(dir: &Path, cells: &[&str]) -> PathBuf {
        let mut text = String::from("name: pre\ndescription: d\ncells:\n");
        for source in cells {
            text.push_str(&format!("  - language: text\n    source: {source}\n"));
        }
        let path = dir.join("manifest.yaml");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn captures_stdout_and_caches() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note.txt"), "hello\n").unwrap();
        let manifest = write_manifest(dir.path(), &["note.txt"]);
        let table = cat_table();

        let first = precompute_cells(&manifest, &table, Duration::from_secs(10)).unwrap();
        assert_eq!(first.executed, 1);
        assert_eq!(first.reused, 0);
        let out = dir.path().join("note.txt.out");
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
        assert!(dir.path().join(CACHE_FILE).is_file());

        let second = precompute_cells(&manifest, &table, Duration::from_secs(10)).unwrap();
        assert_eq!(second.executed, 0);
        assert_eq!(second.reused, 1);
    }

    #[test]
    fn changed_source_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note.txt"), "one\n").unwrap();
        let manifest = write_manifest(dir.path(), &["note.txt"]);
        let table = cat_table();

        precompute_cells(&manifest, &table, Duration::from_secs(10)).unwrap();
        fs::write(dir.path().join("note.txt"), "two\n").unwrap();
        let rerun = precompute_cells(&manifest, &table, Duration::from_secs(10)).unwrap();

        assert_eq!(rerun.executed, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("note.txt.out")).unwrap(),
            "two\n"
        );
    }

    #[test]
    fn missing_cached_output_forces_rerun() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note.txt"), "hello\n").unwrap();
        let manifest = write_manifest(dir.path(), &["note.txt"]);
        let table = cat_table();

        precompute_cells(&manifest, &table, Duration::from_secs(10)).unwrap();
        fs::remove_file(dir.path().join("note.txt.out")).unwrap();
        let rerun = precompute_cells(&manifest, &table, Duration::from_secs(10)).unwrap();
        assert_eq!(rerun.executed, 1);
    }

    #[test]
    fn unsupported_language_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note.cob"), "x").unwrap();
        let mut text = String::from("name: pre\ndescription: d\ncells:\n");
        text.push_str("  - language: cobol\n    source: note.cob\n");
        let manifest = dir.path().join("manifest.yaml");
        fs::write(&manifest, text).unwrap();

        let err =
            precompute_cells(&manifest, &cat_table(), Duration::from_secs(10)).unwrap_err();
        assert_eq!(err.reason_code(), "E_UNSUPPORTED_LANG");
    }

    #[test]
    fn missing_runtime_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note.txt"), "x").unwrap();
        let manifest = write_manifest(dir.path(), &["note.txt"]);
        let table = LanguageTable::defaults().with_commands([(
            "text".to_string(),
            vec!["definitely-not-a-real-binary".to_string()],
        )]);

        let err = precompute_cells(&manifest, &table, Duration::from_secs(10)).unwrap_err();
        assert_eq!(err.reason_code(), "E_RUNTIME_MISSING");
    }

    #[test]
    fn failing_cell_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note.txt"), "x").unwrap();
        let manifest = write_manifest(dir.path(), &["note.txt"]);
        let table = LanguageTable::defaults().with_commands([(
            "text".to_string(),
            vec!["sh".to_string(), "-c".to_string(), "echo partial; exit 3".to_string()],
        )]);

        let err = precompute_cells(&manifest, &table, Duration::from_secs(10)).unwrap_err();
        assert_eq!(err.reason_code(), "E_CELL_EXEC");
        assert!(!dir.path().join("note.txt.out").exists());
        assert!(!dir.path().join(CACHE_FILE).exists());
    }

    #[test]
    fn timed_out_cell_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note.txt"), "x").unwrap();
        let manifest = write_manifest(dir.path(), &["note.txt"]);
        let table = LanguageTable::defaults().with_commands([(
            "text".to_string(),
            vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()],
        )]);

        let start = Instant::now();
        let err = precompute_cells(&manifest, &table, Duration::from_millis(200)).unwrap_err();
        assert_eq!(err.reason_code(), "E_CELL_EXEC");
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(4));
        assert!(!dir.path().join("note.txt.out").exists());
    }
}
