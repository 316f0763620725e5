//! The hatch pipeline: verify, extract into a scoped directory, plan sandbox
//! images, then execute every cell in manifest order.

use std::io;
use std::path::Path;
use std::process::Command;

use anyhow::Result;
use tracing::{info, warn};

use egg_core::errors::EggError;
use egg_core::lang::LanguageTable;
use egg_core::manifest::{self, Manifest};
use egg_core::{composer, sandbox, signer, verifier};

use crate::cli::args::HatchArgs;

pub fn run(args: HatchArgs) -> Result<()> {
    if !args.egg.is_file() {
        return Err(EggError::io(
            &args.egg,
            io::Error::new(io::ErrorKind::NotFound, "egg file not found"),
        )
        .into());
    }

    let seed = signer::resolve_signing_seed(None);
    let verify_key = signer::resolve_verifying_key(args.public_key.as_deref(), &seed)?;
    let entries = verifier::verify_archive(&args.egg, &verify_key)?;
    info!(egg = %args.egg.display(), entries, "egg verified");

    // Scoped workspace, removed on success, failure and cancellation.
    let workspace = tempfile::tempdir().map_err(|e| EggError::io("hatch workspace", e))?;
    verifier::extract_archive(&args.egg, workspace.path())?;
    let manifest = manifest::load_manifest(&workspace.path().join(composer::MANIFEST_FILE))?;

    let sandbox_plan = if args.no_sandbox {
        warn!("sandbox disabled, executing cells directly");
        None
    } else {
        let plan = sandbox::prepare_images(&manifest, &workspace.path().join("sandbox"))?;
        info!(
            images = plan.len(),
            "sandbox images prepared; cells execute with the host runtime"
        );
        Some(plan)
    };

    let table = LanguageTable::from_env();
    run_cells(&manifest, &table, workspace.path())?;

    if let Some(plan) = sandbox_plan {
        plan.release()?;
    }
    println!(
        "hatched {}: {} cells completed",
        args.egg.display(),
        manifest.cells.len()
    );
    Ok(())
}

fn run_cells(manifest: &Manifest, table: &LanguageTable, workspace: &Path) -> Result<()> {
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
            }
            .into());
        }

        let source = workspace.join(&cell.source);
        info!(source = %cell.source, language = %cell.language, "running cell");
        let status = Command::new(&command[0])
            .args(&command[1..])
            .arg(&source)
            .status()
            .map_err(|e| EggError::CellExec {
                path: source.clone(),
                reason: format!("failed to spawn {}: {e}", command[0]),
            })?;
        if !status.success() {
            return Err(EggError::CellExec {
                path: source,
                reason: format!("exited with {status}"),
            }
            .into());
        }
    }
    Ok(())
}
