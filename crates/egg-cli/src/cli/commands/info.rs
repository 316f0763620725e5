//! Manifest summary of a verified egg. Only `manifest.yaml` is extracted.

use std::fs;
use std::io;

use anyhow::Result;

use egg_core::errors::EggError;
use egg_core::manifest::{self, Manifest};
use egg_core::{composer, signer, verifier};

use crate::cli::args::EggArgs;

pub fn run(args: EggArgs) -> Result<()> {
    if !args.egg.is_file() {
        return Err(EggError::io(
            &args.egg,
            io::Error::new(io::ErrorKind::NotFound, "egg file not found"),
        )
        .into());
    }

    let seed = signer::resolve_signing_seed(None);
    let verify_key = signer::resolve_verifying_key(args.public_key.as_deref(), &seed)?;
    verifier::verify_archive(&args.egg, &verify_key)?;

    let bytes = verifier::read_archive_entry(&args.egg, composer::MANIFEST_FILE)?;
    let scratch = tempfile::tempdir().map_err(|e| EggError::io("info workspace", e))?;
    let manifest_path = scratch.path().join(composer::MANIFEST_FILE);
    fs::write(&manifest_path, bytes).map_err(|e| EggError::io(&manifest_path, e))?;
    let manifest = manifest::load_manifest(&manifest_path)?;

    print_summary(&manifest);
    Ok(())
}

fn print_summary(manifest: &Manifest) {
    println!("Name:        {}", manifest.name);
    println!("Description: {}", manifest.description);
    if let Some(author) = &manifest.author {
        println!("Author:      {author}");
    }
    if let Some(license) = &manifest.license {
        println!("License:     {license}");
    }
    if let Some(created) = &manifest.created {
        println!("Created:     {created}");
    }
    println!("Cells:");
    for cell in &manifest.cells {
        println!("  - [{}] {}", cell.language, cell.source);
    }
    if !manifest.dependencies.is_empty() {
        println!("Dependencies:");
        for dep in &manifest.dependencies {
            println!("  - {dep}");
        }
    }
    if !manifest.permissions.is_empty() {
        println!("Permissions:");
        for (name, allowed) in &manifest.permissions {
            println!("  - {name}: {allowed}");
        }
    }
}
