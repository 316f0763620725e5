//! Recursive cleanup of build byproducts: `precompute_hashes.yaml` caches,
//! `*.out` cell outputs and `sandbox` directories.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use walkdir::WalkDir;

use egg_core::errors::EggError;
use egg_core::precompute;

use crate::cli::args::CleanArgs;

enum Target {
    File(PathBuf),
    Dir(PathBuf),
}

pub fn run(args: CleanArgs) -> Result<()> {
    let mut targets = Vec::new();

    let mut walker = WalkDir::new(&args.path).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| EggError::io(&args.path, e.into()))?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if entry.file_type().is_dir() && name == "sandbox" {
            targets.push(Target::Dir(entry.into_path()));
            walker.skip_current_dir();
        } else if entry.file_type().is_file()
            && (name == precompute::CACHE_FILE || name.ends_with(".out"))
        {
            targets.push(Target::File(entry.into_path()));
        }
    }

    if targets.is_empty() {
        println!("nothing to clean under {}", args.path.display());
        return Ok(());
    }

    for target in &targets {
        match target {
            Target::File(path) => {
                if args.dry_run {
                    println!("would remove {}", path.display());
                } else {
                    fs::remove_file(path).map_err(|e| EggError::io(path, e))?;
                    println!("removed {}", path.display());
                }
            }
            Target::Dir(path) => {
                if args.dry_run {
                    println!("would remove {}", path.display());
                } else {
                    fs::remove_dir_all(path).map_err(|e| EggError::io(path, e))?;
                    println!("removed {}", path.display());
                }
            }
        }
    }
    Ok(())
}
