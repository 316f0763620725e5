//! The build pipeline: resolve dependencies, optionally precompute, compose,
//! then verify the freshly written archive with the expected verify key. A
//! failed self check unlinks the output.

use std::fs;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use egg_core::errors::EggError;
use egg_core::lang::LanguageTable;
use egg_core::{composer, precompute, signer, verifier};
use egg_registry::RuntimeResolver;

use crate::cli::args::BuildArgs;

pub fn run(args: BuildArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        return Err(EggError::Exists { path: args.output }.into());
    }

    let resolver = RuntimeResolver::from_env()?;
    let dependencies = resolver.resolve(&args.manifest)?;

    if args.precompute {
        let table = LanguageTable::from_env();
        let timeout = Duration::from_secs_f64(args.precompute_timeout);
        let outcome = precompute::precompute_cells(&args.manifest, &table, timeout)?;
        info!(
            executed = outcome.executed,
            reused = outcome.reused,
            "precomputed cell outputs"
        );
    }

    let seed = signer::resolve_signing_seed(args.private_key.as_deref());
    let signing_key = signer::signing_key_from_seed(&seed);
    info!(
        manifest = %args.manifest.display(),
        output = %args.output.display(),
        "building egg"
    );
    let manifest = composer::compose(&args.manifest, &args.output, &dependencies, &signing_key)?;

    let verify_key = signer::resolve_verifying_key(args.public_key.as_deref(), &seed)?;
    if let Err(err) = verifier::verify_archive(&args.output, &verify_key) {
        let _ = fs::remove_file(&args.output);
        return Err(err.into());
    }

    println!(
        "built {} ({} cells) -> {}",
        manifest.name,
        manifest.cells.len(),
        args.output.display()
    );
    Ok(())
}
