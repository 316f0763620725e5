use std::io;

use anyhow::Result;

use egg_core::errors::EggError;
use egg_core::{signer, verifier};

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
    let entries = verifier::verify_archive(&args.egg, &verify_key)?;
    println!("{} verified: {} entries OK", args.egg.display(), entries);
    Ok(())
}
