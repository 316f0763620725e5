use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "egg",
    version,
    about = "Build, verify and hatch signed multi-language notebook archives"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a signed egg archive from a manifest
    Build(BuildArgs),
    /// Verify an egg archive and execute its cells
    Hatch(HatchArgs),
    /// Verify an egg archive's signature, digests and closure
    Verify(EggArgs),
    /// Print the manifest summary of a verified egg
    Info(EggArgs),
    /// List supported cell languages and their commands
    Languages,
    /// Remove precompute caches, cell outputs and sandbox directories
    Clean(CleanArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Path to the manifest YAML file
    #[arg(short, long, default_value = "manifest.yaml")]
    pub manifest: PathBuf,

    /// Path for the output egg file
    #[arg(short, long, default_value = "out.egg")]
    pub output: PathBuf,

    /// Overwrite the output if it exists
    #[arg(short, long)]
    pub force: bool,

    /// Precompute cell outputs before packaging
    #[arg(long)]
    pub precompute: bool,

    /// Per-cell timeout for precompute, in seconds
    #[arg(long, default_value = "60", value_parser = parse_positive_secs)]
    pub precompute_timeout: f64,

    /// Signing seed (overrides EGG_SIGNING_KEY / EGG_PRIVATE_KEY)
    #[arg(long)]
    pub private_key: Option<String>,

    /// Verify key for the post-build self check (raw or 64-hex)
    #[arg(long)]
    pub public_key: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HatchArgs {
    /// Egg file to hatch
    #[arg(short, long, default_value = "out.egg")]
    pub egg: PathBuf,

    /// Skip sandbox image preparation (unsafe)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Verify key (raw or 64-hex)
    #[arg(long)]
    pub public_key: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EggArgs {
    /// Egg file to inspect
    #[arg(short, long, default_value = "out.egg")]
    pub egg: PathBuf,

    /// Verify key (raw or 64-hex)
    #[arg(long)]
    pub public_key: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Root directory to clean
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// List what would be removed without removing it
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_positive_secs(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("{raw:?} is not a number of seconds"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be positive, got {raw:?}"));
    }
    Ok(secs)
}
