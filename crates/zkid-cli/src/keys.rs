//! # Key Subcommand
//!
//! Ed25519 seed generation and inspection. Seeds are stored as a single
//! line of lowercase hex.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use rand::RngCore;
use zkid_crypto::Ed25519KeyPair;

/// Key subcommand arguments.
#[derive(Args, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

/// Available key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Generate a new seed file.
    Generate {
        /// Where to write the seed.
        #[arg(long)]
        output: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the public key of a seed file.
    Show {
        /// Seed file.
        #[arg(long)]
        key: PathBuf,
    },
}

/// Execute the key subcommand.
pub fn run_key(args: &KeyArgs) -> Result<u8> {
    match &args.command {
        KeyCommand::Generate { output, force } => {
            let key = generate_key(output, *force)?;
            println!("public key: {}", key.public_key().to_hex());
            println!("seed:       {}", output.display());
            Ok(0)
        }
        KeyCommand::Show { key } => {
            println!("{}", load_key(key)?.public_key().to_hex());
            Ok(0)
        }
    }
}

/// Write a fresh random seed to `path`.
pub fn generate_key(path: &Path, force: bool) -> Result<Ed25519KeyPair> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    let mut seed = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    std::fs::write(path, format!("{}\n", hex::encode(seed)))
        .with_context(|| format!("failed to write seed: {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions: {}", path.display()))?;
    }
    tracing::info!(path = %path.display(), "seed written");
    Ok(Ed25519KeyPair::from_seed(&seed))
}

/// Read a seed file.
pub fn load_key(path: &Path) -> Result<Ed25519KeyPair> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read seed: {}", path.display()))?;
    Ed25519KeyPair::from_seed_hex(&raw).with_context(|| format!("invalid seed in {}", path.display()))
}
