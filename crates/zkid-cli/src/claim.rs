//! # Claim Subcommand
//!
//! Encode a claim descriptor into its eight slots, or decode slots back.
//!
//! ```bash
//! zkid claim encode --input descriptor.json
//! zkid claim decode --input claim.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use zkid_claim::{ClaimDescriptor, CoreClaim};
use zkid_core::Hash;

/// Claim subcommand arguments.
#[derive(Args, Debug)]
pub struct ClaimArgs {
    #[command(subcommand)]
    pub command: ClaimCommand,
}

/// Available claim subcommands.
#[derive(Subcommand, Debug)]
pub enum ClaimCommand {
    /// Encode a descriptor JSON file into a core claim.
    Encode {
        /// Descriptor file.
        #[arg(long)]
        input: PathBuf,
    },
    /// Decode a core claim JSON file into its descriptor.
    Decode {
        /// Claim file.
        #[arg(long)]
        input: PathBuf,
    },
}

/// An encoded claim with its hashes.
#[derive(Debug, Serialize)]
pub struct EncodedClaim {
    pub claim: CoreClaim,
    pub hi: Hash,
    pub hv: Hash,
    pub hash: Hash,
}

/// Execute the claim subcommand.
pub fn run_claim(args: &ClaimArgs) -> Result<u8> {
    match &args.command {
        ClaimCommand::Encode { input } => {
            let desc: ClaimDescriptor = read_json(input)?;
            println!("{}", serde_json::to_string_pretty(&encode(&desc)?)?);
        }
        ClaimCommand::Decode { input } => {
            let claim: CoreClaim = read_json(input)?;
            let desc = claim.decode().context("claim does not decode")?;
            println!("{}", serde_json::to_string_pretty(&desc)?);
        }
    }
    Ok(0)
}

/// Encode `desc` and compute its hashes.
pub fn encode(desc: &ClaimDescriptor) -> Result<EncodedClaim> {
    let claim = CoreClaim::encode(desc).context("descriptor does not encode")?;
    Ok(EncodedClaim {
        claim,
        hi: claim.hi(),
        hv: claim.hv(),
        hash: claim.hash(),
    })
}

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
