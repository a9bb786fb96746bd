//! # Identity Subcommand
//!
//! Derives the DID, genesis id and tree roots of the identity controlled
//! by a seed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use zkid_claim::CoreClaim;
use zkid_core::{Did, Hash, IdentityId};
use zkid_identity::{IdentitySnapshot, ManagedIdentity, TreeConfig};

use crate::keys::load_key;

/// Identity subcommand arguments.
#[derive(Args, Debug)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub command: IdentityCommand,
}

/// Available identity subcommands.
#[derive(Subcommand, Debug)]
pub enum IdentityCommand {
    /// Print the genesis identity of a key.
    Show {
        /// Seed file.
        #[arg(long)]
        key: PathBuf,
        /// DID network segment.
        #[arg(long, default_value = "main")]
        network: String,
    },
}

/// JSON summary of a freshly created identity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub did: Did,
    pub id: IdentityId,
    pub genesis_state: Hash,
    pub snapshot: IdentitySnapshot,
    pub auth_claim: CoreClaim,
}

/// Execute the identity subcommand.
pub fn run_identity(args: &IdentityArgs) -> Result<u8> {
    match &args.command {
        IdentityCommand::Show { key, network } => {
            let key = load_key(key)?;
            let summary = summarize(&key.public_key(), network)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(0)
        }
    }
}

/// Genesis view of the identity for `key` on `network`.
pub fn summarize(key: &zkid_crypto::Ed25519PublicKey, network: &str) -> Result<IdentitySummary> {
    let config = TreeConfig {
        network: network.to_string(),
        ..TreeConfig::default()
    };
    let identity = ManagedIdentity::create(key, &config).context("failed to create identity")?;
    Ok(IdentitySummary {
        did: identity.did().clone(),
        id: identity.id(),
        genesis_state: identity.genesis_state(),
        snapshot: identity.snapshot(),
        auth_claim: *identity.auth_claim(),
    })
}
