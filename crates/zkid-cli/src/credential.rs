//! # Credential Subcommand
//!
//! Issue a credential from a seed and a request file, or verify an issued
//! credential.
//!
//! The issuer identity is rebuilt from its key at genesis. Merkle-tree
//! proofs therefore anchor against a tree that exists only for the
//! duration of the command; a long-lived issuer service publishes its
//! state instead.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::Value;
use zkid_core::{Did, Timestamp};
use zkid_identity::IdentityRegistry;
use zkid_vc::{CredentialIssuer, CredentialRequest, ProofKind, ProofPolicy, VerifiableCredential};
use zkid_zkp::DecimalScale;

use crate::claim::read_json;
use crate::keys::load_key;

/// Credential subcommand arguments.
#[derive(Args, Debug)]
pub struct CredentialArgs {
    #[command(subcommand)]
    pub command: CredentialCommand,
}

/// Proof attached at issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProofKindArg {
    /// Ed25519 signature over the claim.
    Signature,
    /// Inclusion in the issuer's claims tree.
    MerkleTree,
}

impl From<ProofKindArg> for ProofKind {
    fn from(arg: ProofKindArg) -> Self {
        match arg {
            ProofKindArg::Signature => ProofKind::Signature,
            ProofKindArg::MerkleTree => ProofKind::MerkleTree,
        }
    }
}

/// Available credential subcommands.
#[derive(Subcommand, Debug)]
pub enum CredentialCommand {
    /// Issue a credential.
    Issue {
        /// Issuer seed file.
        #[arg(long)]
        key: PathBuf,
        /// Request file: holder, schemaUrl, schemaType, contextUrl,
        /// expiration and payload.
        #[arg(long)]
        request: PathBuf,
        /// Proof to attach.
        #[arg(long, value_enum, default_value = "signature")]
        proof: ProofKindArg,
        /// Merklize the payload instead of writing it to the data slots.
        #[arg(long)]
        merklized: bool,
        /// Fractional digits kept for decimal attributes.
        #[arg(long, default_value_t = 3)]
        scale: u32,
        /// Write the credential here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Verify an issued credential.
    Verify {
        /// Credential file.
        #[arg(long)]
        input: PathBuf,
    },
}

/// Request file contents; the issuer comes from the key.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueInput {
    pub holder: Did,
    pub schema_url: String,
    pub schema_type: String,
    pub context_url: String,
    #[serde(default)]
    pub expiration: Option<Timestamp>,
    pub payload: Value,
}

/// Execute the credential subcommand.
pub fn run_credential(args: &CredentialArgs) -> Result<u8> {
    match &args.command {
        CredentialCommand::Issue {
            key,
            request,
            proof,
            merklized,
            scale,
            output,
        } => {
            let key = load_key(key)?;
            let input: IssueInput = read_json(request)?;
            let scale = DecimalScale::new(*scale).context("invalid --scale")?;
            let vc = issue(key, input, (*proof).into(), *merklized, scale)?;
            let json = serde_json::to_string_pretty(&vc)?;
            match output {
                Some(path) => {
                    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
                    println!("credential {} written to {}", vc.id(), path.display());
                }
                None => println!("{json}"),
            }
            Ok(0)
        }
        CredentialCommand::Verify { input } => {
            let vc: VerifiableCredential = read_json(input)?;
            match zkid_vc::verify_credential(&vc, Timestamp::now()) {
                Ok(()) => {
                    println!("valid: {} issued by {} to {}", vc.id(), vc.issuer(), vc.holder());
                    Ok(0)
                }
                Err(e) => {
                    println!("invalid: {e}");
                    Ok(1)
                }
            }
        }
    }
}

/// Issue one credential from a genesis issuer identity.
pub fn issue(
    key: zkid_crypto::Ed25519KeyPair,
    input: IssueInput,
    kind: ProofKind,
    merklized: bool,
    scale: DecimalScale,
) -> Result<VerifiableCredential> {
    let registry = IdentityRegistry::default();
    let identity = registry
        .create(&key.public_key())
        .context("failed to create issuer identity")?;
    let policy = ProofPolicy::new().with(input.schema_type.clone(), kind);
    let issuer = CredentialIssuer::new(identity, key, policy)?.with_scale(scale);
    let request = CredentialRequest {
        issuer: issuer.did().clone(),
        holder: input.holder,
        schema_url: input.schema_url,
        schema_type: input.schema_type,
        context_url: input.context_url,
        expiration: input.expiration,
        payload: input.payload,
    };
    let draft = issuer.draft(request)?;
    Ok(issuer.issue(draft, merklized)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zkid_crypto::Ed25519KeyPair;

    fn input() -> IssueInput {
        let holder = crate::identity::summarize(&Ed25519KeyPair::from_seed(&[2u8; 32]).public_key(), "main")
            .unwrap()
            .did;
        serde_json::from_value(json!({
            "holder": holder,
            "schemaUrl": "https://schemas.example.com/kyc.json",
            "schemaType": "KYCAgeCredential",
            "contextUrl": "https://schemas.example.com/kyc.jsonld",
            "payload": {"birthday": 19960424, "documentType": 2}
        }))
        .unwrap()
    }

    #[test]
    fn issues_verifiable_signature_credential() {
        let vc = issue(
            Ed25519KeyPair::from_seed(&[1u8; 32]),
            input(),
            ProofKind::Signature,
            false,
            DecimalScale::default(),
        )
        .unwrap();
        zkid_vc::verify_credential(&vc, Timestamp::now()).unwrap();
    }

    #[test]
    fn issues_merkle_tree_credential() {
        let vc = issue(
            Ed25519KeyPair::from_seed(&[1u8; 32]),
            input(),
            ProofKind::MerkleTree,
            true,
            DecimalScale::default(),
        )
        .unwrap();
        assert_eq!(vc.proof.kind(), ProofKind::MerkleTree);
    }
}
