//! # zkid CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zkid_cli::claim::{run_claim, ClaimArgs};
use zkid_cli::credential::{run_credential, CredentialArgs};
use zkid_cli::identity::{run_identity, IdentityArgs};
use zkid_cli::keys::{run_key, KeyArgs};
use zkid_cli::query::{run_query, QueryArgs};

/// zkid: identity claims, credentials and zero-knowledge query tooling.
#[derive(Parser, Debug)]
#[command(name = "zkid", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate and inspect Ed25519 seeds.
    Key(KeyArgs),

    /// Show the identity controlled by a key.
    Identity(IdentityArgs),

    /// Encode and decode core claims.
    Claim(ClaimArgs),

    /// Issue and verify credentials.
    Credential(CredentialArgs),

    /// Validate selective-disclosure queries.
    Query(QueryArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Key(args) => run_key(&args),
        Commands::Identity(args) => run_identity(&args),
        Commands::Claim(args) => run_claim(&args),
        Commands::Credential(args) => run_credential(&args),
        Commands::Query(args) => run_query(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
