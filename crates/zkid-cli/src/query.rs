//! # Query Subcommand
//!
//! Validate a selective-disclosure request and print the circuit inputs it
//! produces, or list the operator table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;
use zkid_zkp::{DecimalScale, Operator, QueryBuilder};

use crate::claim::read_json;

/// Query subcommand arguments.
#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommand,
}

/// Available query subcommands.
#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Build circuit inputs from a `{"credentialSubject": ...}` query file.
    Build {
        /// Query file.
        #[arg(long)]
        input: PathBuf,
        /// Fractional digits kept for decimal operands.
        #[arg(long, default_value_t = 3)]
        scale: u32,
    },
    /// List operators with their codes and arity.
    Operators,
}

/// Execute the query subcommand.
pub fn run_query(args: &QueryArgs) -> Result<u8> {
    match &args.command {
        QueryCommand::Build { input, scale } => {
            let query: Value = read_json(input)?;
            let scale = DecimalScale::new(*scale).context("invalid --scale")?;
            match QueryBuilder::new(scale).build_request(&query) {
                Ok(built) => {
                    println!("{}", serde_json::to_string_pretty(&Value::Object(built.signals()))?);
                    Ok(0)
                }
                Err(e) => {
                    println!("invalid query: {e}");
                    Ok(1)
                }
            }
        }
        QueryCommand::Operators => {
            println!("{:<6} {:<12} arity", "code", "operator");
            for op in Operator::ALL {
                println!("{:<6} {:<12} {}", op.code(), op.symbol(), op.arity());
            }
            Ok(0)
        }
    }
}
