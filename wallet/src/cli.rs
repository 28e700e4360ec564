//! # CLI Interface
//!
//! Command-line surface of `umbra-wallet`, built with `clap` derive.
//! Amounts are given in whole tokens with up to nine decimals (`0.5`,
//! `1`, `0.000000001`) and converted to base units on parse.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use umbra_protocol::config::{Cluster, DEFAULT_AIRDROP_AMOUNT};
use umbra_protocol::crypto::PublicKey;

use crate::amount::parse_tokens;

/// Umbra shielded-balance wallet.
#[derive(Parser, Debug)]
#[command(
    name = "umbra-wallet",
    about = "Private balances on a public ledger",
    version,
    propagate_version = true
)]
pub struct UmbraWalletCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Airdrop, top up, then send privately, against an in-process ledger
    /// and prover.
    Demo(DemoArgs),
    /// Generate a keypair and write it to a keyfile.
    Keygen(KeygenArgs),
    /// Print the address of a keyfile.
    Address(AddressArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Keyfile to act as. A throwaway keypair is generated when omitted.
    #[arg(long, short = 'k', env = "UMBRA_KEYPAIR")]
    pub keypair: Option<PathBuf>,

    /// Engine configuration (JSON). Overrides `--cluster` when given.
    #[arg(long, short = 'c', env = "UMBRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cluster to run against.
    #[arg(long, env = "UMBRA_CLUSTER", default_value = "devnet")]
    pub cluster: Cluster,

    /// Public airdrop requested before topping up, in tokens. Defaults to
    /// one token.
    #[arg(long, value_parser = parse_tokens)]
    pub airdrop: Option<u64>,

    /// Amount moved into the private balance, in tokens.
    #[arg(long, default_value = "0.5", value_parser = parse_tokens)]
    pub top_up: u64,

    /// Amount sent privately, in tokens.
    #[arg(long, default_value = "0.4", value_parser = parse_tokens)]
    pub send: u64,

    /// Recipient address (base58). A fresh address is used when omitted.
    #[arg(long, short = 'd')]
    pub destination: Option<PublicKey>,

    /// Log format: `pretty` or `json`.
    #[arg(long, env = "UMBRA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl DemoArgs {
    pub fn airdrop_amount(&self) -> u64 {
        self.airdrop.unwrap_or(DEFAULT_AIRDROP_AMOUNT)
    }
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Where to write the keyfile.
    #[arg(long, short = 'o', env = "UMBRA_KEYPAIR")]
    pub outfile: PathBuf,

    /// Replace an existing keyfile.
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct AddressArgs {
    #[arg(long, short = 'k', env = "UMBRA_KEYPAIR")]
    pub keypair: PathBuf,
}
