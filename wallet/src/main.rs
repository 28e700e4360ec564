// Copyright (c) 2026 Umbra Contributors. MIT License.
// See LICENSE for details.

//! # Umbra Wallet
//!
//! Entry point for the `umbra-wallet` binary.
//!
//! - `demo`: airdrop, top up and send privately, end to end
//! - `keygen`: write a fresh keyfile
//! - `address`: print a keyfile's address
//! - `version`: print build version information
//!
//! The demo runs the whole engine in-process: a [`MemoryLedger`] stands in
//! for the cluster and a [`LocalProver`] for the remote proving service.

mod amount;
mod cli;
mod keyfile;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::OsRng;
use std::sync::Arc;

use umbra_protocol::config::{Cluster, EngineConfig};
use umbra_protocol::crypto::{Keypair, PublicKey};
use umbra_protocol::prover::LocalProver;
use umbra_protocol::rpc::{self, LedgerRpc, MemoryLedger, TxSignature};
use umbra_protocol::transaction::builder::TX_VERSION;
use umbra_protocol::zkp::{PedersenParams, SpendProver};
use umbra_protocol::ShieldedClient;

use amount::format_tokens;
use cli::{Commands, UmbraWalletCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = UmbraWalletCli::parse();

    match cli.command {
        Commands::Demo(args) => run_demo(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Address(args) => address(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

async fn run_demo(args: cli::DemoArgs) -> Result<()> {
    logging::init_logging(
        "umbra_wallet=info,umbra_protocol=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            EngineConfig::from_json(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => EngineConfig {
            cluster: args.cluster,
            ..EngineConfig::default()
        },
    };
    let airdrop_amount = args.airdrop_amount();
    if args.top_up > airdrop_amount {
        bail!(
            "cannot top up {} from an airdrop of {}",
            format_tokens(args.top_up),
            format_tokens(airdrop_amount)
        );
    }

    let owner = match &args.keypair {
        Some(path) => keyfile::read_keypair(path)?,
        None => Keypair::generate(),
    };
    let destination = args
        .destination
        .unwrap_or_else(|| Keypair::generate().public_key());
    tracing::info!(
        owner = %owner.public_key(),
        %destination,
        cluster = %config.cluster,
        rpc = config.cluster.rpc_url(),
        "starting demo"
    );

    // --- In-process cluster and prover ---
    let params = PedersenParams::setup(&mut OsRng);
    let (spend_prover, verifier) = SpendProver::setup(params.clone(), &mut OsRng)?;
    let attester = Keypair::generate();
    let mut ledger = MemoryLedger::new(verifier, attester.public_key());
    if !config.cluster.supports_airdrop() {
        ledger = ledger.without_airdrops();
    }
    let ledger = Arc::new(ledger);
    let prover = Arc::new(LocalProver::new(spend_prover, attester, ledger.clone()));
    tracing::info!("spend circuit set up");

    // --- Public funds ---
    let airdrop = ledger
        .request_airdrop(&owner.public_key(), airdrop_amount)
        .await
        .with_context(|| format!("airdrop unavailable on {}", config.cluster))?;
    rpc::await_confirmation(
        ledger.as_ref(),
        &airdrop,
        config.confirmation_timeout,
        config.confirmation_poll_interval,
    )
    .await
    .context("airdrop not confirmed")?;
    tracing::info!(
        signature = %airdrop,
        explorer = %config.cluster.explorer_tx_url(airdrop.as_str()),
        "airdrop confirmed"
    );

    // --- Private balance ---
    let cluster = config.cluster;
    let client = ShieldedClient::connect(&owner, ledger.clone(), prover, params, config).await?;

    let top_up = client
        .top_up(args.top_up, &owner)
        .await
        .context("top-up failed")?;
    print_receipt(cluster, "top-up", &top_up.signature, top_up.amount, None);

    let send = client
        .send(args.send, destination)
        .await
        .context("private send failed")?;
    print_receipt(cluster, "send", &send.signature, send.amount, send.change);

    println!();
    println!("Balances");
    println!("  public          : {}", format_tokens(client.public_balance().await?));
    println!("  private         : {}", format_tokens(client.private_balance()));
    println!("  recipient       : {}", format_tokens(ledger.balance_of(&destination)));
    Ok(())
}

fn print_receipt(cluster: Cluster, label: &str, signature: &TxSignature, amount: u64, change: Option<u64>) {
    println!("{:<8} {} tokens", label, format_tokens(amount));
    println!("  signature       : {}", signature);
    println!("  explorer        : {}", cluster.explorer_tx_url(signature.as_str()));
    if let Some(change) = change {
        println!("  change          : {}", format_tokens(change));
    }
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = Keypair::generate();
    keyfile::write_keypair(&args.outfile, &keypair, args.force)?;
    println!("Wrote new keypair to {}", args.outfile.display());
    println!("  Address : {}", keypair.public_key());
    Ok(())
}

fn address(args: cli::AddressArgs) -> Result<()> {
    let public: PublicKey = keyfile::read_keypair(&args.keypair)?.public_key();
    println!("{}", public);
    Ok(())
}

fn print_version() {
    println!("umbra-wallet {}", env!("CARGO_PKG_VERSION"));
    println!("tx format    v{}", TX_VERSION);
}
