use std::str::FromStr;

use anyhow::Context as _;
use bitcoin::{Amount, OutPoint, Txid};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use via_config::{ViaRuneEtcherConfig, ViaRuneEtcherSecrets};
use via_env_config::FromEnv;
use via_rune_etcher::{
    inscriber::{Etcher, EtchingRequest},
    signer::KeyManager,
    types::REQUIRED_COMMIT_CONFIRMATIONS,
};

#[derive(Debug, Parser)]
#[command(author = "Via Protocol", version, about = "Via rune etching utility", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the taproot address to fund and the amount it needs.
    Commit,
    /// Builds and signs the reveal transaction spending the funded commit output.
    Reveal {
        /// Transaction id of the funding transaction.
        #[arg(long)]
        txid: String,
        /// Output index of the commit output in the funding transaction.
        #[arg(long)]
        vout: u32,
        /// Value of the commit output in sats. Defaults to the required funding.
        #[arg(long)]
        amount: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let opts = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ViaRuneEtcherConfig::from_env().context("ViaRuneEtcherConfig::from_env()")?;
    let secrets = ViaRuneEtcherSecrets::from_env().context("ViaRuneEtcherSecrets::from_env()")?;

    let request = EtchingRequest::from_config(&config).context("Invalid etching config")?;
    let signer = KeyManager::new(&secrets.private_key, request.network())
        .context("Failed to load the operator key")?;
    let etcher = Etcher::new(Box::new(signer), request).context("Failed to prepare etching")?;

    match opts.command {
        Command::Commit => {
            let commit = etcher.commit_info().context("Failed to estimate the reveal")?;

            println!(
                "- please fund this address {} {} sat",
                commit.address,
                commit.required_funding.to_sat()
            );
            println!(
                "- wait until the funding transaction has at least {} confirmations, then run `reveal`",
                REQUIRED_COMMIT_CONFIRMATIONS
            );
        }
        Command::Reveal { txid, vout, amount } => {
            let funding = OutPoint {
                txid: Txid::from_str(&txid).context("Invalid funding txid")?,
                vout,
            };

            let reveal = etcher
                .reveal(funding, amount.map(Amount::from_sat))
                .context("Failed to build the reveal transaction")?;

            tracing::info!("Reveal txid {}", reveal.txid);
            println!("{}", reveal.raw_tx_hex);
        }
    }

    Ok(())
}
