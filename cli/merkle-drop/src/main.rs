#![forbid(unsafe_code)]
#![allow(unreachable_pub)]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod admin;
mod build_tree;
mod claim;
mod prove;
mod verify;

#[derive(Parser, Debug)]
#[command(name = "merkle-drop")]
#[command(about = "Merkle allow-list drop tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Log filter, e.g. "info" or "merkle_drop=debug"
    #[arg(long, global = true, env = "MERKLE_DROP_LOG", default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the Merkle tree for an allow-list and print its root
    BuildTree(build_tree::Cli),
    /// Write the proof file for one allow-list entry
    Prove(prove::Cli),
    /// Check a proof file against its root
    Verify(verify::Cli),
    /// Redeem part of an allocation against the drop state
    Claim(claim::Cli),
    /// Administer the drop state
    Admin(admin::Cli),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log)?)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::BuildTree(args) => build_tree::run(args)?,
        Commands::Prove(args) => prove::run(&args)?,
        Commands::Verify(args) => verify::run(&args)?,
        Commands::Claim(args) => claim::run(args)?,
        Commands::Admin(args) => admin::run(args)?,
    }

    Ok(())
}
