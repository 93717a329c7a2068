use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use merkle_drop::{format_amounts, parse_address, parse_amounts, ProofFile};

use crate::build_tree::load_allow_list;

#[derive(Args, Debug)]
pub struct Cli {
    /// Allow-list file the root was built from
    #[arg(short, long)]
    input: PathBuf,

    /// Recipient address
    #[arg(short, long)]
    address: String,

    /// Allocation to prove (comma separated); defaults to the listed one
    #[arg(long)]
    allocation: Option<String>,

    /// Metadata pointer recorded in the proof file (e.g. IPFS CID)
    #[arg(short, long)]
    metadata: Option<String>,

    /// Output proof file
    #[arg(short, long)]
    output: PathBuf,
}

pub fn run(cli: &Cli) -> Result<()> {
    println!("Reading allow-list from {:?}...", cli.input);
    let list = load_allow_list(&cli.input)?;

    let recipient = parse_address(&cli.address).context("Invalid recipient address")?;
    let allocation = match &cli.allocation {
        Some(amounts) => parse_amounts(amounts).context("Invalid allocation")?,
        None => list
            .entry(&recipient)
            .map(|entry| entry.max_allocation.clone())
            .context("Address not found in allow-list")?,
    };

    println!("Generating Merkle proof...");
    let proof = ProofFile::from_allow_list(&list, &recipient, &allocation, cli.metadata.clone())
        .context("Failed to generate Merkle proof")?;

    println!("Writing proof to {:?}...", cli.output);
    proof.save(&cli.output)?;

    println!("\nProof generated successfully!");
    println!("Merkle root: {}", proof.merkle_root);
    println!("Allocation: {}", format_amounts(&proof.max_allocation));
    println!("Leaf index: {}", proof.leaf_index);
    println!("Proof length: {} nodes", proof.merkle_proof.len());

    Ok(())
}
