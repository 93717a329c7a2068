use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use merkle_drop::{hex_encode, leaf_hash, validate_merkle_root, verify, ProofFile};

#[derive(Args, Debug)]
pub struct Cli {
    /// Proof file produced by `prove`
    #[arg(short, long)]
    proof: PathBuf,

    /// Root to verify against instead of the one recorded in the proof file
    #[arg(short, long)]
    root: Option<String>,
}

pub fn run(cli: &Cli) -> Result<()> {
    let decoded = ProofFile::load(&cli.proof)?.decode()?;
    let root = match &cli.root {
        Some(root) => validate_merkle_root(root).context("Invalid Merkle root")?,
        None => decoded.root,
    };

    let leaf = leaf_hash(&decoded.recipient, &decoded.max_allocation);
    if !verify(&leaf, &decoded.proof, &root) {
        anyhow::bail!(
            "Proof for {} does not match root {}",
            hex_encode(decoded.recipient),
            hex_encode(root)
        );
    }

    println!(
        "Proof for {} is valid under root {}",
        hex_encode(decoded.recipient),
        hex_encode(root)
    );
    Ok(())
}
