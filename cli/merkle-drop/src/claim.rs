use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use merkle_drop::{format_amounts, hex_encode, parse_amounts, DropState, ProofFile};

#[derive(Args, Debug)]
pub struct Cli {
    /// Drop state file
    #[arg(short, long, env = "MERKLE_DROP_STATE")]
    state: PathBuf,

    /// Proof file produced by `prove`
    #[arg(short, long)]
    proof: PathBuf,

    /// Amounts to claim now, one per category (comma separated)
    #[arg(short = 'n', long)]
    amounts: String,
}

pub fn run(cli: Cli) -> Result<()> {
    println!("Loading drop state from {:?}...", cli.state);
    let mut bound = DropState::load(&cli.state)
        .context("Failed to load drop state")?
        .bind();

    let decoded = ProofFile::load(&cli.proof)?.decode()?;
    let amounts = parse_amounts(&cli.amounts).context("Invalid amounts")?;

    println!(
        "Claiming {} of {} for {}...",
        format_amounts(&amounts),
        format_amounts(&decoded.max_allocation),
        hex_encode(decoded.recipient)
    );
    let receipt = bound
        .ledger
        .claim(
            &amounts,
            &decoded.max_allocation,
            &decoded.recipient,
            &decoded.proof,
        )
        .context("Claim rejected")?;

    // The credit journal lives in the same file, so one atomic write records
    // both the fulfillment and the new claimed totals.
    bound
        .to_state()
        .save(&cli.state)
        .context("Failed to save drop state")?;

    println!("\nClaim accepted!");
    println!("Credited: {}", format_amounts(&receipt.credited));
    println!("Claimed so far: {}", format_amounts(&receipt.claimed));
    Ok(())
}
