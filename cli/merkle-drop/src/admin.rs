use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use merkle_drop::{
    format_amounts, hex_encode, parse_address, parse_amounts, validate_merkle_root, BoundLedger,
    DropState, EligibilityOracle,
};

#[derive(Args, Debug)]
pub struct Cli {
    /// Drop state file
    #[arg(short, long, env = "MERKLE_DROP_STATE")]
    state: PathBuf,

    #[command(subcommand)]
    command: AdminCommand,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Create an empty drop state file
    Init {
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Replace the active Merkle root and its metadata pointer
    SetRoot {
        #[arg(short, long)]
        root: String,

        #[arg(short, long, default_value = "")]
        metadata: String,
    },
    /// Set a holder's collateral balance
    SetCollateral {
        #[arg(short, long)]
        address: String,

        #[arg(short, long)]
        balance: u64,
    },
    /// Reset a recipient's claimed amounts
    OverrideClaimed {
        #[arg(short, long)]
        address: String,

        /// New aggregate; only 0 or the current total are accepted
        #[arg(short, long, conflicts_with = "categories")]
        total: Option<u128>,

        /// Exact per-category claimed amounts (comma separated)
        #[arg(short, long)]
        categories: Option<String>,
    },
    /// Print the commitment, or one recipient's claimed amounts
    Show {
        #[arg(short, long)]
        address: Option<String>,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        AdminCommand::Init { force } => {
            if cli.state.exists() && !force {
                anyhow::bail!("State file {:?} already exists", cli.state);
            }
            DropState::default()
                .save(&cli.state)
                .context("Failed to write drop state")?;
            println!("Initialized drop state at {:?}", cli.state);
        }
        AdminCommand::SetRoot { root, metadata } => {
            let root = validate_merkle_root(&root).context("Invalid Merkle root")?;
            update_state(&cli.state, |bound| {
                bound.ledger.update_commitment(root, metadata);
                Ok(())
            })?;
            println!("Merkle root set to {}", hex_encode(root));
        }
        AdminCommand::SetCollateral { address, balance } => {
            let holder = parse_address(&address).context("Invalid address")?;
            update_state(&cli.state, |bound| {
                bound.collateral.set_balance(holder, balance);
                Ok(())
            })?;
            println!("Collateral of {} set to {}", hex_encode(holder), balance);
        }
        AdminCommand::OverrideClaimed {
            address,
            total,
            categories,
        } => {
            let recipient = parse_address(&address).context("Invalid address")?;
            let claimed = update_state(&cli.state, |bound| {
                match (total, categories) {
                    (_, Some(categories)) => {
                        let claimed = parse_amounts(&categories).context("Invalid categories")?;
                        bound.ledger.override_claimed_categories(&recipient, claimed);
                    }
                    (Some(total), None) => bound.ledger.override_claimed(&recipient, total)?,
                    (None, None) => anyhow::bail!("Pass either --total or --categories"),
                }
                Ok(bound.ledger.claimed(&recipient))
            })?;
            println!(
                "Claimed amounts of {} now {}",
                hex_encode(recipient),
                format_amounts(&claimed)
            );
        }
        AdminCommand::Show { address } => {
            let bound = DropState::load(&cli.state)
                .context("Failed to load drop state")?
                .bind();
            match bound.ledger.commitment() {
                Some(commitment) => {
                    println!("Merkle root: {}", hex_encode(commitment.root));
                    println!("Metadata: {}", commitment.metadata);
                }
                None => println!("Merkle root: <unset>"),
            }
            if let Some(address) = address {
                let recipient = parse_address(&address).context("Invalid address")?;
                println!(
                    "Claimed: [{}] (total {})",
                    format_amounts(&bound.ledger.claimed(&recipient)),
                    bound.ledger.claimed_total(&recipient)
                );
                println!(
                    "Collateral: {}",
                    bound.collateral.balance_of(&recipient)?
                );
            }
        }
    }

    Ok(())
}

/// Loads the drop state, applies `f` and writes the state back atomically.
fn update_state<T>(path: &Path, f: impl FnOnce(&mut BoundLedger) -> Result<T>) -> Result<T> {
    let mut bound = DropState::load(path)
        .context("Failed to load drop state")?
        .bind();
    let output = f(&mut bound)?;
    bound
        .to_state()
        .save(path)
        .context("Failed to save drop state")?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use merkle_drop::{AllowList, AllowListEntry, LedgerState};

    const HOLDER: [u8; 20] = [7u8; 20];

    /// State file where HOLDER has claimed `[1, 0, 2]` of `[1, 1, 2]`.
    fn claimed_state(dir: &Path) -> PathBuf {
        let list = AllowList::from_entries(vec![
            AllowListEntry::new(HOLDER, vec![1, 1, 2]),
            AllowListEntry::new([8u8; 20], vec![1, 1, 1]),
        ])
        .unwrap();
        let mut bound = DropState::default().bind();
        bound.ledger.update_commitment(list.root(), "ipfs://cid");
        bound.collateral.set_balance(HOLDER, 4);
        let proof = list.proof_for(&HOLDER, &[1, 1, 2]).unwrap();
        bound
            .ledger
            .claim(&[1, 0, 2], &[1, 1, 2], &HOLDER, &proof)
            .unwrap();

        let path = dir.join("drop.json");
        bound.to_state().save(&path).unwrap();
        path
    }

    fn override_claimed(
        state: &Path,
        total: Option<u128>,
        categories: Option<&str>,
    ) -> Result<()> {
        run(Cli {
            state: state.to_path_buf(),
            command: AdminCommand::OverrideClaimed {
                address: hex_encode(HOLDER),
                total,
                categories: categories.map(str::to_string),
            },
        })
    }

    #[test]
    fn test_override_with_categories_sets_exact_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = claimed_state(dir.path());

        override_claimed(&path, None, Some("0,1,1")).unwrap();

        let state = DropState::load(&path).unwrap();
        assert_eq!(state.ledger.claimed[&HOLDER], vec![0, 1, 1]);
        assert_eq!(state.credits.len(), 1);
    }

    #[test]
    fn test_override_with_zero_total_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = claimed_state(dir.path());

        override_claimed(&path, Some(0), None).unwrap();

        let state = DropState::load(&path).unwrap();
        assert_eq!(state.ledger.claimed[&HOLDER], vec![0, 0, 0]);
    }

    #[test]
    fn test_failed_override_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = claimed_state(dir.path());
        let before = std::fs::read(&path).unwrap();

        let err = override_claimed(&path, Some(2), None).unwrap_err();
        assert!(err.downcast_ref::<merkle_drop::AdminError>().is_some());
        assert_eq!(std::fs::read(&path).unwrap(), before);

        assert!(override_claimed(&path, None, None).is_err());
        assert!(override_claimed(&path, None, Some("1,x")).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_init_refuses_existing_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = claimed_state(dir.path());
        let before = std::fs::read(&path).unwrap();

        let init = |force| {
            run(Cli {
                state: path.clone(),
                command: AdminCommand::Init { force },
            })
        };
        assert!(init(false).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);

        init(true).unwrap();
        assert_eq!(DropState::load(&path).unwrap().ledger, LedgerState::default());
    }

    #[test]
    fn test_set_root_and_collateral() {
        let dir = tempfile::tempdir().unwrap();
        let path = claimed_state(dir.path());
        let root = format!("0x{}", "cd".repeat(32));

        run(Cli {
            state: path.clone(),
            command: AdminCommand::SetRoot {
                root: root.clone(),
                metadata: "ipfs://next".to_string(),
            },
        })
        .unwrap();
        run(Cli {
            state: path.clone(),
            command: AdminCommand::SetCollateral {
                address: hex_encode(HOLDER),
                balance: 9,
            },
        })
        .unwrap();

        let state = DropState::load(&path).unwrap();
        let commitment = state.ledger.commitment.unwrap();
        assert_eq!(commitment.root, [0xcd; 32]);
        assert_eq!(commitment.metadata, "ipfs://next");
        assert_eq!(state.collateral[&HOLDER], 9);
        assert_eq!(state.ledger.claimed[&HOLDER], vec![1, 0, 2]);
    }
}
