use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use merkle_drop::{hex_encode, parse_allow_list, write_file_atomic, AllowList};

#[derive(Args, Debug)]
pub struct Cli {
    /// Allow-list file, one `0x<address>:<a0>,<a1>,...` entry per line
    #[arg(short, long)]
    input: PathBuf,

    /// Output file for Merkle root
    #[arg(short, long)]
    root_output: Option<PathBuf>,

    /// Output file for index map (address -> leaf index)
    #[arg(short = 'x', long)]
    index_output: Option<PathBuf>,

    /// Output file for every tree level (level:index:hash)
    #[arg(short, long)]
    tree_output: Option<PathBuf>,
}

pub fn load_allow_list(path: &Path) -> Result<AllowList> {
    let file = File::open(path).context("Failed to open allow-list file")?;
    let entries = parse_allow_list(BufReader::new(file))?;
    AllowList::from_entries(entries).context("Invalid allow-list")
}

pub fn run(cli: Cli) -> Result<()> {
    println!("Reading allow-list from {:?}...", cli.input);
    let list = load_allow_list(&cli.input)?;

    println!(
        "Total entries: {} ({} categories)",
        list.len(),
        list.categories()
    );
    println!("Tree depth: {}", list.tree().depth());

    let root = hex_encode(list.root());
    println!("Merkle root: {}", root);

    if let Some(root_path) = &cli.root_output {
        write_file_atomic(root_path, &format!("{}\n", root)).context("Failed to write root")?;
    }

    if let Some(index_path) = &cli.index_output {
        let mut index_file = File::create(index_path).context("Failed to create index file")?;
        for (index, entry) in list.entries().iter().enumerate() {
            writeln!(index_file, "{}:{}", hex_encode(entry.recipient), index)
                .context("Failed to write index")?;
        }
    }

    if let Some(tree_path) = &cli.tree_output {
        println!("Writing Merkle tree to {:?}...", tree_path);
        let mut tree_file = File::create(tree_path).context("Failed to create tree file")?;

        for (level_num, level) in list.tree().levels().iter().enumerate() {
            for (i, hash) in level.iter().enumerate() {
                writeln!(tree_file, "{}:{}:{}", level_num, i, hex_encode(hash))
                    .context("Failed to write tree")?;
            }
        }
    }

    println!("Done!");
    Ok(())
}
