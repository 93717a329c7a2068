use sha3::{Digest as _, Keccak256};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// 32-byte Keccak256 output: leaves, inner nodes and roots.
pub type Digest = [u8; 32];

/// 20-byte recipient identity.
pub type Address = [u8; 20];

/// Parses an Ethereum address from a hex string.
///
/// # Arguments
/// * `addr_str` - The address string, with or without "0x" prefix
///
/// # Returns
/// A 20-byte array representing the address
///
/// # Errors
/// Returns an error if the address is not 40 hex characters, contains invalid hex,
/// or is the zero address
pub fn parse_address(addr_str: &str) -> anyhow::Result<Address> {
    let cleaned = strip_hex_prefix(addr_str);
    if cleaned.len() != 40 {
        anyhow::bail!(
            "Invalid address length: expected 40 hex chars, got {}",
            cleaned.len()
        );
    }
    let mut address = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut address)
        .map_err(|e| anyhow::anyhow!("Invalid hex encoding: {}", e))?;
    if address == [0u8; 20] {
        anyhow::bail!("Zero address not allowed");
    }
    Ok(address)
}

/// Parses a 32-byte digest (a Merkle root or proof node) from hex.
pub fn parse_digest(hash_str: &str) -> anyhow::Result<Digest> {
    let cleaned = strip_hex_prefix(hash_str);
    if cleaned.len() != 64 {
        anyhow::bail!(
            "Invalid hash length: expected 64 hex chars, got {}",
            cleaned.len()
        );
    }
    let mut digest = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut digest)
        .map_err(|e| anyhow::anyhow!("Invalid hex encoding: {}", e))?;
    Ok(digest)
}

/// Parses a Merkle root, rejecting the all-zero value an unset root would have.
pub fn validate_merkle_root(root_str: &str) -> anyhow::Result<Digest> {
    let root = parse_digest(root_str)?;
    if root == [0u8; 32] {
        anyhow::bail!("Zero Merkle root not allowed");
    }
    Ok(root)
}

/// Parses a comma separated amount vector such as `1,0,3`.
pub fn parse_amounts(amounts_str: &str) -> anyhow::Result<Vec<u64>> {
    let trimmed = amounts_str.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Amount list is empty");
    }
    trimmed
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("Invalid amount '{}': {}", part.trim(), e))
        })
        .collect()
}

/// Formats an amount vector the way [`parse_amounts`] reads it.
pub fn format_amounts(amounts: &[u64]) -> String {
    amounts
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Lowercase hex with a `0x` prefix.
pub fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn strip_hex_prefix(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed.strip_prefix("0x").unwrap_or(trimmed)
}

/// Keccak256 of `left ‖ right`; the ordered primitive behind [`hash_pair`].
fn keccak256_hash(left: Digest, right: Digest) -> Digest {
    let hash = Keccak256::new()
        .chain_update(left)
        .chain_update(right)
        .finalize();
    hash.into()
}

/// Hashes an unordered pair of nodes.
///
/// The smaller value always goes first, so proofs carry no left/right bits
/// and match OpenZeppelin's `MerkleProof.verify`.
pub fn hash_pair(a: Digest, b: Digest) -> Digest {
    if a <= b {
        keccak256_hash(a, b)
    } else {
        keccak256_hash(b, a)
    }
}

/// Writes `contents` to `path` through a sibling temp file and a rename, so a
/// reader never observes a half-written file.
///
/// The temp file is `<file name>.tmp`, which never equals `path` itself.
pub fn write_file_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    let mut file = File::create(&temp_path)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    std::fs::rename(&temp_path, path)
}
