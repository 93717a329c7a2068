use anyhow::Context;
use std::collections::HashMap;
use std::io::BufRead;

use crate::common::{parse_address, parse_amounts, Address, Digest};
use crate::error::AllowListError;
use crate::hash::leaf_hash;
use crate::merkle::MerkleTree;

/// A published root together with an opaque pointer to the human-readable
/// allow-list it was built from (usually an IPFS CID).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub root: Digest,
    pub metadata: String,
}

impl Commitment {
    pub fn new(root: Digest, metadata: impl Into<String>) -> Self {
        Self {
            root,
            metadata: metadata.into(),
        }
    }
}

/// One `(recipient, entitlement vector)` row of an allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListEntry {
    pub recipient: Address,
    pub max_allocation: Vec<u64>,
}

impl AllowListEntry {
    pub fn new(recipient: Address, max_allocation: Vec<u64>) -> Self {
        Self {
            recipient,
            max_allocation,
        }
    }

    pub fn leaf(&self) -> Digest {
        leaf_hash(&self.recipient, &self.max_allocation)
    }
}

/// An allow-list committed into a Merkle tree.
///
/// Entry order is leaf order. The whole tree is rebuilt from scratch for a new
/// allow-list; there is no incremental update.
#[derive(Debug, Clone)]
pub struct AllowList {
    entries: Vec<AllowListEntry>,
    index_map: HashMap<Address, usize>,
    tree: MerkleTree,
}

impl AllowList {
    pub fn from_entries(entries: Vec<AllowListEntry>) -> Result<Self, AllowListError> {
        let categories = entries
            .first()
            .map(|entry| entry.max_allocation.len())
            .ok_or(AllowListError::Empty)?;

        let mut index_map = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if entry.max_allocation.len() != categories {
                return Err(AllowListError::InconsistentCategories {
                    index,
                    expected: categories,
                    found: entry.max_allocation.len(),
                });
            }
            if let Some(first) = index_map.insert(entry.recipient, index) {
                return Err(AllowListError::DuplicateRecipient {
                    recipient: entry.recipient,
                    first,
                    second: index,
                });
            }
        }

        let leaves = entries.iter().map(AllowListEntry::leaf).collect();
        let tree = MerkleTree::build(leaves)?;

        Ok(Self {
            entries,
            index_map,
            tree,
        })
    }

    pub fn root(&self) -> Digest {
        self.tree.root()
    }

    pub fn commitment(&self, metadata: impl Into<String>) -> Commitment {
        Commitment::new(self.root(), metadata)
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    pub fn entries(&self) -> &[AllowListEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entitlement categories shared by every entry.
    pub fn categories(&self) -> usize {
        self.entries[0].max_allocation.len()
    }

    pub fn index_of(&self, recipient: &Address) -> Option<usize> {
        self.index_map.get(recipient).copied()
    }

    pub fn entry(&self, recipient: &Address) -> Option<&AllowListEntry> {
        self.index_of(recipient).map(|index| &self.entries[index])
    }

    /// Proof for `(recipient, max_allocation)`.
    ///
    /// Fails with `NotInAllowList` if the recipient is unknown or the vector
    /// differs from the committed one.
    pub fn proof_for(
        &self,
        recipient: &Address,
        max_allocation: &[u64],
    ) -> Result<Vec<Digest>, AllowListError> {
        let not_listed = || AllowListError::NotInAllowList {
            recipient: *recipient,
        };
        let index = self.index_of(recipient).ok_or_else(not_listed)?;
        let leaf = leaf_hash(recipient, max_allocation);
        if self.tree.leaf(index) != Some(leaf) {
            return Err(not_listed());
        }
        Ok(self.tree.proof(index)?)
    }
}

/// Reads an allow-list in the `0x<address>:<a0>,<a1>,...` line format.
///
/// Blank lines and lines starting with `#` are skipped. Parsing does not
/// check duplicates or vector lengths; [`AllowList::from_entries`] does.
pub fn parse_allow_list<R: BufRead>(reader: R) -> anyhow::Result<Vec<AllowListEntry>> {
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (addr_str, amounts_str) = trimmed.split_once(':').with_context(|| {
            format!(
                "Invalid format at line {}: expected 'address:amounts', got '{}'",
                line_num + 1,
                trimmed
            )
        })?;
        let recipient = parse_address(addr_str)
            .with_context(|| format!("Invalid address at line {}", line_num + 1))?;
        let max_allocation = parse_amounts(amounts_str)
            .with_context(|| format!("Invalid amounts at line {}", line_num + 1))?;

        entries.push(AllowListEntry::new(recipient, max_allocation));
    }

    Ok(entries)
}
