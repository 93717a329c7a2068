//! Binary Keccak256 Merkle tree over an ordered list of leaves.
//!
//! Each level pairs adjacent nodes left to right; a trailing odd node is
//! paired with itself. Pairs are hashed sorted (see [`hash_pair`]), so a
//! proof is just the list of sibling digests from leaf to root.

use crate::common::{hash_pair, Digest};
use crate::error::MerkleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaves, the last level holds only the root.
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    pub fn build(leaves: Vec<Digest>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next_level: Vec<Digest> = level
                .chunks(2)
                .map(|chunk| {
                    let left = chunk[0];
                    let right = chunk.get(1).copied().unwrap_or(left);
                    hash_pair(left, right)
                })
                .collect();
            levels.push(next_level);
        }

        Ok(Self { levels })
    }

    pub fn root(&self) -> Digest {
        // build() guarantees a non-empty top level
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn leaf(&self, index: usize) -> Option<Digest> {
        self.levels[0].get(index).copied()
    }

    /// Number of hashing levels above the leaves; also the proof length.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    /// Sibling digests from the leaf at `index` up to the root.
    ///
    /// The last node of an odd level is its own sibling, so every proof has
    /// exactly [`depth`](Self::depth) elements.
    pub fn proof(&self, index: usize) -> Result<Vec<Digest>, MerkleError> {
        let leaves = self.leaf_count();
        if index >= leaves {
            return Err(MerkleError::IndexOutOfRange { index, leaves });
        }

        let mut proof = Vec::with_capacity(self.depth());
        let mut current_index = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = if current_index % 2 == 0 {
                current_index + 1
            } else {
                current_index - 1
            };
            let sibling = level
                .get(sibling_index)
                .copied()
                .unwrap_or(level[current_index]);
            proof.push(sibling);
            current_index /= 2;
        }

        Ok(proof)
    }
}

/// Checks `leaf` against `root` by folding the proof, without the tree.
pub fn verify(leaf: &Digest, proof: &[Digest], root: &Digest) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |current, sibling| hash_pair(current, *sibling));
    computed == *root
}
