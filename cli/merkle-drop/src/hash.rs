use sha3::{Digest as _, Keccak256};

use crate::common::{Address, Digest};

/// Width of one encoded amount word.
const WORD_SIZE: usize = 32;

/// Converts an allow-list entry into its 32-byte Merkle leaf.
///
/// The preimage is the Solidity packed encoding of `(uint256[], address)`:
/// every amount as a 32-byte big-endian word, then the 20-byte recipient.
/// Its length is always `32n + 20`, which pins down the number of categories
/// and can never equal the 64-byte preimage of an inner node.
pub fn leaf_hash(recipient: &Address, amounts: &[u64]) -> Digest {
    let mut hasher = Keccak256::new();
    for amount in amounts {
        hasher.update(amount_word(*amount));
    }
    hasher.update(recipient);
    hasher.finalize().into()
}

fn amount_word(amount: u64) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - 8..].copy_from_slice(&amount.to_be_bytes());
    word
}
