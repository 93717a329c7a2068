//! Merkle allow-list drops.
//!
//! An allow-list of `(recipient, entitlement vector)` entries is committed into
//! a single Keccak256 Merkle root. Recipients then redeem their entitlement in
//! partial claims against a [`ClaimLedger`], which verifies the proof against
//! the active root, checks live eligibility and keeps every category's running
//! total within the committed cap.

#![forbid(unsafe_code)]

pub mod allowlist;
pub mod collaborators;
pub mod common;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod merkle;
pub mod persist;

pub use allowlist::{parse_allow_list, AllowList, AllowListEntry, Commitment};
pub use collaborators::{CollateralBook, Credit, CreditJournal, EligibilityOracle, FulfillmentSink};
pub use common::{
    format_amounts, hash_pair, hex_encode, parse_address, parse_amounts,
    parse_digest, validate_merkle_root, write_file_atomic, Address, Digest,
};
pub use error::{AdminError, AllowListError, ClaimError, CollaboratorError, MerkleError, StateError};
pub use hash::leaf_hash;
pub use ledger::{ClaimLedger, ClaimReceipt, LedgerState, SharedClaimLedger};
pub use merkle::{verify, MerkleTree};
pub use persist::{BoundLedger, DecodedProof, DropState, ProofFile};
