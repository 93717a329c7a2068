use thiserror::Error;

use crate::common::hex_encode;

/// Errors raised while building a tree or extracting a proof from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("merkle tree needs at least one leaf")]
    EmptyTree,

    #[error("leaf index {index} is out of range for tree with {leaves} leaves")]
    IndexOutOfRange { index: usize, leaves: usize },
}

/// Errors raised while committing an allow-list or looking up an entry in it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowListError {
    #[error("allow-list is empty")]
    Empty,

    #[error("recipient {} appears more than once (entries {first} and {second})", hex_encode(.recipient))]
    DuplicateRecipient {
        recipient: [u8; 20],
        first: usize,
        second: usize,
    },

    #[error("entry {index} has {found} categories, expected {expected}")]
    InconsistentCategories {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("recipient {} with the given allocation is not in the allow-list", hex_encode(.recipient))]
    NotInAllowList { recipient: [u8; 20] },

    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why a claim was rejected. A rejected claim never changes the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("requested {requested} categories but allocation has {allocated}")]
    ShapeMismatch { requested: usize, allocated: usize },

    #[error("no merkle root has been committed")]
    NoActiveCommitment,

    #[error("merkle proof does not match the active root")]
    InvalidProof,

    #[error("category {category}: requested {requested} exceeds allocation {allocated}")]
    ExceedsAllocation {
        category: usize,
        requested: u64,
        allocated: u64,
    },

    #[error("eligibility balance {available} does not cover allocation total {required}")]
    InsufficientEligibility { required: u128, available: u64 },

    #[error(
        "category {category}: already claimed {claimed}, requesting {requested} would exceed allocation {allocated}"
    )]
    CumulativeCapExceeded {
        category: usize,
        claimed: u64,
        requested: u64,
        allocated: u64,
    },

    #[error("eligibility oracle is not set")]
    OracleUnset,

    #[error("fulfillment sink is not set")]
    SinkUnset,

    #[error("eligibility oracle failed: {0}")]
    Oracle(CollaboratorError),

    #[error("fulfillment failed: {0}")]
    Fulfillment(CollaboratorError),
}

/// Errors from administrative ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error(
        "cannot spread aggregate {aggregate} across categories; use a per-category override"
    )]
    AmbiguousOverride { aggregate: u128 },
}

/// Errors reading or writing the persisted drop state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state io: {0}")]
    Io(#[from] std::io::Error),

    #[error("state json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field} in state: {reason}")]
    Invalid { field: &'static str, reason: String },
}
