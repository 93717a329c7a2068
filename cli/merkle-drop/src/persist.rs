//! JSON files exchanged by the CLI: proof files handed to claimants and the
//! drop state file holding the ledger plus its in-memory collaborators.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::allowlist::{AllowList, Commitment};
use crate::collaborators::{CollateralBook, Credit, CreditJournal};
use crate::common::{
    hex_encode, parse_address, parse_digest, validate_merkle_root, write_file_atomic, Address,
    Digest,
};
use crate::error::{AllowListError, StateError};
use crate::ledger::{ClaimLedger, LedgerState};

/// Everything a claimant needs to call `claim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofFile {
    pub merkle_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub recipient: String,
    pub max_allocation: Vec<u64>,
    pub leaf_index: usize,
    pub merkle_proof: Vec<String>,
}

/// A [`ProofFile`] with its hex fields decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedProof {
    pub root: Digest,
    pub recipient: Address,
    pub max_allocation: Vec<u64>,
    pub proof: Vec<Digest>,
}

impl ProofFile {
    pub fn from_allow_list(
        list: &AllowList,
        recipient: &Address,
        max_allocation: &[u64],
        metadata: Option<String>,
    ) -> Result<Self, AllowListError> {
        let proof = list.proof_for(recipient, max_allocation)?;
        let leaf_index = list
            .index_of(recipient)
            .ok_or(AllowListError::NotInAllowList {
                recipient: *recipient,
            })?;

        Ok(Self {
            merkle_root: hex_encode(list.root()),
            metadata,
            recipient: hex_encode(recipient),
            max_allocation: max_allocation.to_vec(),
            leaf_index,
            merkle_proof: proof.iter().map(hex_encode).collect(),
        })
    }

    pub fn decode(&self) -> anyhow::Result<DecodedProof> {
        let root = validate_merkle_root(&self.merkle_root).context("Invalid merkle_root")?;
        let recipient = parse_address(&self.recipient).context("Invalid recipient")?;
        let proof = self
            .merkle_proof
            .iter()
            .enumerate()
            .map(|(i, node)| {
                parse_digest(node).with_context(|| format!("Invalid merkle_proof[{}]", i))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(DecodedProof {
            root,
            recipient,
            max_allocation: self.max_allocation.clone(),
            proof,
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read proof file {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse proof JSON")
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize proof")?;
        write_file_atomic(path, &json).context("Failed to write proof file")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CommitmentRecord {
    merkle_root: String,
    #[serde(default)]
    metadata: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CreditRecord {
    recipient: String,
    amounts: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct DropStateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    commitment: Option<CommitmentRecord>,
    #[serde(default)]
    claimed: BTreeMap<String, Vec<u64>>,
    #[serde(default)]
    collateral: BTreeMap<String, u64>,
    #[serde(default)]
    credits: Vec<CreditRecord>,
}

/// Persisted drop: ledger state, collateral balances and the credit journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropState {
    pub ledger: LedgerState,
    pub collateral: BTreeMap<Address, u64>,
    pub credits: Vec<Credit>,
}

/// A ledger bound to the collateral book and credit journal of a [`DropState`].
#[derive(Debug)]
pub struct BoundLedger {
    pub ledger: ClaimLedger,
    pub collateral: Arc<CollateralBook>,
    pub journal: Arc<CreditJournal>,
}

impl BoundLedger {
    /// Captures the current ledger and collaborator contents.
    pub fn to_state(&self) -> DropState {
        DropState {
            ledger: self.ledger.state().clone(),
            collateral: self.collateral.balances(),
            credits: self.journal.credits(),
        }
    }
}

impl DropState {
    pub fn bind(self) -> BoundLedger {
        let collateral = Arc::new(CollateralBook::from_balances(self.collateral));
        let journal = Arc::new(CreditJournal::from_credits(self.credits));
        let mut ledger = ClaimLedger::from_state(self.ledger);
        ledger.set_eligibility_oracle(Arc::clone(&collateral));
        ledger.set_fulfillment_sink(Arc::clone(&journal));
        BoundLedger {
            ledger,
            collateral,
            journal,
        }
    }

    pub fn load(path: &Path) -> Result<Self, StateError> {
        let content = std::fs::read_to_string(path)?;
        let record: DropStateRecord = serde_json::from_str(&content)?;
        Self::from_record(record)
    }

    /// Atomically replaces the state file.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(&self.to_record())?;
        write_file_atomic(path, &json)?;
        Ok(())
    }

    fn to_record(&self) -> DropStateRecord {
        DropStateRecord {
            commitment: self
                .ledger
                .commitment
                .as_ref()
                .map(|commitment| CommitmentRecord {
                    merkle_root: hex_encode(commitment.root),
                    metadata: commitment.metadata.clone(),
                }),
            claimed: self
                .ledger
                .claimed
                .iter()
                .map(|(recipient, amounts)| (hex_encode(recipient), amounts.clone()))
                .collect(),
            collateral: self
                .collateral
                .iter()
                .map(|(holder, balance)| (hex_encode(holder), *balance))
                .collect(),
            credits: self
                .credits
                .iter()
                .map(|credit| CreditRecord {
                    recipient: hex_encode(credit.recipient),
                    amounts: credit.amounts.clone(),
                })
                .collect(),
        }
    }

    fn from_record(record: DropStateRecord) -> Result<Self, StateError> {
        let commitment = record
            .commitment
            .map(|commitment| {
                let root = parse_digest(&commitment.merkle_root)
                    .map_err(|e| invalid("commitment.merkle_root", e))?;
                Ok::<_, StateError>(Commitment::new(root, commitment.metadata))
            })
            .transpose()?;

        let claimed = address_map("claimed", record.claimed)?;
        let collateral = address_map("collateral", record.collateral)?;

        let credits = record
            .credits
            .into_iter()
            .map(|credit| {
                Ok(Credit {
                    recipient: state_address("credits", &credit.recipient)?,
                    amounts: credit.amounts,
                })
            })
            .collect::<Result<Vec<_>, StateError>>()?;

        Ok(Self {
            ledger: LedgerState {
                commitment,
                claimed,
            },
            collateral,
            credits,
        })
    }
}

fn invalid(field: &'static str, err: anyhow::Error) -> StateError {
    StateError::Invalid {
        field,
        reason: format!("{:#}", err),
    }
}

fn state_address(field: &'static str, value: &str) -> Result<Address, StateError> {
    parse_address(value).map_err(|e| invalid(field, e))
}

/// Keys that differ only in case or prefix name the same address; a second
/// one would silently replace the first, so it is refused.
fn address_map<V>(
    field: &'static str,
    entries: BTreeMap<String, V>,
) -> Result<BTreeMap<Address, V>, StateError> {
    let mut map = BTreeMap::new();
    for (key, value) in entries {
        let address = state_address(field, &key)?;
        if map.insert(address, value).is_some() {
            return Err(StateError::Invalid {
                field,
                reason: format!("duplicate address {}", hex_encode(address)),
            });
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::AllowListEntry;
    use crate::hash::leaf_hash;
    use crate::merkle::verify;

    fn list() -> AllowList {
        AllowList::from_entries(vec![
            AllowListEntry::new([1u8; 20], vec![1, 1, 1]),
            AllowListEntry::new([2u8; 20], vec![3, 0, 2]),
            AllowListEntry::new([3u8; 20], vec![0, 0, 9]),
        ])
        .unwrap()
    }

    #[test]
    fn test_proof_file_decodes_to_valid_proof() {
        let list = list();
        let file =
            ProofFile::from_allow_list(&list, &[2u8; 20], &[3, 0, 2], Some("ipfs://x".into()))
                .unwrap();
        assert_eq!(file.leaf_index, 1);
        assert!(file.merkle_root.starts_with("0x"));

        let decoded = file.decode().unwrap();
        assert_eq!(decoded.root, list.root());
        let leaf = leaf_hash(&decoded.recipient, &decoded.max_allocation);
        assert!(verify(&leaf, &decoded.proof, &decoded.root));
    }

    #[test]
    fn test_proof_file_rejects_bad_node() {
        let mut file = ProofFile::from_allow_list(&list(), &[1u8; 20], &[1, 1, 1], None).unwrap();
        file.merkle_proof[0] = "0x1234".to_string();
        let err = file.decode().unwrap_err();
        assert!(format!("{err:#}").contains("merkle_proof[0]"));
    }

    #[test]
    fn test_proof_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.json");
        let file = ProofFile::from_allow_list(&list(), &[3u8; 20], &[0, 0, 9], None).unwrap();
        file.save(&path).unwrap();
        assert_eq!(ProofFile::load(&path).unwrap(), file);
    }

    #[test]
    fn test_drop_state_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let list = list();
        let mut bound = DropState::default().bind();
        bound.ledger.update_commitment(list.root(), "ipfs://cid");
        bound.collateral.set_balance([1u8; 20], 3);
        let proof = list.proof_for(&[1u8; 20], &[1, 1, 1]).unwrap();
        bound
            .ledger
            .claim(&[1, 0, 1], &[1, 1, 1], &[1u8; 20], &proof)
            .unwrap();

        let state = bound.to_state();
        state.save(&path).unwrap();
        let loaded = DropState::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.credits.len(), 1);
        assert_eq!(loaded.ledger.claimed[&[1u8; 20]], vec![1, 0, 1]);

        let rebound = loaded.bind();
        assert!(rebound.ledger.has_eligibility_oracle());
        assert!(rebound.ledger.has_fulfillment_sink());
        assert_eq!(rebound.journal.balance_of(&[1u8; 20], 2), 1);
    }

    #[test]
    fn test_drop_state_rejects_bad_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"collateral": {"0xnothex": 3}}"#).unwrap();
        match DropState::load(&path) {
            Err(StateError::Invalid { field, .. }) => assert_eq!(field, "collateral"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_drop_state_rejects_duplicate_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let lower = format!("0x{}", "ab".repeat(20));
        let upper = format!("0x{}", "AB".repeat(20));

        let claimed = format!(r#"{{"claimed": {{"{lower}": [1, 1], "{upper}": [0, 0]}}}}"#);
        std::fs::write(&path, claimed).unwrap();
        match DropState::load(&path) {
            Err(StateError::Invalid { field, reason }) => {
                assert_eq!(field, "claimed");
                assert!(reason.contains(&lower));
            }
            other => panic!("unexpected {other:?}"),
        }

        let collateral = format!(r#"{{"collateral": {{"{lower}": 3, "{}": 0}}}}"#, "ab".repeat(20));
        std::fs::write(&path, collateral).unwrap();
        match DropState::load(&path) {
            Err(StateError::Invalid { field, .. }) => assert_eq!(field, "collateral"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_drop_state_missing_fields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(DropState::load(&path).unwrap(), DropState::default());
    }
}
