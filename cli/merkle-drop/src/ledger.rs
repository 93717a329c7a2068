//! Claim ledger: redeems Merkle-proved allocations in any number of partial
//! claims without letting any category's running total pass its cap.
//!
//! Every check runs before anything is changed. The fulfillment sink is called
//! last, and the claimed amounts are recorded only after it succeeds, so a
//! rejected or unfulfilled claim leaves the ledger exactly as it was.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::allowlist::Commitment;
use crate::collaborators::{EligibilityOracle, FulfillmentSink};
use crate::common::{format_amounts, hex_encode, Address, Digest};
use crate::error::{AdminError, ClaimError};
use crate::hash::leaf_hash;
use crate::merkle::verify;

/// The ledger's persistent part: active commitment and claimed vectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub commitment: Option<Commitment>,
    /// Cumulative claimed amount per category, per recipient.
    pub claimed: BTreeMap<Address, Vec<u64>>,
}

/// Result of an accepted claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub recipient: Address,
    pub root: Digest,
    /// Amounts handed to the fulfillment sink by this claim.
    pub credited: Vec<u64>,
    /// Running per-category totals after this claim.
    pub claimed: Vec<u64>,
}

pub struct ClaimLedger {
    state: LedgerState,
    oracle: Option<Box<dyn EligibilityOracle>>,
    sink: Option<Box<dyn FulfillmentSink>>,
}

impl fmt::Debug for ClaimLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimLedger")
            .field("state", &self.state)
            .field("oracle_set", &self.oracle.is_some())
            .field("sink_set", &self.sink.is_some())
            .finish()
    }
}

impl Default for ClaimLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimLedger {
    /// Empty ledger with no commitment and no collaborators bound.
    pub fn new() -> Self {
        Self::from_state(LedgerState::default())
    }

    pub fn from_state(state: LedgerState) -> Self {
        Self {
            state,
            oracle: None,
            sink: None,
        }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn into_state(self) -> LedgerState {
        self.state
    }

    pub fn commitment(&self) -> Option<&Commitment> {
        self.state.commitment.as_ref()
    }

    pub fn has_eligibility_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn has_fulfillment_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Per-category amounts claimed so far; empty if the recipient never claimed.
    pub fn claimed(&self, recipient: &Address) -> Vec<u64> {
        self.state
            .claimed
            .get(recipient)
            .cloned()
            .unwrap_or_default()
    }

    /// Sum of the recipient's claimed amounts over all categories.
    pub fn claimed_total(&self, recipient: &Address) -> u128 {
        self.state
            .claimed
            .get(recipient)
            .map(|amounts| amounts.iter().copied().map(u128::from).sum())
            .unwrap_or(0)
    }

    /// Redeems `amounts` for `recipient` against the allocation proved by
    /// `proof` under the active root.
    ///
    /// `max_allocation` must be exactly the committed vector. The recipient's
    /// eligibility balance must cover the allocation's total, and for every
    /// category the running total after this claim must stay within the
    /// allocation. On success the sink is credited with `amounts` and the
    /// running totals are updated.
    pub fn claim(
        &mut self,
        amounts: &[u64],
        max_allocation: &[u64],
        recipient: &Address,
        proof: &[Digest],
    ) -> Result<ClaimReceipt, ClaimError> {
        let result = self.execute_claim(amounts, max_allocation, recipient, proof);
        match &result {
            Ok(receipt) => info!(
                recipient = %hex_encode(recipient),
                credited = %format_amounts(&receipt.credited),
                claimed = %format_amounts(&receipt.claimed),
                "claim accepted"
            ),
            Err(err) => warn!(
                recipient = %hex_encode(recipient),
                requested = %format_amounts(amounts),
                error = %err,
                "claim rejected"
            ),
        }
        result
    }

    fn execute_claim(
        &mut self,
        amounts: &[u64],
        max_allocation: &[u64],
        recipient: &Address,
        proof: &[Digest],
    ) -> Result<ClaimReceipt, ClaimError> {
        let (root, updated) = self.check_claim(amounts, max_allocation, recipient, proof)?;

        let sink = self.sink.as_ref().ok_or(ClaimError::SinkUnset)?;
        sink.credit(recipient, amounts)
            .map_err(ClaimError::Fulfillment)?;

        self.state.claimed.insert(*recipient, updated.clone());

        Ok(ClaimReceipt {
            recipient: *recipient,
            root,
            credited: amounts.to_vec(),
            claimed: updated,
        })
    }

    /// Runs every claim check without side effects and returns the active
    /// root plus the recipient's claimed vector as it would be afterwards.
    fn check_claim(
        &self,
        amounts: &[u64],
        max_allocation: &[u64],
        recipient: &Address,
        proof: &[Digest],
    ) -> Result<(Digest, Vec<u64>), ClaimError> {
        if amounts.len() != max_allocation.len() {
            return Err(ClaimError::ShapeMismatch {
                requested: amounts.len(),
                allocated: max_allocation.len(),
            });
        }

        let root = self
            .state
            .commitment
            .as_ref()
            .map(|commitment| commitment.root)
            .ok_or(ClaimError::NoActiveCommitment)?;
        let leaf = leaf_hash(recipient, max_allocation);
        if !verify(&leaf, proof, &root) {
            return Err(ClaimError::InvalidProof);
        }

        for (category, (&requested, &allocated)) in amounts.iter().zip(max_allocation).enumerate()
        {
            if requested > allocated {
                return Err(ClaimError::ExceedsAllocation {
                    category,
                    requested,
                    allocated,
                });
            }
        }

        let oracle = self.oracle.as_ref().ok_or(ClaimError::OracleUnset)?;
        let required: u128 = max_allocation.iter().copied().map(u128::from).sum();
        let available = oracle.balance_of(recipient).map_err(ClaimError::Oracle)?;
        debug!(
            recipient = %hex_encode(recipient),
            available,
            required = %required,
            "eligibility checked"
        );
        if u128::from(available) < required {
            return Err(ClaimError::InsufficientEligibility {
                required,
                available,
            });
        }

        // Categories past the current allocation (left over from an older
        // root) are carried over untouched.
        let mut updated = self.claimed(recipient);
        if updated.len() < amounts.len() {
            updated.resize(amounts.len(), 0);
        }
        for (category, (&requested, &allocated)) in amounts.iter().zip(max_allocation).enumerate()
        {
            let claimed = updated[category];
            let total = u128::from(claimed) + u128::from(requested);
            if total > u128::from(allocated) {
                return Err(ClaimError::CumulativeCapExceeded {
                    category,
                    claimed,
                    requested,
                    allocated,
                });
            }
            // total <= allocated, so this cannot overflow
            updated[category] = claimed + requested;
        }

        Ok((root, updated))
    }

    /// Replaces the active commitment. Claimed totals are kept and are checked
    /// against whatever allocation is proved under the new root.
    pub fn update_commitment(&mut self, root: Digest, metadata: impl Into<String>) {
        let commitment = Commitment::new(root, metadata);
        info!(
            root = %hex_encode(commitment.root),
            metadata = %commitment.metadata,
            "merkle commitment updated"
        );
        self.state.commitment = Some(commitment);
    }

    pub fn set_eligibility_oracle(&mut self, oracle: impl EligibilityOracle + 'static) {
        info!("eligibility oracle bound");
        self.oracle = Some(Box::new(oracle));
    }

    pub fn clear_eligibility_oracle(&mut self) {
        info!("eligibility oracle cleared");
        self.oracle = None;
    }

    pub fn set_fulfillment_sink(&mut self, sink: impl FulfillmentSink + 'static) {
        info!("fulfillment sink bound");
        self.sink = Some(Box::new(sink));
    }

    pub fn clear_fulfillment_sink(&mut self) {
        info!("fulfillment sink cleared");
        self.sink = None;
    }

    /// Resets the recipient's claimed state from an aggregate value.
    ///
    /// Zero resets every category to zero. An aggregate equal to the current
    /// total is a no-op. Any other value cannot be split across categories
    /// and is refused; use [`override_claimed_categories`] instead.
    ///
    /// [`override_claimed_categories`]: Self::override_claimed_categories
    pub fn override_claimed(
        &mut self,
        recipient: &Address,
        aggregate: u128,
    ) -> Result<(), AdminError> {
        let current = self.claimed_total(recipient);
        if aggregate == current {
            return Ok(());
        }
        if aggregate != 0 {
            return Err(AdminError::AmbiguousOverride { aggregate });
        }
        if let Some(amounts) = self.state.claimed.get_mut(recipient) {
            amounts.iter_mut().for_each(|amount| *amount = 0);
        }
        warn!(
            recipient = %hex_encode(recipient),
            previous_total = %current,
            "claimed amounts reset to zero"
        );
        Ok(())
    }

    /// Sets the recipient's claimed vector exactly.
    pub fn override_claimed_categories(&mut self, recipient: &Address, claimed: Vec<u64>) {
        warn!(
            recipient = %hex_encode(recipient),
            previous = %format_amounts(&self.claimed(recipient)),
            claimed = %format_amounts(&claimed),
            "claimed amounts overridden"
        );
        self.state.claimed.insert(*recipient, claimed);
    }
}

/// Thread-safe handle to a [`ClaimLedger`].
///
/// Claims and admin calls hold the write lock across their whole
/// check-then-act sequence, collaborator calls included. Reads share the read
/// lock.
#[derive(Debug, Clone, Default)]
pub struct SharedClaimLedger {
    inner: Arc<RwLock<ClaimLedger>>,
}

impl SharedClaimLedger {
    pub fn new(ledger: ClaimLedger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn claim(
        &self,
        amounts: &[u64],
        max_allocation: &[u64],
        recipient: &Address,
        proof: &[Digest],
    ) -> Result<ClaimReceipt, ClaimError> {
        self.inner
            .write()
            .claim(amounts, max_allocation, recipient, proof)
    }

    pub fn update_commitment(&self, root: Digest, metadata: impl Into<String>) {
        self.inner.write().update_commitment(root, metadata);
    }

    pub fn set_eligibility_oracle(&self, oracle: impl EligibilityOracle + 'static) {
        self.inner.write().set_eligibility_oracle(oracle);
    }

    pub fn set_fulfillment_sink(&self, sink: impl FulfillmentSink + 'static) {
        self.inner.write().set_fulfillment_sink(sink);
    }

    pub fn override_claimed(&self, recipient: &Address, aggregate: u128) -> Result<(), AdminError> {
        self.inner.write().override_claimed(recipient, aggregate)
    }

    pub fn override_claimed_categories(&self, recipient: &Address, claimed: Vec<u64>) {
        self.inner
            .write()
            .override_claimed_categories(recipient, claimed);
    }

    pub fn claimed(&self, recipient: &Address) -> Vec<u64> {
        self.inner.read().claimed(recipient)
    }

    pub fn claimed_total(&self, recipient: &Address) -> u128 {
        self.inner.read().claimed_total(recipient)
    }

    pub fn commitment(&self) -> Option<Commitment> {
        self.inner.read().commitment().cloned()
    }

    /// Consistent copy of the ledger state.
    pub fn snapshot(&self) -> LedgerState {
        self.inner.read().state().clone()
    }
}
