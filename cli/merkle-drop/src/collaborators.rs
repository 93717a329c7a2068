//! External capabilities consumed by the claim ledger.
//!
//! The ledger only sees the two traits. `CollateralBook` and `CreditJournal`
//! are in-memory bindings used by the CLI and by tests.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::common::{hex_encode, Address};
use crate::error::CollaboratorError;

/// Live source of a recipient's standing (e.g. collateral NFT balance).
pub trait EligibilityOracle: Send + Sync {
    fn balance_of(&self, recipient: &Address) -> Result<u64, CollaboratorError>;
}

/// Capability that delivers claimed amounts (e.g. a batch mint).
pub trait FulfillmentSink: Send + Sync {
    /// Called once per accepted claim with that claim's per-category amounts.
    fn credit(&self, recipient: &Address, amounts: &[u64]) -> Result<(), CollaboratorError>;
}

impl<T: EligibilityOracle + ?Sized> EligibilityOracle for Arc<T> {
    fn balance_of(&self, recipient: &Address) -> Result<u64, CollaboratorError> {
        (**self).balance_of(recipient)
    }
}

impl<T: FulfillmentSink + ?Sized> FulfillmentSink for Arc<T> {
    fn credit(&self, recipient: &Address, amounts: &[u64]) -> Result<(), CollaboratorError> {
        (**self).credit(recipient, amounts)
    }
}

/// Balance table answering [`EligibilityOracle`] queries.
#[derive(Debug, Default)]
pub struct CollateralBook {
    balances: RwLock<BTreeMap<Address, u64>>,
}

impl CollateralBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_balances(balances: BTreeMap<Address, u64>) -> Self {
        Self {
            balances: RwLock::new(balances),
        }
    }

    pub fn set_balance(&self, holder: Address, balance: u64) {
        self.balances.write().insert(holder, balance);
    }

    pub fn balances(&self) -> BTreeMap<Address, u64> {
        self.balances.read().clone()
    }
}

impl EligibilityOracle for CollateralBook {
    fn balance_of(&self, recipient: &Address) -> Result<u64, CollaboratorError> {
        Ok(self.balances.read().get(recipient).copied().unwrap_or(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub recipient: Address,
    pub amounts: Vec<u64>,
}

/// [`FulfillmentSink`] that records every credit and keeps running
/// per-category balances.
///
/// With `max_categories` set, a credit for more categories than that is
/// refused, the way a mint contract refuses unknown token types.
#[derive(Debug, Default)]
pub struct CreditJournal {
    credits: RwLock<Vec<Credit>>,
    max_categories: Option<usize>,
}

impl CreditJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_categories(max_categories: usize) -> Self {
        Self {
            credits: RwLock::default(),
            max_categories: Some(max_categories),
        }
    }

    pub fn from_credits(credits: Vec<Credit>) -> Self {
        Self {
            credits: RwLock::new(credits),
            max_categories: None,
        }
    }

    pub fn credits(&self) -> Vec<Credit> {
        self.credits.read().clone()
    }

    /// Total credited to `holder` in `category` across all credits.
    pub fn balance_of(&self, holder: &Address, category: usize) -> u64 {
        self.credits
            .read()
            .iter()
            .filter(|credit| credit.recipient == *holder)
            .filter_map(|credit| credit.amounts.get(category))
            .sum()
    }
}

impl FulfillmentSink for CreditJournal {
    fn credit(&self, recipient: &Address, amounts: &[u64]) -> Result<(), CollaboratorError> {
        if let Some(max) = self.max_categories {
            if amounts.len() > max {
                return Err(CollaboratorError::new(format!(
                    "cannot credit {} categories to {}, only {} supported",
                    amounts.len(),
                    hex_encode(recipient),
                    max
                )));
            }
        }
        self.credits.write().push(Credit {
            recipient: *recipient,
            amounts: amounts.to_vec(),
        });
        Ok(())
    }
}
