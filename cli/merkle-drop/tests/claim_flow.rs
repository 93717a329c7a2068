use std::sync::Arc;
use std::thread;

use merkle_drop::{
    AllowList, AllowListEntry, ClaimError, ClaimLedger, CollateralBook, CreditJournal, DropState,
    SharedClaimLedger,
};

fn holders(n: u8) -> Vec<[u8; 20]> {
    (1..=n).map(|i| [i; 20]).collect()
}

/// Ten holders with one of each of three token types, like the default drop.
fn default_drop() -> (AllowList, Vec<[u8; 20]>) {
    let addresses = holders(10);
    let entries = addresses
        .iter()
        .map(|address| AllowListEntry::new(*address, vec![1, 1, 1]))
        .collect();
    (AllowList::from_entries(entries).unwrap(), addresses)
}

fn bound_ledger(list: &AllowList) -> (ClaimLedger, Arc<CollateralBook>, Arc<CreditJournal>) {
    let collateral = Arc::new(CollateralBook::new());
    let journal = Arc::new(CreditJournal::new());
    let mut ledger = ClaimLedger::new();
    ledger.update_commitment(list.root(), "hash");
    ledger.set_eligibility_oracle(Arc::clone(&collateral));
    ledger.set_fulfillment_sink(Arc::clone(&journal));
    (ledger, collateral, journal)
}

#[test]
fn batches_and_single_claim_reach_same_state() {
    let (list, addresses) = default_drop();
    let (batched, single) = (addresses[0], addresses[1]);
    let (mut ledger, collateral, journal) = bound_ledger(&list);
    collateral.set_balance(batched, 3);
    collateral.set_balance(single, 3);

    let proof = list.proof_for(&batched, &[1, 1, 1]).unwrap();
    for amounts in [[1, 0, 0], [0, 1, 0], [0, 0, 1]] {
        ledger.claim(&amounts, &[1, 1, 1], &batched, &proof).unwrap();
    }
    let proof = list.proof_for(&single, &[1, 1, 1]).unwrap();
    ledger.claim(&[1, 1, 1], &[1, 1, 1], &single, &proof).unwrap();

    assert_eq!(ledger.claimed(&batched), ledger.claimed(&single));
    for category in 0..3 {
        assert_eq!(
            journal.balance_of(&batched, category),
            journal.balance_of(&single, category)
        );
    }
}

#[test]
fn exhausted_allocation_rejects_every_positive_claim() {
    let (list, addresses) = default_drop();
    let holder = addresses[4];
    let (mut ledger, collateral, journal) = bound_ledger(&list);
    collateral.set_balance(holder, 6);

    let proof = list.proof_for(&holder, &[1, 1, 1]).unwrap();
    ledger.claim(&[1, 1, 1], &[1, 1, 1], &holder, &proof).unwrap();
    let before = ledger.state().clone();

    for amounts in [[1, 0, 0], [0, 1, 0], [0, 0, 1], [1, 1, 1]] {
        let err = ledger
            .claim(&amounts, &[1, 1, 1], &holder, &proof)
            .unwrap_err();
        assert!(matches!(err, ClaimError::CumulativeCapExceeded { .. }));
    }
    assert_eq!(ledger.state(), &before);
    assert_eq!(journal.credits().len(), 1);
}

#[test]
fn rejected_claims_leave_ledger_untouched() {
    let (list, addresses) = default_drop();
    let holder = addresses[2];
    let (mut ledger, collateral, journal) = bound_ledger(&list);
    collateral.set_balance(holder, 2);
    let proof = list.proof_for(&holder, &[1, 1, 1]).unwrap();
    let before = ledger.state().clone();

    let attempts: Vec<(Vec<u64>, Vec<u64>, ClaimError)> = vec![
        (
            vec![1, 1, 1],
            vec![1, 1, 1],
            ClaimError::InsufficientEligibility {
                required: 3,
                available: 2,
            },
        ),
        (
            vec![1, 1],
            vec![1, 1, 1],
            ClaimError::ShapeMismatch {
                requested: 2,
                allocated: 3,
            },
        ),
        (vec![1, 1, 1], vec![2, 1, 1], ClaimError::InvalidProof),
    ];
    for (amounts, allocation, expected) in attempts {
        let err = ledger
            .claim(&amounts, &allocation, &holder, &proof)
            .unwrap_err();
        assert_eq!(err, expected);
        assert_eq!(ledger.state(), &before);
    }
    assert!(journal.credits().is_empty());
}

#[test]
fn proof_from_replaced_root_is_refused() {
    let (list, addresses) = default_drop();
    let holder = addresses[0];
    let (mut ledger, collateral, _journal) = bound_ledger(&list);
    collateral.set_balance(holder, 100);
    let old_proof = list.proof_for(&holder, &[1, 1, 1]).unwrap();

    let big = AllowList::from_entries(vec![AllowListEntry::new(holder, vec![34, 33, 33])]).unwrap();
    ledger.update_commitment(big.root(), "hash2");

    let err = ledger
        .claim(&[1, 1, 1], &[1, 1, 1], &holder, &old_proof)
        .unwrap_err();
    assert_eq!(err, ClaimError::InvalidProof);

    let proof = big.proof_for(&holder, &[34, 33, 33]).unwrap();
    ledger
        .claim(&[34, 33, 33], &[34, 33, 33], &holder, &proof)
        .unwrap();
    assert_eq!(ledger.claimed_total(&holder), 100);
}

#[test]
fn concurrent_claims_never_overshoot_cap() {
    let holder = [0x42; 20];
    let list = AllowList::from_entries(vec![
        AllowListEntry::new(holder, vec![5, 0]),
        AllowListEntry::new([0x43; 20], vec![1, 1]),
    ])
    .unwrap();
    let (ledger, collateral, journal) = bound_ledger(&list);
    collateral.set_balance(holder, 5);

    let shared = SharedClaimLedger::new(ledger);
    let proof = Arc::new(list.proof_for(&holder, &[5, 0]).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let shared = shared.clone();
            let proof = Arc::clone(&proof);
            thread::spawn(move || shared.claim(&[1, 0], &[5, 0], &holder, &proof).is_ok())
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(accepted, 5);
    assert_eq!(shared.claimed(&holder), vec![5, 0]);
    assert_eq!(shared.claimed_total(&holder), 5);
    assert_eq!(journal.balance_of(&holder, 0), 5);
    assert_eq!(shared.snapshot().claimed.len(), 1);
}

#[test]
fn shared_ledger_admin_operations() {
    let (list, addresses) = default_drop();
    let holder = addresses[3];
    let collateral = Arc::new(CollateralBook::new());
    collateral.set_balance(holder, 3);

    let shared = SharedClaimLedger::default();
    assert_eq!(shared.commitment(), None);
    shared.update_commitment(list.root(), "hash");
    shared.set_eligibility_oracle(Arc::clone(&collateral));
    shared.set_fulfillment_sink(CreditJournal::new());

    let proof = list.proof_for(&holder, &[1, 1, 1]).unwrap();
    shared.claim(&[1, 1, 1], &[1, 1, 1], &holder, &proof).unwrap();
    assert_eq!(shared.claimed_total(&holder), 3);

    shared.override_claimed(&holder, 0).unwrap();
    assert_eq!(shared.claimed_total(&holder), 0);
    shared.override_claimed_categories(&holder, vec![0, 0, 1]);
    assert_eq!(shared.claimed(&holder), vec![0, 0, 1]);
    assert_eq!(shared.commitment().unwrap().metadata, "hash");
}

#[test]
fn persisted_drop_survives_reload_between_claims() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drop.json");
    let (list, addresses) = default_drop();
    let holder = addresses[7];
    let proof = list.proof_for(&holder, &[1, 1, 1]).unwrap();

    let bound = DropState::default().bind();
    let mut ledger = bound.ledger;
    ledger.update_commitment(list.root(), "ipfs://cid");
    bound.collateral.set_balance(holder, 3);
    ledger.claim(&[1, 1, 0], &[1, 1, 1], &holder, &proof).unwrap();
    DropState {
        ledger: ledger.into_state(),
        collateral: bound.collateral.balances(),
        credits: bound.journal.credits(),
    }
    .save(&path)
    .unwrap();

    let mut reloaded = DropState::load(&path).unwrap().bind();
    let err = reloaded
        .ledger
        .claim(&[0, 1, 1], &[1, 1, 1], &holder, &proof)
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::CumulativeCapExceeded { category: 1, .. }
    ));
    reloaded
        .ledger
        .claim(&[0, 0, 1], &[1, 1, 1], &holder, &proof)
        .unwrap();
    reloaded.to_state().save(&path).unwrap();

    let final_state = DropState::load(&path).unwrap();
    assert_eq!(final_state.ledger.claimed[&holder], vec![1, 1, 1]);
    assert_eq!(final_state.credits.len(), 2);
}
