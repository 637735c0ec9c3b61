// Transaction submission, pool threshold and mining tests
// Every test runs against its own temporary data directory

use tempfile::TempDir;
use leaderchain::{
    config::Config,
    directory::{Institution, KITCHENS},
    engine::{Engine, Payment},
    ledger::{Direction, Ledger},
    profile::{ProfileKind, Registration},
    storage::Store,
    transaction::{Transaction, TransactionType},
    wallet::Wallet,
    LedgerError,
};

fn config_in(dir: &TempDir) -> Config {
    Config {
        data_directory: dir.path().to_string_lossy().into_owned(),
        ..Config::default()
    }
}

fn student(engine: &mut Engine, local: &str) -> Wallet {
    let reg = Registration {
        name: local.to_string(),
        email: format!("{local}@alustudent.com"),
        kind: ProfileKind::Student { year_of_study: 2, program: "Software Engineering".into() },
    };
    engine.register(reg).expect("Failed to register student").1
}

fn balance(engine: &Engine, address: &str) -> f64 {
    engine.wallets().by_address(address).expect("wallet should exist").balance
}

#[test]
fn test_non_positive_amounts_rejected() {
    println!("🧪 Testing non-positive amount rejection...");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut engine = Engine::initialize(config_in(&dir)).expect("Failed to initialize engine");
    let a = student(&mut engine, "amara");
    let b = student(&mut engine, "bayo");

    for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        let err = engine
            .submit_transaction(&a.address, &b.address, amount, TransactionType::TokenTransfer)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "amount {amount} should be invalid, got {err}");
        assert!(err.is_rejection());
    }

    assert_eq!(engine.ledger().len(), 0, "Rejected transfers must not reach the ledger");
    assert_eq!(engine.pool().pending(), 0, "Rejected transfers must not reach the pool");
    assert_eq!(balance(&engine, &a.address), 100.0);
    println!("✅ Non-positive amount rejection test passed");
}

#[test]
fn test_insufficient_balance_and_unknown_parties() {
    println!("🧪 Testing balance and party checks...");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut engine = Engine::initialize(config_in(&dir)).expect("Failed to initialize engine");
    let a = student(&mut engine, "chidi");
    let b = student(&mut engine, "dami");

    let err = engine
        .submit_transaction(&a.address, &b.address, 150.0, TransactionType::TokenTransfer)
        .unwrap_err();
    assert!(
        matches!(err, LedgerError::InsufficientBalance { available, requested } if available == 100.0 && requested == 150.0),
        "expected insufficient balance, got {err}"
    );

    let stranger = "f".repeat(64);
    let err = engine
        .submit_transaction(&a.address, &stranger, 10.0, TransactionType::TokenTransfer)
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownRecipient(_)), "got {err}");

    let err = engine
        .submit_transaction(&stranger, &b.address, 10.0, TransactionType::TokenTransfer)
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownSender(_)), "got {err}");

    // amount is checked before the recipient
    let err = engine
        .submit_transaction(&a.address, &stranger, 0.0, TransactionType::TokenTransfer)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)), "got {err}");

    assert_eq!(engine.ledger().len(), 0);
    println!("✅ Balance and party checks passed");
}

#[test]
fn test_double_spend_against_ledger_history() {
    println!("🧪 Testing double spend detection...");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let (a, b) = {
        let mut engine = Engine::initialize(config_in(&dir)).expect("Failed to initialize engine");
        (student(&mut engine, "efe"), student(&mut engine, "funmi"))
    };

    // Confirmed spends the wallet file never saw
    let store = Store::open(dir.path()).expect("Failed to open store");
    let mut ledger = Ledger::open(store, 100.0).expect("Failed to open ledger");
    let tx = Transaction::new(a.address.clone(), b.address.clone(), 80.0, TransactionType::TokenTransfer, 1_700_000_000);
    ledger.append(&tx).expect("Failed to append to ledger");
    drop(ledger);

    let mut engine = Engine::initialize(config_in(&dir)).expect("Failed to reopen engine");
    assert_eq!(balance(&engine, &a.address), 100.0, "wallet balance is untouched");
    assert_eq!(engine.ledger().unspent_balance(&a.address), 20.0);

    let err = engine
        .submit_transaction(&a.address, &b.address, 50.0, TransactionType::TokenTransfer)
        .unwrap_err();
    assert!(
        matches!(err, LedgerError::DoubleSpend { unspent, requested } if unspent == 20.0 && requested == 50.0),
        "expected double spend, got {err}"
    );

    let ok = engine.submit_transaction(&a.address, &b.address, 20.0, TransactionType::TokenTransfer);
    assert!(ok.is_ok(), "spending exactly the unspent balance is allowed");

    // whole baseline already spent: even one unit is a double spend
    let (c, d) = (student(&mut engine, "gbenga"), student(&mut engine, "hauwa"));
    drop(engine);
    let store = Store::open(dir.path()).expect("Failed to open store");
    let mut ledger = Ledger::open(store, 100.0).expect("Failed to open ledger");
    let tx = Transaction::new(c.address.clone(), d.address.clone(), 100.0, TransactionType::TokenTransfer, 1_700_000_100);
    ledger.append(&tx).expect("Failed to append to ledger");
    drop(ledger);

    let mut engine = Engine::initialize(config_in(&dir)).expect("Failed to reopen engine");
    let err = engine
        .submit_transaction(&c.address, &d.address, 1.0, TransactionType::TokenTransfer)
        .unwrap_err();
    assert!(matches!(err, LedgerError::DoubleSpend { .. }), "expected double spend, got {err}");
    println!("✅ Double spend detection test passed");
}

#[test]
fn test_accepted_transfer_moves_balances() {
    println!("🧪 Testing accepted transfer bookkeeping...");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut engine = Engine::initialize(config_in(&dir)).expect("Failed to initialize engine");
    let a = student(&mut engine, "gozie");
    let b = student(&mut engine, "halima");

    let sub = engine
        .submit_transaction(&a.address, &b.address, 30.0, TransactionType::TokenTransfer)
        .expect("transfer should be accepted");
    assert!(sub.mined.is_none(), "one transfer is below the pool threshold");
    assert!(sub.transaction.verify(), "fingerprint must match the payload");

    assert_eq!(balance(&engine, &a.address), 70.0);
    assert_eq!(balance(&engine, &b.address), 130.0);
    assert_eq!(engine.ledger().unspent_balance(&a.address), 70.0);
    assert_eq!(engine.ledger().unspent_balance(&b.address), 130.0);
    assert_eq!(engine.ledger().len(), 1);
    assert_eq!(engine.pool().pending(), 1);

    let history = engine.history(&a.address).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].direction, Direction::Sent);
    let history = engine.history(&b.address).expect("history");
    assert_eq!(history[0].direction, Direction::Received);

    assert!(engine.ledger().audit().expect("audit").is_empty(), "index must agree with replay");
    assert_eq!(engine.ledger().replay_unspent_balance(&a.address).expect("replay"), 70.0);

    // balances survive a restart
    drop(engine);
    let engine = Engine::initialize(config_in(&dir)).expect("Failed to reopen engine");
    assert_eq!(balance(&engine, &a.address), 70.0);
    assert_eq!(engine.pool().pending(), 1, "queued work survives a restart");
    println!("✅ Accepted transfer bookkeeping test passed");
}

#[test]
fn test_pool_threshold_mines_a_block() {
    println!("🧪 Testing automatic mining at the pool threshold...");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut engine = Engine::initialize(config_in(&dir)).expect("Failed to initialize engine").with_seed(11);
    let a = student(&mut engine, "ikenna");
    let b = student(&mut engine, "jide");
    let supply_before = engine.wallets().total_balance();

    let mut submitted = Vec::new();
    for i in 0..2 {
        let sub = engine
            .submit_transaction(&a.address, &b.address, 5.0 + i as f64, TransactionType::TokenTransfer)
            .expect("transfer should be accepted");
        assert!(sub.mined.is_none());
        submitted.push(sub.transaction);
    }
    let third = engine
        .submit_transaction(&b.address, &a.address, 1.0, TransactionType::TokenTransfer)
        .expect("transfer should be accepted");
    submitted.push(third.transaction);

    let mined = third.mined.expect("third transfer must trigger mining");
    assert_eq!(mined.index, 1);
    assert_eq!(mined.transaction_count, 3);
    assert_eq!(mined.reward, 2);
    assert!(mined.validator.is_some(), "some wallet holds stake");

    assert_eq!(engine.pool().pending(), 0, "pool must be empty after mining");
    assert!(engine.pool().peek().expect("peek").is_empty());
    assert_eq!(engine.chain().block_count(), 2);
    assert_eq!(engine.chain().latest().transactions, submitted, "block keeps pool order");
    assert!(engine.validate_chain_integrity());

    let supply_after = engine.wallets().total_balance();
    assert!(
        (supply_after - supply_before - 2.0).abs() < 1e-9,
        "transfers conserve supply and only the reward is minted"
    );
    println!("✅ Automatic mining test passed");
}

#[test]
fn test_block_cap_drops_pool_overflow() {
    println!("🧪 Testing per-block transaction cap...");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let cfg = Config { max_transactions: 2, ..config_in(&dir) };
    let mut engine = Engine::initialize(cfg).expect("Failed to initialize engine");
    let a = student(&mut engine, "kemi");
    let b = student(&mut engine, "lola");

    let mut last = None;
    for _ in 0..3 {
        last = Some(
            engine
                .submit_transaction(&a.address, &b.address, 1.0, TransactionType::TokenTransfer)
                .expect("transfer should be accepted"),
        );
    }
    let mined = last.and_then(|s| s.mined).expect("threshold reached");
    assert_eq!(mined.transaction_count, 2, "block holds at most max_transactions");
    assert_eq!(engine.pool().pending(), 0, "overflow is dropped, not carried");
    assert_eq!(engine.ledger().len(), 3, "the ledger still has every transfer");
    println!("✅ Per-block cap test passed");
}

#[test]
fn test_failed_validation_keeps_pool() {
    println!("🧪 Testing that a rejected candidate leaves the pool alone...");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut engine = Engine::initialize(config_in(&dir)).expect("Failed to initialize engine");
    let a = student(&mut engine, "musa");
    let b = student(&mut engine, "nneka");
    for _ in 0..2 {
        engine
            .submit_transaction(&a.address, &b.address, 4.0, TransactionType::TokenTransfer)
            .expect("transfer should be accepted");
    }

    let mut candidate = engine.chain().create_block(2);
    candidate.previous_hash = "wrong_hash".into();
    let err = engine.mine_candidate(candidate).unwrap_err();
    assert!(matches!(err, LedgerError::PreviousHashMismatch { .. }), "got {err}");

    assert_eq!(engine.pool().pending(), 2, "pending counter must not reset");
    assert_eq!(engine.pool().peek().expect("peek").len(), 2, "pool file must not be drained");
    assert_eq!(engine.chain().block_count(), 1, "nothing was linked");

    let mined = engine.mine_block().expect("a fresh candidate mines");
    assert_eq!(mined.transaction_count, 2);
    println!("✅ Rejected candidate test passed");
}

#[test]
fn test_payments_resolve_recipients() {
    println!("🧪 Testing payment routing...");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let cfg = Config { pool_threshold: 0, ..config_in(&dir) };
    let mut engine = Engine::initialize(cfg).expect("Failed to initialize engine");
    let a = student(&mut engine, "obi");

    let sub = engine.pay(&a.address, Payment::Tuition, 10.0).expect("tuition");
    assert_eq!(sub.transaction.to, Institution::Tuition.address());
    assert_eq!(sub.transaction.kind, TransactionType::Tuition);

    let sub = engine.pay(&a.address, Payment::HealthInsurance, 5.0).expect("insurance");
    assert_eq!(sub.transaction.to, Institution::HealthInsurance.address());

    let sub = engine.pay(&a.address, Payment::Cafeteria { kitchen: 0 }, 3.5).expect("cafeteria");
    assert_eq!(sub.transaction.to, KITCHENS[0].address());
    assert_eq!(sub.transaction.kind, TransactionType::Cafeteria);
    assert_eq!(balance(&engine, &KITCHENS[0].address()), 103.5);

    let err = engine.pay(&a.address, Payment::Cafeteria { kitchen: 7 }, 1.0).unwrap_err();
    assert!(matches!(err, LedgerError::UnknownKitchen(7)), "got {err}");

    assert_eq!(balance(&engine, &a.address), 81.5);
    assert_eq!(engine.chain().block_count(), 1, "threshold 0 never mines automatically");
    println!("✅ Payment routing test passed");
}
