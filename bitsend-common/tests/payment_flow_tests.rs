
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Transaction, Txid};
use bitsend_common::chain_source::{ChainSource, MockChainSource};
use bitsend_common::config::FeeConfig;
use bitsend_common::error::{ErrorCategory, PaymentError};
use bitsend_common::payment::PaymentSession;
use bitsend_common::types::{FeeRate, ListedUtxo, PaymentRequest};
use std::str::FromStr;
use test_utils::*;

#[test]
fn prepares_and_broadcasts_payment() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source = funded_source(&key, &[100_000]).with_fee_estimate(6, 2.0);
    let session = PaymentSession::new(&source, &params, &key);

    let request = PaymentRequest::new(recipient(), 50_000, false);
    let tx = session.prepare(&request).unwrap();
    assert_eq!(tx.fee_paid, 452);
    assert_eq!(tx.change_returned, 49_548);

    let txid = session.broadcast(&tx).unwrap();
    assert_eq!(txid, tx.txid);

    let broadcasts = source.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    let relayed: Transaction = encode::deserialize(&broadcasts[0]).unwrap();
    assert_eq!(relayed.txid(), tx.txid);
}

#[test]
fn balance_reports_confirmed_and_unconfirmed() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source = MockChainSource::new()
        .with_funding(key.address(), 60_000, true)
        .with_funding(key.address(), 15_000, false);
    let session = PaymentSession::new(&source, &params, &key);

    let balance = session.balance().unwrap();
    assert_eq!(balance.confirmed, 60_000);
    assert_eq!(balance.unconfirmed, 15_000);
    assert_eq!(balance.total(), 75_000);
}

#[test]
fn no_outputs_is_no_spendable_funds() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source = MockChainSource::new().with_fee_estimate(6, 2.0);
    let session = PaymentSession::new(&source, &params, &key);

    let err = session
        .prepare(&PaymentRequest::new(recipient(), 1_000, false))
        .unwrap_err();
    assert!(matches!(err, PaymentError::NoSpendableFunds(_)));
    assert_eq!(source.parent_fetches(), 0);
}

#[test]
fn fee_lookup_failure_uses_fallback_rate() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source = funded_source(&key, &[100_000]).failing_fee_estimates();
    let session = PaymentSession::new(&source, &params, &key);

    assert_eq!(session.fee_model().rate(), FeeRate::from_sat_per_vb(2));
    let tx = session
        .prepare(&PaymentRequest::new(recipient(), 50_000, false))
        .unwrap();
    assert_eq!(tx.fee_paid, 452);
}

#[test]
fn fractional_estimate_is_rounded_up() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source = funded_source(&key, &[100_000])
        .with_fee_estimate(2, 10.5)
        .with_fee_estimate(6, 3.2);
    let session = PaymentSession::new(&source, &params, &key);

    let tx = session
        .prepare(&PaymentRequest::new(recipient(), 50_000, false))
        .unwrap();
    assert_eq!(tx.fee_paid, 226 * 4);
}

#[test]
fn configured_target_and_fallback_are_honoured() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source = funded_source(&key, &[100_000]).with_fee_estimate(6, 3.0);
    let fees = FeeConfig {
        confirmation_target: 144,
        fallback_fee_rate: 5,
        selection_margin: 1000,
    };
    let session = PaymentSession::new(&source, &params, &key).with_fee_config(fees);

    assert_eq!(session.fee_model().rate(), FeeRate::from_sat_per_vb(5));
}

#[test]
fn parents_fetched_only_for_selected_outputs() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source =
        funded_source(&key, &[60_000, 60_000, 60_000, 60_000]).with_fee_estimate(6, 1.0);
    let session = PaymentSession::new(&source, &params, &key);

    let tx = session
        .prepare(&PaymentRequest::new(recipient(), 100_000, false))
        .unwrap();
    assert_eq!(tx.inputs.len(), 2);
    assert_eq!(source.parent_fetches(), 2);

    // inputs keep listing order
    let listed = session.spendable_utxos().unwrap();
    assert_eq!(tx.inputs[0].outpoint, listed[0].outpoint);
    assert_eq!(tx.inputs[1].outpoint, listed[1].outpoint);
}

#[test]
fn sends_entire_balance() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source = funded_source(&key, &[40_000, 35_000]).with_fee_estimate(6, 2.0);
    let session = PaymentSession::new(&source, &params, &key);

    let tx = session.prepare_max(recipient()).unwrap();

    // two inputs, one output: 10 + 296 + 34 = 340 vB
    assert_eq!(tx.outputs.len(), 1);
    assert_eq!(tx.fee_paid, 680);
    assert_eq!(tx.dropped_dust, 0);
    assert_eq!(tx.payment_amount(), 75_000 - 680);
}

#[test]
fn foreign_parent_output_is_an_invalid_key() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let other = other_key(&params);
    let source = MockChainSource::new()
        .with_funding_script(key.address(), other.script_pubkey(), 100_000, true)
        .with_fee_estimate(6, 2.0);
    let session = PaymentSession::new(&source, &params, &key);

    let err = session
        .prepare(&PaymentRequest::new(recipient(), 50_000, false))
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidKey(_)));
}

#[test]
fn rejected_broadcast_is_a_network_error() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);
    let source = funded_source(&key, &[100_000])
        .with_fee_estimate(6, 2.0)
        .rejecting_broadcasts("min relay fee not met");
    let session = PaymentSession::new(&source, &params, &key);

    let tx = session
        .prepare(&PaymentRequest::new(recipient(), 50_000, false))
        .unwrap();
    let err = session.broadcast(&tx).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Network);
    assert!(err.user_message().contains("min relay fee not met"));
    assert!(source.broadcasts().is_empty());
}

#[test]
fn parent_bytes_for_another_transaction_fail_signing() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);

    let genuine = funded_source(&key, &[100_000]);
    let listed = genuine.list_utxos(key.address()).unwrap();
    let unrelated_parent = genuine.raw_transaction(&listed[0].outpoint.txid).unwrap();

    let claimed = ListedUtxo::new(OutPoint::new(Txid::all_zeros(), 0), 100_000, true);
    let source = MockChainSource::new()
        .with_utxo(key.address(), claimed, unrelated_parent)
        .with_fee_estimate(6, 2.0);
    let session = PaymentSession::new(&source, &params, &key);

    let err = session
        .prepare(&PaymentRequest::new(recipient(), 10_000, false))
        .unwrap_err();
    assert!(matches!(err, PaymentError::Signing(_)));
    assert!(source.broadcasts().is_empty());
}

#[test]
fn missing_parent_is_a_network_error_naming_the_txid() {
    init_test_environment();
    let params = testnet_params();
    let key = test_key(&params);

    let orphan_txid = Txid::from_str(
        "4e3b3fd4c3bb8a9d9c8e3f5c2f5b1c6f1e6c1d9a7f3a7e1f2c4b6d8e0a1b2c3d",
    )
    .unwrap();
    let source = MockChainSource::new()
        .with_orphan_utxo(
            key.address(),
            ListedUtxo::new(OutPoint::new(orphan_txid, 1), 100_000, true),
        )
        .with_fee_estimate(6, 2.0);
    let session = PaymentSession::new(&source, &params, &key);

    let err = session
        .prepare(&PaymentRequest::new(recipient(), 10_000, false))
        .unwrap_err();
    match err {
        PaymentError::Network { ref context, .. } => {
            assert!(context.contains(&orphan_txid.to_string()))
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(source.parent_fetches(), 1);
    assert!(source.broadcasts().is_empty());
}
