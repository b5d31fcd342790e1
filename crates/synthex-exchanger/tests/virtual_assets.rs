//! # Virtual asset lifecycle
//!
//! Exchange into a proxy, move it around before maturity, and check that
//! whoever holds it at settlement receives the underlying.

mod common;

use common::{Harness, id, key};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use synthex_exchanger::ExchangeRequest;
use synthex_gate::SuspensionRegistry;
use synthex_settlement::TransferOutcome;
use synthex_types::{ExchangeEvent, SuspensionReason, SynthexError, VirtualAssetId};

fn virtual_exchange(h: &mut Harness, recipient: &str) -> VirtualAssetId {
    let request = ExchangeRequest::new("sUSD", dec!(100), "sETH");
    let receipt = h
        .exchanger
        .exchange_with_virtual(&id("alice"), &id("alice"), &request, &id(recipient))
        .unwrap();
    receipt.virtual_asset.unwrap()
}

#[test]
fn virtual_exchange_credits_custody() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "alice");

    assert_eq!(h.balance("alice", "sUSD"), dec!(900));
    assert_eq!(h.balance("alice", "sETH"), Decimal::ZERO);
    assert_eq!(
        h.balance(vid.custody_account().as_str(), "sETH"),
        dec!(49.85)
    );
    assert_eq!(
        h.exchanger
            .pending_entries(&vid.custody_account(), &key("sETH"))
            .len(),
        1
    );

    let proxy = h.exchanger.virtual_asset(vid).unwrap();
    assert_eq!(proxy.underlying, key("sETH"));
    assert_eq!(proxy.initial_supply, dec!(49.85));
    assert_eq!(
        h.exchanger.virtual_balance_of(vid, &id("alice")).unwrap(),
        dec!(49.85)
    );

    let created = h
        .mem
        .events
        .events()
        .into_iter()
        .find(|e| e.kind() == "virtual_asset_created")
        .unwrap();
    assert_eq!(
        created,
        ExchangeEvent::VirtualAssetCreated {
            virtual_asset: vid,
            underlying: key("sETH"),
            recipient: id("alice"),
            amount: dec!(49.85),
        }
    );
}

// Full transfer before settlement: the new holder gets everything.
#[test]
fn transferred_proxy_pays_new_holder() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "alice");

    let outcome = h
        .exchanger
        .virtual_transfer(&id("alice"), vid, &id("alice"), &id("bob"), dec!(49.85))
        .unwrap();
    assert_eq!(outcome, TransferOutcome::Transferred);
    assert_eq!(
        h.exchanger.virtual_balance_of(vid, &id("bob")).unwrap(),
        dec!(49.85)
    );

    h.advance(180);
    assert_eq!(
        h.exchanger
            .virtual_underlying_value(vid, &id("bob"))
            .unwrap(),
        dec!(49.85)
    );
    assert_eq!(h.balance("bob", "sETH"), dec!(49.85));
    assert_eq!(h.balance("alice", "sETH"), Decimal::ZERO);
    assert!(h.exchanger.virtual_asset(vid).unwrap().settled);
    assert_eq!(h.mem.events.count_of("virtual_asset_settled"), 1);

    // Reading again does not settle twice.
    assert_eq!(
        h.exchanger.virtual_balance_of(vid, &id("bob")).unwrap(),
        Decimal::ZERO
    );
    assert_eq!(h.mem.events.count_of("virtual_asset_settled"), 1);
}

#[test]
fn drift_is_settled_before_distribution() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "carol");
    h.exchanger
        .virtual_transfer(&id("carol"), vid, &id("carol"), &id("dave"), dec!(24.925))
        .unwrap();
    h.advance(180);
    h.set_rate("sETH", dec!(2.2));

    let settlement = h.exchanger.settle_virtual(vid).unwrap();
    assert_eq!(settlement.adjustment.reclaimed, dec!(4.531818181818181819));
    assert_eq!(settlement.settled_amount, dec!(45.318181818181818181));
    assert_eq!(
        h.balance("carol", "sETH") + h.balance("dave", "sETH"),
        dec!(45.318181818181818181)
    );
    assert_eq!(
        h.exchanger
            .virtual_underlying_value(vid, &id("carol"))
            .unwrap(),
        h.balance("carol", "sETH")
    );
    assert_eq!(h.mem.events.count_of("exchange_reclaim"), 1);
}

#[test]
fn pro_rata_value_before_maturity() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "alice");
    h.exchanger
        .virtual_transfer(&id("alice"), vid, &id("alice"), &id("bob"), dec!(20))
        .unwrap();

    assert_eq!(
        h.exchanger
            .virtual_underlying_value(vid, &id("bob"))
            .unwrap(),
        dec!(20)
    );
    assert_eq!(
        h.exchanger
            .virtual_underlying_value(vid, &id("alice"))
            .unwrap(),
        dec!(29.85)
    );
    assert!(!h.exchanger.virtual_asset(vid).unwrap().settled);
}

#[test]
fn transfer_after_maturity_settles_instead() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "alice");
    h.advance(181);

    match h
        .exchanger
        .virtual_transfer(&id("alice"), vid, &id("alice"), &id("bob"), dec!(1))
        .unwrap()
    {
        TransferOutcome::SettledInstead(settlement) => {
            assert_eq!(settlement.distribution, vec![(id("alice"), dec!(49.85))]);
        }
        TransferOutcome::Transferred => panic!("matured proxy must settle, not transfer"),
    }
    assert_eq!(h.balance("alice", "sETH"), dec!(49.85));
    assert_eq!(h.balance("bob", "sETH"), Decimal::ZERO);

    assert!(matches!(
        h.exchanger
            .virtual_transfer(&id("alice"), vid, &id("alice"), &id("bob"), dec!(1)),
        Err(SynthexError::VirtualAssetSettled(_))
    ));
}

#[test]
fn explicit_settle_waits_for_maturity() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "alice");
    h.advance(45);
    match h.exchanger.settle_virtual(vid) {
        Err(SynthexError::WaitingPeriodNotElapsed { secs_left }) => assert_eq!(secs_left, 135),
        other => panic!("expected waiting period error, got {other:?}"),
    }
}

#[test]
fn only_holder_or_router_moves_units() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "alice");
    assert!(matches!(
        h.exchanger
            .virtual_transfer(&id("mallory"), vid, &id("alice"), &id("mallory"), dec!(10)),
        Err(SynthexError::Unauthorized { .. })
    ));
    h.exchanger
        .virtual_transfer(&id("router"), vid, &id("alice"), &id("bob"), dec!(10))
        .unwrap();
    assert_eq!(
        h.exchanger.virtual_balance_of(vid, &id("bob")).unwrap(),
        dec!(10)
    );
}

#[test]
fn suspension_blocks_proxy_settlement_only() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "alice");
    h.mem
        .suspensions
        .suspend_asset(&key("sETH"), SuspensionReason::Manual);

    // Before maturity nothing settles, so reads and transfers still work.
    assert_eq!(
        h.exchanger.virtual_balance_of(vid, &id("alice")).unwrap(),
        dec!(49.85)
    );
    h.exchanger
        .virtual_transfer(&id("alice"), vid, &id("alice"), &id("bob"), dec!(5))
        .unwrap();

    h.advance(180);
    assert!(matches!(
        h.exchanger.virtual_balance_of(vid, &id("alice")),
        Err(SynthexError::Suspended { .. })
    ));
    assert!(!h.exchanger.virtual_asset(vid).unwrap().settled);
}

#[test]
fn unknown_proxy_is_not_found() {
    let mut h = Harness::new();
    assert!(matches!(
        h.exchanger
            .virtual_balance_of(VirtualAssetId::new(), &id("alice")),
        Err(SynthexError::VirtualAssetNotFound(_))
    ));
}

#[test]
fn virtual_settlement_conserves_supply() {
    let mut h = Harness::new();
    let vid = virtual_exchange(&mut h, "alice");
    h.exchanger
        .virtual_transfer(&id("alice"), vid, &id("alice"), &id("bob"), dec!(16.616666666666666666))
        .unwrap();
    h.exchanger
        .virtual_transfer(&id("alice"), vid, &id("alice"), &id("carol"), dec!(16.616666666666666666))
        .unwrap();
    h.advance(180);
    h.set_rate("sETH", dec!(1.7));
    let settlement = h.exchanger.settle_virtual(vid).unwrap();

    let distributed: Decimal = settlement.distribution.iter().map(|(_, v)| *v).sum();
    assert_eq!(distributed, settlement.settled_amount);
    assert_eq!(
        h.balance("alice", "sETH") + h.balance("bob", "sETH") + h.balance("carol", "sETH"),
        settlement.settled_amount
    );
    h.exchanger
        .supply()
        .verify(&key("sETH"), Decimal::ZERO, h.supply_of("sETH"))
        .unwrap();
    h.exchanger
        .supply()
        .verify(&key("sUSD"), dec!(1000), h.supply_of("sUSD"))
        .unwrap();
}
