//! Shared fixture for the cross-crate scenario tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use synthex_exchanger::{ExchangeReceipt, ExchangeRequest, Exchanger};
use synthex_gate::{Clock, InMemoryCollaborators, SynthLedger};
use synthex_types::{AccessConfig, AccountId, AssetKey, ExchangeSettings, Result};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
}

pub fn id(s: &str) -> AccountId {
    AccountId::new(s)
}

pub fn key(s: &str) -> AssetKey {
    AssetKey::new(s)
}

pub struct Harness {
    pub mem: InMemoryCollaborators,
    pub exchanger: Exchanger,
}

impl Harness {
    /// sUSD = 1, sETH = 2, sBTC = 40000. Alice holds 1000 sUSD.
    /// `router` is a router, `ops` an operator.
    pub fn new() -> Self {
        Self::with_settings(ExchangeSettings::default())
    }

    pub fn with_settings(settings: ExchangeSettings) -> Self {
        init_tracing();
        let mem = InMemoryCollaborators::new(settings, t0()).unwrap();
        mem.oracle.set_rate(&key("sUSD"), dec!(1), t0());
        mem.oracle.set_rate(&key("sETH"), dec!(2), t0());
        mem.oracle.set_rate(&key("sBTC"), dec!(40000), t0());
        mem.ledger.deposit(&id("alice"), &key("sUSD"), dec!(1000));
        let access = AccessConfig::default()
            .with_router("router")
            .with_operator("ops");
        let exchanger = Exchanger::new(mem.collaborators(), access);
        Self { mem, exchanger }
    }

    /// `who` exchanges its own balance.
    pub fn exchange(&mut self, who: &str, amount: Decimal, source: &str, destination: &str) -> Result<ExchangeReceipt> {
        let request = ExchangeRequest::new(source, amount, destination);
        self.exchanger.exchange(&id(who), &id(who), &request)
    }

    pub fn balance(&self, who: &str, asset: &str) -> Decimal {
        self.mem.ledger.balance_of(&id(who), &key(asset))
    }

    pub fn supply_of(&self, asset: &str) -> Decimal {
        self.mem.ledger.total_supply(&key(asset))
    }

    pub fn advance(&self, secs: i64) {
        self.mem.clock.advance_secs(secs);
    }

    /// Publish a fresh round at the current clock time.
    pub fn set_rate(&self, asset: &str, rate: Decimal) {
        self.mem.oracle.set_rate(&key(asset), rate, self.mem.clock.now());
    }

    pub fn event_kinds(&self) -> Vec<&'static str> {
        self.mem.events.events().iter().map(|e| e.kind()).collect()
    }
}
