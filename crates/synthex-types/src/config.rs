//! Configuration types for the exchange engine.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetKey, SynthexError, constants};

/// Tunables read from the settings store at the start of every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    /// Seconds an exchange entry must wait before explicit settlement.
    pub waiting_period_secs: u64,
    /// Oracle rates older than this are treated as invalid.
    pub rate_stale_period_secs: u64,
    /// A leg rate this many times above or below its last exchange anchor
    /// trips the circuit breaker.
    pub price_deviation_threshold_factor: Decimal,
    /// Fee rate applied when the destination asset has no override.
    pub default_exchange_fee_rate: Decimal,
    /// Per-destination-asset fee rate overrides.
    pub exchange_fee_rates: BTreeMap<AssetKey, Decimal>,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            waiting_period_secs: constants::DEFAULT_WAITING_PERIOD_SECS,
            rate_stale_period_secs: constants::DEFAULT_RATE_STALE_PERIOD_SECS,
            price_deviation_threshold_factor: Decimal::from(
                constants::DEFAULT_PRICE_DEVIATION_THRESHOLD_FACTOR,
            ),
            default_exchange_fee_rate: bps_to_rate(constants::DEFAULT_EXCHANGE_FEE_RATE_BPS),
            exchange_fee_rates: BTreeMap::new(),
        }
    }
}

impl ExchangeSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the engine cannot operate under.
    pub fn validate(&self) -> crate::Result<()> {
        if self.rate_stale_period_secs == 0 {
            return Err(SynthexError::Configuration(
                "rate_stale_period_secs must be positive".into(),
            ));
        }
        if self.price_deviation_threshold_factor <= Decimal::ONE {
            return Err(SynthexError::Configuration(format!(
                "price_deviation_threshold_factor must exceed 1, got {}",
                self.price_deviation_threshold_factor
            )));
        }
        validate_fee_rate("default", self.default_exchange_fee_rate)?;
        for (asset, rate) in &self.exchange_fee_rates {
            validate_fee_rate(asset.as_str(), *rate)?;
        }
        Ok(())
    }

    /// Fee rate charged on exchanges into `destination`.
    #[must_use]
    pub fn fee_rate_for(&self, destination: &AssetKey) -> Decimal {
        self.exchange_fee_rates
            .get(destination)
            .copied()
            .unwrap_or(self.default_exchange_fee_rate)
    }
}

fn validate_fee_rate(label: &str, rate: Decimal) -> crate::Result<()> {
    let max = bps_to_rate(constants::MAX_EXCHANGE_FEE_RATE_BPS);
    if rate.is_sign_negative() || rate >= max {
        return Err(SynthexError::Configuration(format!(
            "fee rate for {label} must be in [0, {max}), got {rate}"
        )));
    }
    Ok(())
}

/// Convert basis points to a fractional rate (30 -> 0.0030).
#[must_use]
pub fn bps_to_rate(bps: u32) -> Decimal {
    Decimal::new(i64::from(bps), 4)
}

/// Who may call privileged entry points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Trusted front-ends that may exchange for any account.
    pub routers: BTreeSet<AccountId>,
    /// Accounts allowed to run administrative operations.
    pub operators: BTreeSet<AccountId>,
}

impl AccessConfig {
    /// Allow `router` to exchange for any account.
    #[must_use]
    pub fn with_router(mut self, router: impl Into<String>) -> Self {
        self.routers.insert(AccountId::new(router));
        self
    }

    /// Allow `operator` to run admin operations.
    #[must_use]
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operators.insert(AccountId::new(operator));
        self
    }
}
