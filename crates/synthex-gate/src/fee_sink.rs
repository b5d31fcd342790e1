//! Fee collection seam.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use synthex_types::{AccountId, AssetKey, Result, SynthexError};

/// Receives exchange fees. Fees are never minted to a holder's balance.
pub trait FeeSink: Send + Sync {
    fn collect(&self, asset: &AssetKey, amount: Decimal) -> Result<()>;

    /// Credit a tracked exchange's fee to an integrator's reward tally.
    fn record_reward(&self, recipient: &AccountId, asset: &AssetKey, fee: Decimal) -> Result<()>;
}

/// Running fee totals per asset, plus per-recipient reward tallies.
#[derive(Debug, Default)]
pub struct InMemoryFeePool {
    collected: RwLock<HashMap<AssetKey, Decimal>>,
    rewards: RwLock<HashMap<(AccountId, AssetKey), Decimal>>,
}

impl InMemoryFeePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total fees collected in `asset`.
    #[must_use]
    pub fn collected(&self, asset: &AssetKey) -> Decimal {
        self.collected
            .read()
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Fees attributed to `recipient` through tracking.
    #[must_use]
    pub fn reward_of(&self, recipient: &AccountId, asset: &AssetKey) -> Decimal {
        self.rewards
            .read()
            .get(&(recipient.clone(), asset.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

fn accumulate(slot: &mut Decimal, amount: Decimal) -> Result<()> {
    *slot = slot
        .checked_add(amount)
        .ok_or(SynthexError::ArithmeticOverflow { context: "fee pool" })?;
    Ok(())
}

impl FeeSink for InMemoryFeePool {
    fn collect(&self, asset: &AssetKey, amount: Decimal) -> Result<()> {
        let mut collected = self.collected.write();
        accumulate(collected.entry(asset.clone()).or_insert(Decimal::ZERO), amount)
    }

    fn record_reward(&self, recipient: &AccountId, asset: &AssetKey, fee: Decimal) -> Result<()> {
        let mut rewards = self.rewards.write();
        accumulate(
            rewards
                .entry((recipient.clone(), asset.clone()))
                .or_insert(Decimal::ZERO),
            fee,
        )
    }
}
