//! Supply accounting for engine-driven issuance.
//!
//! Every mint and burn the engine commits is recorded here, per asset.
//! Given the supply an asset had before the engine touched it, the ledger
//! total must always equal:
//! ```text
//! baseline + Σ(engine mints) - Σ(engine burns)
//! ```
//! Exchanges, reclaims, rebates and virtual-asset conversions are the only
//! paths that change supply, and all of them flow through a `LedgerBatch`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use synthex_types::{AssetKey, Result, SynthexError};

use crate::journal::{LedgerBatch, LedgerOp};

/// Running record of what the engine minted and burned, per asset.
#[derive(Debug, Default)]
pub struct SupplyConservation {
    minted: HashMap<AssetKey, Decimal>,
    burned: HashMap<AssetKey, Decimal>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mint(&mut self, asset: &AssetKey, amount: Decimal) {
        *self.minted.entry(asset.clone()).or_insert(Decimal::ZERO) += amount;
    }

    pub fn record_burn(&mut self, asset: &AssetKey, amount: Decimal) {
        *self.burned.entry(asset.clone()).or_insert(Decimal::ZERO) += amount;
    }

    /// Record a batch that has been committed.
    pub fn record_batch(&mut self, batch: &LedgerBatch) {
        for op in batch.ops() {
            match op {
                LedgerOp::Burn { asset, amount, .. } => self.record_burn(asset, *amount),
                LedgerOp::Mint { asset, amount, .. } => self.record_mint(asset, *amount),
            }
        }
    }

    #[must_use]
    pub fn total_minted(&self, asset: &AssetKey) -> Decimal {
        self.minted.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn total_burned(&self, asset: &AssetKey) -> Decimal {
        self.burned.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Minted minus burned.
    #[must_use]
    pub fn net_issuance(&self, asset: &AssetKey) -> Decimal {
        self.total_minted(asset) - self.total_burned(asset)
    }

    /// Check the ledger's `actual_supply` against `baseline` plus net issuance.
    ///
    /// # Errors
    /// [`SynthexError::SupplyInvariantViolation`] on any mismatch.
    pub fn verify(&self, asset: &AssetKey, baseline: Decimal, actual_supply: Decimal) -> Result<()> {
        let expected = baseline + self.net_issuance(asset);
        if actual_supply != expected {
            tracing::error!(
                asset = %asset,
                actual = %actual_supply,
                expected = %expected,
                "Supply invariant violated"
            );
            return Err(SynthexError::SupplyInvariantViolation {
                reason: format!(
                    "Asset {asset}: actual supply {actual_supply} != expected {expected} \
                     (baseline={baseline}, minted={}, burned={})",
                    self.total_minted(asset),
                    self.total_burned(asset),
                ),
            });
        }
        Ok(())
    }
}
