//! Virtual assets: transferable proxies for a pending destination balance.
//!
//! A virtual exchange mints its net destination amount into a custody
//! account owned by the proxy, and the pending entry is queued against that
//! custody account. Holders own proxy units, not underlying.
//!
//! ## Lifecycle
//!
//! ```text
//! create ──► transferable (before maturity)
//!              │
//!              ▼ first value access after maturity, or explicit settle
//!           settle custody entry ──► distribute backing pro rata ──► settled
//! ```
//!
//! Once settled, the proxy supply is zero and every holder's share has been
//! minted to them as underlying balance. Further transfers fail.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_gate::SynthLedger;
use synthex_pricing::{div_trunc, mul_trunc};
use synthex_types::{
    AccountId, AssetKey, EntryId, Result, SynthexError, VirtualAssetId, secs_until,
    waiting_period_end,
};

use crate::engine::{SettleMode, SettlementOutcome, Settler};
use crate::journal::LedgerBatch;

/// Transferable proxy for the credit of one pending entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualAsset {
    pub id: VirtualAssetId,
    pub underlying: AssetKey,
    pub entry_id: EntryId,
    /// Ledger account holding the proxy's underlying backing.
    pub custody: AccountId,
    pub initial_supply: Decimal,
    pub total_supply: Decimal,
    balances: BTreeMap<AccountId, Decimal>,
    pub settled: bool,
    converted: BTreeMap<AccountId, Decimal>,
    pub created_at: DateTime<Utc>,
}

impl VirtualAsset {
    /// Proxy units held by `holder`. Zero after settlement.
    #[must_use]
    pub fn balance_of(&self, holder: &AccountId) -> Decimal {
        self.balances.get(holder).copied().unwrap_or(Decimal::ZERO)
    }

    /// Underlying credited to `holder` at settlement.
    #[must_use]
    pub fn converted_of(&self, holder: &AccountId) -> Decimal {
        self.converted.get(holder).copied().unwrap_or(Decimal::ZERO)
    }

    /// Holders with a non-zero proxy balance, in key order.
    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, &Decimal)> {
        self.balances.iter().filter(|(_, b)| !b.is_zero())
    }

    /// Proxies mature together with their originating entry.
    #[must_use]
    pub fn is_mature(&self, now: DateTime<Utc>, waiting_period_secs: u64) -> bool {
        now >= waiting_period_end(self.created_at, waiting_period_secs)
    }

    /// Whole seconds until maturity, rounded up.
    #[must_use]
    pub fn secs_left(&self, now: DateTime<Utc>, waiting_period_secs: u64) -> u64 {
        secs_until(now, waiting_period_end(self.created_at, waiting_period_secs))
    }

    /// Key used when reporting proxy balance errors.
    #[must_use]
    pub fn proxy_key(&self) -> AssetKey {
        AssetKey::new(self.id.to_string())
    }

    /// Split `backing` across holders pro rata to proxy balance.
    ///
    /// Each share is truncated; the last holder in key order takes the
    /// remainder, so the shares sum to `backing` exactly.
    pub fn distribution(&self, backing: Decimal) -> Result<Vec<(AccountId, Decimal)>> {
        let holders: Vec<(&AccountId, &Decimal)> = self.holders().collect();
        let Some(((last, _), rest)) = holders.split_last() else {
            return Ok(Vec::new());
        };
        let mut shares = Vec::with_capacity(holders.len());
        let mut assigned = Decimal::ZERO;
        for (holder, balance) in rest {
            let share = div_trunc(mul_trunc(**balance, backing)?, self.total_supply)?;
            assigned += share;
            shares.push(((*holder).clone(), share));
        }
        shares.push(((*last).clone(), backing - assigned));
        Ok(shares)
    }

    fn move_units(&mut self, from: &AccountId, to: &AccountId, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(SynthexError::InvalidAmount {
                reason: format!("proxy transfer amount must be positive, got {amount}"),
            });
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(SynthexError::InsufficientBalance {
                account: from.clone(),
                asset: self.proxy_key(),
                needed: amount,
                available,
            });
        }
        self.balances.insert(from.clone(), available - amount);
        *self.balances.entry(to.clone()).or_insert(Decimal::ZERO) += amount;
        self.balances.retain(|_, b| !b.is_zero());
        Ok(())
    }
}

/// Result of converting a proxy into underlying balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSettlement {
    pub id: VirtualAssetId,
    pub underlying: AssetKey,
    /// Drift adjustment applied to the custody account first.
    pub adjustment: SettlementOutcome,
    /// Backing distributed to holders.
    pub settled_amount: Decimal,
    pub distribution: Vec<(AccountId, Decimal)>,
}

/// What a proxy transfer call ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Transferred,
    /// The proxy had matured, so it was settled and nothing was transferred.
    SettledInstead(VirtualSettlement),
}

/// Ledger handle and timing inputs, read once per operation.
#[derive(Clone, Copy)]
pub struct VirtualContext<'a> {
    pub ledger: &'a dyn SynthLedger,
    pub now: DateTime<Utc>,
    pub waiting_period_secs: u64,
}

/// Registry of every proxy ever created.
#[derive(Debug, Default)]
pub struct VirtualAssetFactory {
    assets: BTreeMap<VirtualAssetId, VirtualAsset>,
}

impl VirtualAssetFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proxy whose backing is already minted to `id.custody_account()`.
    pub fn create(
        &mut self,
        id: VirtualAssetId,
        underlying: &AssetKey,
        entry_id: EntryId,
        recipient: &AccountId,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<&VirtualAsset> {
        if amount <= Decimal::ZERO {
            return Err(SynthexError::InvalidAmount {
                reason: format!("virtual asset supply must be positive, got {amount}"),
            });
        }
        let mut balances = BTreeMap::new();
        balances.insert(recipient.clone(), amount);
        let asset = VirtualAsset {
            id,
            underlying: underlying.clone(),
            entry_id,
            custody: id.custody_account(),
            initial_supply: amount,
            total_supply: amount,
            balances,
            settled: false,
            converted: BTreeMap::new(),
            created_at,
        };
        tracing::info!(
            virtual_asset = %id,
            underlying = %underlying,
            recipient = %recipient,
            supply = %amount,
            "Virtual asset created"
        );
        Ok(self.assets.entry(id).or_insert(asset))
    }

    /// Look up a proxy by id.
    pub fn get(&self, id: VirtualAssetId) -> Result<&VirtualAsset> {
        self.assets
            .get(&id)
            .ok_or(SynthexError::VirtualAssetNotFound(id))
    }

    fn get_mut(&mut self, id: VirtualAssetId) -> Result<&mut VirtualAsset> {
        self.assets
            .get_mut(&id)
            .ok_or(SynthexError::VirtualAssetNotFound(id))
    }

    /// Settle the proxy's entry and convert every holder's units.
    ///
    /// # Errors
    /// `VirtualAssetSettled` if already settled, `WaitingPeriodNotElapsed`
    /// before maturity, or any settlement or ledger error.
    pub fn settle<S: Settler + ?Sized>(
        &mut self,
        id: VirtualAssetId,
        settler: &mut S,
        ctx: VirtualContext<'_>,
    ) -> Result<VirtualSettlement> {
        let asset = self.get(id)?;
        if asset.settled {
            return Err(SynthexError::VirtualAssetSettled(id));
        }
        if !asset.is_mature(ctx.now, ctx.waiting_period_secs) {
            return Err(SynthexError::WaitingPeriodNotElapsed {
                secs_left: asset.secs_left(ctx.now, ctx.waiting_period_secs),
            });
        }
        let custody = asset.custody.clone();
        let underlying = asset.underlying.clone();

        let adjustment = settler.settle(&custody, &underlying, SettleMode::Explicit)?;

        let asset = self.get(id)?;
        let backing = ctx.ledger.balance_of(&custody, &underlying);
        let distribution = asset.distribution(backing)?;

        let mut batch = LedgerBatch::new();
        batch.burn(&custody, &underlying, backing);
        for (holder, share) in &distribution {
            batch.mint(holder, &underlying, *share);
        }
        settler.commit(&batch)?;

        let asset = self.get_mut(id)?;
        asset.settled = true;
        asset.total_supply = Decimal::ZERO;
        asset.balances.clear();
        asset.converted = distribution.iter().cloned().collect();

        tracing::info!(
            virtual_asset = %id,
            underlying = %underlying,
            settled_amount = %backing,
            holders = distribution.len(),
            "Virtual asset settled"
        );

        Ok(VirtualSettlement {
            id,
            underlying,
            adjustment,
            settled_amount: backing,
            distribution,
        })
    }

    /// Settle if matured and not yet settled; otherwise do nothing.
    pub fn settle_if_matured<S: Settler + ?Sized>(
        &mut self,
        id: VirtualAssetId,
        settler: &mut S,
        ctx: VirtualContext<'_>,
    ) -> Result<Option<VirtualSettlement>> {
        let asset = self.get(id)?;
        if asset.settled || !asset.is_mature(ctx.now, ctx.waiting_period_secs) {
            return Ok(None);
        }
        self.settle(id, settler, ctx).map(Some)
    }

    /// Move proxy units before maturity; settle instead after it.
    pub fn transfer<S: Settler + ?Sized>(
        &mut self,
        id: VirtualAssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
        settler: &mut S,
        ctx: VirtualContext<'_>,
    ) -> Result<TransferOutcome> {
        let asset = self.get(id)?;
        if asset.settled {
            return Err(SynthexError::VirtualAssetSettled(id));
        }
        if asset.is_mature(ctx.now, ctx.waiting_period_secs) {
            let settlement = self.settle(id, settler, ctx)?;
            return Ok(TransferOutcome::SettledInstead(settlement));
        }
        self.get_mut(id)?.move_units(from, to, amount)?;
        tracing::debug!(virtual_asset = %id, from = %from, to = %to, amount = %amount, "Proxy units moved");
        Ok(TransferOutcome::Transferred)
    }
}
