//! Settlement engine: reconciles pending entries against destination drift.
//!
//! ## Algorithm
//!
//! For one (account, asset) queue:
//! 1. Select eligible entries (mature ones, or all of them when forced).
//! 2. Read the current destination rate. If it is invalid, suspend the
//!    asset and fail without touching any entry.
//! 3. Compute each entry's delta, oldest first, and net them.
//! 4. Apply the net as one burn (reclaim, capped at the balance) or one
//!    mint (rebate) through an all-or-nothing [`LedgerBatch`].
//! 5. Delete the processed entries and queue the events.
//!
//! Events are buffered, not emitted. The caller drains them once the whole
//! operation's bookkeeping is done.

use std::collections::HashMap;

use rust_decimal::Decimal;
use synthex_gate::{Collaborators, RateOracleClient};
use synthex_pricing::{
    EntryAdjustment, compute_settlement_root, entry_adjustment, net_adjustment,
    settlement_root_hex,
};
use synthex_types::{
    AccountId, AssetKey, EntryId, ExchangeEntry, ExchangeEvent, ExchangeSettings, RateLeg,
    RateSnapshot, Result, SuspensionReason,
};

use crate::journal::LedgerBatch;
use crate::pending_ledger::{EligibleEntries, PendingExchangeLedger};
use crate::supply_conservation::SupplyConservation;

/// Which entries a settlement pass may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleMode {
    /// Only entries whose waiting period has elapsed.
    Explicit,
    /// Every entry, mature or not. Used before a new exchange.
    Force,
}

/// What one settlement pass did (or, for a preview, would do).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub account: AccountId,
    pub asset: AssetKey,
    pub reclaimed: Decimal,
    pub rebated: Decimal,
    /// Reclaim owed beyond the account's balance. Reported, never burned.
    pub unreclaimed_shortfall: Decimal,
    pub entries_processed: usize,
    pub entries_deferred: usize,
    /// SHA-256 over the processed entries, in order.
    pub settlement_root: [u8; 32],
}

impl SettlementOutcome {
    fn nothing(account: &AccountId, asset: &AssetKey, deferred: usize) -> Self {
        Self {
            account: account.clone(),
            asset: asset.clone(),
            reclaimed: Decimal::ZERO,
            rebated: Decimal::ZERO,
            unreclaimed_shortfall: Decimal::ZERO,
            entries_processed: 0,
            entries_deferred: deferred,
            settlement_root: compute_settlement_root(&[]),
        }
    }

    /// True when no balance moved and no entry was consumed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.entries_processed == 0
    }

    #[must_use]
    pub fn root_hex(&self) -> String {
        settlement_root_hex(&self.settlement_root)
    }
}

/// Narrow settlement capability consumed by the exchange executor.
pub trait Settler {
    fn settle(
        &mut self,
        account: &AccountId,
        asset: &AssetKey,
        mode: SettleMode,
    ) -> Result<SettlementOutcome>;

    /// Read-only preview of an explicit settle.
    fn settlement_owing(&self, account: &AccountId, asset: &AssetKey) -> Result<SettlementOutcome>;

    /// Queue a new entry. Returns its sequence.
    fn append_entry(&mut self, entry: ExchangeEntry) -> u64;

    fn pending_entries(&self, account: &AccountId, asset: &AssetKey) -> &[ExchangeEntry];

    fn max_secs_left(&self, account: &AccountId, asset: &AssetKey) -> u64;

    /// Circuit-breaker anchor, if the asset has ever been exchanged or set.
    fn last_exchange_rate(&self, asset: &AssetKey) -> Option<Decimal>;

    fn set_last_exchange_rate(&mut self, asset: &AssetKey, rate: Decimal);

    /// Commit a ledger batch and record it in supply accounting.
    fn commit(&mut self, batch: &LedgerBatch) -> Result<()>;

    fn supply(&self) -> &SupplyConservation;

    /// Take the events queued since the last drain.
    fn drain_events(&mut self) -> Vec<ExchangeEvent>;
}

/// How a net delta maps onto the ledger.
struct AdjustmentPlan {
    batch: LedgerBatch,
    reclaimed: Decimal,
    rebated: Decimal,
    shortfall: Decimal,
}

/// Everything a settlement pass needs, computed without side effects.
struct Evaluation {
    selected: EligibleEntries,
    current: RateSnapshot,
    adjustments: Vec<EntryAdjustment>,
    plan: AdjustmentPlan,
}

/// Concrete [`Settler`]: pending queues, rate anchors and the supply
/// record, applied against the injected collaborators.
pub struct SettlementEngine {
    collab: Collaborators,
    pending: PendingExchangeLedger,
    anchors: HashMap<AssetKey, Decimal>,
    supply: SupplyConservation,
    outbox: Vec<ExchangeEvent>,
}

impl SettlementEngine {
    /// Engine with empty queues and no rate anchors.
    #[must_use]
    pub fn new(collab: Collaborators) -> Self {
        Self {
            collab,
            pending: PendingExchangeLedger::new(),
            anchors: HashMap::new(),
            supply: SupplyConservation::new(),
            outbox: Vec::new(),
        }
    }

    fn evaluate(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        mode: SettleMode,
        settings: &ExchangeSettings,
    ) -> Result<Option<Evaluation>> {
        let now = self.collab.clock.now();
        let selected = self.pending.eligible(
            account,
            asset,
            now,
            settings.waiting_period_secs,
            mode == SettleMode::Force,
        );
        if selected.entries.is_empty() {
            return Ok(None);
        }

        let oracle = RateOracleClient::new(self.collab.oracle.as_ref(), settings, now);
        let current = oracle.snapshot(asset);
        current.require_valid(RateLeg::Destination)?;

        let adjustments = selected
            .entries
            .iter()
            .map(|entry| entry_adjustment(entry, current.rate))
            .collect::<Result<Vec<_>>>()?;
        let net = net_adjustment(&adjustments)?;
        let plan = self.plan_adjustment(account, asset, net);

        Ok(Some(Evaluation {
            selected,
            current,
            adjustments,
            plan,
        }))
    }

    fn plan_adjustment(&self, account: &AccountId, asset: &AssetKey, net: Decimal) -> AdjustmentPlan {
        let mut plan = AdjustmentPlan {
            batch: LedgerBatch::new(),
            reclaimed: Decimal::ZERO,
            rebated: Decimal::ZERO,
            shortfall: Decimal::ZERO,
        };
        if net < Decimal::ZERO {
            let owed = -net;
            let balance = self.collab.ledger.balance_of(account, asset);
            plan.reclaimed = owed.min(balance.max(Decimal::ZERO));
            plan.shortfall = owed - plan.reclaimed;
            plan.batch.burn(account, asset, plan.reclaimed);
        } else if net > Decimal::ZERO {
            plan.rebated = net;
            plan.batch.mint(account, asset, net);
        }
        plan
    }

    fn suspend_for_invalid_rate(&mut self, asset: &AssetKey) {
        self.collab
            .suspensions
            .suspend_asset(asset, SuspensionReason::InvalidRate);
        tracing::warn!(asset = %asset, "Settlement found invalid rate, asset suspended");
        self.outbox.push(ExchangeEvent::SynthSuspended {
            asset: asset.clone(),
            reason: SuspensionReason::InvalidRate,
        });
    }

    fn queue_settlement_events(&mut self, eval: &Evaluation, outcome: &SettlementOutcome) {
        for (entry, adj) in eval.selected.entries.iter().zip(&eval.adjustments) {
            self.outbox.push(ExchangeEvent::ExchangeEntrySettled {
                account: entry.account.clone(),
                entry_id: entry.id,
                source: entry.source.clone(),
                amount: entry.amount,
                destination: entry.destination.clone(),
                reclaim: adj.reclaim(),
                rebate: adj.rebate(),
                destination_round_at_settle: eval.current.round_id,
            });
        }
        if outcome.reclaimed > Decimal::ZERO {
            self.outbox.push(ExchangeEvent::ExchangeReclaim {
                account: outcome.account.clone(),
                asset: outcome.asset.clone(),
                amount: outcome.reclaimed,
            });
        }
        if outcome.rebated > Decimal::ZERO {
            self.outbox.push(ExchangeEvent::ExchangeRebate {
                account: outcome.account.clone(),
                asset: outcome.asset.clone(),
                amount: outcome.rebated,
            });
        }
    }
}

fn outcome_of(account: &AccountId, asset: &AssetKey, eval: &Evaluation) -> SettlementOutcome {
    SettlementOutcome {
        account: account.clone(),
        asset: asset.clone(),
        reclaimed: eval.plan.reclaimed,
        rebated: eval.plan.rebated,
        unreclaimed_shortfall: eval.plan.shortfall,
        entries_processed: eval.selected.entries.len(),
        entries_deferred: eval.selected.deferred,
        settlement_root: compute_settlement_root(&eval.selected.entries),
    }
}

impl Settler for SettlementEngine {
    fn settle(
        &mut self,
        account: &AccountId,
        asset: &AssetKey,
        mode: SettleMode,
    ) -> Result<SettlementOutcome> {
        let settings = self.collab.settings.snapshot();
        let eval = match self.evaluate(account, asset, mode, &settings) {
            Ok(Some(eval)) => eval,
            Ok(None) => {
                let now = self.collab.clock.now();
                let deferred = self
                    .pending
                    .eligible(account, asset, now, settings.waiting_period_secs, false)
                    .deferred;
                return Ok(SettlementOutcome::nothing(account, asset, deferred));
            }
            Err(err @ synthex_types::SynthexError::RateInvalid { .. }) => {
                self.suspend_for_invalid_rate(asset);
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        self.commit(&eval.plan.batch)?;

        let ids: Vec<EntryId> = eval.selected.entries.iter().map(|e| e.id).collect();
        self.pending.remove(account, asset, &ids);

        let outcome = outcome_of(account, asset, &eval);
        tracing::info!(
            account = %account,
            asset = %asset,
            mode = ?mode,
            processed = outcome.entries_processed,
            deferred = outcome.entries_deferred,
            reclaimed = %outcome.reclaimed,
            rebated = %outcome.rebated,
            shortfall = %outcome.unreclaimed_shortfall,
            root = %outcome.root_hex(),
            "Settlement complete"
        );
        if outcome.unreclaimed_shortfall > Decimal::ZERO {
            tracing::warn!(
                account = %account,
                asset = %asset,
                shortfall = %outcome.unreclaimed_shortfall,
                "Reclaim capped at balance"
            );
        }
        self.queue_settlement_events(&eval, &outcome);
        Ok(outcome)
    }

    fn settlement_owing(&self, account: &AccountId, asset: &AssetKey) -> Result<SettlementOutcome> {
        let settings = self.collab.settings.snapshot();
        match self.evaluate(account, asset, SettleMode::Explicit, &settings)? {
            Some(eval) => Ok(outcome_of(account, asset, &eval)),
            None => {
                let now = self.collab.clock.now();
                let deferred = self
                    .pending
                    .eligible(account, asset, now, settings.waiting_period_secs, false)
                    .deferred;
                Ok(SettlementOutcome::nothing(account, asset, deferred))
            }
        }
    }

    fn append_entry(&mut self, entry: ExchangeEntry) -> u64 {
        self.pending.append(entry)
    }

    fn pending_entries(&self, account: &AccountId, asset: &AssetKey) -> &[ExchangeEntry] {
        self.pending.entries(account, asset)
    }

    fn max_secs_left(&self, account: &AccountId, asset: &AssetKey) -> u64 {
        let settings = self.collab.settings.snapshot();
        self.pending.max_secs_left(
            account,
            asset,
            self.collab.clock.now(),
            settings.waiting_period_secs,
        )
    }

    fn last_exchange_rate(&self, asset: &AssetKey) -> Option<Decimal> {
        self.anchors.get(asset).copied()
    }

    fn set_last_exchange_rate(&mut self, asset: &AssetKey, rate: Decimal) {
        self.anchors.insert(asset.clone(), rate);
        tracing::debug!(asset = %asset, rate = %rate, "Exchange rate anchor set");
    }

    fn commit(&mut self, batch: &LedgerBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        batch.commit(self.collab.ledger.as_ref())?;
        self.supply.record_batch(batch);
        Ok(())
    }

    fn supply(&self) -> &SupplyConservation {
        &self.supply
    }

    fn drain_events(&mut self) -> Vec<ExchangeEvent> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use synthex_gate::{Clock, InMemoryCollaborators, SuspensionRegistry, SynthLedger};
    use synthex_types::{RoundId, SynthexError};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    fn seth() -> AssetKey {
        AssetKey::new("sETH")
    }

    /// Engine with alice holding the 49.85 sETH credited by a pending entry.
    fn setup() -> (InMemoryCollaborators, SettlementEngine) {
        let mem = InMemoryCollaborators::new(ExchangeSettings::default(), t0()).unwrap();
        mem.oracle.set_rate(&seth(), dec!(2), t0());
        mem.ledger.deposit(&alice(), &seth(), dec!(49.85));
        let mut engine = SettlementEngine::new(mem.collaborators());
        let mut entry = ExchangeEntry::dummy("alice", t0());
        entry.destination_rate.round_id = RoundId(1);
        engine.append_entry(entry);
        (mem, engine)
    }

    #[test]
    fn empty_queue_is_noop() {
        let mem = InMemoryCollaborators::new(ExchangeSettings::default(), t0()).unwrap();
        let mut engine = SettlementEngine::new(mem.collaborators());
        let outcome = engine.settle(&alice(), &seth(), SettleMode::Explicit).unwrap();
        assert!(outcome.is_noop());
        assert_eq!(outcome.reclaimed, Decimal::ZERO);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn immature_entry_deferred_in_explicit_mode() {
        let (mem, mut engine) = setup();
        mem.clock.advance_secs(60);
        let outcome = engine.settle(&alice(), &seth(), SettleMode::Explicit).unwrap();
        assert!(outcome.is_noop());
        assert_eq!(outcome.entries_deferred, 1);
        assert_eq!(engine.pending_entries(&alice(), &seth()).len(), 1);
        assert_eq!(engine.max_secs_left(&alice(), &seth()), 120);
    }

    #[test]
    fn appreciation_reclaims() {
        let (mem, mut engine) = setup();
        mem.clock.advance_secs(180);
        mem.oracle.set_rate(&seth(), dec!(2.2), mem.clock.now());

        let outcome = engine.settle(&alice(), &seth(), SettleMode::Explicit).unwrap();
        assert_eq!(outcome.reclaimed, dec!(4.531818181818181819));
        assert_eq!(outcome.rebated, Decimal::ZERO);
        assert_eq!(outcome.entries_processed, 1);
        assert_eq!(
            mem.ledger.balance_of(&alice(), &seth()),
            dec!(45.318181818181818181)
        );
        assert!(engine.pending_entries(&alice(), &seth()).is_empty());
        assert_eq!(
            engine.supply().net_issuance(&seth()),
            dec!(-4.531818181818181819)
        );

        let events = engine.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), "exchange_entry_settled");
        assert_eq!(events[1].kind(), "exchange_reclaim");
    }

    #[test]
    fn depreciation_rebates() {
        let (mem, mut engine) = setup();
        mem.oracle.set_rate(&seth(), dec!(1.8), t0());
        let outcome = engine.settle(&alice(), &seth(), SettleMode::Force).unwrap();
        assert_eq!(outcome.rebated, dec!(5.538888888888888888));
        assert_eq!(
            mem.ledger.balance_of(&alice(), &seth()),
            dec!(55.388888888888888888)
        );
    }

    #[test]
    fn second_settle_returns_zeroes() {
        let (mem, mut engine) = setup();
        mem.oracle.set_rate(&seth(), dec!(2.2), t0());
        engine.settle(&alice(), &seth(), SettleMode::Force).unwrap();
        let again = engine.settle(&alice(), &seth(), SettleMode::Force).unwrap();
        assert!(again.is_noop());
        assert_eq!(again.reclaimed, Decimal::ZERO);
        assert_eq!(again.rebated, Decimal::ZERO);
    }

    #[test]
    fn reclaim_capped_at_balance() {
        let (mem, mut engine) = setup();
        mem.ledger.burn(&alice(), &seth(), dec!(49)).unwrap();
        mem.oracle.set_rate(&seth(), dec!(2.2), t0());

        let outcome = engine.settle(&alice(), &seth(), SettleMode::Force).unwrap();
        assert_eq!(outcome.reclaimed, dec!(0.85));
        assert_eq!(
            outcome.unreclaimed_shortfall,
            dec!(4.531818181818181819) - dec!(0.85)
        );
        assert_eq!(mem.ledger.balance_of(&alice(), &seth()), Decimal::ZERO);
        assert!(engine.pending_entries(&alice(), &seth()).is_empty());
    }

    #[test]
    fn invalid_rate_suspends_and_keeps_entries() {
        let (mem, mut engine) = setup();
        mem.oracle.remove_rate(&seth());

        let err = engine
            .settle(&alice(), &seth(), SettleMode::Force)
            .unwrap_err();
        assert!(matches!(
            err,
            SynthexError::RateInvalid {
                leg: RateLeg::Destination,
                ..
            }
        ));
        assert_eq!(
            mem.suspensions.asset_suspension(&seth()),
            Some(SuspensionReason::InvalidRate)
        );
        assert_eq!(engine.pending_entries(&alice(), &seth()).len(), 1);
        assert_eq!(mem.ledger.balance_of(&alice(), &seth()), dec!(49.85));
        assert_eq!(engine.drain_events()[0].kind(), "synth_suspended");
    }

    #[test]
    fn owing_preview_has_no_side_effects() {
        let (mem, engine) = setup();
        mem.clock.advance_secs(200);
        mem.oracle.set_rate(&seth(), dec!(2.2), mem.clock.now());

        let preview = engine.settlement_owing(&alice(), &seth()).unwrap();
        assert_eq!(preview.reclaimed, dec!(4.531818181818181819));
        assert_eq!(engine.pending_entries(&alice(), &seth()).len(), 1);
        assert_eq!(mem.ledger.balance_of(&alice(), &seth()), dec!(49.85));
    }

    #[test]
    fn net_of_multiple_entries_applied_once() {
        let (mem, mut engine) = setup();
        let mut second = ExchangeEntry::dummy("alice", t0());
        second.destination_rate.rate = dec!(1.8);
        second.amount_received = dec!(10);
        mem.ledger.deposit(&alice(), &seth(), dec!(10));
        engine.append_entry(second);

        // First entry: no drift at 2. Second: 10 * 1.8 / 2 = 9, so reclaim 1.
        let outcome = engine.settle(&alice(), &seth(), SettleMode::Force).unwrap();
        assert_eq!(outcome.entries_processed, 2);
        assert_eq!(outcome.reclaimed, dec!(1));
        assert_eq!(mem.ledger.balance_of(&alice(), &seth()), dec!(58.85));
    }

    #[test]
    fn events_stay_queued_until_drained() {
        let (mem, mut engine) = setup();
        mem.oracle.set_rate(&seth(), dec!(2.2), t0());
        engine.settle(&alice(), &seth(), SettleMode::Force).unwrap();
        assert!(mem.events.events().is_empty());
        let kinds: Vec<&str> = engine.drain_events().iter().map(ExchangeEvent::kind).collect();
        assert!(kinds.contains(&"exchange_reclaim"));
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn anchors_round_trip() {
        let mem = InMemoryCollaborators::new(ExchangeSettings::default(), t0()).unwrap();
        let mut engine = SettlementEngine::new(mem.collaborators());
        assert_eq!(engine.last_exchange_rate(&seth()), None);
        engine.set_last_exchange_rate(&seth(), dec!(2));
        assert_eq!(engine.last_exchange_rate(&seth()), Some(dec!(2)));
    }
}
