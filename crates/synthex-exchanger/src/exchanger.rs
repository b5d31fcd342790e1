//! The exchange executor.
//!
//! ## Exchange pipeline
//!
//! 1. Authorize the caller for the account
//! 2. Validate the request (positive amount at most 18 dp, distinct assets)
//! 3. Suspension guard: system, source, destination
//! 4. Force-settle the account's source and destination queues
//! 5. Snapshot both leg rates and reject invalid ones
//! 6. Circuit breaker against each leg's last exchange rate
//! 7. Quote gross, fee and net at 18-decimal truncation
//! 8. Check the source balance
//! 9. Commit burn + mint as one [`LedgerBatch`]
//! 10. Hand the fee to the fee sink (and the reward tally when tracked)
//! 11. Queue the pending entry, create the proxy for virtual exchanges
//! 12. Move the rate anchors and queue events
//!
//! Every public operation publishes its buffered events on the way out,
//! including failed ones, so suspensions and already-committed settlements
//! are never lost.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use synthex_gate::{AuthorizationGate, Collaborators, RateOracleClient, SuspensionGuard};
use synthex_pricing::{FeeCalculator, FeeQuote, div_trunc, is_deviation_above_threshold, mul_trunc};
use synthex_settlement::{
    LedgerBatch, SettleMode, SettlementEngine, SettlementOutcome, Settler, SupplyConservation,
    TransferOutcome, VirtualAsset, VirtualAssetFactory, VirtualContext, VirtualSettlement,
};
use synthex_types::constants::PRECISION_DECIMALS;
use synthex_types::{
    AccessConfig, AccountId, AssetKey, EntryId, ExchangeEntry, ExchangeEvent, ExchangeSettings,
    RateLeg, RateSnapshot, Result, RoundId, SuspensionReason, SynthexError, VirtualAssetId,
};

use crate::request::{Credit, ExchangeReceipt, ExchangeRequest, Tracking};

/// Entry point for every exchange, settlement and proxy operation.
///
/// Operations take `&mut self`, so one `Exchanger` processes them strictly
/// one at a time. Share it behind a lock if several threads need it.
pub struct Exchanger<S: Settler = SettlementEngine> {
    collab: Collaborators,
    gate: AuthorizationGate,
    settler: S,
    virtuals: VirtualAssetFactory,
    outbox: Vec<ExchangeEvent>,
}

impl Exchanger<SettlementEngine> {
    /// Exchanger backed by a fresh [`SettlementEngine`] over `collab`.
    #[must_use]
    pub fn new(collab: Collaborators, access: AccessConfig) -> Self {
        let settler = SettlementEngine::new(collab.clone());
        Self::with_settler(collab, access, settler)
    }
}

impl<S: Settler> Exchanger<S> {
    /// Exchanger over a caller-supplied settlement backend.
    #[must_use]
    pub fn with_settler(collab: Collaborators, access: AccessConfig, settler: S) -> Self {
        tracing::info!(
            engine = synthex_types::constants::ENGINE_NAME,
            version = synthex_types::constants::VERSION,
            routers = access.routers.len(),
            operators = access.operators.len(),
            "Exchanger initialised"
        );
        Self {
            collab,
            gate: AuthorizationGate::new(access),
            settler,
            virtuals: VirtualAssetFactory::new(),
            outbox: Vec::new(),
        }
    }

    /// Settlement backend, for anchor and queue inspection.
    #[must_use]
    pub fn settler(&self) -> &S {
        &self.settler
    }

    /// Mints and burns performed by this exchanger, per asset.
    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        self.settler.supply()
    }

    /// Unsettled entries for (account, asset), oldest first.
    #[must_use]
    pub fn pending_entries(&self, account: &AccountId, asset: &AssetKey) -> &[ExchangeEntry] {
        self.settler.pending_entries(account, asset)
    }

    // ------------------------------------------------------------------
    // Exchanges
    // ------------------------------------------------------------------

    /// Exchange from `from`'s own balance.
    pub fn exchange(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        request: &ExchangeRequest,
    ) -> Result<ExchangeReceipt> {
        self.publishing(|this| {
            this.gate.authorize_direct(caller, from)?;
            this.execute(from, request, None, &Credit::Direct)
        })
    }

    /// Exchange by an approved `delegate` for `exchange_for`.
    pub fn exchange_on_behalf(
        &mut self,
        caller: &AccountId,
        delegate: &AccountId,
        exchange_for: &AccountId,
        request: &ExchangeRequest,
    ) -> Result<ExchangeReceipt> {
        self.publishing(|this| {
            this.gate.authorize_on_behalf(
                this.collab.delegations.as_ref(),
                caller,
                delegate,
                exchange_for,
            )?;
            this.execute(exchange_for, request, None, &Credit::Direct)
        })
    }

    /// Delegated exchange that also credits the fee to a tracking code.
    pub fn exchange_on_behalf_with_tracking(
        &mut self,
        caller: &AccountId,
        delegate: &AccountId,
        exchange_for: &AccountId,
        request: &ExchangeRequest,
        tracking: &Tracking,
    ) -> Result<ExchangeReceipt> {
        self.publishing(|this| {
            this.gate.authorize_on_behalf(
                this.collab.delegations.as_ref(),
                caller,
                delegate,
                exchange_for,
            )?;
            this.execute(exchange_for, request, Some(tracking), &Credit::Direct)
        })
    }

    /// Direct exchange that also credits the fee to a tracking code.
    pub fn exchange_with_tracking(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        request: &ExchangeRequest,
        tracking: &Tracking,
    ) -> Result<ExchangeReceipt> {
        self.publishing(|this| {
            this.gate.authorize_direct(caller, from)?;
            this.execute(from, request, Some(tracking), &Credit::Direct)
        })
    }

    /// Exchange into a transferable proxy held by `recipient`.
    ///
    /// The destination credit sits in the proxy's custody account until the
    /// proxy settles.
    pub fn exchange_with_virtual(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        request: &ExchangeRequest,
        recipient: &AccountId,
    ) -> Result<ExchangeReceipt> {
        self.publishing(|this| {
            this.gate.authorize_direct(caller, from)?;
            let credit = Credit::Virtual {
                recipient: recipient.clone(),
            };
            this.execute(from, request, None, &credit)
        })
    }

    fn execute(
        &mut self,
        from: &AccountId,
        request: &ExchangeRequest,
        tracking: Option<&Tracking>,
        credit: &Credit,
    ) -> Result<ExchangeReceipt> {
        validate_request(request)?;
        let ExchangeRequest {
            source,
            amount,
            destination,
        } = request;
        let amount = *amount;

        SuspensionGuard::new(self.collab.suspensions.as_ref())
            .require_exchange_allowed(source, destination)?;

        self.settler.settle(from, source, SettleMode::Force)?;
        self.settler.settle(from, destination, SettleMode::Force)?;

        let settings = self.collab.settings.snapshot();
        let now = self.collab.clock.now();
        let (source_rate, destination_rate) = self.leg_rates(source, destination, &settings, now)?;
        self.check_circuit_breaker(&source_rate, &settings)?;
        self.check_circuit_breaker(&destination_rate, &settings)?;

        let quote = FeeCalculator::new(&settings).quote(
            source,
            amount,
            source_rate.rate,
            destination,
            destination_rate.rate,
        )?;

        let available = self.collab.ledger.balance_of(from, source);
        if available < amount {
            return Err(SynthexError::InsufficientBalance {
                account: from.clone(),
                asset: source.clone(),
                needed: amount,
                available,
            });
        }

        let proxy = match credit {
            Credit::Direct => None,
            Credit::Virtual { recipient } => Some((VirtualAssetId::new(), recipient)),
        };
        let holder = proxy
            .as_ref()
            .map_or_else(|| from.clone(), |(id, _)| id.custody_account());

        let mut batch = LedgerBatch::new();
        batch
            .burn(from, source, amount)
            .mint(&holder, destination, quote.net);
        self.settler.commit(&batch)?;

        if let Err(err) = self.collect_fee(destination, quote.fee, tracking) {
            tracing::warn!(
                account = %from,
                asset = %destination,
                fee = %quote.fee,
                error = %err,
                "Fee collection failed, reverting exchange"
            );
            self.settler.commit(&batch.inverse())?;
            return Err(err);
        }

        let entry = ExchangeEntry {
            id: EntryId::new(),
            sequence: 0,
            account: holder.clone(),
            source: source.clone(),
            amount,
            destination: destination.clone(),
            amount_received: quote.net,
            exchange_fee_rate: quote.fee_rate,
            source_rate: source_rate.clone(),
            destination_rate: destination_rate.clone(),
            timestamp: now,
        };
        let entry_id = entry.id;
        self.settler.append_entry(entry);

        if let Some((id, recipient)) = &proxy {
            self.virtuals
                .create(*id, destination, entry_id, recipient, quote.net, now)?;
        }

        self.settler.set_last_exchange_rate(source, source_rate.rate);
        self.settler
            .set_last_exchange_rate(destination, destination_rate.rate);

        tracing::info!(
            account = %from,
            source = %source,
            destination = %destination,
            amount = %amount,
            gross = %quote.gross,
            fee = %quote.fee,
            net = %quote.net,
            entry = %entry_id,
            virtual_exchange = proxy.is_some(),
            "Exchange executed"
        );

        self.outbox.push(ExchangeEvent::SynthExchange {
            account: from.clone(),
            source: source.clone(),
            amount,
            destination: destination.clone(),
            amount_received: quote.net,
            recipient: holder.clone(),
            fee: quote.fee,
        });
        self.outbox.push(ExchangeEvent::ExchangeEntryAppended {
            account: holder,
            entry_id,
            source: source.clone(),
            amount,
            destination: destination.clone(),
            amount_received: quote.net,
            exchange_fee_rate: quote.fee_rate,
            source_round: source_rate.round_id,
            destination_round: destination_rate.round_id,
        });
        if let Some(tracking) = tracking {
            self.outbox.push(ExchangeEvent::ExchangeTracking {
                code: tracking.code.clone(),
                destination: destination.clone(),
                amount: quote.net,
                fee: quote.fee,
            });
        }
        if let Some((id, recipient)) = &proxy {
            self.outbox.push(ExchangeEvent::VirtualAssetCreated {
                virtual_asset: *id,
                underlying: destination.clone(),
                recipient: (*recipient).clone(),
                amount: quote.net,
            });
        }

        Ok(ExchangeReceipt {
            net_amount: quote.net,
            fee: quote.fee,
            gross_amount: quote.gross,
            fee_rate: quote.fee_rate,
            entry_id,
            virtual_asset: proxy.map(|(id, _)| id),
        })
    }

    fn leg_rates(
        &self,
        source: &AssetKey,
        destination: &AssetKey,
        settings: &ExchangeSettings,
        now: DateTime<Utc>,
    ) -> Result<(RateSnapshot, RateSnapshot)> {
        let oracle = RateOracleClient::new(self.collab.oracle.as_ref(), settings, now);
        let source_rate = oracle.snapshot(source);
        source_rate.require_valid(RateLeg::Source)?;
        let destination_rate = oracle.snapshot(destination);
        destination_rate.require_valid(RateLeg::Destination)?;
        Ok((source_rate, destination_rate))
    }

    /// Trip the breaker when a leg rate moved too far from its anchor.
    /// Assets without an anchor pass.
    fn check_circuit_breaker(
        &mut self,
        snapshot: &RateSnapshot,
        settings: &ExchangeSettings,
    ) -> Result<()> {
        let Some(anchor) = self.settler.last_exchange_rate(&snapshot.asset) else {
            return Ok(());
        };
        if !is_deviation_above_threshold(
            anchor,
            snapshot.rate,
            settings.price_deviation_threshold_factor,
        ) {
            return Ok(());
        }
        self.suspend(&snapshot.asset, SuspensionReason::CircuitBreaker);
        Err(SynthexError::CircuitBroken {
            asset: snapshot.asset.clone(),
            rate: snapshot.rate,
            last_rate: anchor,
        })
    }

    fn collect_fee(
        &self,
        destination: &AssetKey,
        fee: Decimal,
        tracking: Option<&Tracking>,
    ) -> Result<()> {
        if fee.is_zero() {
            return Ok(());
        }
        self.collab.fee_sink.collect(destination, fee)?;
        if let Some(tracking) = tracking {
            self.collab
                .fee_sink
                .record_reward(&tracking.reward_recipient, destination, fee)?;
        }
        Ok(())
    }

    fn suspend(&mut self, asset: &AssetKey, reason: SuspensionReason) {
        self.collab.suspensions.suspend_asset(asset, reason);
        tracing::warn!(asset = %asset, reason = %reason, code = reason.code(), "Asset suspended");
        self.outbox.push(ExchangeEvent::SynthSuspended {
            asset: asset.clone(),
            reason,
        });
    }

    // ------------------------------------------------------------------
    // Settlement and administration
    // ------------------------------------------------------------------

    /// Settle `account`'s matured entries for `asset`. Anyone may call it.
    pub fn settle(&mut self, account: &AccountId, asset: &AssetKey) -> Result<SettlementOutcome> {
        self.publishing(|this| {
            let guard = SuspensionGuard::new(this.collab.suspensions.as_ref());
            guard.require_system_active()?;
            guard.require_asset_active(asset)?;
            this.settler.settle(account, asset, SettleMode::Explicit)
        })
    }

    /// Suspend `asset` if its current rate is invalid or has deviated past
    /// the threshold. Returns the reason recorded.
    pub fn suspend_synth_with_invalid_rate(
        &mut self,
        caller: &AccountId,
        asset: &AssetKey,
    ) -> Result<SuspensionReason> {
        self.publishing(|this| {
            this.gate.require_operator(caller)?;
            SuspensionGuard::new(this.collab.suspensions.as_ref()).require_system_active()?;

            let settings = this.collab.settings.snapshot();
            let now = this.collab.clock.now();
            let snapshot =
                RateOracleClient::new(this.collab.oracle.as_ref(), &settings, now).snapshot(asset);
            let deviated = this.settler.last_exchange_rate(asset).is_some_and(|anchor| {
                is_deviation_above_threshold(
                    anchor,
                    snapshot.rate,
                    settings.price_deviation_threshold_factor,
                )
            });
            let reason = match (snapshot.valid, deviated) {
                (false, _) => SuspensionReason::InvalidRate,
                (true, true) => SuspensionReason::CircuitBreaker,
                (true, false) => {
                    return Err(SynthexError::RateStillValid {
                        asset: asset.clone(),
                    });
                }
            };
            this.suspend(asset, reason);
            Ok(reason)
        })
    }

    /// Reset the circuit-breaker anchor for `asset`.
    pub fn set_last_exchange_rate_for_synth(
        &mut self,
        caller: &AccountId,
        asset: &AssetKey,
        rate: Decimal,
    ) -> Result<()> {
        self.publishing(|this| {
            this.gate.require_operator(caller)?;
            if rate <= Decimal::ZERO {
                return Err(SynthexError::InvalidAmount {
                    reason: format!("exchange rate anchor must be positive, got {rate}"),
                });
            }
            this.settler.set_last_exchange_rate(asset, rate);
            tracing::info!(caller = %caller, asset = %asset, rate = %rate, "Last exchange rate set");
            this.outbox.push(ExchangeEvent::LastExchangeRateUpdated {
                asset: asset.clone(),
                rate,
            });
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// What an explicit settle would do now. No side effects.
    pub fn settlement_owing(
        &self,
        account: &AccountId,
        asset: &AssetKey,
    ) -> Result<SettlementOutcome> {
        self.settler.settlement_owing(account, asset)
    }

    /// Seconds until the youngest pending entry for (account, asset) matures.
    #[must_use]
    pub fn max_secs_left_in_waiting_period(&self, account: &AccountId, asset: &AssetKey) -> u64 {
        self.settler.max_secs_left(account, asset)
    }

    /// True while an entry is still waiting, or a reclaim is owed.
    pub fn has_waiting_period_or_settlement_owing(
        &self,
        account: &AccountId,
        asset: &AssetKey,
    ) -> Result<bool> {
        if self.max_secs_left_in_waiting_period(account, asset) > 0 {
            return Ok(true);
        }
        let owing = self.settler.settlement_owing(account, asset)?;
        Ok(owing.reclaimed > Decimal::ZERO || owing.unreclaimed_shortfall > Decimal::ZERO)
    }

    /// Fee rate currently charged for `source` into `destination`.
    #[must_use]
    pub fn fee_rate_for_exchange(&self, source: &AssetKey, destination: &AssetKey) -> Decimal {
        let settings = self.collab.settings.snapshot();
        FeeCalculator::new(&settings).fee_rate(source, destination)
    }

    /// Quote `request` at current rates without executing it.
    pub fn amounts_for_exchange(&self, request: &ExchangeRequest) -> Result<FeeQuote> {
        validate_request(request)?;
        let settings = self.collab.settings.snapshot();
        let now = self.collab.clock.now();
        let (source_rate, destination_rate) =
            self.leg_rates(&request.source, &request.destination, &settings, now)?;
        FeeCalculator::new(&settings).quote(
            &request.source,
            request.amount,
            source_rate.rate,
            &request.destination,
            destination_rate.rate,
        )
    }

    /// Rate `asset` had at oracle round `round_id`, as recorded on entries
    /// and settlement events. Past rounds are never stale.
    #[must_use]
    pub fn rate_at_round(&self, asset: &AssetKey, round_id: RoundId) -> RateSnapshot {
        let settings = self.collab.settings.snapshot();
        RateOracleClient::new(self.collab.oracle.as_ref(), &settings, self.collab.clock.now())
            .snapshot_at(asset, round_id)
    }

    // ------------------------------------------------------------------
    // Virtual assets
    // ------------------------------------------------------------------

    /// Proxy state, settled or not.
    pub fn virtual_asset(&self, id: VirtualAssetId) -> Result<&VirtualAsset> {
        self.virtuals.get(id)
    }

    /// Move proxy units between holders. Once the proxy has matured this
    /// settles it instead and moves nothing.
    pub fn virtual_transfer(
        &mut self,
        caller: &AccountId,
        id: VirtualAssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<TransferOutcome> {
        self.publishing(|this| {
            this.gate.authorize_direct(caller, from)?;
            let ctx = virtual_context(&this.collab);
            this.guard_virtual_settlement(id, &ctx)?;
            let outcome = this
                .virtuals
                .transfer(id, from, to, amount, &mut this.settler, ctx)?;
            if let TransferOutcome::SettledInstead(settlement) = &outcome {
                this.record_virtual_settlement(settlement);
            }
            Ok(outcome)
        })
    }

    /// Proxy units held by `holder`, settling the proxy first if it matured.
    pub fn virtual_balance_of(&mut self, id: VirtualAssetId, holder: &AccountId) -> Result<Decimal> {
        self.publishing(|this| {
            this.settle_virtual_if_matured(id)?;
            Ok(this.virtuals.get(id)?.balance_of(holder))
        })
    }

    /// Underlying `holder` is entitled to through the proxy.
    ///
    /// Before maturity this is the holder's pro-rata share of the custody
    /// balance; after settlement it is what was actually credited.
    pub fn virtual_underlying_value(
        &mut self,
        id: VirtualAssetId,
        holder: &AccountId,
    ) -> Result<Decimal> {
        self.publishing(|this| {
            this.settle_virtual_if_matured(id)?;
            let asset = this.virtuals.get(id)?;
            if asset.settled {
                return Ok(asset.converted_of(holder));
            }
            if asset.total_supply.is_zero() {
                return Ok(Decimal::ZERO);
            }
            let backing = this
                .collab
                .ledger
                .balance_of(&asset.custody, &asset.underlying);
            div_trunc(
                mul_trunc(asset.balance_of(holder), backing)?,
                asset.total_supply,
            )
        })
    }

    /// Settle a matured proxy explicitly.
    pub fn settle_virtual(&mut self, id: VirtualAssetId) -> Result<VirtualSettlement> {
        self.publishing(|this| {
            let underlying = this.virtuals.get(id)?.underlying.clone();
            let guard = SuspensionGuard::new(this.collab.suspensions.as_ref());
            guard.require_system_active()?;
            guard.require_asset_active(&underlying)?;

            let ctx = virtual_context(&this.collab);
            let settlement = this.virtuals.settle(id, &mut this.settler, ctx)?;
            this.record_virtual_settlement(&settlement);
            Ok(settlement)
        })
    }

    fn settle_virtual_if_matured(&mut self, id: VirtualAssetId) -> Result<Option<VirtualSettlement>> {
        let ctx = virtual_context(&self.collab);
        self.guard_virtual_settlement(id, &ctx)?;
        let settled = self
            .virtuals
            .settle_if_matured(id, &mut self.settler, ctx)?;
        if let Some(settlement) = &settled {
            self.record_virtual_settlement(settlement);
        }
        Ok(settled)
    }

    /// Suspension only blocks a proxy call that is about to settle it.
    fn guard_virtual_settlement(&self, id: VirtualAssetId, ctx: &VirtualContext<'_>) -> Result<()> {
        let asset = self.virtuals.get(id)?;
        if asset.settled || !asset.is_mature(ctx.now, ctx.waiting_period_secs) {
            return Ok(());
        }
        let guard = SuspensionGuard::new(self.collab.suspensions.as_ref());
        guard.require_system_active()?;
        guard.require_asset_active(&asset.underlying)
    }

    fn record_virtual_settlement(&mut self, settlement: &VirtualSettlement) {
        self.outbox.push(ExchangeEvent::VirtualAssetSettled {
            virtual_asset: settlement.id,
            underlying: settlement.underlying.clone(),
            settled_amount: settlement.settled_amount,
            holders: settlement.distribution.len(),
        });
    }

    // ------------------------------------------------------------------
    // Event publication
    // ------------------------------------------------------------------

    fn publishing<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = op(self);
        self.publish_events();
        result
    }

    /// Settlement events first, then the executor's own, in queue order.
    fn publish_events(&mut self) {
        let mut events = self.settler.drain_events();
        events.append(&mut self.outbox);
        for event in events {
            self.collab.events.emit(event);
        }
    }
}

fn validate_request(request: &ExchangeRequest) -> Result<()> {
    if request.amount <= Decimal::ZERO {
        return Err(SynthexError::InvalidAmount {
            reason: format!("exchange amount must be positive, got {}", request.amount),
        });
    }
    if request.amount.scale() > PRECISION_DECIMALS {
        return Err(SynthexError::InvalidAmount {
            reason: format!(
                "exchange amount {} has more than {PRECISION_DECIMALS} fractional digits",
                request.amount
            ),
        });
    }
    if request.source == request.destination {
        return Err(SynthexError::SameAsset(request.source.clone()));
    }
    Ok(())
}

fn virtual_context(collab: &Collaborators) -> VirtualContext<'_> {
    VirtualContext {
        ledger: collab.ledger.as_ref(),
        now: collab.clock.now(),
        waiting_period_secs: collab.settings.snapshot().waiting_period_secs,
    }
}
