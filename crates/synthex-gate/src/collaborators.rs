//! Bundle of every external capability the engine consumes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use synthex_types::{ExchangeSettings, Result};

use crate::{
    Clock, DelegationRegistry, EventSink, FeeSink, InMemoryDelegations, InMemoryFeePool,
    InMemoryLedger, InMemoryOracle, InMemorySettings, InMemorySuspensionRegistry, ManualClock,
    RateOracle, RecordingEventSink, SuspensionRegistry, SynthLedger, SystemSettings,
};

/// Injected capabilities. Cloning shares the same underlying services.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn SynthLedger>,
    pub oracle: Arc<dyn RateOracle>,
    pub suspensions: Arc<dyn SuspensionRegistry>,
    pub delegations: Arc<dyn DelegationRegistry>,
    pub settings: Arc<dyn SystemSettings>,
    pub fee_sink: Arc<dyn FeeSink>,
    pub events: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

/// Concrete in-memory services, kept alongside the trait-object bundle so
/// callers can drive them (publish rates, move the clock, seed balances).
#[derive(Clone)]
pub struct InMemoryCollaborators {
    pub ledger: Arc<InMemoryLedger>,
    pub oracle: Arc<InMemoryOracle>,
    pub suspensions: Arc<InMemorySuspensionRegistry>,
    pub delegations: Arc<InMemoryDelegations>,
    pub settings: Arc<InMemorySettings>,
    pub fee_pool: Arc<InMemoryFeePool>,
    pub events: Arc<RecordingEventSink>,
    pub clock: Arc<ManualClock>,
}

impl InMemoryCollaborators {
    pub fn new(settings: ExchangeSettings, start: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            ledger: Arc::new(InMemoryLedger::new()),
            oracle: Arc::new(InMemoryOracle::new()),
            suspensions: Arc::new(InMemorySuspensionRegistry::new()),
            delegations: Arc::new(InMemoryDelegations::new()),
            settings: Arc::new(InMemorySettings::new(settings)?),
            fee_pool: Arc::new(InMemoryFeePool::new()),
            events: Arc::new(RecordingEventSink::new()),
            clock: Arc::new(ManualClock::new(start)),
        })
    }

    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            ledger: self.ledger.clone(),
            oracle: self.oracle.clone(),
            suspensions: self.suspensions.clone(),
            delegations: self.delegations.clone(),
            settings: self.settings.clone(),
            fee_sink: self.fee_pool.clone(),
            events: self.events.clone(),
            clock: self.clock.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use synthex_types::{AccountId, AssetKey};

    #[test]
    fn bundle_shares_state_with_handles() {
        let start = Utc::now();
        let mem = InMemoryCollaborators::new(ExchangeSettings::default(), start).unwrap();
        let bundle = mem.collaborators();

        let alice = AccountId::new("alice");
        let susd = AssetKey::new("sUSD");
        mem.ledger.deposit(&alice, &susd, dec!(5));
        assert_eq!(bundle.ledger.balance_of(&alice, &susd), dec!(5));

        mem.clock.advance_secs(10);
        assert_eq!(bundle.clock.now(), start + chrono::TimeDelta::seconds(10));
    }
}
