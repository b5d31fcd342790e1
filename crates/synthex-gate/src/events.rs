//! Outbound event channel.
//!
//! The engine emits only after every ledger write and entry update for an
//! operation has landed, so a sink observes committed state.

use parking_lot::Mutex;
use synthex_types::ExchangeEvent;

/// Receives published exchange events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ExchangeEvent);
}

/// Keeps every event in order. Used by tests and replay tooling.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ExchangeEvent>>,
}

impl RecordingEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<ExchangeEvent> {
        self.events.lock().clone()
    }

    /// Take and clear the recorded events.
    pub fn drain(&self) -> Vec<ExchangeEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events with the given kind tag.
    #[must_use]
    pub fn count_of(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: ExchangeEvent) {
        self.events.lock().push(event);
    }
}

/// Mirrors events into the `tracing` stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: ExchangeEvent) {
        tracing::info!(kind = event.kind(), event = ?event, "Exchange event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use synthex_types::AssetKey;

    #[test]
    fn records_in_order_and_drains() {
        let sink = RecordingEventSink::new();
        sink.emit(ExchangeEvent::LastExchangeRateUpdated {
            asset: AssetKey::new("sETH"),
            rate: dec!(2),
        });
        sink.emit(ExchangeEvent::LastExchangeRateUpdated {
            asset: AssetKey::new("sUSD"),
            rate: dec!(1),
        });
        assert_eq!(sink.count_of("last_exchange_rate_updated"), 2);
        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert!(sink.events().is_empty());
    }
}
