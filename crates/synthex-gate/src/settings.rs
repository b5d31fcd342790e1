//! Settings store seam.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use synthex_types::{AssetKey, ExchangeSettings, Result};

/// Source of tunables. Each operation reads exactly one snapshot.
pub trait SystemSettings: Send + Sync {
    fn snapshot(&self) -> ExchangeSettings;
}

/// Mutable in-memory settings. Setters validate before committing.
#[derive(Debug, Default)]
pub struct InMemorySettings {
    inner: RwLock<ExchangeSettings>,
}

impl InMemorySettings {
    pub fn new(settings: ExchangeSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            inner: RwLock::new(settings),
        })
    }

    /// Zero disables the waiting period.
    pub fn set_waiting_period_secs(&self, secs: u64) {
        self.inner.write().waiting_period_secs = secs;
        tracing::info!(secs, "Waiting period updated");
    }

    pub fn set_rate_stale_period_secs(&self, secs: u64) -> Result<()> {
        self.update(|s| s.rate_stale_period_secs = secs)
    }

    pub fn set_price_deviation_threshold_factor(&self, factor: Decimal) -> Result<()> {
        self.update(|s| s.price_deviation_threshold_factor = factor)
    }

    pub fn set_exchange_fee_rate(&self, asset: &AssetKey, rate: Decimal) -> Result<()> {
        self.update(|s| {
            s.exchange_fee_rates.insert(asset.clone(), rate);
        })
    }

    fn update(&self, apply: impl FnOnce(&mut ExchangeSettings)) -> Result<()> {
        let mut guard = self.inner.write();
        let mut next = guard.clone();
        apply(&mut next);
        next.validate()?;
        *guard = next;
        Ok(())
    }
}

impl SystemSettings for InMemorySettings {
    fn snapshot(&self) -> ExchangeSettings {
        self.inner.read().clone()
    }
}
