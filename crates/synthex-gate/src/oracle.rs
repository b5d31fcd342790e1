//! Rate oracle seam and validity rules.
//!
//! The oracle only stores rounds. Whether a round is usable (present,
//! positive, fresh) is decided here by [`RateOracleClient`] against one
//! settings snapshot and one clock reading.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use synthex_types::{AssetKey, ExchangeSettings, RateSnapshot, RoundId};

/// One oracle price update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleRound {
    pub round_id: RoundId,
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Source of current and historical rates.
pub trait RateOracle: Send + Sync {
    fn latest_round(&self, asset: &AssetKey) -> Option<OracleRound>;

    fn round(&self, asset: &AssetKey, round_id: RoundId) -> Option<OracleRound>;
}

/// In-memory oracle. Every `set_rate` opens a new round.
#[derive(Debug, Default)]
pub struct InMemoryOracle {
    rounds: RwLock<HashMap<AssetKey, Vec<OracleRound>>>,
}

impl InMemoryOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new round for `asset` and return its id.
    pub fn set_rate(&self, asset: &AssetKey, rate: Decimal, updated_at: DateTime<Utc>) -> RoundId {
        let mut rounds = self.rounds.write();
        let history = rounds.entry(asset.clone()).or_default();
        let round_id = history
            .last()
            .map_or(RoundId(1), |last| last.round_id.next());
        history.push(OracleRound {
            round_id,
            rate,
            updated_at,
        });
        tracing::debug!(asset = %asset, rate = %rate, round = %round_id, "Oracle round published");
        round_id
    }

    /// Forget every round for `asset`, so it reads as missing.
    pub fn remove_rate(&self, asset: &AssetKey) {
        self.rounds.write().remove(asset);
    }
}

impl RateOracle for InMemoryOracle {
    fn latest_round(&self, asset: &AssetKey) -> Option<OracleRound> {
        self.rounds
            .read()
            .get(asset)
            .and_then(|history| history.last().copied())
    }

    fn round(&self, asset: &AssetKey, round_id: RoundId) -> Option<OracleRound> {
        self.rounds
            .read()
            .get(asset)
            .and_then(|history| history.iter().find(|r| r.round_id == round_id).copied())
    }
}

/// Reads snapshots and applies validity rules for one operation.
pub struct RateOracleClient<'a> {
    oracle: &'a dyn RateOracle,
    settings: &'a ExchangeSettings,
    now: DateTime<Utc>,
}

impl<'a> RateOracleClient<'a> {
    #[must_use]
    pub fn new(oracle: &'a dyn RateOracle, settings: &'a ExchangeSettings, now: DateTime<Utc>) -> Self {
        Self {
            oracle,
            settings,
            now,
        }
    }

    /// Current rate and validity for `asset`.
    #[must_use]
    pub fn snapshot(&self, asset: &AssetKey) -> RateSnapshot {
        match self.oracle.latest_round(asset) {
            Some(round) => RateSnapshot {
                asset: asset.clone(),
                rate: round.rate,
                valid: round.rate > Decimal::ZERO && !self.is_stale(round.updated_at),
                round_id: round.round_id,
                observed_at: self.now,
            },
            None => RateSnapshot::missing(asset.clone(), self.now),
        }
    }

    /// Rate as of a past round. Historical rounds are never stale.
    #[must_use]
    pub fn snapshot_at(&self, asset: &AssetKey, round_id: RoundId) -> RateSnapshot {
        match self.oracle.round(asset, round_id) {
            Some(round) => RateSnapshot {
                asset: asset.clone(),
                rate: round.rate,
                valid: round.rate > Decimal::ZERO,
                round_id: round.round_id,
                observed_at: self.now,
            },
            None => RateSnapshot::missing(asset.clone(), self.now),
        }
    }

    fn is_stale(&self, updated_at: DateTime<Utc>) -> bool {
        let window = i64::try_from(self.settings.rate_stale_period_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        self.now - updated_at > window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn seth() -> AssetKey {
        AssetKey::new("sETH")
    }

    #[test]
    fn rounds_increment() {
        let oracle = InMemoryOracle::new();
        assert_eq!(oracle.set_rate(&seth(), dec!(2), t0()), RoundId(1));
        assert_eq!(oracle.set_rate(&seth(), dec!(2.2), t0()), RoundId(2));
        assert_eq!(oracle.latest_round(&seth()).unwrap().rate, dec!(2.2));
        assert_eq!(oracle.latest_round(&seth()).unwrap().round_id, RoundId(2));
        assert_eq!(oracle.round(&seth(), RoundId(1)).unwrap().rate, dec!(2));
    }

    #[test]
    fn fresh_positive_rate_is_valid() {
        let oracle = InMemoryOracle::new();
        oracle.set_rate(&seth(), dec!(2), t0());
        let settings = ExchangeSettings::default();
        let client = RateOracleClient::new(&oracle, &settings, t0() + TimeDelta::seconds(3_600));
        let snap = client.snapshot(&seth());
        assert!(snap.valid);
        assert_eq!(snap.round_id, RoundId(1));
    }

    #[test]
    fn stale_rate_is_invalid() {
        let oracle = InMemoryOracle::new();
        oracle.set_rate(&seth(), dec!(2), t0());
        let settings = ExchangeSettings::default();
        let client = RateOracleClient::new(&oracle, &settings, t0() + TimeDelta::seconds(3_601));
        assert!(!client.snapshot(&seth()).valid);
    }

    #[test]
    fn zero_and_missing_are_invalid() {
        let oracle = InMemoryOracle::new();
        oracle.set_rate(&seth(), Decimal::ZERO, t0());
        let settings = ExchangeSettings::default();
        let client = RateOracleClient::new(&oracle, &settings, t0());
        assert!(!client.snapshot(&seth()).valid);
        assert!(!client.snapshot(&AssetKey::new("sXYZ")).valid);

        oracle.remove_rate(&seth());
        assert!(!client.snapshot(&seth()).valid);
    }

    #[test]
    fn historical_round_ignores_staleness() {
        let oracle = InMemoryOracle::new();
        let round = oracle.set_rate(&seth(), dec!(2), t0());
        let settings = ExchangeSettings::default();
        let client = RateOracleClient::new(&oracle, &settings, t0() + TimeDelta::days(30));
        let snap = client.snapshot_at(&seth(), round);
        assert!(snap.valid);
        assert_eq!(snap.rate, dec!(2));
        assert!(!client.snapshot_at(&seth(), RoundId(99)).valid);
    }
}
