//! Pending exchange entries awaiting settlement.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetKey, EntryId, RateSnapshot};

/// One executed exchange whose destination credit is not yet final.
///
/// The credited `amount_received` is never mutated after the entry is
/// recorded. Settlement derives a delta from the captured destination rate
/// and the current one, applies it, then deletes the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeEntry {
    pub id: EntryId,
    /// Monotonic append order across the whole ledger. Tie-breaks entries
    /// that share a timestamp.
    pub sequence: u64,
    /// Account whose destination balance was credited.
    pub account: AccountId,
    pub source: AssetKey,
    /// Amount of `source` burned.
    pub amount: Decimal,
    pub destination: AssetKey,
    /// Net amount of `destination` minted, after fee.
    pub amount_received: Decimal,
    pub exchange_fee_rate: Decimal,
    pub source_rate: RateSnapshot,
    pub destination_rate: RateSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Instant at which a waiting period started at `start` ends. Saturates at
/// the latest representable time.
#[must_use]
pub fn waiting_period_end(start: DateTime<Utc>, waiting_period_secs: u64) -> DateTime<Utc> {
    i64::try_from(waiting_period_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|wait| start.checked_add_signed(wait))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whole seconds from `now` until `deadline`, rounded up. Zero once passed.
#[must_use]
pub fn secs_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> u64 {
    let remaining = deadline - now;
    if remaining <= TimeDelta::zero() {
        return 0;
    }
    let whole = remaining.num_seconds();
    let rounded = if remaining > TimeDelta::seconds(whole) {
        whole + 1
    } else {
        whole
    };
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

impl ExchangeEntry {
    /// Instant at which the waiting period ends.
    #[must_use]
    pub fn matures_at(&self, waiting_period_secs: u64) -> DateTime<Utc> {
        waiting_period_end(self.timestamp, waiting_period_secs)
    }

    #[must_use]
    pub fn is_mature(&self, now: DateTime<Utc>, waiting_period_secs: u64) -> bool {
        now >= self.matures_at(waiting_period_secs)
    }

    /// Whole seconds until maturity, rounded up. Zero once mature.
    #[must_use]
    pub fn secs_left(&self, now: DateTime<Utc>, waiting_period_secs: u64) -> u64 {
        secs_until(now, self.matures_at(waiting_period_secs))
    }

    /// A fixed sUSD -> sETH entry for tests.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn dummy(account: &str, timestamp: DateTime<Utc>) -> Self {
        use crate::RoundId;

        Self {
            id: EntryId::new(),
            sequence: 0,
            account: AccountId::new(account),
            source: AssetKey::new("sUSD"),
            amount: Decimal::new(100, 0),
            destination: AssetKey::new("sETH"),
            amount_received: Decimal::new(4985, 2),
            exchange_fee_rate: Decimal::new(3, 3),
            source_rate: RateSnapshot {
                asset: AssetKey::new("sUSD"),
                rate: Decimal::ONE,
                valid: true,
                round_id: RoundId(1),
                observed_at: timestamp,
            },
            destination_rate: RateSnapshot {
                asset: AssetKey::new("sETH"),
                rate: Decimal::TWO,
                valid: true,
                round_id: RoundId(1),
                observed_at: timestamp,
            },
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn maturity_boundary_is_inclusive() {
        let entry = ExchangeEntry::dummy("alice", t0());
        assert!(!entry.is_mature(t0() + TimeDelta::seconds(179), 180));
        assert!(entry.is_mature(t0() + TimeDelta::seconds(180), 180));
    }

    #[test]
    fn zero_waiting_period_is_immediately_mature() {
        let entry = ExchangeEntry::dummy("alice", t0());
        assert!(entry.is_mature(t0(), 0));
        assert_eq!(entry.secs_left(t0(), 0), 0);
    }

    #[test]
    fn secs_left_rounds_up() {
        let entry = ExchangeEntry::dummy("alice", t0());
        let now = t0() + TimeDelta::milliseconds(500);
        assert_eq!(entry.secs_left(now, 180), 180);
        assert_eq!(entry.secs_left(t0() + TimeDelta::seconds(100), 180), 80);
        assert_eq!(entry.secs_left(t0() + TimeDelta::seconds(500), 180), 0);
    }

    #[test]
    fn huge_waiting_period_never_matures() {
        let entry = ExchangeEntry::dummy("alice", t0());
        assert!(!entry.is_mature(t0() + TimeDelta::days(365 * 100), u64::MAX));
        assert!(entry.secs_left(t0(), u64::MAX) > 0);
        assert_eq!(
            secs_until(t0(), waiting_period_end(t0(), u64::MAX)),
            entry.secs_left(t0(), u64::MAX)
        );
    }

    #[test]
    fn entry_serde_roundtrip() {
        let entry = ExchangeEntry::dummy("bob", t0());
        let json = serde_json::to_string(&entry).unwrap();
        let back: ExchangeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
