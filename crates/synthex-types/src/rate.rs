//! Oracle rate snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssetKey, RoundId};

/// Which side of an exchange a rate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateLeg {
    Source,
    Destination,
}

impl fmt::Display for RateLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// A rate as observed from the oracle at one point in time.
///
/// Snapshots are immutable. The exchange path captures one per leg and
/// stores both on the pending entry so settlement can compare against the
/// rate that was actually used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub asset: AssetKey,
    /// Price of one unit of `asset` in the common unit of account.
    /// Zero when the oracle has no round for the asset.
    pub rate: Decimal,
    /// False when the rate is missing, non-positive, or stale.
    pub valid: bool,
    pub round_id: RoundId,
    pub observed_at: DateTime<Utc>,
}

impl RateSnapshot {
    /// Snapshot for an asset the oracle knows nothing about.
    #[must_use]
    pub fn missing(asset: AssetKey, observed_at: DateTime<Utc>) -> Self {
        Self {
            asset,
            rate: Decimal::ZERO,
            valid: false,
            round_id: RoundId(0),
            observed_at,
        }
    }

    /// Return `self` if valid, otherwise a `RateInvalid` error for `leg`.
    pub fn require_valid(&self, leg: RateLeg) -> crate::Result<&Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(crate::SynthexError::RateInvalid {
                leg,
                asset: self.asset.clone(),
            })
        }
    }
}
