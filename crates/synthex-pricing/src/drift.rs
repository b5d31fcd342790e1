//! Rate-drift adjustment for pending exchange entries.
//!
//! An entry credited `amount_received` at the captured destination rate. Had
//! it been priced at the current rate, the holder would have received
//! `implied = trunc(credited * captured / current)`. The difference is owed
//! back (negative) or owed to the holder (positive).

use rust_decimal::Decimal;
use synthex_types::{EntryId, ExchangeEntry, Result, SynthexError};

use crate::fixed_point::effective_value;

/// Per-entry settlement result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryAdjustment {
    pub entry_id: EntryId,
    /// Destination amount at the current rate.
    pub implied: Decimal,
    /// `implied - credited`. Negative means reclaim.
    pub delta: Decimal,
}

impl EntryAdjustment {
    /// Amount to take back, zero for a rebate.
    #[must_use]
    pub fn reclaim(&self) -> Decimal {
        if self.delta.is_sign_negative() {
            -self.delta
        } else {
            Decimal::ZERO
        }
    }

    /// Amount to add, zero for a reclaim.
    #[must_use]
    pub fn rebate(&self) -> Decimal {
        if self.delta.is_sign_positive() {
            self.delta
        } else {
            Decimal::ZERO
        }
    }
}

/// Drift of a single entry against `current_destination_rate`.
pub fn entry_adjustment(
    entry: &ExchangeEntry,
    current_destination_rate: Decimal,
) -> Result<EntryAdjustment> {
    let captured = entry.destination_rate.rate;
    let implied = if captured == current_destination_rate {
        entry.amount_received
    } else {
        effective_value(entry.amount_received, captured, current_destination_rate)?
    };
    let delta = implied
        .checked_sub(entry.amount_received)
        .ok_or(SynthexError::ArithmeticOverflow { context: "drift" })?;

    tracing::debug!(
        entry = %entry.id,
        credited = %entry.amount_received,
        captured = %captured,
        current = %current_destination_rate,
        delta = %delta,
        "Entry drift computed"
    );

    Ok(EntryAdjustment {
        entry_id: entry.id,
        implied,
        delta,
    })
}

/// Sum of deltas, applied as one adjustment.
pub fn net_adjustment(adjustments: &[EntryAdjustment]) -> Result<Decimal> {
    adjustments.iter().try_fold(Decimal::ZERO, |acc, adj| {
        acc.checked_add(adj.delta)
            .ok_or(SynthexError::ArithmeticOverflow { context: "net drift" })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn no_drift_no_adjustment() {
        let entry = ExchangeEntry::dummy("alice", Utc::now());
        let adj = entry_adjustment(&entry, dec!(2)).unwrap();
        assert_eq!(adj.delta, Decimal::ZERO);
        assert_eq!(adj.reclaim(), Decimal::ZERO);
        assert_eq!(adj.rebate(), Decimal::ZERO);
    }

    #[test]
    fn destination_appreciation_reclaims() {
        let entry = ExchangeEntry::dummy("alice", Utc::now());
        let adj = entry_adjustment(&entry, dec!(2.2)).unwrap();
        assert_eq!(adj.implied, dec!(45.318181818181818181));
        assert_eq!(adj.reclaim(), dec!(4.531818181818181819));
        assert_eq!(adj.rebate(), Decimal::ZERO);
    }

    #[test]
    fn destination_depreciation_rebates() {
        let entry = ExchangeEntry::dummy("alice", Utc::now());
        let adj = entry_adjustment(&entry, dec!(1.8)).unwrap();
        // 99.7 / 1.8 = 55.3888...
        assert_eq!(adj.implied, dec!(55.388888888888888888));
        assert_eq!(adj.rebate(), dec!(5.538888888888888888));
    }

    #[test]
    fn net_sums_mixed_signs() {
        let entry = ExchangeEntry::dummy("alice", Utc::now());
        let up = entry_adjustment(&entry, dec!(2.2)).unwrap();
        let down = entry_adjustment(&entry, dec!(1.8)).unwrap();
        let net = net_adjustment(&[up, down]).unwrap();
        assert_eq!(net, up.delta + down.delta);
        assert_eq!(net_adjustment(&[]).unwrap(), Decimal::ZERO);
    }
}
