//! Domain events published after an operation's bookkeeping is complete.
//!
//! Events are the outbound side of the engine. Consumers must treat them as
//! notifications only; nothing in the engine reads them back.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetKey, EntryId, RoundId, TrackingCode, VirtualAssetId};

/// Why an asset (or the system) was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuspensionReason {
    /// Set by an operator.
    Manual,
    /// Settlement found the current rate invalid.
    InvalidRate,
    /// A leg rate deviated too far from its last exchange anchor.
    CircuitBreaker,
}

impl SuspensionReason {
    /// Stable numeric reason code carried in logs.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Manual => 1,
            Self::InvalidRate => 55,
            Self::CircuitBreaker => 65,
        }
    }
}

impl fmt::Display for SuspensionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::InvalidRate => write!(f, "invalid_rate"),
            Self::CircuitBreaker => write!(f, "circuit_breaker"),
        }
    }
}

/// Everything the engine announces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeEvent {
    SynthExchange {
        account: AccountId,
        source: AssetKey,
        amount: Decimal,
        destination: AssetKey,
        amount_received: Decimal,
        /// Where the destination credit went. Differs from `account` for
        /// virtual exchanges.
        recipient: AccountId,
        fee: Decimal,
    },
    ExchangeEntryAppended {
        account: AccountId,
        entry_id: EntryId,
        source: AssetKey,
        amount: Decimal,
        destination: AssetKey,
        amount_received: Decimal,
        exchange_fee_rate: Decimal,
        source_round: RoundId,
        destination_round: RoundId,
    },
    ExchangeEntrySettled {
        account: AccountId,
        entry_id: EntryId,
        source: AssetKey,
        amount: Decimal,
        destination: AssetKey,
        reclaim: Decimal,
        rebate: Decimal,
        destination_round_at_settle: RoundId,
    },
    ExchangeReclaim {
        account: AccountId,
        asset: AssetKey,
        amount: Decimal,
    },
    ExchangeRebate {
        account: AccountId,
        asset: AssetKey,
        amount: Decimal,
    },
    ExchangeTracking {
        code: TrackingCode,
        destination: AssetKey,
        amount: Decimal,
        fee: Decimal,
    },
    VirtualAssetCreated {
        virtual_asset: VirtualAssetId,
        underlying: AssetKey,
        recipient: AccountId,
        amount: Decimal,
    },
    VirtualAssetSettled {
        virtual_asset: VirtualAssetId,
        underlying: AssetKey,
        settled_amount: Decimal,
        holders: usize,
    },
    SynthSuspended {
        asset: AssetKey,
        reason: SuspensionReason,
    },
    LastExchangeRateUpdated {
        asset: AssetKey,
        rate: Decimal,
    },
}

impl ExchangeEvent {
    /// Short event name, matching the serde tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SynthExchange { .. } => "synth_exchange",
            Self::ExchangeEntryAppended { .. } => "exchange_entry_appended",
            Self::ExchangeEntrySettled { .. } => "exchange_entry_settled",
            Self::ExchangeReclaim { .. } => "exchange_reclaim",
            Self::ExchangeRebate { .. } => "exchange_rebate",
            Self::ExchangeTracking { .. } => "exchange_tracking",
            Self::VirtualAssetCreated { .. } => "virtual_asset_created",
            Self::VirtualAssetSettled { .. } => "virtual_asset_settled",
            Self::SynthSuspended { .. } => "synth_suspended",
            Self::LastExchangeRateUpdated { .. } => "last_exchange_rate_updated",
        }
    }
}
