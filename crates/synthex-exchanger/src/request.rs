//! Inputs and outputs of the public exchange operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_types::{AccountId, AssetKey, EntryId, TrackingCode, VirtualAssetId};

/// Convert `amount` of `source` into `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub source: AssetKey,
    pub amount: Decimal,
    pub destination: AssetKey,
}

impl ExchangeRequest {
    #[must_use]
    pub fn new(source: impl Into<String>, amount: Decimal, destination: impl Into<String>) -> Self {
        Self {
            source: AssetKey::new(source),
            amount,
            destination: AssetKey::new(destination),
        }
    }
}

/// Integrator attribution for tracked exchanges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub code: TrackingCode,
    /// Credited with the exchange fee in the fee sink's reward tally.
    pub reward_recipient: AccountId,
}

impl Tracking {
    #[must_use]
    pub fn new(code: impl Into<String>, reward_recipient: impl Into<String>) -> Self {
        Self {
            code: TrackingCode::new(code),
            reward_recipient: AccountId::new(reward_recipient),
        }
    }
}

/// Result of a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    /// Destination amount credited, after fee.
    pub net_amount: Decimal,
    pub fee: Decimal,
    pub gross_amount: Decimal,
    pub fee_rate: Decimal,
    pub entry_id: EntryId,
    /// Set for virtual exchanges only.
    pub virtual_asset: Option<VirtualAssetId>,
}

/// Where the net destination amount goes.
#[derive(Debug, Clone)]
pub(crate) enum Credit {
    Direct,
    Virtual { recipient: AccountId },
}
