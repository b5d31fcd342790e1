//! Error types for the Synthex exchange engine.
//!
//! All errors use the `SX_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Authorization errors
//! - 2xx: Suspension errors
//! - 3xx: Rate / oracle errors
//! - 4xx: Amount, fee and balance errors
//! - 5xx: Settlement errors
//! - 6xx: Virtual asset errors
//! - 9xx: General / internal errors

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AccountId, AssetKey, RateLeg, VirtualAssetId};

/// Which switch of the suspension registry blocked an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuspensionScope {
    /// The whole system is suspended.
    System,
    /// A single asset is suspended.
    Asset(AssetKey),
}

impl fmt::Display for SuspensionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Asset(key) => write!(f, "asset {key}"),
        }
    }
}

/// Central error enum for all Synthex operations.
#[derive(Debug, Clone, Error)]
pub enum SynthexError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// The caller may not act for the given account.
    #[error("SX_ERR_100: Caller {caller} is not authorized to act for {account}")]
    Unauthorized { caller: AccountId, account: AccountId },

    /// The caller is not a registered operator.
    #[error("SX_ERR_101: Caller {caller} is not an operator")]
    NotOperator { caller: AccountId },

    // =================================================================
    // Suspension Errors (2xx)
    // =================================================================
    /// The system or an asset is suspended.
    #[error("SX_ERR_200: Operation blocked, {scope} is suspended")]
    Suspended { scope: SuspensionScope },

    // =================================================================
    // Rate Errors (3xx)
    // =================================================================
    /// A leg's rate is missing, stale, or non-positive.
    #[error("SX_ERR_300: {leg} rate invalid or not found for {asset}")]
    RateInvalid { leg: RateLeg, asset: AssetKey },

    /// A leg's rate moved beyond the deviation threshold from its anchor.
    #[error("SX_ERR_301: Circuit breaker tripped for {asset}: rate {rate} vs last {last_rate}")]
    CircuitBroken {
        asset: AssetKey,
        rate: Decimal,
        last_rate: Decimal,
    },

    /// A suspension-for-invalid-rate was requested but the rate is healthy.
    #[error("SX_ERR_302: Rate for {asset} is valid")]
    RateStillValid { asset: AssetKey },

    // =================================================================
    // Amount / Fee / Balance Errors (4xx)
    // =================================================================
    /// The exchange fee would consume the entire gross amount.
    #[error("SX_ERR_400: Fee {fee} exceeds gross amount {gross}")]
    FeeExceedsAmount { fee: Decimal, gross: Decimal },

    /// Not enough balance to burn.
    #[error("SX_ERR_401: Insufficient balance of {asset} for {account}: need {needed}, have {available}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetKey,
        needed: Decimal,
        available: Decimal,
    },

    /// Amount or rate argument is out of range.
    #[error("SX_ERR_402: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Source and destination are the same asset.
    #[error("SX_ERR_403: Cannot exchange {0} for itself")]
    SameAsset(AssetKey),

    /// Fixed-point arithmetic overflowed.
    #[error("SX_ERR_404: Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    // =================================================================
    // Settlement Errors (5xx)
    // =================================================================
    /// The waiting period has not elapsed yet. Retry after `secs_left`.
    #[error("SX_ERR_500: Waiting period not elapsed, {secs_left}s left")]
    WaitingPeriodNotElapsed { secs_left: u64 },

    /// Supply accounting does not reconcile. Critical safety alert.
    #[error("SX_ERR_501: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Virtual Asset Errors (6xx)
    // =================================================================
    /// No virtual asset with this id exists.
    #[error("SX_ERR_600: Virtual asset not found: {0}")]
    VirtualAssetNotFound(VirtualAssetId),

    /// The virtual asset has already been settled and its supply burned.
    #[error("SX_ERR_601: Virtual asset already settled: {0}")]
    VirtualAssetSettled(VirtualAssetId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SX_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SX_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid settings, missing fields, etc.).
    #[error("SX_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl SynthexError {
    /// Numeric code embedded in the message prefix.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 100,
            Self::NotOperator { .. } => 101,
            Self::Suspended { .. } => 200,
            Self::RateInvalid { .. } => 300,
            Self::CircuitBroken { .. } => 301,
            Self::RateStillValid { .. } => 302,
            Self::FeeExceedsAmount { .. } => 400,
            Self::InsufficientBalance { .. } => 401,
            Self::InvalidAmount { .. } => 402,
            Self::SameAsset(_) => 403,
            Self::ArithmeticOverflow { .. } => 404,
            Self::WaitingPeriodNotElapsed { .. } => 500,
            Self::SupplyInvariantViolation { .. } => 501,
            Self::VirtualAssetNotFound(_) => 600,
            Self::VirtualAssetSettled(_) => 601,
            Self::Internal(_) => 900,
            Self::Serialization(_) => 901,
            Self::Configuration(_) => 902,
        }
    }

    /// Whether retrying the same call later may succeed without any
    /// administrative intervention.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::WaitingPeriodNotElapsed { .. }
                | Self::InsufficientBalance { .. }
                | Self::RateInvalid { .. }
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SynthexError>;

impl From<serde_json::Error> for SynthexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
