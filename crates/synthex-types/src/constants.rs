//! System-wide constants for the Synthex exchange engine.

/// Fractional digits of the fixed-point representation used for amounts.
pub const PRECISION_DECIMALS: u32 = 18;

/// Default waiting period before an exchange entry may be settled (3 minutes).
pub const DEFAULT_WAITING_PERIOD_SECS: u64 = 180;

/// Default oracle freshness window. Rates older than this are stale.
pub const DEFAULT_RATE_STALE_PERIOD_SECS: u64 = 3_600;

/// Default circuit-breaker factor. A rate that moved 3x (up or down) from
/// its last exchange anchor suspends the asset.
pub const DEFAULT_PRICE_DEVIATION_THRESHOLD_FACTOR: u64 = 3;

/// Default exchange fee rate, in basis points (30 bps = 0.3%).
pub const DEFAULT_EXCHANGE_FEE_RATE_BPS: u32 = 30;

/// Upper bound for a configured fee rate, in basis points.
pub const MAX_EXCHANGE_FEE_RATE_BPS: u32 = 10_000;

/// Prefix of ledger accounts that custody virtual-asset backing.
pub const VIRTUAL_CUSTODY_PREFIX: &str = "vasset:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Synthex";
