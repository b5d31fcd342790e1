//! # synthex-pricing
//!
//! **Pure pricing arithmetic for Synthex.**
//!
//! Everything in this crate is a function of its inputs:
//!
//! - **Zero side effects**: no ledger access, no oracle reads, no clock
//! - **Fixed point**: 18 fractional digits, truncated toward zero
//! - **Checked**: overflow surfaces as `SX_ERR_404`, never a panic
//! - **Auditable**: settlement roots hash processed entries in order

pub mod circuit_breaker;
pub mod determinism;
pub mod drift;
pub mod fees;
pub mod fixed_point;

pub use circuit_breaker::is_deviation_above_threshold;
pub use determinism::{compute_settlement_root, settlement_root_hex};
pub use drift::{EntryAdjustment, entry_adjustment, net_adjustment};
pub use fees::{FeeCalculator, FeeQuote};
pub use fixed_point::{div_trunc, effective_value, mul_trunc};
