//! # synthex-exchanger
//!
//! **Synthetic-asset exchange executor.**
//!
//! [`Exchanger`] is the public surface of the engine. It ties together:
//!
//! - **Authorization**: direct, delegated and router-forwarded exchanges
//! - **Pricing**: oracle rates, 18-decimal truncation, destination-priced fees
//! - **Execution**: force-settle, circuit breaker, atomic burn + mint
//! - **Settlement**: deferred reclaim/rebate through the [`Settler`] seam
//! - **Virtual assets**: transferable proxies that settle on first access
//!   after maturity
//!
//! ```text
//! caller ──► Exchanger ──► AuthorizationGate / SuspensionGuard
//!               │
//!               ├──► Settler (force-settle, commit, append entry)
//!               ├──► RateOracleClient + FeeCalculator
//!               ├──► FeeSink
//!               └──► EventSink  (after all bookkeeping)
//! ```

pub mod exchanger;
pub mod request;

pub use exchanger::Exchanger;
pub use request::{ExchangeReceipt, ExchangeRequest, Tracking};
pub use synthex_settlement::Settler;
