//! # synthex-types
//!
//! Shared types, errors, events, and settings for the **Synthex** exchange
//! and settlement engine.
//!
//! This crate is the leaf dependency of the workspace. Every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`AssetKey`], [`EntryId`], [`VirtualAssetId`], [`RoundId`], [`TrackingCode`]
//! - **Rates**: [`RateSnapshot`], [`RateLeg`]
//! - **Pending exchanges**: [`ExchangeEntry`]
//! - **Events**: [`ExchangeEvent`], [`SuspensionReason`]
//! - **Configuration**: [`ExchangeSettings`], [`AccessConfig`]
//! - **Errors**: [`SynthexError`] with `SX_ERR_` prefix codes
//! - **Constants**: fixed-point precision and setting defaults

pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod event;
pub mod ids;
pub mod rate;

// Re-export all primary types at crate root for ergonomic imports:
//   use synthex_types::{AccountId, AssetKey, ExchangeEntry, SynthexError, ...};

pub use config::*;
pub use entry::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use rate::*;

// Constants are accessed via `synthex_types::constants::FOO`
// (not re-exported to avoid name collisions).
