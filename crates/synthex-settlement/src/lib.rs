//! # synthex-settlement
//!
//! **Deferred settlement for Synthex exchanges.**
//!
//! An exchange credits its destination immediately but stays provisional
//! for a waiting period. This crate owns that provisional state and
//! finalises it:
//!
//! 1. **PendingExchangeLedger**: unsettled entries per (account, asset)
//! 2. **SettlementEngine**: nets destination-rate drift into one reclaim or
//!    rebate and removes the entries, exactly once
//! 3. **VirtualAssetFactory**: transferable proxies over a pending credit,
//!    converted pro rata when they settle
//! 4. **LedgerBatch**: all-or-nothing burns and mints
//! 5. **SupplyConservation**: every engine mint and burn, per asset
//!
//! The exchange executor talks to settlement only through the [`Settler`]
//! trait, so it never depends on the concrete engine.

pub mod engine;
pub mod journal;
pub mod pending_ledger;
pub mod supply_conservation;
pub mod virtual_asset;

pub use engine::{SettleMode, SettlementEngine, SettlementOutcome, Settler};
pub use journal::{LedgerBatch, LedgerOp};
pub use pending_ledger::{EligibleEntries, PendingExchangeLedger};
pub use supply_conservation::SupplyConservation;
pub use virtual_asset::{
    TransferOutcome, VirtualAsset, VirtualAssetFactory, VirtualContext, VirtualSettlement,
};
