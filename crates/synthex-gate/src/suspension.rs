//! Suspension registry and the precondition guard built on it.

use std::collections::HashMap;

use parking_lot::RwLock;
use synthex_types::{AssetKey, Result, SuspensionReason, SuspensionScope, SynthexError};

/// System-wide and per-asset suspension flags.
pub trait SuspensionRegistry: Send + Sync {
    fn system_suspension(&self) -> Option<SuspensionReason>;

    fn asset_suspension(&self, asset: &AssetKey) -> Option<SuspensionReason>;

    fn suspend_system(&self, reason: SuspensionReason);

    fn resume_system(&self);

    fn suspend_asset(&self, asset: &AssetKey, reason: SuspensionReason);

    fn resume_asset(&self, asset: &AssetKey);
}

/// Suspension flags held in memory.
#[derive(Debug, Default)]
pub struct InMemorySuspensionRegistry {
    system: RwLock<Option<SuspensionReason>>,
    assets: RwLock<HashMap<AssetKey, SuspensionReason>>,
}

impl InMemorySuspensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SuspensionRegistry for InMemorySuspensionRegistry {
    fn system_suspension(&self) -> Option<SuspensionReason> {
        *self.system.read()
    }

    fn asset_suspension(&self, asset: &AssetKey) -> Option<SuspensionReason> {
        self.assets.read().get(asset).copied()
    }

    fn suspend_system(&self, reason: SuspensionReason) {
        *self.system.write() = Some(reason);
        tracing::warn!(reason = %reason, "System suspended");
    }

    fn resume_system(&self) {
        *self.system.write() = None;
        tracing::info!("System resumed");
    }

    fn suspend_asset(&self, asset: &AssetKey, reason: SuspensionReason) {
        self.assets.write().insert(asset.clone(), reason);
    }

    fn resume_asset(&self, asset: &AssetKey) {
        self.assets.write().remove(asset);
        tracing::info!(asset = %asset, "Asset resumed");
    }
}

/// Read-only precondition checks. Never mutates the registry.
pub struct SuspensionGuard<'a> {
    registry: &'a dyn SuspensionRegistry,
}

impl<'a> SuspensionGuard<'a> {
    #[must_use]
    pub fn new(registry: &'a dyn SuspensionRegistry) -> Self {
        Self { registry }
    }

    /// Fails with a system-scope `Suspended` error.
    pub fn require_system_active(&self) -> Result<()> {
        if self.registry.system_suspension().is_some() {
            return Err(SynthexError::Suspended {
                scope: SuspensionScope::System,
            });
        }
        Ok(())
    }

    /// Fails with an asset-scope `Suspended` error naming `asset`.
    pub fn require_asset_active(&self, asset: &AssetKey) -> Result<()> {
        if self.registry.asset_suspension(asset).is_some() {
            return Err(SynthexError::Suspended {
                scope: SuspensionScope::Asset(asset.clone()),
            });
        }
        Ok(())
    }

    /// System, then source, then destination.
    pub fn require_exchange_allowed(&self, source: &AssetKey, destination: &AssetKey) -> Result<()> {
        self.require_system_active()?;
        self.require_asset_active(source)?;
        self.require_asset_active(destination)
    }
}
