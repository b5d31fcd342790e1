//! Balance ledger seam.
//!
//! The engine never owns balances. It burns and mints through
//! [`SynthLedger`], and reads balances fresh on every operation.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use synthex_types::{AccountId, AssetKey, Result, SynthexError};

/// Per-(account, asset) balance store with mint/burn.
pub trait SynthLedger: Send + Sync {
    fn balance_of(&self, account: &AccountId, asset: &AssetKey) -> Decimal;

    fn total_supply(&self, asset: &AssetKey) -> Decimal;

    /// Destroy `amount` of `account`'s balance.
    ///
    /// # Errors
    /// `InsufficientBalance` if the balance is smaller than `amount`.
    fn burn(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> Result<()>;

    /// Create `amount` in `account`'s balance.
    fn mint(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> Result<()>;
}

fn require_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(SynthexError::InvalidAmount {
            reason: format!("ledger amount must be positive, got {amount}"),
        });
    }
    Ok(())
}

/// In-memory ledger, guarded by a single lock.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<(AccountId, AssetKey), Decimal>>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance outside the engine (issuance, test fixtures).
    pub fn deposit(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) {
        let mut balances = self.balances.write();
        *balances
            .entry((account.clone(), asset.clone()))
            .or_insert(Decimal::ZERO) += amount;
    }
}

impl SynthLedger for InMemoryLedger {
    fn balance_of(&self, account: &AccountId, asset: &AssetKey) -> Decimal {
        self.balances
            .read()
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn total_supply(&self, asset: &AssetKey) -> Decimal {
        self.balances
            .read()
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, balance)| *balance)
            .sum()
    }

    fn burn(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> Result<()> {
        require_positive(amount)?;
        let mut balances = self.balances.write();
        let key = (account.clone(), asset.clone());
        let available = balances.get(&key).copied().unwrap_or(Decimal::ZERO);
        if available < amount {
            return Err(SynthexError::InsufficientBalance {
                account: account.clone(),
                asset: asset.clone(),
                needed: amount,
                available,
            });
        }
        balances.insert(key, available - amount);
        Ok(())
    }

    fn mint(&self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> Result<()> {
        require_positive(amount)?;
        let mut balances = self.balances.write();
        let balance = balances
            .entry((account.clone(), asset.clone()))
            .or_insert(Decimal::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or(SynthexError::ArithmeticOverflow { context: "mint" })?;
        Ok(())
    }
}
