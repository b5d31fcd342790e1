//! All-or-nothing ledger batches.
//!
//! A [`LedgerBatch`] collects the burns and mints of one operation. On
//! commit the ops are applied in order; if one fails, the already-applied
//! prefix is reverted in reverse order, so the ledger is left as it was.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use synthex_gate::SynthLedger;
use synthex_types::{AccountId, AssetKey, Result, SynthexError};

/// One ledger mutation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    Burn {
        account: AccountId,
        asset: AssetKey,
        amount: Decimal,
    },
    Mint {
        account: AccountId,
        asset: AssetKey,
        amount: Decimal,
    },
}

impl LedgerOp {
    fn apply(&self, ledger: &dyn SynthLedger) -> Result<()> {
        match self {
            Self::Burn {
                account,
                asset,
                amount,
            } => ledger.burn(account, asset, *amount),
            Self::Mint {
                account,
                asset,
                amount,
            } => ledger.mint(account, asset, *amount),
        }
    }

    /// The op that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self.clone() {
            Self::Burn {
                account,
                asset,
                amount,
            } => Self::Mint {
                account,
                asset,
                amount,
            },
            Self::Mint {
                account,
                asset,
                amount,
            } => Self::Burn {
                account,
                asset,
                amount,
            },
        }
    }

    #[must_use]
    pub fn asset(&self) -> &AssetKey {
        match self {
            Self::Burn { asset, .. } | Self::Mint { asset, .. } => asset,
        }
    }
}

/// Ordered burns and mints committed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBatch {
    ops: Vec<LedgerOp>,
}

impl LedgerBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a burn. Zero amounts are dropped.
    pub fn burn(&mut self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> &mut Self {
        if !amount.is_zero() {
            self.ops.push(LedgerOp::Burn {
                account: account.clone(),
                asset: asset.clone(),
                amount,
            });
        }
        self
    }

    /// Queue a mint. Zero amounts are dropped.
    pub fn mint(&mut self, account: &AccountId, asset: &AssetKey, amount: Decimal) -> &mut Self {
        if !amount.is_zero() {
            self.ops.push(LedgerOp::Mint {
                account: account.clone(),
                asset: asset.clone(),
                amount,
            });
        }
        self
    }

    /// Operations in commit order.
    #[must_use]
    pub fn ops(&self) -> &[LedgerOp] {
        &self.ops
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Batch that undoes this one once committed.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            ops: self.ops.iter().rev().map(LedgerOp::inverse).collect(),
        }
    }

    /// Apply every op, or none.
    ///
    /// # Errors
    /// The first failing op's error. If reverting the applied prefix also
    /// fails, the ledger is inconsistent and `Internal` is returned.
    pub fn commit(&self, ledger: &dyn SynthLedger) -> Result<()> {
        for (applied, op) in self.ops.iter().enumerate() {
            if let Err(err) = op.apply(ledger) {
                tracing::warn!(
                    failed_op = applied,
                    total_ops = self.ops.len(),
                    error = %err,
                    "Ledger batch failed, reverting"
                );
                Self::revert(&self.ops[..applied], ledger)?;
                return Err(err);
            }
        }
        Ok(())
    }

    fn revert(applied: &[LedgerOp], ledger: &dyn SynthLedger) -> Result<()> {
        for op in applied.iter().rev() {
            if let Err(err) = op.inverse().apply(ledger) {
                tracing::error!(op = ?op, error = %err, "Ledger batch revert failed");
                return Err(SynthexError::Internal(format!(
                    "ledger revert failed for {op:?}: {err}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use synthex_gate::InMemoryLedger;

    fn id(s: &str) -> AccountId {
        AccountId::new(s)
    }

    fn key(s: &str) -> AssetKey {
        AssetKey::new(s)
    }

    #[test]
    fn commit_applies_in_order() {
        let ledger = InMemoryLedger::new();
        ledger.deposit(&id("alice"), &key("sUSD"), dec!(100));
        let mut batch = LedgerBatch::new();
        batch
            .burn(&id("alice"), &key("sUSD"), dec!(100))
            .mint(&id("alice"), &key("sETH"), dec!(49.85));
        batch.commit(&ledger).unwrap();
        assert_eq!(ledger.balance_of(&id("alice"), &key("sUSD")), Decimal::ZERO);
        assert_eq!(ledger.balance_of(&id("alice"), &key("sETH")), dec!(49.85));
    }

    #[test]
    fn failure_reverts_applied_prefix() {
        let ledger = InMemoryLedger::new();
        ledger.deposit(&id("alice"), &key("sUSD"), dec!(100));
        let mut batch = LedgerBatch::new();
        batch
            .mint(&id("alice"), &key("sETH"), dec!(10))
            .burn(&id("alice"), &key("sUSD"), dec!(50))
            .burn(&id("alice"), &key("sUSD"), dec!(60));

        let err = batch.commit(&ledger).unwrap_err();
        assert!(matches!(err, SynthexError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(&id("alice"), &key("sUSD")), dec!(100));
        assert_eq!(ledger.balance_of(&id("alice"), &key("sETH")), Decimal::ZERO);
    }

    #[test]
    fn zero_amounts_are_dropped() {
        let mut batch = LedgerBatch::new();
        batch
            .burn(&id("a"), &key("sUSD"), Decimal::ZERO)
            .mint(&id("a"), &key("sUSD"), Decimal::ZERO);
        assert!(batch.is_empty());
    }

    #[test]
    fn inverse_swaps_direction() {
        let op = LedgerOp::Burn {
            account: id("a"),
            asset: key("sUSD"),
            amount: dec!(1),
        };
        assert!(matches!(op.inverse(), LedgerOp::Mint { .. }));
        assert_eq!(op.inverse().inverse(), op);
    }

    #[test]
    fn batch_inverse_restores_ledger() {
        let ledger = InMemoryLedger::new();
        ledger.deposit(&id("alice"), &key("sUSD"), dec!(100));
        let mut batch = LedgerBatch::new();
        batch
            .burn(&id("alice"), &key("sUSD"), dec!(100))
            .mint(&id("alice"), &key("sETH"), dec!(49.85));
        batch.commit(&ledger).unwrap();
        batch.inverse().commit(&ledger).unwrap();
        assert_eq!(ledger.balance_of(&id("alice"), &key("sUSD")), dec!(100));
        assert_eq!(ledger.balance_of(&id("alice"), &key("sETH")), Decimal::ZERO);
    }
}
