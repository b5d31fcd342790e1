//! Caller authorization.
//!
//! Three kinds of caller may move an account's balance: the account itself,
//! a delegate the account approved, or a configured router that forwards on
//! behalf of end users. Administrative calls need an operator.

use std::collections::HashSet;

use parking_lot::RwLock;
use synthex_types::{AccessConfig, AccountId, Result, SynthexError};

/// Records which delegates an account has approved for exchanges.
pub trait DelegationRegistry: Send + Sync {
    fn can_exchange_for(&self, authoriser: &AccountId, delegate: &AccountId) -> bool;
}

/// Delegation registry held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDelegations {
    approvals: RwLock<HashSet<(AccountId, AccountId)>>,
}

impl InMemoryDelegations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `delegate` exchange on behalf of `authoriser`.
    pub fn approve(&self, authoriser: &AccountId, delegate: &AccountId) {
        self.approvals
            .write()
            .insert((authoriser.clone(), delegate.clone()));
    }

    /// Withdraw an approval. Unknown pairs are ignored.
    pub fn revoke(&self, authoriser: &AccountId, delegate: &AccountId) {
        self.approvals
            .write()
            .remove(&(authoriser.clone(), delegate.clone()));
    }
}

impl DelegationRegistry for InMemoryDelegations {
    fn can_exchange_for(&self, authoriser: &AccountId, delegate: &AccountId) -> bool {
        self.approvals
            .read()
            .contains(&(authoriser.clone(), delegate.clone()))
    }
}

/// Pure caller checks against the access config and delegation registry.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGate {
    access: AccessConfig,
}

impl AuthorizationGate {
    #[must_use]
    pub fn new(access: AccessConfig) -> Self {
        Self { access }
    }

    /// True for configured router accounts.
    #[must_use]
    pub fn is_router(&self, caller: &AccountId) -> bool {
        self.access.routers.contains(caller)
    }

    /// True for configured operator accounts.
    #[must_use]
    pub fn is_operator(&self, caller: &AccountId) -> bool {
        self.access.operators.contains(caller)
    }

    /// `caller` acts for `account` directly.
    pub fn authorize_direct(&self, caller: &AccountId, account: &AccountId) -> Result<()> {
        if caller == account || self.is_router(caller) {
            return Ok(());
        }
        tracing::warn!(caller = %caller, account = %account, "Direct exchange rejected");
        Err(SynthexError::Unauthorized {
            caller: caller.clone(),
            account: account.clone(),
        })
    }

    /// `caller` forwards an exchange by `delegate` for `exchange_for`.
    pub fn authorize_on_behalf(
        &self,
        delegations: &dyn DelegationRegistry,
        caller: &AccountId,
        delegate: &AccountId,
        exchange_for: &AccountId,
    ) -> Result<()> {
        let caller_ok = caller == delegate || self.is_router(caller);
        if caller_ok && delegations.can_exchange_for(exchange_for, delegate) {
            return Ok(());
        }
        tracing::warn!(
            caller = %caller,
            delegate = %delegate,
            account = %exchange_for,
            "On-behalf exchange rejected"
        );
        Err(SynthexError::Unauthorized {
            caller: caller.clone(),
            account: exchange_for.clone(),
        })
    }

    /// Admin operations are limited to operators.
    pub fn require_operator(&self, caller: &AccountId) -> Result<()> {
        if self.is_operator(caller) {
            Ok(())
        } else {
            Err(SynthexError::NotOperator {
                caller: caller.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AccountId {
        AccountId::new(s)
    }

    fn gate() -> AuthorizationGate {
        AuthorizationGate::new(
            AccessConfig::default()
                .with_router("router")
                .with_operator("ops"),
        )
    }

    #[test]
    fn self_and_router_may_exchange() {
        let gate = gate();
        gate.authorize_direct(&id("alice"), &id("alice")).unwrap();
        gate.authorize_direct(&id("router"), &id("alice")).unwrap();
        assert!(matches!(
            gate.authorize_direct(&id("mallory"), &id("alice")),
            Err(SynthexError::Unauthorized { .. })
        ));
    }

    #[test]
    fn on_behalf_requires_approval() {
        let gate = gate();
        let delegations = InMemoryDelegations::new();
        assert!(
            gate.authorize_on_behalf(&delegations, &id("bob"), &id("bob"), &id("alice"))
                .is_err()
        );

        delegations.approve(&id("alice"), &id("bob"));
        gate.authorize_on_behalf(&delegations, &id("bob"), &id("bob"), &id("alice"))
            .unwrap();
        gate.authorize_on_behalf(&delegations, &id("router"), &id("bob"), &id("alice"))
            .unwrap();

        delegations.revoke(&id("alice"), &id("bob"));
        assert!(
            gate.authorize_on_behalf(&delegations, &id("bob"), &id("bob"), &id("alice"))
                .is_err()
        );
    }

    #[test]
    fn caller_cannot_impersonate_delegate() {
        let gate = gate();
        let delegations = InMemoryDelegations::new();
        delegations.approve(&id("alice"), &id("bob"));
        assert!(
            gate.authorize_on_behalf(&delegations, &id("mallory"), &id("bob"), &id("alice"))
                .is_err()
        );
    }

    #[test]
    fn operator_check() {
        let gate = gate();
        gate.require_operator(&id("ops")).unwrap();
        assert!(matches!(
            gate.require_operator(&id("router")),
            Err(SynthexError::NotOperator { .. })
        ));
    }
}
