//! Single-target authorization

use tracing::warn;

use crate::auth::{Actor, ScopeStrategy};
use crate::network::resolver::Scope;
use crate::types::{AliancaError, Result};

/// Decides whether an actor may act on one specific member
pub struct PermissionGuard;

impl PermissionGuard {
    /// Allow or deny access to `target_id` given the actor's resolved scope
    pub fn authorize(actor: &Actor, scope: &Scope, target_id: &str) -> Result<()> {
        if Self::allows(actor, scope, target_id) {
            return Ok(());
        }

        warn!(
            "Denied {} ({}) access to member {}",
            actor.id, actor.role, target_id
        );
        Err(AliancaError::Forbidden(
            "Member is outside your network".into(),
        ))
    }

    pub fn allows(actor: &Actor, scope: &Scope, target_id: &str) -> bool {
        match actor.role.scope_strategy() {
            ScopeStrategy::Global => true,
            ScopeStrategy::Network | ScopeStrategy::Cell => scope.contains(target_id),
            ScopeStrategy::SelfOnly => actor.id == target_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use std::collections::HashSet;

    fn scope(strategy: ScopeStrategy, ids: &[&str]) -> Scope {
        Scope::new(strategy, ids.iter().map(|s| s.to_string()).collect::<HashSet<_>>())
    }

    #[test]
    fn test_admin_always_allowed() {
        let admin = Actor::new("adm", Role::Admin);
        let s = scope(ScopeStrategy::Global, &["adm"]);
        assert!(PermissionGuard::authorize(&admin, &s, "anyone").is_ok());
    }

    #[test]
    fn test_scope_membership_decides_for_middle_roles() {
        for (role, strategy) in [
            (Role::Pastor, ScopeStrategy::Network),
            (Role::Leader, ScopeStrategy::Cell),
        ] {
            let actor = Actor::new("a", role);
            let s = scope(strategy, &["a", "b"]);
            assert!(PermissionGuard::authorize(&actor, &s, "b").is_ok());
            let err = PermissionGuard::authorize(&actor, &s, "c").unwrap_err();
            assert!(matches!(err, AliancaError::Forbidden(_)));
        }
    }

    #[test]
    fn test_disciple_only_self() {
        let actor = Actor::new("d", Role::Disciple);
        let s = scope(ScopeStrategy::SelfOnly, &["d"]);
        assert!(PermissionGuard::allows(&actor, &s, "d"));
        assert!(!PermissionGuard::allows(&actor, &s, "x"));
    }
}
