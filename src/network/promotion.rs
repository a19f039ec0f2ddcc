//! Role changes and their audit trail

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{Actor, Role};
use crate::db::{MemberDoc, PromotionRecordDoc};
use crate::network::guard::PermissionGuard;
use crate::network::resolver::HierarchyResolver;
use crate::network::store::MemberStore;
use crate::types::{AliancaError, Result};

/// Changes a member's role and records who did it
#[derive(Clone)]
pub struct PromotionWorkflow {
    store: Arc<dyn MemberStore>,
    resolver: HierarchyResolver,
}

impl PromotionWorkflow {
    pub fn new(store: Arc<dyn MemberStore>) -> Self {
        let resolver = HierarchyResolver::new(store.clone());
        Self { store, resolver }
    }

    /// Set `target_id`'s role to `new_role`
    ///
    /// The role matrix is checked first and independently of scope. The
    /// role update and its history record are written atomically.
    pub async fn promote(
        &self,
        actor: &Actor,
        target_id: &str,
        new_role: Role,
        reason: Option<String>,
    ) -> Result<MemberDoc> {
        if !actor.role.can_promote_to(new_role) {
            warn!(
                "{} ({}) may not assign role {}",
                actor.id, actor.role, new_role
            );
            return Err(AliancaError::Forbidden(format!(
                "Role {} cannot assign role {}",
                actor.role, new_role
            )));
        }

        let target = self
            .store
            .find_member(target_id)
            .await?
            .ok_or_else(|| AliancaError::NotFound(format!("Member {target_id} not found")))?;

        let scope = self.resolver.resolve_scope(actor).await?;
        PermissionGuard::authorize(actor, &scope, &target.id)?;

        let record = PromotionRecordDoc::new(
            target.id.clone(),
            target.role,
            new_role,
            actor.id.clone(),
            reason,
        );
        let promoted = self.store.apply_promotion(&target.id, new_role, record).await?;

        info!(
            "Member {} promoted to {} by {}",
            promoted.id, new_role, actor.id
        );
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::memory::InMemoryMemberStore;

    async fn seed(store: &InMemoryMemberStore, role: Role, supervisor: Option<&str>) -> MemberDoc {
        let n = store.stored_count().await;
        let mut member = MemberDoc::new(
            format!("member{n}"),
            format!("member{n}@alianca.com"),
            "h".into(),
            role,
        );
        member.supervisor_id = supervisor.map(str::to_string);
        store.insert_member(member).await.unwrap()
    }

    #[tokio::test]
    async fn test_promotion_writes_one_record() {
        let store = Arc::new(InMemoryMemberStore::new());
        let pastor = seed(&store, Role::Pastor, None).await;
        let disciple = seed(&store, Role::Disciple, Some(&pastor.id)).await;

        let workflow = PromotionWorkflow::new(store.clone());
        let actor = Actor::new(&pastor.id, Role::Pastor);
        let promoted = workflow
            .promote(&actor, &disciple.id, Role::Leader, None)
            .await
            .unwrap();

        assert_eq!(promoted.role, Role::Leader);
        let history = store.promotion_history(&disciple.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_role, Role::Disciple);
        assert_eq!(history[0].new_role, Role::Leader);
        assert_eq!(history[0].changed_by, pastor.id);
        assert_eq!(history[0].reason, "Promoted to DISCIPULADOR");
    }

    #[tokio::test]
    async fn test_matrix_denial_ignores_scope() {
        let store = Arc::new(InMemoryMemberStore::new());
        let leader = seed(&store, Role::Leader, None).await;
        let disciple = seed(&store, Role::Disciple, Some(&leader.id)).await;

        let workflow = PromotionWorkflow::new(store.clone());
        let actor = Actor::new(&leader.id, Role::Leader);
        let err = workflow
            .promote(&actor, &disciple.id, Role::Pastor, Some("why not".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, AliancaError::Forbidden(_)));
        let unchanged = store.find_member(&disciple.id).await.unwrap().unwrap();
        assert_eq!(unchanged.role, Role::Disciple);
        assert!(store.promotion_history(&disciple.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_scope_target_denied() {
        let store = Arc::new(InMemoryMemberStore::new());
        let pastor = seed(&store, Role::Pastor, None).await;
        let stranger = seed(&store, Role::Disciple, None).await;

        let workflow = PromotionWorkflow::new(store.clone());
        let err = workflow
            .promote(&Actor::new(&pastor.id, Role::Pastor), &stranger.id, Role::Leader, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AliancaError::Forbidden(_)));
        assert!(store.promotion_history(&stranger.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_target_is_not_found() {
        let store = Arc::new(InMemoryMemberStore::new());
        let admin = seed(&store, Role::Admin, None).await;

        let workflow = PromotionWorkflow::new(store.clone());
        let err = workflow
            .promote(&Actor::new(&admin.id, Role::Admin), "nobody", Role::Leader, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AliancaError::NotFound(_)));
    }
}
