//! Member operations behind the REST surface
//!
//! Each operation receives an authenticated [`Actor`] and resolves its scope
//! fresh from the store. Single-target operations check existence before
//! scope, and every authorization failure happens before any write.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::{
    extract_token_from_header, hash_password, verify_password, Actor, JwtValidator, Role,
    TokenInput,
};
use crate::db::MemberDoc;
use crate::network::guard::PermissionGuard;
use crate::network::input::{LoginRequest, NewMember, PasswordChange, PromoteRequest, UpdateMember};
use crate::network::promotion::PromotionWorkflow;
use crate::network::resolver::{HierarchyResolver, Scope};
use crate::network::stats::{StatisticsAggregator, StatsFilter, StatsReport};
use crate::network::store::{MemberQuery, MemberStore, PageRequest};
use crate::network::view::{
    HierarchyNode, HierarchyView, ListResponse, LoginResponse, MemberDetail, MemberListItem,
    MemberSummary, MemberView, PromotionView, SupervisorSummary,
};
use crate::types::{AliancaError, Result};

#[derive(Clone)]
pub struct NetworkService {
    store: Arc<dyn MemberStore>,
    resolver: HierarchyResolver,
    stats: StatisticsAggregator,
    promotions: PromotionWorkflow,
    jwt: JwtValidator,
}

fn not_found(id: &str) -> AliancaError {
    AliancaError::NotFound(format!("Member {id} not found"))
}

impl NetworkService {
    pub fn new(store: Arc<dyn MemberStore>, jwt: JwtValidator) -> Self {
        Self {
            resolver: HierarchyResolver::new(store.clone()),
            stats: StatisticsAggregator::new(store.clone()),
            promotions: PromotionWorkflow::new(store.clone()),
            store,
            jwt,
        }
    }

    pub fn store(&self) -> &Arc<dyn MemberStore> {
        &self.store
    }

    pub fn resolver(&self) -> &HierarchyResolver {
        &self.resolver
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Exchange credentials for a token
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        request.validate()?;

        let member = self
            .store
            .find_member_by_email(request.email.trim())
            .await?
            .ok_or_else(|| AliancaError::Unauthorized("Invalid credentials".into()))?;

        if !verify_password(&request.password, &member.password_hash)? {
            warn!("Failed login for {}", member.email);
            return Err(AliancaError::Unauthorized("Invalid credentials".into()));
        }

        let token = self.jwt.generate_token(TokenInput {
            user_id: member.id.clone(),
            email: member.email.clone(),
            role: member.role,
        })?;

        info!("Member {} logged in as {}", member.id, member.role);
        Ok(LoginResponse {
            token,
            expires_in: self.jwt.expiry_seconds(),
            member: MemberSummary::from(&member),
        })
    }

    /// Resolve the actor behind an Authorization header
    ///
    /// The stored role wins over the role claim, and deactivated members
    /// lose access immediately.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Actor> {
        let token = extract_token_from_header(authorization)
            .ok_or_else(|| AliancaError::Unauthorized("Missing bearer token".into()))?;
        let claims = self.jwt.verify_token(token).into_claims()?;

        let member = self
            .store
            .find_member(&claims.user_id)
            .await?
            .ok_or_else(|| AliancaError::Unauthorized("Member is no longer active".into()))?;

        if member.role != claims.role {
            debug!(
                "Token role {} of {} superseded by stored role {}",
                claims.role, member.id, member.role
            );
        }
        Ok(Actor::new(member.id, member.role))
    }

    /// The actor's own profile
    pub async fn me(&self, actor: &Actor) -> Result<MemberDetail> {
        let member = self
            .store
            .find_member(&actor.id)
            .await?
            .ok_or_else(|| not_found(&actor.id))?;
        self.detail(member).await
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Listing filtered by the actor's scope rather than denied
    pub async fn list(
        &self,
        actor: &Actor,
        mut query: MemberQuery,
        page: PageRequest,
    ) -> Result<ListResponse<MemberListItem>> {
        let scope = self.resolver.resolve_scope(actor).await?;
        query.ids = scope.restriction();

        let page = self.store.list_members(&query, page).await?;
        let ids: Vec<String> = page.items.iter().map(|m| m.id.clone()).collect();
        let counts = self.store.count_active_children(&ids).await?;

        Ok(ListResponse::from_page(page, |member| MemberListItem {
            disciple_count: counts.get(&member.id).copied().unwrap_or(0),
            member: MemberView::from(&member),
        }))
    }

    pub async fn get(&self, actor: &Actor, id: &str) -> Result<MemberDetail> {
        let (target, _) = self.authorized_target(actor, id).await?;
        self.detail(target).await
    }

    pub async fn create(&self, actor: &Actor, input: NewMember) -> Result<MemberView> {
        if !actor.role.can_create_members() {
            warn!("{} ({}) may not register members", actor.id, actor.role);
            return Err(AliancaError::Forbidden(
                "Your role cannot register members".into(),
            ));
        }

        let mut valid = input.validate()?;
        if !actor.role.can_promote_to(valid.role) {
            return Err(AliancaError::Forbidden(format!(
                "Role {} cannot register members as {}",
                actor.role, valid.role
            )));
        }

        let supervisor_id = match valid.profile.supervisor_id.take() {
            Some(supervisor_id) if supervisor_id != actor.id => {
                let scope = self.resolver.resolve_scope(actor).await?;
                self.check_supervisor(actor, &scope, &supervisor_id).await?;
                supervisor_id
            }
            _ => actor.id.clone(),
        };

        if self.store.find_member_by_email(&valid.email).await?.is_some() {
            return Err(AliancaError::Conflict(format!(
                "Email {} is already registered",
                valid.email
            )));
        }

        let password_hash = hash_password(&valid.password)?;
        let mut member = MemberDoc::new(valid.name, valid.email, password_hash, valid.role)
            .with_supervisor(supervisor_id);
        valid.profile.apply_to(&mut member);

        let created = self.store.insert_member(member).await?;
        info!(
            "Member {} registered as {} under {} by {}",
            created.id,
            created.role,
            created.supervisor_id.as_deref().unwrap_or("-"),
            actor.id
        );
        Ok(MemberView::from(&created))
    }

    pub async fn update(&self, actor: &Actor, id: &str, input: UpdateMember) -> Result<MemberView> {
        let mut changes = input.validate()?;
        let (target, scope) = self.authorized_target(actor, id).await?;

        if changes.supervisor_id == target.supervisor_id {
            changes.supervisor_id = None;
        }

        if let Some(ref supervisor_id) = changes.supervisor_id {
            if actor.role == Role::Disciple {
                return Err(AliancaError::Forbidden(
                    "Your role cannot change supervisors".into(),
                ));
            }
            if *supervisor_id == target.id {
                return Err(AliancaError::invalid(
                    "supervisor_id",
                    "A member cannot supervise itself",
                ));
            }
            self.check_supervisor(actor, &scope, supervisor_id).await?;

            if self.resolver.is_above(&target.id, supervisor_id).await? {
                return Err(AliancaError::invalid(
                    "supervisor_id",
                    "Supervisor cannot be one of the member's own disciples",
                ));
            }
        }

        if changes.is_empty() {
            return Ok(MemberView::from(&target));
        }

        let updated = self.store.update_profile(&target.id, &changes).await?;
        debug!("Member {} updated by {}", updated.id, actor.id);
        Ok(MemberView::from(&updated))
    }

    pub async fn promote(
        &self,
        actor: &Actor,
        id: &str,
        request: PromoteRequest,
    ) -> Result<MemberView> {
        request.validate()?;
        let promoted = self
            .promotions
            .promote(actor, id, request.new_role, request.reason)
            .await?;
        Ok(MemberView::from(&promoted))
    }

    /// Soft delete; the member's subtree drops out of every scope
    pub async fn deactivate(&self, actor: &Actor, id: &str) -> Result<()> {
        let (target, _) = self.authorized_target(actor, id).await?;

        if !self.store.deactivate_member(&target.id).await? {
            return Err(not_found(id));
        }
        info!("Member {} deactivated by {}", target.id, actor.id);
        Ok(())
    }

    /// Own password with the current one, or any password as admin
    pub async fn change_password(
        &self,
        actor: &Actor,
        id: &str,
        change: PasswordChange,
    ) -> Result<()> {
        let is_self = actor.id == id;
        if !is_self && actor.role != Role::Admin {
            warn!("{} ({}) may not change the password of {}", actor.id, actor.role, id);
            return Err(AliancaError::Forbidden(
                "You cannot change this member's password".into(),
            ));
        }
        change.validate()?;

        let target = self.store.find_member(id).await?.ok_or_else(|| not_found(id))?;

        if is_self {
            let current = change.current_password.as_deref().unwrap_or_default();
            if current.is_empty() {
                return Err(AliancaError::invalid(
                    "current_password",
                    "Current password is required",
                ));
            }
            if !verify_password(current, &target.password_hash)? {
                return Err(AliancaError::Unauthorized(
                    "Current password is incorrect".into(),
                ));
            }
        }

        let password_hash = hash_password(&change.new_password)?;
        self.store.set_password_hash(&target.id, &password_hash).await?;
        info!("Password of {} changed by {}", target.id, actor.id);
        Ok(())
    }

    pub async fn promotion_history(&self, actor: &Actor, id: &str) -> Result<Vec<PromotionView>> {
        let (target, _) = self.authorized_target(actor, id).await?;
        let records = self.store.promotion_history(&target.id).await?;
        Ok(records.into_iter().map(PromotionView::from).collect())
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    pub async fn dashboard(&self, actor: &Actor, filter: StatsFilter) -> Result<StatsReport> {
        let scope = self.resolver.resolve_scope(actor).await?;
        self.stats.aggregate(actor, &scope, &filter).await
    }

    /// The actor and its direct reports with the size of each one's network
    pub async fn hierarchy(&self, actor: &Actor) -> Result<HierarchyView> {
        let member = self
            .store
            .find_member(&actor.id)
            .await?
            .ok_or_else(|| not_found(&actor.id))?;

        let children = self.store.active_children(&member.id).await?;
        let ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        let direct = self.store.count_active_children(&ids).await?;

        let mut direct_reports = Vec::with_capacity(children.len());
        for child in &children {
            let network = self.resolver.network(&child.id).await?;
            direct_reports.push(HierarchyNode {
                member: MemberSummary::from(child),
                direct_disciples: direct.get(&child.id).copied().unwrap_or(0),
                total_disciples: network.len().saturating_sub(1) as u64,
            });
        }

        Ok(HierarchyView {
            member: MemberSummary::from(&member),
            direct_reports,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Load an active target and check it against the actor's scope
    async fn authorized_target(&self, actor: &Actor, id: &str) -> Result<(MemberDoc, Scope)> {
        let target = self.store.find_member(id).await?.ok_or_else(|| not_found(id))?;
        let scope = self.resolver.resolve_scope(actor).await?;
        PermissionGuard::authorize(actor, &scope, &target.id)?;
        Ok((target, scope))
    }

    /// A supervisor must be an active member the actor can reach
    async fn check_supervisor(&self, actor: &Actor, scope: &Scope, supervisor_id: &str) -> Result<()> {
        if self.store.find_member(supervisor_id).await?.is_none() {
            return Err(AliancaError::invalid(
                "supervisor_id",
                "Supervisor not found",
            ));
        }
        PermissionGuard::authorize(actor, scope, supervisor_id)
    }

    async fn detail(&self, member: MemberDoc) -> Result<MemberDetail> {
        let supervisor = match member.supervisor_id {
            Some(ref supervisor_id) => self
                .store
                .find_member(supervisor_id)
                .await?
                .map(|s| SupervisorSummary::from(&s)),
            None => None,
        };
        let disciples = self
            .store
            .active_children(&member.id)
            .await?
            .iter()
            .map(MemberSummary::from)
            .collect();

        Ok(MemberDetail {
            member: MemberView::from(&member),
            supervisor,
            disciples,
        })
    }
}
