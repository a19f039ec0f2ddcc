//! In-memory member store
//!
//! Backs dev mode when MongoDB is unreachable, and the test suite. A single
//! `RwLock` guards members and history together, so a promotion's two
//! writes are observed as one.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::Role;
use crate::db::{MemberDoc, PromotionRecordDoc};
use crate::network::store::{MemberQuery, MemberStore, Page, PageRequest, ProfileChanges};
use crate::types::{AliancaError, Result};

#[derive(Default)]
struct MemoryState {
    members: HashMap<String, MemberDoc>,
    history: Vec<PromotionRecordDoc>,
}

impl MemoryState {
    fn active(&self, id: &str) -> Option<&MemberDoc> {
        self.members.get(id).filter(|m| m.is_active())
    }

    fn active_mut(&mut self, id: &str) -> Option<&mut MemberDoc> {
        self.members.get_mut(id).filter(|m| m.is_active())
    }

    fn email_taken(&self, email: &str, except_id: Option<&str>) -> bool {
        self.members
            .values()
            .any(|m| m.email.eq_ignore_ascii_case(email) && Some(m.id.as_str()) != except_id)
    }
}

/// Member store held entirely in process memory
#[derive(Default)]
pub struct InMemoryMemberStore {
    state: RwLock<MemoryState>,
}

impl InMemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents, including soft-deleted ones
    pub async fn stored_count(&self) -> usize {
        self.state.read().await.members.len()
    }

    /// Raw lookup that ignores the active flag
    pub async fn raw_member(&self, id: &str) -> Option<MemberDoc> {
        self.state.read().await.members.get(id).cloned()
    }
}

fn not_found(id: &str) -> AliancaError {
    AliancaError::NotFound(format!("Member {id} not found"))
}

fn by_name(a: &MemberDoc, b: &MemberDoc) -> std::cmp::Ordering {
    a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
}

#[async_trait::async_trait]
impl MemberStore for InMemoryMemberStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn find_member(&self, id: &str) -> Result<Option<MemberDoc>> {
        Ok(self.state.read().await.active(id).cloned())
    }

    async fn supervisor_of(&self, id: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state.members.get(id).and_then(|m| m.supervisor_id.clone()))
    }

    async fn find_member_by_email(&self, email: &str) -> Result<Option<MemberDoc>> {
        let state = self.state.read().await;
        Ok(state
            .members
            .values()
            .find(|m| m.is_active() && m.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn active_member_ids(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .members
            .values()
            .filter(|m| m.is_active())
            .map(|m| m.id.clone())
            .collect())
    }

    async fn active_child_ids(&self, parent_ids: &[String]) -> Result<Vec<String>> {
        let parents: HashSet<&str> = parent_ids.iter().map(String::as_str).collect();
        let state = self.state.read().await;
        Ok(state
            .members
            .values()
            .filter(|m| m.is_active())
            .filter(|m| {
                m.supervisor_id
                    .as_deref()
                    .is_some_and(|s| parents.contains(s))
            })
            .map(|m| m.id.clone())
            .collect())
    }

    async fn active_children(&self, parent_id: &str) -> Result<Vec<MemberDoc>> {
        let state = self.state.read().await;
        let mut children: Vec<MemberDoc> = state
            .members
            .values()
            .filter(|m| m.is_active() && m.supervisor_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(by_name);
        Ok(children)
    }

    async fn members_in(&self, ids: &HashSet<String>) -> Result<Vec<MemberDoc>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.active(id))
            .cloned()
            .collect())
    }

    async fn list_members(
        &self,
        query: &MemberQuery,
        page: PageRequest,
    ) -> Result<Page<MemberDoc>> {
        let state = self.state.read().await;
        let mut matching: Vec<&MemberDoc> =
            state.members.values().filter(|m| query.matches(m)).collect();
        matching.sort_by(|a, b| by_name(a, b));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.skip() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn count_active_children(&self, parent_ids: &[String]) -> Result<HashMap<String, u64>> {
        let state = self.state.read().await;
        let mut counts: HashMap<String, u64> =
            parent_ids.iter().map(|id| (id.clone(), 0)).collect();
        for member in state.members.values().filter(|m| m.is_active()) {
            if let Some(count) = member
                .supervisor_id
                .as_ref()
                .and_then(|s| counts.get_mut(s))
            {
                *count += 1;
            }
        }
        Ok(counts)
    }

    async fn insert_member(&self, member: MemberDoc) -> Result<MemberDoc> {
        let mut state = self.state.write().await;
        if state.email_taken(&member.email, None) {
            return Err(AliancaError::Conflict(format!(
                "Email {} is already registered",
                member.email
            )));
        }
        if state.members.contains_key(&member.id) {
            return Err(AliancaError::Conflict(format!(
                "Member {} already exists",
                member.id
            )));
        }
        debug!("Inserting member {} ({})", member.id, member.role);
        state.members.insert(member.id.clone(), member.clone());
        Ok(member)
    }

    async fn update_profile(&self, id: &str, changes: &ProfileChanges) -> Result<MemberDoc> {
        let mut state = self.state.write().await;
        if let Some(ref email) = changes.email {
            if state.email_taken(email, Some(id)) {
                return Err(AliancaError::Conflict(format!(
                    "Email {email} is already registered"
                )));
            }
        }
        let member = state.active_mut(id).ok_or_else(|| not_found(id))?;
        changes.apply_to(member);
        member.metadata.touch();
        Ok(member.clone())
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let member = state.active_mut(id).ok_or_else(|| not_found(id))?;
        member.password_hash = password_hash.to_string();
        member.metadata.touch();
        Ok(())
    }

    async fn deactivate_member(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.active_mut(id) {
            Some(member) => {
                member.metadata.mark_deleted();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn apply_promotion(
        &self,
        id: &str,
        new_role: Role,
        mut record: PromotionRecordDoc,
    ) -> Result<MemberDoc> {
        let mut state = self.state.write().await;
        // Both writes happen under the same guard or not at all
        let member = state.active_mut(id).ok_or_else(|| not_found(id))?;
        record.previous_role = member.role;
        member.role = new_role;
        member.metadata.touch();
        let updated = member.clone();
        state.history.push(record);
        Ok(updated)
    }

    async fn promotion_history(&self, member_id: &str) -> Result<Vec<PromotionRecordDoc>> {
        let state = self.state.read().await;
        let mut records: Vec<PromotionRecordDoc> = state
            .history
            .iter()
            .filter(|r| r.member_id == member_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(records)
    }
}
