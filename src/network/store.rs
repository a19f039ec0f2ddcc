//! Persistence seam for the discipleship network
//!
//! Every read returns active members only. Implementations must apply a
//! promotion's role update and history record as one atomic unit.

use std::collections::{HashMap, HashSet};

use crate::auth::Role;
use crate::db::{Gender, MemberDoc, PromotionRecordDoc};
use crate::types::Result;

/// Largest page a list request may ask for
pub const MAX_PAGE_SIZE: u32 = 100;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Filters for member listing
#[derive(Debug, Clone, Default)]
pub struct MemberQuery {
    /// Restrict to these ids; `None` means every active member
    pub ids: Option<HashSet<String>>,
    pub role: Option<Role>,
    pub gender: Option<Gender>,
    pub supervisor_id: Option<String>,
    pub ministry_id: Option<String>,
    pub baptized: Option<bool>,
}

impl MemberQuery {
    /// In-process evaluation of the filter
    pub fn matches(&self, member: &MemberDoc) -> bool {
        member.is_active()
            && self.ids.as_ref().map_or(true, |ids| ids.contains(&member.id))
            && self.role.map_or(true, |role| member.role == role)
            && self.gender.map_or(true, |g| member.gender == Some(g))
            && self
                .supervisor_id
                .as_ref()
                .map_or(true, |s| member.supervisor_id.as_ref() == Some(s))
            && self
                .ministry_id
                .as_ref()
                .map_or(true, |m| member.ministry_id.as_ref() == Some(m))
            && self
                .baptized
                .map_or(true, |b| member.milestones.baptized == b)
    }
}

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Clamp page to >= 1 and limit to 1..=MAX_PAGE_SIZE
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.limit as u64
    }
}

/// One page of results plus the total match count
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64) as u32
    }
}

/// Profile fields an update may change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<chrono::NaiveDate>,
    pub gender: Option<Gender>,
    pub supervisor_id: Option<String>,
    pub ministry_id: Option<String>,
    pub photo_url: Option<String>,
    pub baptized: Option<bool>,
    pub life_university: Option<bool>,
    pub destiny_training_1: Option<bool>,
    pub destiny_training_2: Option<bool>,
    pub destiny_training_3: Option<bool>,
    pub activity_level: Option<u8>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the changes to an in-memory document
    pub fn apply_to(&self, member: &mut MemberDoc) {
        if let Some(ref name) = self.name {
            member.name = name.clone();
        }
        if let Some(ref email) = self.email {
            member.email = email.clone();
        }
        if let Some(ref phone) = self.phone {
            member.phone = Some(phone.clone());
        }
        if let Some(birth_date) = self.birth_date {
            member.birth_date = Some(birth_date);
        }
        if let Some(gender) = self.gender {
            member.gender = Some(gender);
        }
        if let Some(ref supervisor_id) = self.supervisor_id {
            member.supervisor_id = Some(supervisor_id.clone());
        }
        if let Some(ref ministry_id) = self.ministry_id {
            member.ministry_id = Some(ministry_id.clone());
        }
        if let Some(ref photo_url) = self.photo_url {
            member.photo_url = Some(photo_url.clone());
        }
        let m = &mut member.milestones;
        if let Some(v) = self.baptized {
            m.baptized = v;
        }
        if let Some(v) = self.life_university {
            m.life_university = v;
        }
        if let Some(v) = self.destiny_training_1 {
            m.destiny_training_1 = v;
        }
        if let Some(v) = self.destiny_training_2 {
            m.destiny_training_2 = v;
        }
        if let Some(v) = self.destiny_training_3 {
            m.destiny_training_3 = v;
        }
        if let Some(level) = self.activity_level {
            member.activity_level = level;
        }
    }
}

/// Storage operations the network core depends on
#[async_trait::async_trait]
pub trait MemberStore: Send + Sync {
    /// Short name for health output and logs
    fn kind(&self) -> &'static str;

    /// Point lookup of an active member
    async fn find_member(&self, id: &str) -> Result<Option<MemberDoc>>;

    async fn find_member_by_email(&self, email: &str) -> Result<Option<MemberDoc>>;

    /// Supervisor pointer of any stored member, deactivated ones included
    async fn supervisor_of(&self, id: &str) -> Result<Option<String>>;

    /// Ids of every active member
    async fn active_member_ids(&self) -> Result<Vec<String>>;

    /// Ids of active members whose supervisor is one of `parent_ids`
    async fn active_child_ids(&self, parent_ids: &[String]) -> Result<Vec<String>>;

    /// Active direct children of one member, ordered by name
    async fn active_children(&self, parent_id: &str) -> Result<Vec<MemberDoc>>;

    /// Active members among `ids`, in no particular order
    async fn members_in(&self, ids: &HashSet<String>) -> Result<Vec<MemberDoc>>;

    /// Paginated listing ordered by name
    async fn list_members(&self, query: &MemberQuery, page: PageRequest)
        -> Result<Page<MemberDoc>>;

    /// Number of active direct children for each of `parent_ids`
    async fn count_active_children(&self, parent_ids: &[String]) -> Result<HashMap<String, u64>>;

    /// Insert a new member; duplicate email is a conflict
    async fn insert_member(&self, member: MemberDoc) -> Result<MemberDoc>;

    /// Apply profile changes to an active member and return it
    async fn update_profile(&self, id: &str, changes: &ProfileChanges) -> Result<MemberDoc>;

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<()>;

    /// Soft delete; returns false if no active member had this id
    async fn deactivate_member(&self, id: &str) -> Result<bool>;

    /// Set the member's role and append `record`, atomically
    ///
    /// The stored record's `previous_role` is the role read inside the same
    /// atomic unit, whatever the caller put there.
    async fn apply_promotion(
        &self,
        id: &str,
        new_role: Role,
        record: PromotionRecordDoc,
    ) -> Result<MemberDoc>;

    /// Promotion records of a member, newest first
    async fn promotion_history(&self, member_id: &str) -> Result<Vec<PromotionRecordDoc>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(3, 500).limit, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(3, 20).skip(), 40);
    }

    #[test]
    fn test_total_pages() {
        let page: Page<()> = Page {
            items: vec![],
            total: 41,
            page: 1,
            limit: 20,
        };
        assert_eq!(page.total_pages(), 3);

        let empty: Page<()> = Page {
            items: vec![],
            total: 0,
            page: 1,
            limit: 20,
        };
        assert_eq!(empty.total_pages(), 0);
    }

    #[test]
    fn test_query_skips_inactive() {
        let mut member = MemberDoc::new("Ana".into(), "ana@x.com".into(), "h".into(), Role::Disciple);
        let query = MemberQuery::default();
        assert!(query.matches(&member));

        member.metadata.mark_deleted();
        assert!(!query.matches(&member));
    }

    #[test]
    fn test_query_filters() {
        let mut member = MemberDoc::new("Ana".into(), "ana@x.com".into(), "h".into(), Role::Leader)
            .with_supervisor("p1");
        member.gender = Some(Gender::Female);
        member.milestones.baptized = true;

        let query = MemberQuery {
            role: Some(Role::Leader),
            gender: Some(Gender::Female),
            supervisor_id: Some("p1".into()),
            baptized: Some(true),
            ..Default::default()
        };
        assert!(query.matches(&member));

        let wrong_scope = MemberQuery {
            ids: Some(HashSet::from(["other".to_string()])),
            ..Default::default()
        };
        assert!(!wrong_scope.matches(&member));

        let male = MemberQuery {
            gender: Some(Gender::Male),
            ..Default::default()
        };
        assert!(!male.matches(&member));
    }

    #[test]
    fn test_profile_changes_apply() {
        let mut member = MemberDoc::new("Ana".into(), "ana@x.com".into(), "h".into(), Role::Disciple);
        let changes = ProfileChanges {
            name: Some("Ana Paula".into()),
            life_university: Some(true),
            activity_level: Some(4),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        changes.apply_to(&mut member);

        assert_eq!(member.name, "Ana Paula");
        assert!(member.milestones.life_university);
        assert!(!member.milestones.baptized);
        assert_eq!(member.activity_level, 4);
        assert!(ProfileChanges::default().is_empty());
    }
}
