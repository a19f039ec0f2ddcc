//! Response shapes
//!
//! Documents never leave the service as-is: password hashes and raw
//! metadata stay behind these views.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::auth::Role;
use crate::db::{Gender, MemberDoc, Milestones, PromotionRecordDoc};
use crate::network::store::Page;

#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub role: Role,
    pub supervisor_id: Option<String>,
    pub ministry_id: Option<String>,
    pub photo_url: Option<String>,
    pub milestones: Milestones,
    pub activity_level: u8,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&MemberDoc> for MemberView {
    fn from(doc: &MemberDoc) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            email: doc.email.clone(),
            phone: doc.phone.clone(),
            birth_date: doc.birth_date,
            gender: doc.gender,
            role: doc.role,
            supervisor_id: doc.supervisor_id.clone(),
            ministry_id: doc.ministry_id.clone(),
            photo_url: doc.photo_url.clone(),
            milestones: doc.milestones.clone(),
            activity_level: doc.activity_level,
            active: doc.is_active(),
            created_at: doc.metadata.created_at.map(|t| t.to_chrono()),
            updated_at: doc.metadata.updated_at.map(|t| t.to_chrono()),
        }
    }
}

/// Short form used in lists of related members
#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo_url: Option<String>,
}

impl From<&MemberDoc> for MemberSummary {
    fn from(doc: &MemberDoc) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            email: doc.email.clone(),
            role: doc.role,
            photo_url: doc.photo_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorSummary {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl From<&MemberDoc> for SupervisorSummary {
    fn from(doc: &MemberDoc) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            role: doc.role,
        }
    }
}

/// One member with its supervisor and active direct disciples
#[derive(Debug, Clone, Serialize)]
pub struct MemberDetail {
    #[serde(flatten)]
    pub member: MemberView,
    pub supervisor: Option<SupervisorSummary>,
    pub disciples: Vec<MemberSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberListItem {
    #[serde(flatten)]
    pub member: MemberView,
    /// Active direct disciples
    pub disciple_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> ListResponse<T> {
    pub fn from_page<D>(page: Page<D>, map: impl FnMut(D) -> T) -> Self {
        let total_pages = page.total_pages();
        Self {
            data: page.items.into_iter().map(map).collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionView {
    pub id: String,
    pub member_id: String,
    pub previous_role: Role,
    pub new_role: Role,
    pub changed_by: String,
    pub reason: String,
    pub changed_at: DateTime<Utc>,
}

impl From<PromotionRecordDoc> for PromotionView {
    fn from(doc: PromotionRecordDoc) -> Self {
        Self {
            id: doc.id,
            member_id: doc.member_id,
            previous_role: doc.previous_role,
            new_role: doc.new_role,
            changed_by: doc.changed_by,
            reason: doc.reason,
            changed_at: doc.changed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub member: MemberSummary,
}

/// A direct report and the size of the network below it
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub member: MemberSummary,
    pub direct_disciples: u64,
    /// Active members anywhere below this one
    pub total_disciples: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchyView {
    pub member: MemberSummary,
    pub direct_reports: Vec<HierarchyNode>,
}
