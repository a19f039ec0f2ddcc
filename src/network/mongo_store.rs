//! MongoDB-backed member store
//!
//! Promotions run inside a multi-document transaction, which requires the
//! server to be a replica set member (a single-node replica set is enough).

use std::collections::{HashMap, HashSet};

use bson::{doc, Bson, Document};
use mongodb::options::FindOptions;
use tracing::{error, warn};

use crate::auth::Role;
use crate::db::schemas::{MEMBER_COLLECTION, PROMOTION_COLLECTION};
use crate::db::{MemberDoc, MongoClient, MongoCollection, PromotionRecordDoc};
use crate::network::store::{MemberQuery, MemberStore, Page, PageRequest, ProfileChanges};
use crate::types::{AliancaError, Result};

pub struct MongoMemberStore {
    mongo: MongoClient,
    members: MongoCollection<MemberDoc>,
    history: MongoCollection<PromotionRecordDoc>,
}

impl MongoMemberStore {
    /// Open both collections and ensure their indexes
    pub async fn new(mongo: MongoClient) -> Result<Self> {
        let members = mongo.collection::<MemberDoc>(MEMBER_COLLECTION).await?;
        let history = mongo
            .collection::<PromotionRecordDoc>(PROMOTION_COLLECTION)
            .await?;

        Ok(Self {
            mongo,
            members,
            history,
        })
    }

    /// Role update, history append and read-back, all on one session
    ///
    /// The record's previous role is the one replaced by this update.
    async fn promote_in_transaction(
        &self,
        id: &str,
        new_role: Role,
        mut record: PromotionRecordDoc,
        session: &mut mongodb::ClientSession,
    ) -> Result<MemberDoc> {
        let role = bson::to_bson(&new_role).map_err(bson_error)?;
        let before = self
            .members
            .find_one_and_update_in(doc! { "_id": id }, doc! { "$set": { "role": role } }, session)
            .await?
            .ok_or_else(|| AliancaError::NotFound(format!("Member {id} not found")))?;

        record.previous_role = before.role;
        self.history.insert_one_in(record, session).await?;

        self.members
            .find_one_in(doc! { "_id": id }, session)
            .await?
            .ok_or_else(|| AliancaError::NotFound(format!("Member {id} not found")))
    }
}

fn bson_error(err: bson::ser::Error) -> AliancaError {
    AliancaError::Internal(format!("BSON serialization failed: {err}"))
}

fn ids_to_bson(ids: impl IntoIterator<Item = impl Into<String>>) -> Vec<Bson> {
    ids.into_iter().map(|id| Bson::String(id.into())).collect()
}

/// Translate a listing query into a MongoDB filter
fn query_filter(query: &MemberQuery) -> Result<Document> {
    let mut filter = Document::new();

    if let Some(ref ids) = query.ids {
        filter.insert("_id", doc! { "$in": ids_to_bson(ids.iter().cloned()) });
    }
    if let Some(role) = query.role {
        filter.insert("role", role.as_str());
    }
    if let Some(gender) = query.gender {
        filter.insert("gender", bson::to_bson(&gender).map_err(bson_error)?);
    }
    if let Some(ref supervisor_id) = query.supervisor_id {
        filter.insert("supervisor_id", supervisor_id.clone());
    }
    if let Some(ref ministry_id) = query.ministry_id {
        filter.insert("ministry_id", ministry_id.clone());
    }
    if let Some(baptized) = query.baptized {
        filter.insert("milestones.baptized", baptized);
    }

    Ok(filter)
}

/// Translate profile changes into a `$set` document
fn profile_update(changes: &ProfileChanges) -> Result<Document> {
    let mut set = Document::new();

    if let Some(ref name) = changes.name {
        set.insert("name", name.clone());
    }
    if let Some(ref email) = changes.email {
        set.insert("email", email.clone());
    }
    if let Some(ref phone) = changes.phone {
        set.insert("phone", phone.clone());
    }
    if let Some(birth_date) = changes.birth_date {
        set.insert("birth_date", bson::to_bson(&birth_date).map_err(bson_error)?);
    }
    if let Some(gender) = changes.gender {
        set.insert("gender", bson::to_bson(&gender).map_err(bson_error)?);
    }
    if let Some(ref supervisor_id) = changes.supervisor_id {
        set.insert("supervisor_id", supervisor_id.clone());
    }
    if let Some(ref ministry_id) = changes.ministry_id {
        set.insert("ministry_id", ministry_id.clone());
    }
    if let Some(ref photo_url) = changes.photo_url {
        set.insert("photo_url", photo_url.clone());
    }
    if let Some(v) = changes.baptized {
        set.insert("milestones.baptized", v);
    }
    if let Some(v) = changes.life_university {
        set.insert("milestones.life_university", v);
    }
    if let Some(v) = changes.destiny_training_1 {
        set.insert("milestones.destiny_training_1", v);
    }
    if let Some(v) = changes.destiny_training_2 {
        set.insert("milestones.destiny_training_2", v);
    }
    if let Some(v) = changes.destiny_training_3 {
        set.insert("milestones.destiny_training_3", v);
    }
    if let Some(level) = changes.activity_level {
        set.insert("activity_level", level as i32);
    }

    Ok(doc! { "$set": set })
}

fn by_name() -> FindOptions {
    FindOptions::builder().sort(doc! { "name": 1, "_id": 1 }).build()
}

#[async_trait::async_trait]
impl MemberStore for MongoMemberStore {
    fn kind(&self) -> &'static str {
        "mongodb"
    }

    async fn find_member(&self, id: &str) -> Result<Option<MemberDoc>> {
        self.members.find_one(doc! { "_id": id }).await
    }

    async fn find_member_by_email(&self, email: &str) -> Result<Option<MemberDoc>> {
        self.members
            .find_one(doc! { "email": email.to_lowercase() })
            .await
    }

    async fn supervisor_of(&self, id: &str) -> Result<Option<String>> {
        let member = self.members.find_one_any(doc! { "_id": id }).await?;
        Ok(member.and_then(|m| m.supervisor_id))
    }

    async fn active_member_ids(&self) -> Result<Vec<String>> {
        let members = self.members.find_many(Document::new(), None).await?;
        Ok(members.into_iter().map(|m| m.id).collect())
    }

    async fn active_child_ids(&self, parent_ids: &[String]) -> Result<Vec<String>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = doc! { "supervisor_id": { "$in": ids_to_bson(parent_ids.iter().cloned()) } };
        let children = self.members.find_many(filter, None).await?;
        Ok(children.into_iter().map(|m| m.id).collect())
    }

    async fn active_children(&self, parent_id: &str) -> Result<Vec<MemberDoc>> {
        self.members
            .find_many(doc! { "supervisor_id": parent_id }, Some(by_name()))
            .await
    }

    async fn members_in(&self, ids: &HashSet<String>) -> Result<Vec<MemberDoc>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = doc! { "_id": { "$in": ids_to_bson(ids.iter().cloned()) } };
        self.members.find_many(filter, None).await
    }

    async fn list_members(
        &self,
        query: &MemberQuery,
        page: PageRequest,
    ) -> Result<Page<MemberDoc>> {
        let filter = query_filter(query)?;
        let total = self.members.count(filter.clone()).await?;

        let options = FindOptions::builder()
            .sort(doc! { "name": 1, "_id": 1 })
            .skip(page.skip())
            .limit(page.limit as i64)
            .build();
        let items = self.members.find_many(filter, Some(options)).await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn count_active_children(&self, parent_ids: &[String]) -> Result<HashMap<String, u64>> {
        let mut counts: HashMap<String, u64> =
            parent_ids.iter().map(|id| (id.clone(), 0)).collect();
        if parent_ids.is_empty() {
            return Ok(counts);
        }

        let filter = doc! { "supervisor_id": { "$in": ids_to_bson(parent_ids.iter().cloned()) } };
        for child in self.members.find_many(filter, None).await? {
            if let Some(count) = child
                .supervisor_id
                .as_ref()
                .and_then(|s| counts.get_mut(s))
            {
                *count += 1;
            }
        }
        Ok(counts)
    }

    async fn insert_member(&self, mut member: MemberDoc) -> Result<MemberDoc> {
        member.email = member.email.to_lowercase();
        self.members.insert_one(member.clone()).await?;
        self.find_member(&member.id)
            .await?
            .ok_or_else(|| AliancaError::Internal("Inserted member not readable".into()))
    }

    async fn update_profile(&self, id: &str, changes: &ProfileChanges) -> Result<MemberDoc> {
        let mut changes = changes.clone();
        if let Some(ref mut email) = changes.email {
            *email = email.to_lowercase();
        }

        let result = self
            .members
            .update_one(doc! { "_id": id }, profile_update(&changes)?)
            .await?;
        if result.matched_count == 0 {
            return Err(AliancaError::NotFound(format!("Member {id} not found")));
        }

        self.find_member(id)
            .await?
            .ok_or_else(|| AliancaError::NotFound(format!("Member {id} not found")))
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<()> {
        let result = self
            .members
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "password_hash": password_hash } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(AliancaError::NotFound(format!("Member {id} not found")));
        }
        Ok(())
    }

    async fn deactivate_member(&self, id: &str) -> Result<bool> {
        let result = self.members.soft_delete(doc! { "_id": id }).await?;
        Ok(result.modified_count > 0)
    }

    async fn apply_promotion(
        &self,
        id: &str,
        new_role: Role,
        record: PromotionRecordDoc,
    ) -> Result<MemberDoc> {
        let mut session = self.mongo.start_session().await?;
        session
            .start_transaction()
            .await
            .map_err(|e| AliancaError::Database(format!("Failed to start transaction: {e}")))?;

        match self
            .promote_in_transaction(id, new_role, record, &mut session)
            .await
        {
            Ok(member) => {
                session.commit_transaction().await.map_err(|e| {
                    AliancaError::Database(format!("Failed to commit promotion: {e}"))
                })?;
                Ok(member)
            }
            Err(e) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    error!("Failed to abort promotion transaction: {}", abort_err);
                }
                warn!("Promotion of {} rolled back: {}", id, e);
                Err(e)
            }
        }
    }

    async fn promotion_history(&self, member_id: &str) -> Result<Vec<PromotionRecordDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "changed_at": -1 })
            .build();
        self.history
            .find_many(doc! { "member_id": member_id }, Some(options))
            .await
    }
}
