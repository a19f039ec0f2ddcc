//! Promotion history schema
//!
//! Append-only audit trail of role changes. Records are written in the
//! same transaction as the role update and never modified afterwards.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for promotion records
pub const PROMOTION_COLLECTION: &str = "promotion_history";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PromotionRecordDoc {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Member whose role changed
    pub member_id: String,

    pub previous_role: Role,

    pub new_role: Role,

    /// Member who performed the change
    pub changed_by: String,

    pub reason: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub changed_at: DateTime<Utc>,
}

impl PromotionRecordDoc {
    pub fn new(
        member_id: String,
        previous_role: Role,
        new_role: Role,
        changed_by: String,
        reason: Option<String>,
    ) -> Self {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| default_reason(new_role));

        Self {
            id: Uuid::new_v4().to_string(),
            metadata: Metadata::new(),
            member_id,
            previous_role,
            new_role,
            changed_by,
            reason,
            changed_at: Utc::now(),
        }
    }
}

/// Reason recorded when the actor gives none
pub fn default_reason(new_role: Role) -> String {
    format!("Promoted to {new_role}")
}

impl IntoIndexes for PromotionRecordDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "member_id": 1, "changed_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("member_history_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PromotionRecordDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
