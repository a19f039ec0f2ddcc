//! Member document schema
//!
//! One document per member of the discipleship network. The supervisor
//! pointer forms the tree; soft deletion lives in `metadata.is_deleted`.

use bson::{doc, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for members
pub const MEMBER_COLLECTION: &str = "members";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" | "m" => Ok(Gender::Male),
            "F" | "f" => Ok(Gender::Female),
            other => Err(format!("Unknown gender: {other}")),
        }
    }
}

/// Discipleship program milestones
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Milestones {
    #[serde(default)]
    pub baptized: bool,
    #[serde(default)]
    pub life_university: bool,
    #[serde(default)]
    pub destiny_training_1: bool,
    #[serde(default)]
    pub destiny_training_2: bool,
    #[serde(default)]
    pub destiny_training_3: bool,
}

/// Member document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MemberDoc {
    /// UUID v4 identifier
    #[serde(rename = "_id")]
    pub id: String,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    /// Login identifier, unique across members
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub birth_date: Option<NaiveDate>,

    #[serde(default)]
    pub gender: Option<Gender>,

    #[serde(default)]
    pub role: Role,

    /// Parent in the discipleship tree; roots have none
    #[serde(default)]
    pub supervisor_id: Option<String>,

    #[serde(default)]
    pub ministry_id: Option<String>,

    #[serde(default)]
    pub photo_url: Option<String>,

    #[serde(default)]
    pub milestones: Milestones,

    /// Engagement level from 1 to 5
    #[serde(default = "default_activity_level")]
    pub activity_level: u8,
}

fn default_activity_level() -> u8 {
    1
}

impl MemberDoc {
    /// Create a new member document with a fresh id
    pub fn new(name: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            metadata: Metadata::new(),
            name,
            email,
            password_hash,
            phone: None,
            birth_date: None,
            gender: None,
            role,
            supervisor_id: None,
            ministry_id: None,
            photo_url: None,
            milestones: Milestones::default(),
            activity_level: default_activity_level(),
        }
    }

    pub fn with_supervisor(mut self, supervisor_id: impl Into<String>) -> Self {
        self.supervisor_id = Some(supervisor_id.into());
        self
    }

    pub fn is_active(&self) -> bool {
        !self.metadata.is_deleted
    }
}

impl IntoIndexes for MemberDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            // Child lookups during closure
            (
                doc! { "supervisor_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("supervisor_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "role": 1 },
                Some(
                    IndexOptions::builder()
                        .name("role_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for MemberDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
