//! Database layer for Alianca
//!
//! Provides MongoDB storage for members and their promotion history.

pub mod mongo;
pub mod schemas;

pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{Gender, MemberDoc, Metadata, Milestones, PromotionRecordDoc};
