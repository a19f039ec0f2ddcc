//! Database schemas for Alianca
//!
//! Defines MongoDB document structures for members and promotion history.

mod member;
mod metadata;
mod promotion;

pub use member::{Gender, MemberDoc, Milestones, MEMBER_COLLECTION};
pub use metadata::Metadata;
pub use promotion::{default_reason, PromotionRecordDoc, PROMOTION_COLLECTION};
