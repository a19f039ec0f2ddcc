//! The discipleship network
//!
//! Members form a tree through their supervisor pointer. This module
//! resolves what each actor can see, guards single-target access, computes
//! dashboard statistics and applies promotions.

pub mod guard;
pub mod input;
pub mod memory;
pub mod mongo_store;
pub mod promotion;
pub mod resolver;
pub mod seed;
pub mod service;
pub mod stats;
pub mod store;
pub mod view;

pub use guard::PermissionGuard;
pub use memory::InMemoryMemberStore;
pub use mongo_store::MongoMemberStore;
pub use promotion::PromotionWorkflow;
pub use resolver::{HierarchyResolver, Scope};
pub use service::NetworkService;
pub use stats::{StatisticsAggregator, StatsFilter, StatsReport};
pub use store::{MemberQuery, MemberStore, Page, PageRequest, ProfileChanges};
