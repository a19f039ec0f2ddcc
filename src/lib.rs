//! Alianca - membership backend for a discipleship network
//!
//! Members form a supervisor tree. What a member can see and change is
//! scoped by its role: administrators see everyone, pastors their whole
//! network, cell leaders their direct disciples, and disciples themselves.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod network;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AliancaError, Result};
