//! HTTP server for Alianca

pub mod http;

pub use http::{run, AppState};
