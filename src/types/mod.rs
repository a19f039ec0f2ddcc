//! Shared types for Alianca

pub mod error;

pub use error::{AliancaError, FieldError, Result};
