//! Authentication and authorization for Alianca
//!
//! Provides:
//! - JWT token generation and validation
//! - Member roles, the promotion matrix and scope strategies
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;
pub mod permissions;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use password::{hash_password, verify_password};
pub use permissions::{Role, ScopeStrategy};

/// Authenticated actor performing a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}
