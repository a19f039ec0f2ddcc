//! Configuration for Alianca
//!
//! CLI arguments with environment variable fallbacks. A `.env` file is
//! loaded before parsing.

use clap::Parser;
use std::net::SocketAddr;

use crate::auth::JwtValidator;
use crate::types::AliancaError;

/// Alianca - discipleship network membership service
#[derive(Parser, Debug, Clone)]
#[command(name = "alianca")]
#[command(about = "Role-scoped membership backend for a discipleship network")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3333")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "alianca")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required outside dev mode)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Development mode: dev JWT secret, in-memory fallback, verbose errors
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Value of Access-Control-Allow-Origin
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Largest accepted request body
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "65536")]
    pub max_body_bytes: usize,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.as_deref().map_or(true, str::is_empty) {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Token validator for the configured secret
    ///
    /// Dev mode without a secret falls back to a fixed development secret.
    pub fn jwt_validator(&self) -> Result<JwtValidator, AliancaError> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) if !secret.is_empty() => {
                JwtValidator::new(secret.clone(), self.jwt_expiry_seconds)
            }
            (_, true) => Ok(JwtValidator::new_dev(self.jwt_expiry_seconds)),
            _ => Err(AliancaError::Config(
                "JWT_SECRET is required in production mode".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("alianca").chain(args.iter().copied()))
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&[]);
        if args.jwt_secret.is_none() && !args.dev_mode {
            assert!(args.validate().is_err());
            assert!(args.jwt_validator().is_err());
        }
    }

    #[test]
    fn test_dev_mode_falls_back_to_dev_secret() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert!(args.jwt_validator().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let args = parse(&["--jwt-secret", "short"]);
        assert!(args.validate().is_ok());
        assert!(matches!(
            args.jwt_validator(),
            Err(AliancaError::Config(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--jwt-secret", "a-secret-that-is-long-enough-for-hs256!!"]);
        assert_eq!(args.max_body_bytes, 65536);
        assert!(args.jwt_validator().is_ok());
    }
}
