//! Token validators
//!
//! A token validator turns a raw credential string into a
//! [`Validation`]. Rejections are values, never errors: `Err` is reserved
//! for system failures such as an unreadable issuer key.

pub mod jwt;

use async_trait::async_trait;

use crate::Result;
use crate::types::Validation;

/// Verifies a raw token and extracts identity claims
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Registered discriminant of this validator
    fn type_name(&self) -> &'static str;

    /// Validate `token`.
    ///
    /// Returns `Ok` with `valid == false` for any token-attributable failure.
    async fn validate(&self, token: &str) -> Result<Validation>;
}

/// Every registered token validator
#[derive(Debug)]
pub enum Validator {
    /// Signed JWT verified against per-issuer PEM keys
    Jwt(jwt::JwtValidator),
}

#[async_trait]
impl TokenValidator for Validator {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Jwt(v) => v.type_name(),
        }
    }

    async fn validate(&self, token: &str) -> Result<Validation> {
        match self {
            Self::Jwt(v) => v.validate(token).await,
        }
    }
}
