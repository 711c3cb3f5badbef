//! `Authorization: Bearer` input

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::InputAdapter;
use crate::Result;
use crate::registry::{AdapterDeclaration, build_validator};
use crate::token::{TokenValidator, Validator};
use crate::types::Validation;

/// Registered discriminant
pub const TYPE_NAME: &str = "Bearer";

const MISSING_HEADER: &str = "Missing authorization header";
const NOT_BEARER: &str = "Expected bearer token in authorization header";

/// `config` body of a `Bearer` input declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearerConfig {
    /// Nested token validator declaration
    pub validator: AdapterDeclaration,
}

/// Reads the token from the `Authorization` header
#[derive(Debug)]
pub struct BearerInput {
    validator: Validator,
}

impl BearerInput {
    /// Build, resolving the nested validator declaration
    pub fn from_config(config: BearerConfig) -> Result<Self> {
        Ok(Self {
            validator: build_validator(&config.validator)?,
        })
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The value is split once at the first space; the scheme is matched
/// case-insensitively and everything after the space is the token.
fn bearer_token(headers: &HeaderMap) -> std::result::Result<&str, &'static str> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(MISSING_HEADER);
    };
    if value.is_empty() {
        return Err(MISSING_HEADER);
    }
    let value = value.to_str().map_err(|_| NOT_BEARER)?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(NOT_BEARER),
    }
}

#[async_trait]
impl InputAdapter for BearerInput {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn authenticate(&self, request: Request) -> Result<Validation> {
        // Owned: the request body is not Sync, so no borrow may cross the await
        let token = match bearer_token(request.headers()) {
            Ok(token) => token.to_string(),
            Err(reason) => return Ok(Validation::invalid(reason)),
        };
        self.validator.validate(&token).await
    }

    fn validator(&self) -> &Validator {
        &self.validator
    }
}
