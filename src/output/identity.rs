//! Identity output: the validation record as JSON

use axum::http::{StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::OutputAdapter;
use crate::Result;
use crate::types::Validation;

/// Registered discriminant
pub const TYPE_NAME: &str = "Identity";

/// `config` body of an `Identity` output declaration (no options)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {}

/// Serializes the [`Validation`]; `401` when invalid, `200` otherwise
#[derive(Debug, Default)]
pub struct IdentityOutput;

impl IdentityOutput {
    /// Build from its (empty) config
    #[must_use]
    pub fn new(_config: IdentityConfig) -> Self {
        Self
    }
}

impl OutputAdapter for IdentityOutput {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn render(&self, validation: &Validation) -> Result<Response> {
        let body = serde_json::to_vec(validation)?;
        let status = if validation.valid {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        };
        Ok((status, [(CONTENT_TYPE, "application/json")], body).into_response())
    }
}
