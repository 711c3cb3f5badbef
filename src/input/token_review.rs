//! Kubernetes `TokenReview` body input

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::InputAdapter;
use crate::protocol::TokenReview;
use crate::registry::{AdapterDeclaration, build_validator};
use crate::token::{TokenValidator, Validator};
use crate::types::Validation;
use crate::{Error, Result};

/// Registered discriminant
pub const TYPE_NAME: &str = "KubernetesTokenReview";

/// `config` body of a `KubernetesTokenReview` input declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenReviewInputConfig {
    /// Nested token validator declaration
    pub validator: AdapterDeclaration,
}

/// Reads `spec.token` from a JSON `TokenReview` request body
#[derive(Debug)]
pub struct TokenReviewInput {
    validator: Validator,
}

impl TokenReviewInput {
    /// Build, resolving the nested validator declaration
    pub fn from_config(config: TokenReviewInputConfig) -> Result<Self> {
        Ok(Self {
            validator: build_validator(&config.validator)?,
        })
    }
}

/// Decode a `TokenReview` body
pub fn decode_review(body: &[u8]) -> Result<TokenReview> {
    serde_json::from_slice(body).map_err(|e| Error::Decode(format!("decode JSON: {e}")))
}

#[async_trait]
impl InputAdapter for TokenReviewInput {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn authenticate(&self, request: Request) -> Result<Validation> {
        // Bounded by the router's body limit layer, declared length or not
        let body = Bytes::from_request(request, &())
            .await
            .map_err(|rejection| match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => Error::PayloadTooLarge,
                _ => Error::Decode(format!("read body: {}", rejection.body_text())),
            })?;
        let review = decode_review(&body)?;
        self.validator.validate(&review.spec.token).await
    }

    fn validator(&self) -> &Validator {
        &self.validator
    }
}
