//! Input adapters
//!
//! An input adapter finds the credential in an inbound request and hands it
//! to its token validator. Requests rejected before a token is found yield
//! `valid == false` without touching the validator.

pub mod bearer;
pub mod token_review;

use async_trait::async_trait;
use axum::extract::Request;

use crate::Result;
use crate::token::Validator;
use crate::types::Validation;

/// Request → [`Validation`]
#[async_trait]
pub trait InputAdapter: Send + Sync {
    /// Registered discriminant of this adapter
    fn type_name(&self) -> &'static str;

    /// Extract and validate the credential carried by `request`.
    ///
    /// `Err` means the request could not be processed at all (malformed
    /// transport framing, unreadable issuer key) and maps to a 500.
    async fn authenticate(&self, request: Request) -> Result<Validation>;

    /// Validator receiving the extracted token
    fn validator(&self) -> &Validator;
}

/// Every registered input adapter
#[derive(Debug)]
pub enum Input {
    /// `Authorization: Bearer <token>`
    Bearer(bearer::BearerInput),
    /// JSON `TokenReview` body
    KubernetesTokenReview(token_review::TokenReviewInput),
}

#[async_trait]
impl InputAdapter for Input {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bearer(i) => i.type_name(),
            Self::KubernetesTokenReview(i) => i.type_name(),
        }
    }

    async fn authenticate(&self, request: Request) -> Result<Validation> {
        match self {
            Self::Bearer(i) => i.authenticate(request).await,
            Self::KubernetesTokenReview(i) => i.authenticate(request).await,
        }
    }

    fn validator(&self) -> &Validator {
        match self {
            Self::Bearer(i) => i.validator(),
            Self::KubernetesTokenReview(i) => i.validator(),
        }
    }
}
