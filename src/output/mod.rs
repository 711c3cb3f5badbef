//! Output adapters
//!
//! An output adapter renders a [`Validation`] in the shape its caller expects.

pub mod identity;
pub mod token_review;

use axum::response::Response;

use crate::Result;
use crate::types::Validation;

/// [`Validation`] → response
pub trait OutputAdapter: Send + Sync {
    /// Registered discriminant of this adapter
    fn type_name(&self) -> &'static str;

    /// Render `validation` as a complete HTTP response
    fn render(&self, validation: &Validation) -> Result<Response>;
}

/// Every registered output adapter
#[derive(Debug)]
pub enum Output {
    /// The [`Validation`] as JSON
    Identity(identity::IdentityOutput),
    /// A Kubernetes `TokenReview` response
    KubernetesTokenReview(token_review::TokenReviewOutput),
}

impl OutputAdapter for Output {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Identity(o) => o.type_name(),
            Self::KubernetesTokenReview(o) => o.type_name(),
        }
    }

    fn render(&self, validation: &Validation) -> Result<Response> {
        match self {
            Self::Identity(o) => o.render(validation),
            Self::KubernetesTokenReview(o) => o.render(validation),
        }
    }
}
