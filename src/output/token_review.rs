//! Kubernetes `TokenReview` output

use std::collections::BTreeMap;

use axum::http::{StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::OutputAdapter;
use crate::Result;
use crate::protocol::{TokenReview, TokenReviewStatus, UserInfo};
use crate::types::Validation;

/// Registered discriminant
pub const TYPE_NAME: &str = "KubernetesTokenReview";

/// `config` body of a `KubernetesTokenReview` output declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReviewOutputConfig {
    /// Audience reported in `status.audiences`; empty reports none
    #[serde(default)]
    pub audience: String,
    /// Accepted for compatibility; API servers apply their own cache TTL
    #[serde(default, rename = "maxTTL")]
    pub max_ttl: i64,
}

/// Answers API server webhook authentication with a `TokenReview`.
///
/// Always `200`: the outcome travels in `status.authenticated`.
#[derive(Debug)]
pub struct TokenReviewOutput {
    config: TokenReviewOutputConfig,
}

impl TokenReviewOutput {
    /// Build from config
    #[must_use]
    pub fn new(config: TokenReviewOutputConfig) -> Self {
        Self { config }
    }

    /// Map a [`Validation`] onto a `TokenReview` response
    #[must_use]
    pub fn review(&self, validation: &Validation) -> TokenReview {
        let claims = &validation.claims;
        let audiences = if self.config.audience.is_empty() {
            Vec::new()
        } else {
            vec![self.config.audience.clone()]
        };

        TokenReview::response(TokenReviewStatus {
            authenticated: validation.valid,
            user: UserInfo {
                username: claims.subject.clone(),
                uid: claims.id.clone(),
                groups: claims.groups.clone(),
                extra: user_extra(&claims.extra),
            },
            audiences,
            error: validation.error.clone(),
        })
    }
}

/// `user.extra` from the opaque extra claim.
///
/// Object entries whose value is a string or a list of strings are kept;
/// anything else is dropped.
fn user_extra(extra: &Value) -> BTreeMap<String, Vec<String>> {
    let Value::Object(map) = extra else {
        return BTreeMap::new();
    };

    map.iter()
        .filter_map(|(key, value)| {
            let values = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map(ToString::to_string))
                    .collect::<Option<Vec<_>>>()?,
                _ => return None,
            };
            Some((key.clone(), values))
        })
        .collect()
}

impl OutputAdapter for TokenReviewOutput {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn render(&self, validation: &Validation) -> Result<Response> {
        let body = serde_json::to_vec(&self.review(validation))?;
        Ok((StatusCode::OK, [(CONTENT_TYPE, "application/json")], body).into_response())
    }
}
