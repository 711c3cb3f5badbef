//! Kubernetes `authentication.k8s.io/v1` `TokenReview`
//!
//! Only the fields a webhook token authenticator reads or writes are modeled.
//! Unknown fields are ignored on input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API group/version of the `TokenReview` resource
pub const API_VERSION: &str = "authentication.k8s.io/v1";

/// Resource kind
pub const KIND: &str = "TokenReview";

/// A `TokenReview` request or response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReview {
    /// `authentication.k8s.io/v1`
    #[serde(default)]
    pub api_version: String,
    /// `TokenReview`
    #[serde(default)]
    pub kind: String,
    /// Object metadata, carried opaquely
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// What is being reviewed
    #[serde(default)]
    pub spec: TokenReviewSpec,
    /// Review outcome, set by the authenticator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenReviewStatus>,
}

impl TokenReview {
    /// A response carrying `status`
    #[must_use]
    pub fn response(status: TokenReviewStatus) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: Map::new(),
            spec: TokenReviewSpec::default(),
            status: Some(status),
        }
    }
}

/// `spec` of a `TokenReview`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReviewSpec {
    /// Opaque bearer token
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Audiences the caller accepts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
}

/// `status` of a `TokenReview`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReviewStatus {
    /// Whether the token was accepted
    #[serde(default)]
    pub authenticated: bool,
    /// Identity behind the token
    #[serde(default)]
    pub user: UserInfo,
    /// Audiences the token is valid for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
    /// Why the review failed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// `status.user` of a `TokenReview`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Name uniquely identifying the user
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Identifier stable across name changes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Group memberships
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Additional attributes for authorizers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
}
