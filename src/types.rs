//! Claims model shared by every adapter
//!
//! A [`Validation`] is created fresh per request by a token validator (or by an
//! input adapter that rejects the request before a token is found), flows
//! through the output adapter and is dropped once the response is written.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity claims extracted from a verified token
///
/// Serialized with PascalCase keys (`ID`, `Subject`, `Groups`, `Extra`), the
/// shape identity consumers already parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Claims {
    /// Stable identifier of the principal
    #[serde(rename = "ID")]
    pub id: String,
    /// Human-facing subject (user name)
    pub subject: String,
    /// Group memberships, in token order
    pub groups: Vec<String>,
    /// Opaque extra claim, `null` when not configured or absent
    pub extra: Value,
}

/// Outcome of validating one credential
///
/// `valid` is `false` as soon as any reason has been recorded; `error` holds
/// every distinct reason, one per line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Validation {
    /// Whether the credential was accepted
    pub valid: bool,
    /// Newline-separated rejection reasons, empty when valid
    pub error: String,
    /// Extracted claims (default when extraction never happened)
    pub claims: Claims,
}

impl Validation {
    /// An accepted validation carrying `claims`
    #[must_use]
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            error: String::new(),
            claims,
        }
    }

    /// A rejected validation with a single reason and no claims
    pub fn invalid(reason: impl Into<String>) -> Self {
        let mut validation = Self::default();
        validation.reject(reason);
        validation
    }

    /// Record a rejection reason and mark the validation invalid
    pub fn reject(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.valid = false;
        if self.reasons().any(|existing| existing == reason) {
            return;
        }
        if !self.error.is_empty() {
            self.error.push('\n');
        }
        self.error.push_str(&reason);
    }

    /// Iterate over the recorded rejection reasons
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.error.lines().filter(|line| !line.is_empty())
    }

    /// Apply an issuer's prefix policy to the extracted claims.
    ///
    /// Every rule is checked; each violation adds its own reason.
    pub fn assert(&mut self, assertion: &Assertion) {
        if !self.claims.id.starts_with(&assertion.id_prefix) {
            let reason = format!(
                "Expected ID {:?} to have prefix {:?}",
                self.claims.id, assertion.id_prefix
            );
            self.reject(reason);
        }

        if !self.claims.subject.starts_with(&assertion.subject_prefix) {
            let reason = format!(
                "Expected subject {:?} to have prefix {:?}",
                self.claims.subject, assertion.subject_prefix
            );
            self.reject(reason);
        }

        let violations: Vec<String> = self
            .claims
            .groups
            .iter()
            .filter(|group| !group.starts_with(&assertion.group_prefix))
            .map(|group| {
                format!(
                    "Expected group {group:?} to have prefix {:?}",
                    assertion.group_prefix
                )
            })
            .collect();
        for reason in violations {
            self.reject(reason);
        }
    }
}

/// Required string prefixes on identity fields (empty matches everything)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Assertion {
    /// Required prefix of [`Claims::id`]
    pub id_prefix: String,
    /// Required prefix of [`Claims::subject`]
    pub subject_prefix: String,
    /// Required prefix of every entry in [`Claims::groups`]
    pub group_prefix: String,
}
