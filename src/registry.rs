//! Adapter registry
//!
//! Every adapter is declared in configuration as an envelope:
//!
//! ```yaml
//! type: Bearer          # discriminant
//! name: corp-sso        # diagnostic label
//! path: /bearer         # route fragment (inputs and outputs only)
//! config: { ... }       # schema depends on `type`
//! ```
//!
//! Decoding is two-phase: the envelope is decoded by the configuration loader
//! with `config` kept opaque, then [`build_input`], [`build_output`] or
//! [`build_validator`] look the discriminant up in a static registration table
//! and decode `config` against the matching concrete schema.
//!
//! The tables are closed: adding an adapter type is a code change.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::input::{Input, bearer, token_review as token_review_input};
use crate::output::{Output, identity, token_review as token_review_output};
use crate::token::{Validator, jwt};
use crate::{Error, Result};

/// Which registration table a declaration is resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterCategory {
    /// Request → [`Validation`](crate::types::Validation)
    Input,
    /// [`Validation`](crate::types::Validation) → response
    Output,
    /// Raw token → [`Validation`](crate::types::Validation)
    Validator,
}

impl fmt::Display for AdapterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Validator => "token validator",
        })
    }
}

/// Generic adapter envelope, `config` still undecoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterDeclaration {
    /// Discriminant selecting the concrete adapter
    #[serde(rename = "type")]
    pub type_name: String,
    /// Diagnostic label used in logs
    #[serde(default)]
    pub name: String,
    /// Route fragment; combined with the paired adapter's path
    #[serde(default)]
    pub path: String,
    /// Type-specific configuration body
    #[serde(default)]
    pub config: Value,
}

impl AdapterDeclaration {
    /// Declaration with empty name and path
    pub fn new(type_name: impl Into<String>, config: Value) -> Self {
        Self {
            type_name: type_name.into(),
            name: String::new(),
            path: String::new(),
            config,
        }
    }

    /// Label for logs: the name if set, otherwise the type
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.type_name
        } else {
            &self.name
        }
    }
}

/// One row of a registration table
pub struct Registration<T> {
    /// Discriminant matched against [`AdapterDeclaration::type_name`]
    pub type_name: &'static str,
    /// Decodes the concrete config and constructs the adapter
    pub build: fn(Value) -> Result<T>,
}

/// Registered input adapters
pub const INPUTS: &[Registration<Input>] = &[
    Registration {
        type_name: bearer::TYPE_NAME,
        build: |config| {
            let config: bearer::BearerConfig = decode_config(bearer::TYPE_NAME, config)?;
            Ok(Input::Bearer(bearer::BearerInput::from_config(config)?))
        },
    },
    Registration {
        type_name: token_review_input::TYPE_NAME,
        build: |config| {
            let config: token_review_input::TokenReviewInputConfig =
                decode_config(token_review_input::TYPE_NAME, config)?;
            Ok(Input::KubernetesTokenReview(
                token_review_input::TokenReviewInput::from_config(config)?,
            ))
        },
    },
];

/// Registered output adapters
pub const OUTPUTS: &[Registration<Output>] = &[
    Registration {
        type_name: identity::TYPE_NAME,
        build: |config| {
            let config: identity::IdentityConfig = decode_config(identity::TYPE_NAME, config)?;
            Ok(Output::Identity(identity::IdentityOutput::new(config)))
        },
    },
    Registration {
        type_name: token_review_output::TYPE_NAME,
        build: |config| {
            let config: token_review_output::TokenReviewOutputConfig =
                decode_config(token_review_output::TYPE_NAME, config)?;
            Ok(Output::KubernetesTokenReview(
                token_review_output::TokenReviewOutput::new(config),
            ))
        },
    },
];

/// Registered token validators
pub const VALIDATORS: &[Registration<Validator>] = &[Registration {
    type_name: jwt::TYPE_NAME,
    build: |config| {
        let config: jwt::JwtConfig = decode_config(jwt::TYPE_NAME, config)?;
        Ok(Validator::Jwt(jwt::JwtValidator::from_config(config)?))
    },
}];

/// Resolve an input declaration
pub fn build_input(declaration: &AdapterDeclaration) -> Result<Input> {
    resolve(AdapterCategory::Input, INPUTS, declaration)
}

/// Resolve an output declaration
pub fn build_output(declaration: &AdapterDeclaration) -> Result<Output> {
    resolve(AdapterCategory::Output, OUTPUTS, declaration)
}

/// Resolve a token validator declaration (nested inside input configs)
pub fn build_validator(declaration: &AdapterDeclaration) -> Result<Validator> {
    resolve(AdapterCategory::Validator, VALIDATORS, declaration)
}

/// Discriminants registered for a category, in table order
#[must_use]
pub fn registered_types(category: AdapterCategory) -> Vec<&'static str> {
    match category {
        AdapterCategory::Input => INPUTS.iter().map(|r| r.type_name).collect(),
        AdapterCategory::Output => OUTPUTS.iter().map(|r| r.type_name).collect(),
        AdapterCategory::Validator => VALIDATORS.iter().map(|r| r.type_name).collect(),
    }
}

fn resolve<T>(
    category: AdapterCategory,
    table: &[Registration<T>],
    declaration: &AdapterDeclaration,
) -> Result<T> {
    let registration = table
        .iter()
        .find(|r| r.type_name == declaration.type_name)
        .ok_or_else(|| Error::UnknownAdapterType {
            category,
            type_name: declaration.type_name.clone(),
        })?;

    (registration.build)(declaration.config.clone())
}

/// Second decode phase: apply the concrete schema to an opaque config body.
///
/// A missing body (`null`) decodes as an empty mapping so config-less adapters
/// need no `config:` key.
pub fn decode_config<C: DeserializeOwned>(type_name: &str, config: Value) -> Result<C> {
    let config = match config {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(config).map_err(|e| Error::invalid_config(type_name, e))
}
