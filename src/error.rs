//! Error types for auth-mux
//!
//! Only *system* errors live here: misconfiguration, unreadable key material,
//! malformed request framing. A token that fails validation is not an error;
//! it is a [`Validation`](crate::types::Validation) with `valid == false`.

use std::io;

use thiserror::Error;

use crate::registry::AdapterCategory;

/// Result type alias for auth-mux
pub type Result<T> = std::result::Result<T, Error>;

/// auth-mux system errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The `type` of an adapter declaration is not registered
    #[error("Unknown {category} type {type_name:?}")]
    UnknownAdapterType {
        /// Which table was searched
        category: AdapterCategory,
        /// The offending discriminant
        type_name: String,
    },

    /// The type-specific `config` body failed to decode
    #[error("Invalid {type_name} config: {reason}")]
    InvalidAdapterConfig {
        /// Adapter discriminant whose schema was applied
        type_name: String,
        /// Underlying structural error
        reason: String,
    },

    /// An issuer's public key could not be read or parsed
    #[error("Failed to load public key for issuer {issuer:?}: {reason}")]
    KeyLoad {
        /// Issuer identifier
        issuer: String,
        /// What went wrong
        reason: String,
    },

    /// Request body could not be read or decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Request body exceeded `max_body_size` while being read
    #[error("Request body exceeds the configured limit")]
    PayloadTooLarge,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an [`Error::InvalidAdapterConfig`] from any displayable cause
    pub fn invalid_config(type_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidAdapterConfig {
            type_name: type_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error happened while decoding configuration at startup
    #[must_use]
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownAdapterType { .. } | Self::InvalidAdapterConfig { .. }
        )
    }
}
