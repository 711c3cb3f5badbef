//! auth-mux Library
//!
//! Authentication translation gateway: accept a credential in one shape,
//! validate it against per-issuer trust policy, answer in another shape.
//!
//! # Pipeline
//!
//! Each configured (input, output) pair is mounted at
//! `/<input.path>/<output.path>`:
//!
//! - **Input adapter** finds the credential (`Authorization: Bearer`, a
//!   Kubernetes `TokenReview` body) and hands it to its token validator.
//! - **Token validator** verifies the JWT against the issuer's PEM key, maps
//!   claims and applies the issuer's prefix policy.
//! - **Output adapter** renders the [`types::Validation`] (identity JSON, a
//!   `TokenReview` response).
//!
//! Adapters are selected by the `type` of their configuration declaration
//! through the closed tables in [`registry`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod input;
pub mod output;
pub mod protocol;
pub mod registry;
pub mod token;
pub mod types;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
