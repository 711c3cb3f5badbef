//! JWT token validator with per-issuer public keys.
//!
//! # Verification flow
//!
//! 1. Check the token is three dot-separated segments and decode its header.
//! 2. Read `iss` from the payload *without* verification, only to pick a key.
//! 3. Look the issuer up in the configured map; unknown issuers are rejected.
//! 4. Resolve the issuer's PEM key, loading it from disk on first use and
//!    caching it for the lifetime of the process.
//! 5. Verify the signature, `iss`, `aud` (when configured) and `exp`/`nbf`
//!    (when present) with a clock leeway.
//! 6. Map the configured claim names onto [`Claims`].
//! 7. Apply the issuer's prefix [`Assertion`].
//!
//! Only step 4 can fail with a system error. Everything else is attributable
//! to the token and yields `valid == false`.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::TokenValidator;
use crate::config::humantime_serde;
use crate::types::{Assertion, Claims, Validation};
use crate::{Error, Result};

/// Registered discriminant
pub const TYPE_NAME: &str = "JWT";

/// Default clock skew tolerance for `exp` and `nbf`
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);

/// `config` body of a `JWT` validator declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Acceptable audiences; the token must carry at least one. Empty disables the check.
    #[serde(default)]
    pub audience: Vec<String>,
    /// Trusted issuers keyed by their `iss` value
    #[serde(default)]
    pub issuers: HashMap<String, IssuerConfig>,
    /// Claim names to map onto [`Claims`]
    pub claims: ClaimFields,
    /// Clock skew tolerance
    #[serde(default = "default_leeway", with = "humantime_serde")]
    pub leeway: Duration,
}

fn default_leeway() -> Duration {
    DEFAULT_LEEWAY
}

/// Per-issuer key source and prefix policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerConfig {
    /// Path to a PEM-encoded public key
    pub public_key: String,
    /// Required prefix of the mapped ID
    #[serde(default)]
    pub id_prefix: String,
    /// Required prefix of the mapped subject
    #[serde(default)]
    pub subject_prefix: String,
    /// Required prefix of every mapped group
    #[serde(default)]
    pub group_prefix: String,
}

/// Names of the token claims holding each identity field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFields {
    /// Claim mapped to [`Claims::id`]
    pub id: String,
    /// Claim mapped to [`Claims::subject`]
    pub subject: String,
    /// Claim mapped to [`Claims::groups`]
    pub groups: String,
    /// Claim copied verbatim into [`Claims::extra`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl ClaimFields {
    /// Pull the mapped fields out of a verified claim set
    fn extract(&self, claims: &Map<String, Value>) -> std::result::Result<Claims, String> {
        let id = string_claim(claims, &self.id)?;
        let subject = string_claim(claims, &self.subject)?;

        let Some(Value::Array(items)) = claims.get(&self.groups) else {
            return Err(format!(
                "failed to cast {:?} claim to a list of strings",
                self.groups
            ));
        };
        let groups = items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(ToString::to_string)
                    .ok_or_else(|| format!("failed to cast group to string: {item}"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let extra = self
            .extra
            .as_deref()
            .and_then(|field| claims.get(field))
            .cloned()
            .unwrap_or(Value::Null);

        Ok(Claims {
            id,
            subject,
            groups,
            extra,
        })
    }
}

fn string_claim(claims: &Map<String, Value>, field: &str) -> std::result::Result<String, String> {
    claims
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| format!("failed to cast {field:?} claim to string"))
}

/// Signature family of an issuer key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// RSA (PKCS#1 v1.5 and PSS)
    Rsa,
    /// ECDSA on P-256 / P-384
    Ec,
    /// Ed25519
    Ed,
}

impl KeyFamily {
    /// Algorithms a token may declare when verified with a key of this family
    #[must_use]
    pub fn algorithms(self) -> &'static [Algorithm] {
        match self {
            Self::Rsa => &[
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            Self::Ec => &[Algorithm::ES256, Algorithm::ES384],
            Self::Ed => &[Algorithm::EdDSA],
        }
    }
}

/// Parsed key plus the verification rules bound to its family
struct IssuerKey {
    decoding: DecodingKey,
    family: KeyFamily,
    rules: jsonwebtoken::Validation,
}

/// A trusted issuer: key source, lazily resolved key, prefix policy
pub struct Issuer {
    name: String,
    key_source: PathBuf,
    assertion: Assertion,
    rules: jsonwebtoken::Validation,
    key: OnceCell<IssuerKey>,
}

// Manual Debug impl: DecodingKey is opaque
impl fmt::Debug for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issuer")
            .field("name", &self.name)
            .field("key_source", &self.key_source)
            .field("assertion", &self.assertion)
            .field("key", &self.key.get().map(|k| k.family))
            .finish_non_exhaustive()
    }
}

impl Issuer {
    fn new(name: String, config: IssuerConfig, audience: &[String], leeway: Duration) -> Self {
        let rules = base_rules(&name, audience, leeway);
        Self {
            key_source: PathBuf::from(config.public_key),
            assertion: Assertion {
                id_prefix: config.id_prefix,
                subject_prefix: config.subject_prefix,
                group_prefix: config.group_prefix,
            },
            rules,
            key: OnceCell::new(),
            name,
        }
    }

    /// Issuer identifier (`iss` value)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix policy applied to tokens from this issuer
    #[must_use]
    pub fn assertion(&self) -> &Assertion {
        &self.assertion
    }

    /// Whether the key has been loaded and cached
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.key.initialized()
    }

    /// Family of the cached key, if loaded
    #[must_use]
    pub fn key_family(&self) -> Option<KeyFamily> {
        self.key.get().map(|k| k.family)
    }

    /// Resolve the key, loading it on first use.
    ///
    /// Concurrent first callers wait on a single load. A failed load leaves
    /// the issuer unresolved so the next request retries.
    async fn key(&self) -> Result<&IssuerKey> {
        self.key.get_or_try_init(|| self.load_key()).await
    }

    async fn load_key(&self) -> Result<IssuerKey> {
        let key_load = |reason: String| Error::KeyLoad {
            issuer: self.name.clone(),
            reason,
        };

        let pem = tokio::fs::read(&self.key_source)
            .await
            .map_err(|e| key_load(format!("{}: {e}", self.key_source.display())))?;
        let (decoding, family) = parse_public_key(&pem).map_err(key_load)?;

        let fingerprint = hex::encode(Sha256::digest(&pem));
        info!(
            issuer = %self.name,
            path = %self.key_source.display(),
            family = ?family,
            fingerprint = %&fingerprint[..16],
            "Loaded issuer public key"
        );

        let mut rules = self.rules.clone();
        rules.algorithms = family.algorithms().to_vec();

        Ok(IssuerKey {
            decoding,
            family,
            rules,
        })
    }
}

/// Verification rules shared by every key family of one issuer
fn base_rules(issuer: &str, audience: &[String], leeway: Duration) -> jsonwebtoken::Validation {
    let mut rules = jsonwebtoken::Validation::default();
    // exp and nbf are checked only when present
    rules.required_spec_claims.clear();
    rules.validate_exp = true;
    rules.validate_nbf = true;
    rules.leeway = leeway.as_secs();
    rules.set_issuer(&[issuer]);
    if audience.is_empty() {
        rules.validate_aud = false;
    } else {
        rules.set_audience(audience);
        rules.set_required_spec_claims(&["aud"]);
    }
    rules
}

/// Parse PEM public key material into a decoding key and its family.
///
/// RSA, ECDSA and Ed25519 `PUBLIC KEY` blocks are accepted.
pub fn parse_public_key(pem: &[u8]) -> std::result::Result<(DecodingKey, KeyFamily), String> {
    if let Ok(key) = DecodingKey::from_rsa_pem(pem) {
        return Ok((key, KeyFamily::Rsa));
    }
    if let Ok(key) = DecodingKey::from_ec_pem(pem) {
        return Ok((key, KeyFamily::Ec));
    }
    if let Ok(key) = DecodingKey::from_ed_pem(pem) {
        return Ok((key, KeyFamily::Ed));
    }
    Err("unsupported or malformed PEM public key (expected RSA, EC or Ed25519)".to_string())
}

/// Structural parse of a compact JWS
fn parse_token(token: &str) -> std::result::Result<jsonwebtoken::Header, String> {
    let segments = token.split('.').count();
    if segments != 3 {
        return Err(format!(
            "compact JWS has {segments} segments, expected 3"
        ));
    }
    jsonwebtoken::decode_header(token).map_err(|e| e.to_string())
}

/// Read `iss` from the payload without checking the signature.
///
/// The value selects a key and nothing else. A missing `iss` reads as `""`.
fn unverified_issuer(token: &str) -> std::result::Result<String, String> {
    #[derive(Deserialize)]
    struct Unverified {
        #[serde(default)]
        iss: String,
    }

    let payload = token.split('.').nth(1).unwrap_or_default();
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| format!("payload is not base64url: {e}"))?;
    let claims: Unverified =
        serde_json::from_slice(&bytes).map_err(|e| format!("payload is not a claim set: {e}"))?;
    Ok(claims.iss)
}

/// Human-readable reason for a failed `jsonwebtoken::decode`
fn rejection_reason(err: &jsonwebtoken::errors::Error) -> String {
    match err.kind() {
        ErrorKind::ExpiredSignature
        | ErrorKind::ImmatureSignature
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::MissingRequiredClaim(_) => format!("Invalid token: {err}"),
        _ => format!("Failed to extract token claims: {err}"),
    }
}

/// JWT validator: one instance per declaration, issuers shared by every route
/// using the owning input
#[derive(Debug)]
pub struct JwtValidator {
    issuers: HashMap<String, Issuer>,
    claims: ClaimFields,
}

impl JwtValidator {
    /// Build from a decoded config body. Keys are not read here.
    pub fn from_config(config: JwtConfig) -> Result<Self> {
        for (field, name) in [
            ("id", &config.claims.id),
            ("subject", &config.claims.subject),
            ("groups", &config.claims.groups),
        ] {
            if name.is_empty() {
                return Err(Error::invalid_config(
                    TYPE_NAME,
                    format!("claims.{field} must name a token claim"),
                ));
            }
        }

        let mut issuers = HashMap::with_capacity(config.issuers.len());
        for (name, issuer) in config.issuers {
            if issuer.public_key.is_empty() {
                return Err(Error::invalid_config(
                    TYPE_NAME,
                    format!("issuer {name:?} has no publicKey"),
                ));
            }
            let issuer = Issuer::new(name.clone(), issuer, &config.audience, config.leeway);
            issuers.insert(name, issuer);
        }

        Ok(Self {
            issuers,
            claims: config.claims,
        })
    }

    /// Configured issuer by `iss` value
    #[must_use]
    pub fn issuer(&self, name: &str) -> Option<&Issuer> {
        self.issuers.get(name)
    }

    /// Every configured issuer
    pub fn issuers(&self) -> impl Iterator<Item = &Issuer> {
        self.issuers.values()
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn validate(&self, token: &str) -> Result<Validation> {
        if let Err(reason) = parse_token(token) {
            return Ok(Validation::invalid(format!(
                "Failed to parse token: {reason}"
            )));
        }

        let issuer_name = match unverified_issuer(token) {
            Ok(name) => name,
            Err(reason) => {
                return Ok(Validation::invalid(format!(
                    "Failed to extract token claims: {reason}"
                )));
            }
        };

        let Some(issuer) = self.issuers.get(&issuer_name) else {
            return Ok(Validation::invalid(format!(
                "Invalid token: unknown issuer {issuer_name:?}"
            )));
        };

        let key = issuer.key().await?;

        let verified =
            match jsonwebtoken::decode::<Map<String, Value>>(token, &key.decoding, &key.rules) {
                Ok(data) => data.claims,
                Err(e) => {
                    debug!(issuer = %issuer.name, error = %e, "Token verification failed");
                    return Ok(Validation::invalid(rejection_reason(&e)));
                }
            };

        let claims = match self.claims.extract(&verified) {
            Ok(claims) => claims,
            Err(reason) => return Ok(Validation::invalid(format!("Invalid token: {reason}"))),
        };

        let mut validation = Validation::valid(claims);
        validation.assert(&issuer.assertion);
        Ok(validation)
    }
}
