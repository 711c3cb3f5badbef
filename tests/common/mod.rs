//! Shared helpers for integration tests: fixture keys and token minting
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use auth_mux::token::jwt::{JwtConfig, JwtValidator};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

pub const ISSUER: &str = "https://idp.example";
pub const AUDIENCE: &str = "auth-mux";

pub const EC_PRIVATE: &str = include_str!("../fixtures/ec_private.pem");
pub const EC_OTHER_PRIVATE: &str = include_str!("../fixtures/ec_other_private.pem");
pub const RSA_PRIVATE: &str = include_str!("../fixtures/rsa_private.pem");
pub const ED_PRIVATE: &str = include_str!("../fixtures/ed_private.pem");

/// Absolute path of a file under `tests/fixtures`
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Copy a fixture into `dir` so the test owns the file
pub fn copy_fixture(dir: &Path, name: &str) -> PathBuf {
    let target = dir.join(name);
    std::fs::copy(fixture(name), &target).unwrap();
    target
}

pub fn now() -> i64 {
    i64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs(),
    )
    .unwrap()
}

/// Standard claim set for `ISSUER`, valid for an hour
pub fn claims(id: &str, subject: &str, groups: &[&str]) -> Value {
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now(),
        "exp": now() + 3600,
        "uid": id,
        "sub": subject,
        "groups": groups,
    })
}

pub fn mint(alg: Algorithm, private_pem: &str, claims: &Value) -> String {
    let key = match alg {
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(private_pem.as_bytes()),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(private_pem.as_bytes()),
        _ => EncodingKey::from_rsa_pem(private_pem.as_bytes()),
    }
    .unwrap();
    jsonwebtoken::encode(&Header::new(alg), claims, &key).unwrap()
}

/// ES256 token signed with the `ec_private.pem` fixture
pub fn mint_es256(claims: &Value) -> String {
    mint(Algorithm::ES256, EC_PRIVATE, claims)
}

/// Validator config body trusting `ISSUER` with the key at `public_key`
pub fn jwt_config(public_key: &Path, id_prefix: &str) -> Value {
    json!({
        "audience": [AUDIENCE],
        "issuers": {
            ISSUER: {"publicKey": public_key, "idPrefix": id_prefix}
        },
        "claims": {"id": "uid", "subject": "sub", "groups": "groups", "extra": "ext"}
    })
}

pub fn validator(config: Value) -> JwtValidator {
    let config: JwtConfig = serde_json::from_value(config).unwrap();
    JwtValidator::from_config(config).unwrap()
}

/// Validator trusting `ISSUER` with the EC fixture key
pub fn ec_validator(id_prefix: &str) -> JwtValidator {
    validator(jwt_config(&fixture("ec_public.pem"), id_prefix))
}
