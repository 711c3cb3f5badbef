//! Token validator behavior against real signed tokens

mod common;

use std::sync::Arc;

use auth_mux::Error;
use auth_mux::token::TokenValidator;
use auth_mux::token::jwt::KeyFamily;
use auth_mux::types::{Claims, Validation};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::Algorithm;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::{
    AUDIENCE, EC_OTHER_PRIVATE, ED_PRIVATE, ISSUER, RSA_PRIVATE, claims, copy_fixture,
    ec_validator, fixture, jwt_config, mint, mint_es256, now, validator,
};

// ============================================================================
// Accepted tokens
// ============================================================================

#[tokio::test]
async fn valid_token_yields_mapped_claims() {
    // GIVEN: issuer with idPrefix "user:" and a matching token
    let validator = ec_validator("user:");
    let token = mint_es256(&claims("user:42", "alice", &["team:dev"]));

    // WHEN: validated
    let validation = validator.validate(&token).await.unwrap();

    // THEN: accepted with exactly the mapped fields
    assert_eq!(
        validation,
        Validation {
            valid: true,
            error: String::new(),
            claims: Claims {
                id: "user:42".to_string(),
                subject: "alice".to_string(),
                groups: vec!["team:dev".to_string()],
                extra: Value::Null,
            },
        }
    );
}

#[tokio::test]
async fn extra_claim_is_carried_verbatim() {
    let validator = ec_validator("");
    let mut token_claims = claims("user:1", "bob", &[]);
    token_claims["ext"] = json!({"dept": "r&d", "scopes": ["read"]});

    let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();

    assert!(validation.valid, "{}", validation.error);
    assert_eq!(validation.claims.extra, json!({"dept": "r&d", "scopes": ["read"]}));
}

#[tokio::test]
async fn rsa_and_ed25519_issuers() {
    for (public, private, algs) in [
        (
            "rsa_public.pem",
            RSA_PRIVATE,
            vec![Algorithm::RS256, Algorithm::RS512, Algorithm::PS256],
        ),
        ("ed_public.pem", ED_PRIVATE, vec![Algorithm::EdDSA]),
    ] {
        let validator = validator(jwt_config(&fixture(public), "user:"));
        for alg in algs {
            let token = mint(alg, private, &claims("user:7", "carol", &["ops"]));
            let validation = validator.validate(&token).await.unwrap();
            assert!(validation.valid, "{alg:?}: {}", validation.error);
        }
    }
}

#[tokio::test]
async fn empty_audience_list_skips_audience_check() {
    // GIVEN: no acceptable audiences configured, token without aud
    let validator = validator(json!({
        "issuers": {ISSUER: {"publicKey": fixture("ec_public.pem")}},
        "claims": {"id": "uid", "subject": "sub", "groups": "groups"}
    }));
    let mut token_claims = claims("user:1", "bob", &[]);
    token_claims.as_object_mut().unwrap().remove("aud");

    // THEN: accepted
    let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();
    assert!(validation.valid, "{}", validation.error);
}

#[tokio::test]
async fn any_configured_audience_is_enough() {
    let mut config = jwt_config(&fixture("ec_public.pem"), "");
    config["audience"] = json!(["kubernetes", AUDIENCE]);
    let validator = validator(config);

    let mut token_claims = claims("user:1", "bob", &[]);
    token_claims["aud"] = json!(["other", AUDIENCE]);

    let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();
    assert!(validation.valid, "{}", validation.error);
}

#[tokio::test]
async fn exp_and_nbf_are_optional() {
    let validator = ec_validator("");
    let mut token_claims = claims("user:1", "bob", &[]);
    let map = token_claims.as_object_mut().unwrap();
    map.remove("exp");
    map.remove("iat");

    let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();
    assert!(validation.valid, "{}", validation.error);
}

#[tokio::test]
async fn expiry_within_leeway_is_accepted() {
    let validator = ec_validator("");
    let mut token_claims = claims("user:1", "bob", &[]);
    token_claims["exp"] = json!(now() - 10);

    let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();
    assert!(validation.valid, "{}", validation.error);
}

// ============================================================================
// Prefix assertions
// ============================================================================

#[tokio::test]
async fn id_prefix_violation() {
    let validator = ec_validator("user:");
    let token = mint_es256(&claims("admin:42", "alice", &["team:dev"]));

    let validation = validator.validate(&token).await.unwrap();

    assert!(!validation.valid);
    assert_eq!(validation.error, r#"Expected ID "admin:42" to have prefix "user:""#);
    // Claims stay populated so the caller can see what was rejected
    assert_eq!(validation.claims.id, "admin:42");
}

#[tokio::test]
async fn independent_violations_accumulate() {
    // GIVEN: issuer requiring id, subject and group prefixes
    let validator = validator(json!({
        "audience": [AUDIENCE],
        "issuers": {ISSUER: {
            "publicKey": fixture("ec_public.pem"),
            "idPrefix": "user:",
            "subjectPrefix": "svc-",
            "groupPrefix": "team:"
        }},
        "claims": {"id": "uid", "subject": "sub", "groups": "groups"}
    }));
    // AND: a token violating the id and group rules
    let token = mint_es256(&claims("admin:42", "svc-builder", &["team:dev", "wheel"]));

    // WHEN: validated
    let validation = validator.validate(&token).await.unwrap();

    // THEN: both violations reported
    assert!(!validation.valid);
    assert!(validation.error.contains(r#"Expected ID "admin:42" to have prefix "user:""#));
    assert!(validation.error.contains(r#"Expected group "wheel" to have prefix "team:""#));
    assert_eq!(validation.reasons().count(), 2);
}

// ============================================================================
// Rejected tokens
// ============================================================================

#[tokio::test]
async fn unknown_issuer_is_a_rejection() {
    let validator = ec_validator("");
    let mut token_claims = claims("user:1", "bob", &[]);
    token_claims["iss"] = json!("https://evil.example");

    let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();

    assert!(!validation.valid);
    assert_eq!(
        validation.error,
        r#"Invalid token: unknown issuer "https://evil.example""#
    );
}

#[tokio::test]
async fn wrong_signing_key_is_rejected_without_claims() {
    let validator = ec_validator("");
    let token = mint(
        Algorithm::ES256,
        EC_OTHER_PRIVATE,
        &claims("user:1", "bob", &["team:dev"]),
    );

    let validation = validator.validate(&token).await.unwrap();

    assert!(!validation.valid);
    assert!(
        validation.error.starts_with("Failed to extract token claims: "),
        "{}",
        validation.error
    );
    assert_eq!(validation.claims, Claims::default());
}

#[tokio::test]
async fn tampered_payload_is_rejected_without_claims() {
    // GIVEN: a valid token whose payload is swapped for an elevated one
    let validator = ec_validator("user:");
    let token = mint_es256(&claims("user:42", "alice", &["team:dev"]));
    let forged = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&claims("user:42", "alice", &["team:admin"])).unwrap(),
    );
    let parts: Vec<&str> = token.split('.').collect();
    let tampered = format!("{}.{forged}.{}", parts[0], parts[2]);

    // WHEN: validated
    let validation = validator.validate(&tampered).await.unwrap();

    // THEN: signature failure, nothing extracted
    assert!(!validation.valid);
    assert_eq!(validation.claims, Claims::default());
}

#[tokio::test]
async fn algorithm_outside_key_family_is_rejected() {
    // GIVEN: an EC issuer and an RS256 token claiming that issuer
    let validator = ec_validator("");
    let token = mint(Algorithm::RS256, RSA_PRIVATE, &claims("user:1", "bob", &[]));

    let validation = validator.validate(&token).await.unwrap();

    assert!(!validation.valid);
    assert_eq!(validation.claims, Claims::default());
}

#[tokio::test]
async fn expired_token() {
    let validator = ec_validator("");
    let mut token_claims = claims("user:1", "bob", &[]);
    token_claims["exp"] = json!(now() - 3600);

    let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();

    assert!(!validation.valid);
    assert!(validation.error.starts_with("Invalid token: "), "{}", validation.error);
}

#[tokio::test]
async fn not_yet_valid_token() {
    let validator = ec_validator("");
    let mut token_claims = claims("user:1", "bob", &[]);
    token_claims["nbf"] = json!(now() + 3600);

    let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();

    assert!(!validation.valid);
    assert!(validation.error.starts_with("Invalid token: "), "{}", validation.error);
}

#[tokio::test]
async fn wrong_or_missing_audience() {
    let validator = ec_validator("");

    let mut wrong = claims("user:1", "bob", &[]);
    wrong["aud"] = json!("someone-else");
    let mut missing = claims("user:1", "bob", &[]);
    missing.as_object_mut().unwrap().remove("aud");

    for token_claims in [wrong, missing] {
        let validation = validator.validate(&mint_es256(&token_claims)).await.unwrap();
        assert!(!validation.valid);
        assert!(validation.error.starts_with("Invalid token: "), "{}", validation.error);
    }
}

#[tokio::test]
async fn malformed_tokens() {
    let validator = ec_validator("");
    for token in ["", "not-a-jwt", "a.b", "a.b.c.d", "%%%.%%%.%%%"] {
        let validation = validator.validate(token).await.unwrap();
        assert!(!validation.valid, "{token:?}");
        assert!(
            validation.error.starts_with("Failed to parse token: "),
            "{token:?}: {}",
            validation.error
        );
    }
}

#[tokio::test]
async fn mistyped_claims_name_the_field() {
    let validator = ec_validator("");

    let mut numeric_id = claims("user:1", "bob", &[]);
    numeric_id["uid"] = json!(42);
    let validation = validator.validate(&mint_es256(&numeric_id)).await.unwrap();
    assert_eq!(
        validation.error,
        r#"Invalid token: failed to cast "uid" claim to string"#
    );

    let mut scalar_groups = claims("user:1", "bob", &[]);
    scalar_groups["groups"] = json!("team:dev");
    let validation = validator.validate(&mint_es256(&scalar_groups)).await.unwrap();
    assert_eq!(
        validation.error,
        r#"Invalid token: failed to cast "groups" claim to a list of strings"#
    );
}

// ============================================================================
// Key resolution
// ============================================================================

#[tokio::test]
async fn unreadable_key_is_a_system_error() {
    let validator = validator(jwt_config(
        std::path::Path::new("/nonexistent/idp.pem"),
        "",
    ));
    let token = mint_es256(&claims("user:1", "bob", &[]));

    let err = validator.validate(&token).await.unwrap_err();

    assert!(
        matches!(&err, Error::KeyLoad { issuer, .. } if issuer == ISSUER),
        "{err}"
    );
    assert!(!validator.issuer(ISSUER).unwrap().is_resolved());
}

#[tokio::test]
async fn dsa_key_is_a_system_error() {
    let validator = validator(jwt_config(&fixture("dsa_public.pem"), ""));
    let token = mint_es256(&claims("user:1", "bob", &[]));

    let err = validator.validate(&token).await.unwrap_err();
    assert!(matches!(err, Error::KeyLoad { .. }), "{err}");
}

#[tokio::test]
async fn key_is_loaded_once_and_cached() {
    // GIVEN: a validator whose key file the test owns
    let dir = tempfile::tempdir().unwrap();
    let key_path = copy_fixture(dir.path(), "ec_public.pem");
    let validator = validator(jwt_config(&key_path, "user:"));
    let token = mint_es256(&claims("user:42", "alice", &["team:dev"]));

    // WHEN: validated once, the key file removed, validated again
    let first = validator.validate(&token).await.unwrap();
    std::fs::remove_file(&key_path).unwrap();
    let second = validator.validate(&token).await.unwrap();

    // THEN: identical results, the second served from the cached key
    assert!(first.valid, "{}", first.error);
    assert_eq!(first, second);
    let issuer = validator.issuer(ISSUER).unwrap();
    assert!(issuer.is_resolved());
    assert_eq!(issuer.key_family(), Some(KeyFamily::Ec));
}

#[tokio::test]
async fn failed_key_load_is_retried() {
    // GIVEN: the key file is missing at first use
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("late.pem");
    let validator = validator(jwt_config(&key_path, ""));
    let token = mint_es256(&claims("user:1", "bob", &[]));
    assert!(validator.validate(&token).await.is_err());

    // WHEN: the file appears
    std::fs::copy(fixture("ec_public.pem"), &key_path).unwrap();

    // THEN: the next request loads it
    let validation = validator.validate(&token).await.unwrap();
    assert!(validation.valid, "{}", validation.error);
}

#[tokio::test]
async fn rejected_token_still_resolves_the_key() {
    // Unknown-issuer rejections happen before key resolution; bad signatures after
    let validator = ec_validator("");
    let token = mint(Algorithm::ES256, EC_OTHER_PRIVATE, &claims("user:1", "bob", &[]));

    let validation = validator.validate(&token).await.unwrap();

    assert!(!validation.valid);
    assert!(validator.issuer(ISSUER).unwrap().is_resolved());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_is_safe() {
    // GIVEN: a fresh issuer and many simultaneous first requests
    let validator = Arc::new(ec_validator("user:"));
    let token = mint_es256(&claims("user:42", "alice", &["team:dev"]));

    // WHEN: they race to resolve the key
    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let validator = Arc::clone(&validator);
            let token = token.clone();
            tokio::spawn(async move { validator.validate(&token).await })
        })
        .collect();
    let results = futures::future::join_all(tasks).await;

    // THEN: every request sees the same accepted validation
    let expected = validator.validate(&token).await.unwrap();
    assert!(expected.valid, "{}", expected.error);
    for result in results {
        assert_eq!(result.unwrap().unwrap(), expected);
    }
    assert!(validator.issuer(ISSUER).unwrap().is_resolved());
}
