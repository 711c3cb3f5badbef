//! Token validation benchmarks.
//!
//! ```bash
//! cargo bench --bench validation
//! cargo bench --bench validation -- jwt_validate
//! ```
//!
//! Keys are resolved before measurement, so every iteration hits the issuer
//! key cache.

#[path = "../tests/common/mod.rs"]
mod common;

use std::hint::black_box;

use auth_mux::token::TokenValidator;
use auth_mux::types::{Assertion, Claims, Validation};
use criterion::{Criterion, criterion_group, criterion_main};
use jsonwebtoken::Algorithm;

use common::{ED_PRIVATE, RSA_PRIVATE, claims, fixture, jwt_config, mint, mint_es256, validator};

fn bench_jwt_validate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("jwt_validate");

    for (label, public, token) in [
        (
            "es256",
            "ec_public.pem",
            mint_es256(&claims("user:42", "alice", &["team:dev"])),
        ),
        (
            "rs256",
            "rsa_public.pem",
            mint(Algorithm::RS256, RSA_PRIVATE, &claims("user:42", "alice", &["team:dev"])),
        ),
        (
            "eddsa",
            "ed_public.pem",
            mint(Algorithm::EdDSA, ED_PRIVATE, &claims("user:42", "alice", &["team:dev"])),
        ),
    ] {
        let validator = validator(jwt_config(&fixture(public), "user:"));
        let warm = rt.block_on(validator.validate(&token)).unwrap();
        assert!(warm.valid, "{label}: {}", warm.error);

        group.bench_function(label, |b| {
            b.iter(|| rt.block_on(validator.validate(black_box(&token))).unwrap());
        });
    }

    let validator = validator(jwt_config(&fixture("ec_public.pem"), ""));
    group.bench_function("malformed", |b| {
        b.iter(|| rt.block_on(validator.validate(black_box("not.a.jwt"))).unwrap());
    });

    group.finish();
}

fn bench_assertion(c: &mut Criterion) {
    let assertion = Assertion {
        id_prefix: "user:".to_string(),
        subject_prefix: String::new(),
        group_prefix: "team:".to_string(),
    };
    let claims = Claims {
        id: "admin:1".to_string(),
        subject: "mallory".to_string(),
        groups: (0..32).map(|i| format!("group-{i}")).collect(),
        extra: serde_json::Value::Null,
    };

    c.bench_function("assert_prefixes", |b| {
        b.iter(|| {
            let mut validation = Validation::valid(claims.clone());
            validation.assert(black_box(&assertion));
            validation
        });
    });
}

criterion_group!(benches, bench_jwt_validate, bench_assertion);
criterion_main!(benches);
