use super::*;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

const SECRET: &str = "test-secret";

fn sign(claims: &serde_json::Value, secret: &str) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).expect("token should encode")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

#[test]
fn string_user_id_is_accepted() {
    let verifier = JwtVerifier::new(SECRET);
    let token = sign(&json!({"userId": "0b6f3c3e-user"}), SECRET);

    assert_eq!(verifier.verify(&token).unwrap(), "0b6f3c3e-user");
}

#[test]
fn numeric_user_id_is_stringified() {
    let verifier = JwtVerifier::new(SECRET);
    let token = sign(&json!({"userId": 42}), SECRET);

    assert_eq!(verifier.verify(&token).unwrap(), "42");
}

#[test]
fn token_without_exp_is_accepted_and_future_exp_too() {
    let verifier = JwtVerifier::new(SECRET);
    let token = sign(&json!({"userId": "u1", "exp": now_secs() + 3600}), SECRET);

    assert_eq!(verifier.verify(&token).unwrap(), "u1");
}

#[test]
fn expired_token_is_rejected() {
    let verifier = JwtVerifier::new(SECRET);
    let token = sign(&json!({"userId": "u1", "exp": now_secs() - 3600}), SECRET);

    assert!(matches!(verifier.verify(&token), Err(AuthError::Invalid(_))));
}

#[test]
fn wrong_secret_is_rejected() {
    let verifier = JwtVerifier::new(SECRET);
    let token = sign(&json!({"userId": "u1"}), "some-other-secret");

    assert!(matches!(verifier.verify(&token), Err(AuthError::Invalid(_))));
}

#[test]
fn garbage_and_empty_tokens_are_rejected() {
    let verifier = JwtVerifier::new(SECRET);

    assert!(matches!(verifier.verify("not.a.jwt"), Err(AuthError::Invalid(_))));
    assert!(matches!(verifier.verify(""), Err(AuthError::MissingToken)));
}

#[test]
fn token_without_identity_is_rejected() {
    let verifier = JwtVerifier::new(SECRET);

    let token = sign(&json!({"sub": "u1"}), SECRET);
    assert!(matches!(verifier.verify(&token), Err(AuthError::MissingIdentity)));

    let token = sign(&json!({"userId": ""}), SECRET);
    assert!(matches!(verifier.verify(&token), Err(AuthError::MissingIdentity)));
}
