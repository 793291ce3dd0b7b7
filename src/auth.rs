//! Credential verification for websocket connects.
//!
//! ARCHITECTURE
//! ============
//! Clients connect with `?token=<jwt>`; the token is issued by the account
//! service and signed with the shared `JWT_SECRET`. Verification happens once
//! per connection, before the upgrade. A rejected credential never reaches
//! the relay.
//!
//! TRADE-OFFS
//! ==========
//! Tokens issued by the account service carry no `exp`, so expiry is checked
//! only when the claim is present.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::Value;

/// Verifies an opaque bearer credential and yields a stable user identity.
pub trait CredentialVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns an `AuthError` if the credential is missing, forged, expired,
    /// or carries no identity.
    fn verify(&self, token: &str) -> Result<String, AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credential missing")]
    MissingToken,
    #[error("credential rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("credential carries no user identity")]
    MissingIdentity,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(rename = "userId", default)]
    user_id: Value,
}

/// HS256 JWT verifier.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        Self { key: DecodingKey::from_secret(secret.as_bytes()), validation }
    }
}

impl CredentialVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        match data.claims.user_id {
            Value::String(id) if !id.is_empty() => Ok(id),
            Value::Number(id) => Ok(id.to_string()),
            _ => Err(AuthError::MissingIdentity),
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
