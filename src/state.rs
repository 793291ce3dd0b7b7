//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the relay (which owns the connection registry and the shape store)
//! and the credential verifier used at upgrade time. Clone is required by
//! Axum; every field is Arc-wrapped.

use std::sync::Arc;

use crate::auth::CredentialVerifier;
use crate::registry::ConnectionRegistry;
use crate::relay::Relay;
use crate::store::ShapeStore;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: ConnectionRegistry, store: Arc<dyn ShapeStore>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { relay: Arc::new(Relay::new(registry, store)), verifier }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
