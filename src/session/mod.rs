//! Session authority, shared wiring, and the token-keyed session manager.

pub mod authority;
pub mod manager;
mod token;

pub use authority::{LoginOutcome, NewProfile, ProfileUpdate, SessionAuthority, SessionStatus};
pub use manager::SessionManager;

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::credential::CredentialVerifier;
use crate::observe::{ObservabilitySink, TracingSink};
use crate::roles::{RoleRegistry, RoleResolver};
use crate::store::IdentityStore;

/// Shared collaborators from which per-request session authorities are built.
///
/// Construct once at startup, after the role registry is fully populated.
#[derive(Clone)]
pub struct AuthCore {
    store: Arc<dyn IdentityStore>,
    registry: Arc<RoleRegistry>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ObservabilitySink>,
    config: AuthConfig,
}

impl AuthCore {
    /// Wire up the core with the system clock and the tracing sink.
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, registry: Arc<RoleRegistry>, config: AuthConfig) -> Self {
        Self {
            store,
            registry,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            config: config.normalize(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// A fresh anonymous session.
    #[must_use]
    pub fn session(&self) -> SessionAuthority {
        let verifier =
            CredentialVerifier::new(self.store.clone(), self.clock.clone(), self.sink.clone());
        let resolver = RoleResolver::new(self.registry.clone(), self.sink.clone());
        SessionAuthority::new(
            verifier,
            resolver,
            self.store.clone(),
            self.clock.clone(),
            self.sink.clone(),
            self.config.clone(),
        )
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
