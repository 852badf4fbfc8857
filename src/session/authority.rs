//! The per-session authentication state machine.
//!
//! A session is exactly one of `Anonymous`, `Transitional` (a federated
//! identity was presented but is not linked yet), or `Authenticated`. All
//! transitions happen through the methods below; every failure leaves the
//! state exactly as it was.
//!
//! Expiry is lazy: each entry point first checks whether an authenticated
//! session has outlived its inactivity window and demotes it to `Anonymous`
//! before doing anything else. Successful authenticated operations push the
//! window forward.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::account::{Account, FederatedClaim, FederatedIdentity};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::credential::CredentialVerifier;
use crate::error::Error;
use crate::observe::{AuthEvent, ObservabilitySink};
use crate::roles::RoleResolver;
use crate::store::{IdentityStore, StoreError};
use crate::utils::{normalize_email, valid_email};

/// Where a session currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Transitional,
    Authenticated,
}

#[derive(Clone, Copy, Debug)]
enum SessionState {
    Anonymous,
    Transitional,
    Authenticated {
        guid: Uuid,
        expires_at: DateTime<Utc>,
    },
}

/// Result of a federated login attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(Uuid),
    /// The identity is unlinked; the session is transitional until the
    /// caller completes registration or associates an existing account.
    RegistrationRequired,
}

/// Profile data for completing registration from a pending federated claim.
///
/// Fields left empty fall back to what the provider asserted in the claim.
#[derive(Debug, Default)]
pub struct NewProfile {
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Optional local credential so the member can also log in with a
    /// password.
    pub secret: Option<SecretString>,
}

/// Partial profile edit for the authenticated account.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub secret: Option<SecretString>,
}

/// Roles and permissions resolved for the authenticated account, memoized
/// for the session lifetime.
#[derive(Debug)]
struct AccessSet {
    roles: BTreeSet<String>,
    permissions: BTreeSet<String>,
}

pub struct SessionAuthority {
    verifier: CredentialVerifier,
    resolver: RoleResolver,
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ObservabilitySink>,
    config: AuthConfig,
    state: SessionState,
    pending_claim: Option<FederatedClaim>,
    access: Option<AccessSet>,
}

impl SessionAuthority {
    pub(crate) fn new(
        verifier: CredentialVerifier,
        resolver: RoleResolver,
        store: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn ObservabilitySink>,
        config: AuthConfig,
    ) -> Self {
        Self {
            verifier,
            resolver,
            store,
            clock,
            sink,
            config,
            state: SessionState::Anonymous,
            pending_claim: None,
            access: None,
        }
    }

    /// Log in with a local email + secret.
    ///
    /// Succeeding while already authenticated re-verifies and replaces the
    /// session's identity; the cached access set is dropped with it.
    pub fn login_local(
        &mut self,
        email: &str,
        secret: &SecretString,
        addr: Option<IpAddr>,
    ) -> Result<Uuid, Error> {
        self.check_expiry();
        let account = self.verifier.verify_local(email, secret, addr)?;
        self.authenticate(account.guid);
        info!(guid = %account.guid, "local login");
        Ok(account.guid)
    }

    /// Log in with a federated identity assertion.
    ///
    /// A linked identity authenticates immediately. An unlinked identity
    /// parks the claim on the session and, from `Anonymous`, moves to
    /// `Transitional`; an already-authenticated session keeps its identity
    /// so the claim can be associated instead.
    pub fn login_federated(
        &mut self,
        claim: FederatedClaim,
        addr: Option<IpAddr>,
    ) -> Result<LoginOutcome, Error> {
        self.check_expiry();
        match self.verifier.verify_federated(&claim, addr)? {
            Some(account) => {
                info!(guid = %account.guid, provider = %claim.provider, "federated login");
                self.authenticate(account.guid);
                self.pending_claim = None;
                Ok(LoginOutcome::Authenticated(account.guid))
            }
            None => {
                info!(provider = %claim.provider, "unlinked federated identity presented");
                if matches!(self.state, SessionState::Anonymous) {
                    self.state = SessionState::Transitional;
                }
                self.pending_claim = Some(claim);
                Ok(LoginOutcome::RegistrationRequired)
            }
        }
    }

    /// Create an account for the pending federated identity and log in.
    ///
    /// Only valid while `Transitional`. The new account gets the configured
    /// default roles, the email/display name from the profile (falling back
    /// to the provider's claims), and an optional local credential.
    pub fn complete_registration(
        &mut self,
        profile: NewProfile,
        addr: Option<IpAddr>,
    ) -> Result<Uuid, Error> {
        self.check_expiry();
        if !matches!(self.state, SessionState::Transitional) {
            return Err(Error::NoPendingIdentity);
        }
        let Some(claim) = self.pending_claim.clone() else {
            return Err(Error::NoPendingIdentity);
        };

        let email = match profile.email.as_deref().or_else(|| claim.email()) {
            Some(raw) => normalize_email(raw),
            None => return Err(Error::InvalidEmail),
        };
        if !valid_email(&email) {
            return Err(Error::InvalidEmail);
        }

        let mut account =
            Account::new(email).with_roles(self.config.default_roles().iter().cloned());
        account.display_name = profile
            .display_name
            .or_else(|| claim.display_name().map(ToString::to_string));
        if let Some(secret) = &profile.secret {
            account.password_hash = Some(self.verifier.hash_secret(secret)?);
        }
        account.last_seen_at = Some(self.clock.now());
        account.last_seen_addr = addr;

        self.store.save_account(&account)?;

        let link = FederatedIdentity {
            provider: claim.provider.clone(),
            subject: claim.subject.clone(),
            guid: account.guid,
            linked_at: self.clock.now(),
        };
        if let Err(err) = self.store.save_federated_identity(&link) {
            return Err(self.map_link_error(err, &claim, account.guid));
        }

        info!(guid = %account.guid, provider = %claim.provider, "registration completed");
        self.pending_claim = None;
        self.authenticate(account.guid);
        Ok(account.guid)
    }

    /// Link a federated identity to the currently authenticated account.
    ///
    /// Linking a pair already owned by this account is a no-op; a pair owned
    /// by a different account fails with [`Error::AlreadyLinkedElsewhere`]
    /// and the session is untouched.
    pub fn associate(&mut self, claim: &FederatedClaim) -> Result<(), Error> {
        self.check_expiry();
        let SessionState::Authenticated { guid, .. } = self.state else {
            return Err(Error::NotAuthenticated);
        };

        if let Some(existing) = self
            .store
            .federated_identity(&claim.provider, &claim.subject)?
        {
            if existing.guid == guid {
                self.clear_matching_pending(claim);
                self.touch();
                return Ok(());
            }
            self.sink.record(&AuthEvent::AssociationConflict {
                provider: claim.provider.clone(),
                subject: claim.subject.clone(),
                linked_guid: existing.guid,
                attempted_guid: guid,
            });
            return Err(Error::AlreadyLinkedElsewhere);
        }

        let link = FederatedIdentity {
            provider: claim.provider.clone(),
            subject: claim.subject.clone(),
            guid,
            linked_at: self.clock.now(),
        };
        if let Err(err) = self.store.save_federated_identity(&link) {
            return Err(self.map_link_error(err, claim, guid));
        }

        info!(%guid, provider = %claim.provider, "federated identity associated");
        self.clear_matching_pending(claim);
        self.touch();
        Ok(())
    }

    /// Associate the claim parked on this session during a federated login.
    pub fn associate_pending(&mut self) -> Result<(), Error> {
        let Some(claim) = self.pending_claim.clone() else {
            return Err(Error::NoPendingIdentity);
        };
        self.associate(&claim)
    }

    /// Drop all session state. Idempotent.
    pub fn logout(&mut self) {
        if !matches!(self.state, SessionState::Anonymous) {
            info!("logout");
        }
        self.state = SessionState::Anonymous;
        self.pending_claim = None;
        self.access = None;
    }

    /// Edit the authenticated account's profile.
    pub fn update_profile(&mut self, update: ProfileUpdate) -> Result<(), Error> {
        self.check_expiry();
        let SessionState::Authenticated { guid, .. } = self.state else {
            return Err(Error::NotAuthenticated);
        };
        let Some(mut account) = self.store.account_by_guid(guid)? else {
            return Err(Error::NotAuthenticated);
        };
        if !account.enabled {
            return Err(Error::AccountDisabled);
        }

        if let Some(raw) = &update.email {
            let email = normalize_email(raw);
            if !valid_email(&email) {
                return Err(Error::InvalidEmail);
            }
            account.email = email;
        }
        if let Some(name) = update.display_name {
            account.display_name = Some(name);
        }
        if let Some(secret) = &update.secret {
            account.password_hash = Some(self.verifier.hash_secret(secret)?);
        }

        self.store.save_account(&account)?;
        info!(%guid, "profile updated");
        self.touch();
        Ok(())
    }

    /// Provider names linked to the authenticated account; empty otherwise.
    pub fn providers(&mut self) -> Vec<String> {
        self.check_expiry();
        let SessionState::Authenticated { guid, .. } = self.state else {
            return Vec::new();
        };
        match self.store.federated_identities_for(guid) {
            Ok(links) => {
                self.touch();
                links.into_iter().map(|link| link.provider).collect()
            }
            Err(err) => {
                error!("failed to list federated identities: {err}");
                Vec::new()
            }
        }
    }

    /// The authenticated account, freshly loaded from the store.
    pub fn current_account(&mut self) -> Option<Account> {
        self.check_expiry();
        let SessionState::Authenticated { guid, .. } = self.state else {
            return None;
        };
        match self.store.account_by_guid(guid) {
            Ok(Some(account)) => {
                self.touch();
                Some(account)
            }
            Ok(None) => None,
            Err(err) => {
                error!("failed to load account: {err}");
                None
            }
        }
    }

    pub fn status(&mut self) -> SessionStatus {
        self.check_expiry();
        match self.state {
            SessionState::Anonymous => SessionStatus::Anonymous,
            SessionState::Transitional => SessionStatus::Transitional,
            SessionState::Authenticated { .. } => SessionStatus::Authenticated,
        }
    }

    pub fn is_authenticated(&mut self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn is_transitional(&mut self) -> bool {
        self.status() == SessionStatus::Transitional
    }

    pub fn current_guid(&mut self) -> Option<Uuid> {
        self.check_expiry();
        match self.state {
            SessionState::Authenticated { guid, .. } => Some(guid),
            _ => None,
        }
    }

    /// The federated claim parked by an unlinked federated login, if any.
    #[must_use]
    pub fn pending_claim(&self) -> Option<&FederatedClaim> {
        self.pending_claim.as_ref()
    }

    /// Whether the authenticated account holds the role. Anything short of a
    /// fully authenticated session answers `false`; this never errors.
    pub fn has_role(&mut self, role: &str) -> bool {
        self.check_expiry();
        let Some(access) = self.ensure_access() else {
            return false;
        };
        let hit = access.roles.contains(role);
        self.touch();
        hit
    }

    /// Whether the authenticated account holds any of the roles.
    pub fn has_any_role(&mut self, roles: &[&str]) -> bool {
        self.check_expiry();
        let Some(access) = self.ensure_access() else {
            return false;
        };
        let hit = roles.iter().any(|role| access.roles.contains(*role));
        self.touch();
        hit
    }

    /// Whether the effective permission set contains the permission.
    pub fn has_permission(&mut self, permission: &str) -> bool {
        self.check_expiry();
        let Some(access) = self.ensure_access() else {
            return false;
        };
        let hit = access.permissions.contains(permission);
        self.touch();
        hit
    }

    fn authenticate(&mut self, guid: Uuid) {
        self.state = SessionState::Authenticated {
            guid,
            expires_at: self.clock.now() + self.config.session_ttl(),
        };
        self.access = None;
    }

    fn check_expiry(&mut self) {
        if let SessionState::Authenticated { guid, expires_at } = self.state {
            if self.clock.now() >= expires_at {
                debug!(%guid, "session expired");
                self.state = SessionState::Anonymous;
                self.access = None;
            }
        }
    }

    /// Push the inactivity window forward after a successful authenticated
    /// operation.
    fn touch(&mut self) {
        if let SessionState::Authenticated { guid, .. } = self.state {
            self.state = SessionState::Authenticated {
                guid,
                expires_at: self.clock.now() + self.config.session_ttl(),
            };
        }
    }

    /// Resolve and memoize the access set for the authenticated account.
    /// Store failures resolve to no access rather than an error.
    fn ensure_access(&mut self) -> Option<&AccessSet> {
        let SessionState::Authenticated { guid, .. } = self.state else {
            return None;
        };
        if self.access.is_none() {
            let names = match self.store.roles_for_guid(guid) {
                Ok(names) => names,
                Err(err) => {
                    error!(%guid, "failed to load roles: {err}");
                    return None;
                }
            };
            let roles = self.resolver.resolve(&names);
            let permissions = self.resolver.effective_permissions(&roles);
            let roles = roles.into_iter().map(|role| role.name).collect();
            self.access = Some(AccessSet { roles, permissions });
        }
        self.access.as_ref()
    }

    fn map_link_error(&self, err: StoreError, claim: &FederatedClaim, attempted: Uuid) -> Error {
        if matches!(err, StoreError::DuplicateIdentity) {
            // Lost a race for the pair; report who holds it now.
            if let Ok(Some(existing)) = self
                .store
                .federated_identity(&claim.provider, &claim.subject)
            {
                self.sink.record(&AuthEvent::AssociationConflict {
                    provider: claim.provider.clone(),
                    subject: claim.subject.clone(),
                    linked_guid: existing.guid,
                    attempted_guid: attempted,
                });
            }
            return Error::AlreadyLinkedElsewhere;
        }
        err.into()
    }

    fn clear_matching_pending(&mut self, claim: &FederatedClaim) {
        if let Some(pending) = &self.pending_claim {
            if pending.provider == claim.provider && pending.subject == claim.subject {
                self.pending_claim = None;
            }
        }
    }
}
