//! # Membri (Membership Session & Authorization Core)
//!
//! `membri` is a session-scoped authorization core for membership systems:
//! it tracks who is logged in, what roles and permissions they hold, and
//! mediates between local credentials and federated (OAuth-style) identity.
//! Rendering, routing, and persistence belong to the host application; the
//! core consumes them through narrow interfaces.
//!
//! ## Session State Machine
//!
//! Every session is exactly one of **anonymous**, **transitional** (a
//! federated identity was presented but is not linked to an account yet), or
//! **authenticated**. [`SessionAuthority`] owns the transitions: local and
//! federated login, registration completion, federated association, logout,
//! and lazy inactivity expiry. Role and permission queries answer `false`
//! unless the session is fully authenticated; they never error.
//!
//! ## Identity Store
//!
//! Accounts, federated identity links, and role assignments live behind the
//! [`IdentityStore`] trait. Stores enforce the uniqueness invariants (one
//! account per email, one account per (provider, subject) pair) themselves,
//! closing concurrent-registration races. [`MemoryStore`] is the bundled
//! reference implementation.
//!
//! ## Credentials
//!
//! Local secrets are Argon2id PHC hashes; verification is constant-time and
//! never discloses whether an email is registered. Federated claims resolve
//! through stored (provider, subject) links. Session tokens issued by
//! [`SessionManager`] are random and stored only as SHA-256 hashes.
//!
//! ## Roles
//!
//! [`RoleRegistry`] collects role contributions (last registration of a name
//! wins) and permission grants at startup; [`RoleResolver`] expands an
//! account's stored role names, dropping unknown names with an observability
//! event instead of failing.

pub mod account;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod observe;
pub mod roles;
pub mod session;
pub mod store;

mod utils;

pub use account::{Account, FederatedClaim, FederatedIdentity};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use credential::CredentialVerifier;
pub use error::Error;
pub use observe::{AuthEvent, NullSink, ObservabilitySink, TracingSink, VerificationFailure};
pub use roles::{Role, RoleRegistry, RoleResolver};
pub use session::{
    AuthCore, LoginOutcome, NewProfile, ProfileUpdate, SessionAuthority, SessionManager,
    SessionStatus,
};
pub use store::{memory::MemoryStore, IdentityStore, StoreError};
