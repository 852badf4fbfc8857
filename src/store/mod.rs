//! Identity store adapter interface.
//!
//! The core never talks to persistence directly; it calls this trait. An
//! adapter may sit on a relational database, the host framework's record
//! layer, or the bundled [`memory::MemoryStore`].
//!
//! Contract for implementors:
//! - Email and (provider, subject) uniqueness are enforced by the store
//!   itself (unique constraint or equivalent), not checked-then-inserted, so
//!   concurrent registrations cannot race past the invariant.
//! - Each account or link write is atomic per row.
//! - Calls are time-bounded by the adapter; timeouts and connectivity
//!   failures come back as [`StoreError::Unavailable`] rather than hanging a
//!   session transition.

pub mod memory;

use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

use crate::account::{Account, FederatedIdentity};

/// Failures an identity store adapter can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-email constraint violation.
    #[error("email is already in use")]
    DuplicateEmail,
    /// Unique (provider, subject) constraint violation.
    #[error("federated identity is already linked")]
    DuplicateIdentity,
    /// Timeout or connectivity failure; retryable by the caller.
    #[error("identity store unavailable: {0}")]
    Unavailable(anyhow::Error),
}

pub trait IdentityStore: Send + Sync {
    fn account_by_guid(&self, guid: Uuid) -> Result<Option<Account>, StoreError>;

    /// Lookup by normalized email.
    fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Insert or update an account, enforcing email uniqueness.
    fn save_account(&self, account: &Account) -> Result<(), StoreError>;

    fn federated_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<FederatedIdentity>, StoreError>;

    /// Insert a link, enforcing (provider, subject) uniqueness across
    /// accounts. Re-linking the same pair to the same account is a no-op.
    fn save_federated_identity(&self, link: &FederatedIdentity) -> Result<(), StoreError>;

    fn federated_identities_for(&self, guid: Uuid) -> Result<Vec<FederatedIdentity>, StoreError>;

    /// Role names assigned to an account; empty for unknown guids.
    fn roles_for_guid(&self, guid: Uuid) -> Result<BTreeSet<String>, StoreError>;
}
