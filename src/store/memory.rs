//! In-memory identity store.
//!
//! Reference implementation of the adapter contract; also what the test
//! suite runs against. Uniqueness checks happen under the same write lock as
//! the mutation, so the check-then-insert race an external store closes with
//! unique constraints cannot occur here either.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::{IdentityStore, StoreError};
use crate::account::{Account, FederatedIdentity};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    email_index: HashMap<String, Uuid>,
    links: HashMap<(String, String), FederatedIdentity>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.inner.read().accounts.len()
    }
}

impl IdentityStore for MemoryStore {
    fn account_by_guid(&self, guid: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.read().accounts.get(&guid).cloned())
    }

    fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .email_index
            .get(email)
            .and_then(|guid| inner.accounts.get(guid))
            .cloned())
    }

    fn save_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if let Some(owner) = inner.email_index.get(&account.email) {
            if *owner != account.guid {
                return Err(StoreError::DuplicateEmail);
            }
        }
        // Email may have changed; drop the old index entry before re-inserting.
        if let Some(previous) = inner.accounts.get(&account.guid) {
            if previous.email != account.email {
                inner.email_index.remove(&previous.email.clone());
            }
        }
        inner.email_index.insert(account.email.clone(), account.guid);
        inner.accounts.insert(account.guid, account.clone());
        Ok(())
    }

    fn federated_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<FederatedIdentity>, StoreError> {
        let key = (provider.to_string(), subject.to_string());
        Ok(self.inner.read().links.get(&key).cloned())
    }

    fn save_federated_identity(&self, link: &FederatedIdentity) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let key = (link.provider.clone(), link.subject.clone());
        if let Some(existing) = inner.links.get(&key) {
            if existing.guid != link.guid {
                return Err(StoreError::DuplicateIdentity);
            }
        }
        inner.links.insert(key, link.clone());
        Ok(())
    }

    fn federated_identities_for(&self, guid: Uuid) -> Result<Vec<FederatedIdentity>, StoreError> {
        let inner = self.inner.read();
        let mut links: Vec<FederatedIdentity> = inner
            .links
            .values()
            .filter(|link| link.guid == guid)
            .cloned()
            .collect();
        links.sort_by(|a, b| a.provider.cmp(&b.provider));
        Ok(links)
    }

    fn roles_for_guid(&self, guid: Uuid) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .inner
            .read()
            .accounts
            .get(&guid)
            .map(|account| account.roles.clone())
            .unwrap_or_default())
    }
}
