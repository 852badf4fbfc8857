//! Account, federated identity, and claim types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::net::IpAddr;
use uuid::Uuid;

/// A member account.
///
/// Accounts are never hard-deleted; they are disabled instead, so federated
/// identity links always resolve.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub guid: Uuid,
    /// Unique, stored normalized (trimmed, lowercase).
    pub email: String,
    pub display_name: Option<String>,
    pub enabled: bool,
    /// Role names as assigned; expansion against the registry happens at
    /// query time.
    pub roles: BTreeSet<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub last_seen_addr: Option<IpAddr>,
    /// PHC string, present only for accounts with a local credential.
    pub password_hash: Option<String>,
}

impl Account {
    /// New enabled account with a fresh guid and no roles.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            email: email.into(),
            display_name: None,
            enabled: true,
            roles: BTreeSet::new(),
            last_seen_at: None,
            last_seen_addr: None,
            password_hash: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A (provider, subject) pair linked to exactly one account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FederatedIdentity {
    pub provider: String,
    /// The provider's stable identifier for the resource owner.
    pub subject: String,
    pub guid: Uuid,
    pub linked_at: DateTime<Utc>,
}

/// An identity assertion from an external provider, as presented during a
/// federated handshake.
///
/// The `claims` payload carries whatever resource-owner data the provider
/// returned; the core reads only the typed accessors below.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FederatedClaim {
    pub provider: String,
    pub subject: String,
    pub claims: Value,
}

impl FederatedClaim {
    #[must_use]
    pub fn new(provider: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            subject: subject.into(),
            claims: Value::Null,
        }
    }

    #[must_use]
    pub fn with_claims(mut self, claims: Value) -> Self {
        self.claims = claims;
        self
    }

    /// Email asserted by the provider, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.claims.get("email").and_then(Value::as_str)
    }

    /// Display name asserted by the provider, if any.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.claims.get("name").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{Account, FederatedClaim};
    use serde_json::json;

    #[test]
    fn new_account_is_enabled_with_no_roles() {
        let account = Account::new("alice@example.com");
        assert!(account.enabled);
        assert!(account.roles.is_empty());
        assert!(account.password_hash.is_none());
        assert!(account.last_seen_at.is_none());
    }

    #[test]
    fn account_builders_apply() {
        let account = Account::new("alice@example.com")
            .with_display_name("Alice")
            .with_roles(["member", "admin"])
            .disabled();
        assert_eq!(account.display_name.as_deref(), Some("Alice"));
        assert!(account.roles.contains("admin"));
        assert!(!account.enabled);
    }

    #[test]
    fn claim_accessors_read_payload() {
        let claim = FederatedClaim::new("github", "42").with_claims(json!({
            "email": "alice@example.com",
            "name": "Alice",
            "avatar": "https://example.com/a.png",
        }));
        assert_eq!(claim.email(), Some("alice@example.com"));
        assert_eq!(claim.display_name(), Some("Alice"));
    }

    #[test]
    fn claim_accessors_tolerate_missing_payload() {
        let claim = FederatedClaim::new("github", "42");
        assert_eq!(claim.email(), None);
        assert_eq!(claim.display_name(), None);
    }
}
