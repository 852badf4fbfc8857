//! Local and federated credential verification.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use std::net::IpAddr;
use std::sync::Arc;

use crate::account::{Account, FederatedClaim};
use crate::clock::Clock;
use crate::error::Error;
use crate::observe::{AuthEvent, ObservabilitySink, VerificationFailure};
use crate::store::IdentityStore;
use crate::utils::normalize_email;

/// Salt for the fallback hash run when no stored credential exists.
const FALLBACK_SALT: &[u8] = b"membri.fallback.salt";

/// Verifies presented credentials against the identity store.
///
/// Secrets are Argon2id-hashed PHC strings; verification is constant-time and
/// runs even when the account or its local credential is missing, so response
/// timing does not reveal whether an email is registered.
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ObservabilitySink>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self { store, clock, sink }
    }

    /// Verify an email + secret pair.
    ///
    /// Unknown email, missing local credential, secret mismatch, and disabled
    /// account all come back as [`Error::InvalidCredential`]; the specific
    /// reason goes to the observability sink only. On success the account's
    /// last-seen stamp is updated.
    pub fn verify_local(
        &self,
        email: &str,
        secret: &SecretString,
        addr: Option<IpAddr>,
    ) -> Result<Account, Error> {
        let email = normalize_email(email);
        let account = self.store.account_by_email(&email)?;

        let Some(account) = account else {
            self.burn_verification(secret);
            return Err(self.reject(&email, VerificationFailure::UnknownEmail));
        };
        let Some(hash) = account.password_hash.clone() else {
            self.burn_verification(secret);
            return Err(self.reject(&email, VerificationFailure::NoLocalCredential));
        };
        if !verify_secret(secret, &hash) {
            return Err(self.reject(&email, VerificationFailure::SecretMismatch));
        }
        // Enabled is checked after the hash comparison; both paths do the
        // same amount of work.
        if !account.enabled {
            return Err(self.reject(&email, VerificationFailure::Disabled));
        }

        let account = self.stamp_last_seen(account, addr)?;
        Ok(account)
    }

    /// Resolve a federated claim to its linked account.
    ///
    /// `Ok(None)` means the (provider, subject) pair is unlinked and the
    /// caller must register a new account or associate an existing one.
    pub fn verify_federated(
        &self,
        claim: &FederatedClaim,
        addr: Option<IpAddr>,
    ) -> Result<Option<Account>, Error> {
        let link = self.store.federated_identity(&claim.provider, &claim.subject)?;
        let Some(link) = link else {
            return Ok(None);
        };

        // A link without its account means the store lost referential
        // integrity; treat the identity as unlinked.
        let Some(account) = self.store.account_by_guid(link.guid)? else {
            return Ok(None);
        };

        if !account.enabled {
            let subject = format!("{}:{}", claim.provider, claim.subject);
            self.sink.record(&AuthEvent::VerificationFailed {
                subject,
                reason: VerificationFailure::Disabled,
            });
            return Err(Error::AccountDisabled);
        }

        let account = self.stamp_last_seen(account, addr)?;
        Ok(Some(account))
    }

    /// Hash a secret for storage as a PHC string.
    pub fn hash_secret(&self, secret: &SecretString) -> Result<String, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.expose_secret().as_bytes(), &salt)
            .map_err(|_| Error::Hash)?
            .to_string();
        Ok(hash)
    }

    fn reject(&self, subject: &str, reason: VerificationFailure) -> Error {
        self.sink.record(&AuthEvent::VerificationFailed {
            subject: subject.to_string(),
            reason,
        });
        Error::InvalidCredential
    }

    /// Run a hash over the presented secret when there is nothing stored to
    /// compare against, keeping the rejected paths on the same timing.
    fn burn_verification(&self, secret: &SecretString) {
        let mut out = [0u8; 32];
        let _ = Argon2::default().hash_password_into(
            secret.expose_secret().as_bytes(),
            FALLBACK_SALT,
            &mut out,
        );
    }

    fn stamp_last_seen(&self, mut account: Account, addr: Option<IpAddr>) -> Result<Account, Error> {
        account.last_seen_at = Some(self.clock.now());
        account.last_seen_addr = addr;
        self.store.save_account(&account)?;
        Ok(account)
    }
}

fn verify_secret(secret: &SecretString, phc: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.expose_secret().as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::CredentialVerifier;
    use crate::account::{Account, FederatedClaim, FederatedIdentity};
    use crate::clock::{Clock, ManualClock};
    use crate::error::Error;
    use crate::observe::test_support::RecordingSink;
    use crate::observe::{AuthEvent, VerificationFailure};
    use crate::store::memory::MemoryStore;
    use crate::store::IdentityStore;
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        sink: Arc<RecordingSink>,
        verifier: CredentialVerifier,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let sink = Arc::new(RecordingSink::default());
        let verifier = CredentialVerifier::new(store.clone(), clock.clone(), sink.clone());
        Fixture {
            store,
            clock,
            sink,
            verifier,
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn seed_account(fx: &Fixture, email: &str, password: &str) -> Account {
        let hash = fx.verifier.hash_secret(&secret(password)).unwrap();
        let account = Account::new(email).with_password_hash(hash);
        fx.store.save_account(&account).unwrap();
        account
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let fx = fixture();
        seed_account(&fx, "alice@example.com", "hunter2");

        let account = fx
            .verifier
            .verify_local("alice@example.com", &secret("hunter2"), None)
            .unwrap();
        assert_eq!(account.email, "alice@example.com");
    }

    #[test]
    fn verify_local_normalizes_email() {
        let fx = fixture();
        seed_account(&fx, "alice@example.com", "hunter2");

        let account = fx
            .verifier
            .verify_local(" Alice@Example.COM ", &secret("hunter2"), None)
            .unwrap();
        assert_eq!(account.email, "alice@example.com");
    }

    #[test]
    fn wrong_secret_is_invalid_credential() {
        let fx = fixture();
        seed_account(&fx, "alice@example.com", "hunter2");

        let err = fx
            .verifier
            .verify_local("alice@example.com", &secret("wrong"), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));
        assert!(matches!(
            &fx.sink.events()[0],
            AuthEvent::VerificationFailed {
                reason: VerificationFailure::SecretMismatch,
                ..
            }
        ));
    }

    #[test]
    fn unknown_email_is_invalid_credential() {
        let fx = fixture();
        let err = fx
            .verifier
            .verify_local("nobody@example.com", &secret("hunter2"), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));
        assert!(matches!(
            &fx.sink.events()[0],
            AuthEvent::VerificationFailed {
                reason: VerificationFailure::UnknownEmail,
                ..
            }
        ));
    }

    #[test]
    fn disabled_account_is_invalid_credential() {
        let fx = fixture();
        let hash = fx.verifier.hash_secret(&secret("hunter2")).unwrap();
        let account = Account::new("alice@example.com")
            .with_password_hash(hash)
            .disabled();
        fx.store.save_account(&account).unwrap();

        let err = fx
            .verifier
            .verify_local("alice@example.com", &secret("hunter2"), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));
        assert!(matches!(
            &fx.sink.events()[0],
            AuthEvent::VerificationFailed {
                reason: VerificationFailure::Disabled,
                ..
            }
        ));
    }

    #[test]
    fn successful_login_updates_last_seen() {
        let fx = fixture();
        let seeded = seed_account(&fx, "alice@example.com", "hunter2");
        let addr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));

        fx.verifier
            .verify_local("alice@example.com", &secret("hunter2"), Some(addr))
            .unwrap();

        let stored = fx.store.account_by_guid(seeded.guid).unwrap().unwrap();
        assert_eq!(stored.last_seen_at, Some(fx.clock.now()));
        assert_eq!(stored.last_seen_addr, Some(addr));
    }

    #[test]
    fn unlinked_claim_resolves_to_none() {
        let fx = fixture();
        let claim = FederatedClaim::new("github", "42");
        assert!(fx.verifier.verify_federated(&claim, None).unwrap().is_none());
    }

    #[test]
    fn linked_claim_resolves_to_account_and_stamps() {
        let fx = fixture();
        let account = Account::new("alice@example.com");
        fx.store.save_account(&account).unwrap();
        fx.store
            .save_federated_identity(&FederatedIdentity {
                provider: "github".to_string(),
                subject: "42".to_string(),
                guid: account.guid,
                linked_at: fx.clock.now(),
            })
            .unwrap();

        let claim = FederatedClaim::new("github", "42");
        let resolved = fx.verifier.verify_federated(&claim, None).unwrap().unwrap();
        assert_eq!(resolved.guid, account.guid);

        let stored = fx.store.account_by_guid(account.guid).unwrap().unwrap();
        assert_eq!(stored.last_seen_at, Some(fx.clock.now()));
    }

    #[test]
    fn linked_claim_to_disabled_account_is_rejected() {
        let fx = fixture();
        let account = Account::new("alice@example.com").disabled();
        fx.store.save_account(&account).unwrap();
        fx.store
            .save_federated_identity(&FederatedIdentity {
                provider: "github".to_string(),
                subject: "42".to_string(),
                guid: account.guid,
                linked_at: fx.clock.now(),
            })
            .unwrap();

        let claim = FederatedClaim::new("github", "42");
        let err = fx.verifier.verify_federated(&claim, None).unwrap_err();
        assert!(matches!(err, Error::AccountDisabled));
    }
}
