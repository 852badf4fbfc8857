//! Error taxonomy for the authorization core.

use thiserror::Error;

/// Failures surfaced to consumers of the session authority.
///
/// Verification and association failures are returned as values, never
/// panics, and leave the session state untouched. Only
/// [`Error::StoreUnavailable`] is worth retrying.
#[derive(Debug, Error)]
pub enum Error {
    /// Login failed. Deliberately generic: callers must not be able to tell
    /// an unknown email from a wrong secret or a disabled account.
    #[error("invalid credentials")]
    InvalidCredential,
    /// The federated identity is not linked to any account.
    #[error("federated identity is not linked to an account")]
    UnlinkedIdentity,
    /// The federated identity is already linked to a different account.
    #[error("federated identity is linked to another account")]
    AlreadyLinkedElsewhere,
    /// The account exists but has been disabled.
    #[error("account is disabled")]
    AccountDisabled,
    /// The email is already taken by another account.
    #[error("email is already in use")]
    DuplicateEmail,
    /// The email failed format validation.
    #[error("invalid email address")]
    InvalidEmail,
    /// Registration was attempted without a pending federated identity.
    #[error("no federated identity pending for this session")]
    NoPendingIdentity,
    /// The operation requires a fully authenticated session.
    #[error("session is not authenticated")]
    NotAuthenticated,
    /// Secret hashing failed.
    #[error("credential hashing failed")]
    Hash,
    /// Session token generation failed.
    #[error("failed to generate session token")]
    TokenGeneration,
    /// The identity store timed out or is unreachable.
    #[error("identity store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),
}

impl Error {
    /// Whether a caller may retry the failed attempt (bounded, with backoff).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<crate::store::StoreError> for Error {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::DuplicateEmail => Self::DuplicateEmail,
            crate::store::StoreError::DuplicateIdentity => Self::AlreadyLinkedElsewhere,
            crate::store::StoreError::Unavailable(source) => Self::StoreUnavailable(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use anyhow::anyhow;

    #[test]
    fn only_store_unavailable_is_retryable() {
        assert!(Error::StoreUnavailable(anyhow!("timeout")).is_retryable());
        assert!(!Error::InvalidCredential.is_retryable());
        assert!(!Error::AlreadyLinkedElsewhere.is_retryable());
    }

    #[test]
    fn invalid_credential_message_is_generic() {
        assert_eq!(Error::InvalidCredential.to_string(), "invalid credentials");
    }

    #[test]
    fn store_errors_map_into_taxonomy() {
        let err: Error = crate::store::StoreError::DuplicateEmail.into();
        assert!(matches!(err, Error::DuplicateEmail));

        let err: Error = crate::store::StoreError::DuplicateIdentity.into();
        assert!(matches!(err, Error::AlreadyLinkedElsewhere));

        let err: Error = crate::store::StoreError::Unavailable(anyhow!("down")).into();
        assert!(err.is_retryable());
    }
}
