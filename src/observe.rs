//! Structured auth events and the sink they are reported to.
//!
//! Unknown roles, failed verifications, and association conflicts are
//! anomalies worth counting, not errors worth failing on. The core reports
//! them here and carries on; the sink decides whether that means a log line,
//! a metric, or an audit record.

use tracing::warn;
use uuid::Uuid;

/// Why a verification attempt was rejected.
///
/// Never surfaced to the end user; callers only ever see
/// [`crate::Error::InvalidCredential`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationFailure {
    UnknownEmail,
    NoLocalCredential,
    SecretMismatch,
    Disabled,
}

#[derive(Clone, Debug)]
pub enum AuthEvent {
    /// A stored role name had no registry entry and was dropped.
    UnknownRole { name: String },
    /// A local or federated verification attempt failed.
    VerificationFailed {
        subject: String,
        reason: VerificationFailure,
    },
    /// An association attempt hit a (provider, subject) pair owned by a
    /// different account.
    AssociationConflict {
        provider: String,
        subject: String,
        linked_guid: Uuid,
        attempted_guid: Uuid,
    },
}

pub trait ObservabilitySink: Send + Sync {
    fn record(&self, event: &AuthEvent);
}

/// Default sink: emits events as `tracing` warnings.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record(&self, event: &AuthEvent) {
        match event {
            AuthEvent::UnknownRole { name } => {
                warn!(role = %name, "dropping unknown role");
            }
            AuthEvent::VerificationFailed { subject, reason } => {
                warn!(subject = %subject, reason = ?reason, "verification failed");
            }
            AuthEvent::AssociationConflict {
                provider,
                subject,
                linked_guid,
                attempted_guid,
            } => {
                warn!(
                    provider = %provider,
                    subject = %subject,
                    linked_guid = %linked_guid,
                    attempted_guid = %attempted_guid,
                    "federated identity already linked to another account"
                );
            }
        }
    }
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ObservabilitySink for NullSink {
    fn record(&self, _event: &AuthEvent) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{AuthEvent, ObservabilitySink};
    use parking_lot::Mutex;

    /// Collects events so tests can assert on what was reported.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        events: Mutex<Vec<AuthEvent>>,
    }

    impl RecordingSink {
        pub(crate) fn events(&self) -> Vec<AuthEvent> {
            self.events.lock().clone()
        }
    }

    impl ObservabilitySink for RecordingSink {
        fn record(&self, event: &AuthEvent) {
            self.events.lock().push(event.clone());
        }
    }
}
