//! Core configuration.

use chrono::Duration;
use std::collections::BTreeSet;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_IDLE_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Session and registration settings.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    idle_ttl_seconds: i64,
    default_roles: BTreeSet<String>,
}

impl AuthConfig {
    /// Defaults: 1h authenticated inactivity timeout, 24h idle session
    /// retention, no default roles.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            idle_ttl_seconds: DEFAULT_IDLE_TTL_SECONDS,
            default_roles: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_idle_ttl_seconds(mut self, seconds: i64) -> Self {
        self.idle_ttl_seconds = seconds;
        self
    }

    /// Roles granted to accounts created through registration.
    #[must_use]
    pub fn with_default_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.default_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.session_ttl_seconds = self.session_ttl_seconds.max(1);
        self.idle_ttl_seconds = self.idle_ttl_seconds.max(self.session_ttl_seconds);
        self
    }

    /// Inactivity timeout for an authenticated session.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_seconds)
    }

    /// Retention for idle sessions in the session manager.
    #[must_use]
    pub fn idle_ttl(&self) -> Duration {
        Duration::seconds(self.idle_ttl_seconds)
    }

    #[must_use]
    pub fn default_roles(&self) -> &BTreeSet<String> {
        &self.default_roles
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::AuthConfig;
    use chrono::Duration;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(config.session_ttl(), Duration::seconds(3600));
        assert_eq!(config.idle_ttl(), Duration::seconds(86400));
        assert!(config.default_roles().is_empty());

        let config = config
            .with_session_ttl_seconds(120)
            .with_idle_ttl_seconds(600)
            .with_default_roles(["member"]);
        assert_eq!(config.session_ttl(), Duration::seconds(120));
        assert_eq!(config.idle_ttl(), Duration::seconds(600));
        assert!(config.default_roles().contains("member"));
    }

    #[test]
    fn normalize_clamps_degenerate_values() {
        let config = AuthConfig::new()
            .with_session_ttl_seconds(0)
            .with_idle_ttl_seconds(-5)
            .normalize();
        assert_eq!(config.session_ttl(), Duration::seconds(1));
        // Idle retention never undercuts the session ttl.
        assert!(config.idle_ttl() >= config.session_ttl());
    }
}
