//! Role registry and resolution.
//!
//! Roles are contributed by the host application and by plugins at startup
//! through [`RoleRegistry::register_role`], then the registry is frozen
//! behind an `Arc`. Registering a name twice overwrites the earlier entry:
//! the last contributor wins. Permission grants accumulate per role.
//!
//! Resolution expands an account's stored role names against the registry.
//! Names with no registry entry are dropped and reported, never fatal: a
//! plugin that stopped contributing its role must not lock members out.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::observe::{AuthEvent, ObservabilitySink};

/// A named role with a human label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub label: String,
}

impl Role {
    #[must_use]
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// Registry of known roles and their permission grants.
#[derive(Clone, Debug, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<String, Role>,
    grants: BTreeMap<String, BTreeSet<String>>,
}

impl RoleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role. A duplicate name replaces the earlier definition.
    pub fn register_role(&mut self, name: impl Into<String>, label: impl Into<String>) {
        let role = Role::new(name, label);
        self.roles.insert(role.name.clone(), role);
    }

    /// Grant permissions to a role. Grants accumulate across contributors.
    pub fn grant(
        &mut self,
        role: impl Into<String>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.grants
            .entry(role.into())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    #[must_use]
    pub fn all_roles(&self) -> Vec<Role> {
        self.roles.values().cloned().collect()
    }

    #[must_use]
    pub fn permissions_for(&self, role: &str) -> BTreeSet<String> {
        self.grants.get(role).cloned().unwrap_or_default()
    }
}

/// Expands stored role names to roles and effective permissions.
#[derive(Clone)]
pub struct RoleResolver {
    registry: Arc<RoleRegistry>,
    sink: Arc<dyn ObservabilitySink>,
}

impl RoleResolver {
    #[must_use]
    pub fn new(registry: Arc<RoleRegistry>, sink: Arc<dyn ObservabilitySink>) -> Self {
        Self { registry, sink }
    }

    /// Expand role names against the registry. Unknown names are dropped and
    /// reported to the sink.
    #[must_use]
    pub fn resolve(&self, names: &BTreeSet<String>) -> Vec<Role> {
        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            match self.registry.get(name) {
                Some(role) => roles.push(role.clone()),
                None => self.sink.record(&AuthEvent::UnknownRole { name: name.clone() }),
            }
        }
        roles
    }

    /// Flatten roles to the union of their granted permissions.
    #[must_use]
    pub fn effective_permissions(&self, roles: &[Role]) -> BTreeSet<String> {
        let mut permissions = BTreeSet::new();
        for role in roles {
            permissions.extend(self.registry.permissions_for(&role.name));
        }
        permissions
    }
}
