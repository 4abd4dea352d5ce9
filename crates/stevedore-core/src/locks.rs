//! Service lock table.
//!
//! A bidirectional map between service identities and the container that currently owns the
//! identity's jobs. At every point the map is a bijection: an identity is locked by at most one
//! container and a container holds at most one identity.
use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use stevedore_model::ServiceIdentity;

/// Contract violations of the lock table; these point at a reconciliation bug.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("service {identity} is already locked by container {owner}")]
    ServiceLocked {
        identity: ServiceIdentity,
        owner: String,
    },

    #[error("container {0} already holds a service lock")]
    ContainerLocked(String),

    #[error("container {0} holds no service lock")]
    NotLocked(String),
}

#[derive(Debug, Default)]
pub struct ServiceLocks {
    by_identity: HashMap<ServiceIdentity, String>,
    by_container: HashMap<String, ServiceIdentity>,
}

impl ServiceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `identity` to `container_id`; fails if either side is already taken.
    pub fn lock(&mut self, identity: ServiceIdentity, container_id: &str) -> Result<(), LockError> {
        if let Some(owner) = self.by_identity.get(&identity) {
            return Err(LockError::ServiceLocked {
                identity,
                owner: owner.clone(),
            });
        }
        if self.by_container.contains_key(container_id) {
            return Err(LockError::ContainerLocked(container_id.to_string()));
        }
        debug!(service = %identity, container = container_id, "service locked");
        self.by_identity.insert(identity.clone(), container_id.to_string());
        self.by_container.insert(container_id.to_string(), identity);
        Ok(())
    }

    pub fn find_current_owner(&self, identity: &ServiceIdentity) -> Option<&str> {
        self.by_identity.get(identity).map(String::as_str)
    }

    pub fn identity_of(&self, container_id: &str) -> Option<&ServiceIdentity> {
        self.by_container.get(container_id)
    }

    pub fn is_owner(&self, container_id: &str) -> bool {
        self.by_container.contains_key(container_id)
    }

    /// Repoint the identity held by `old` to `new`.
    pub fn reassign(&mut self, old: &str, new: &str) -> Result<(), LockError> {
        if old == new {
            return if self.is_owner(old) {
                Ok(())
            } else {
                Err(LockError::NotLocked(old.to_string()))
            };
        }
        if self.by_container.contains_key(new) {
            return Err(LockError::ContainerLocked(new.to_string()));
        }
        let identity = self
            .by_container
            .remove(old)
            .ok_or_else(|| LockError::NotLocked(old.to_string()))?;

        debug!(service = %identity, from = old, to = new, "service lock reassigned");
        self.by_identity.insert(identity.clone(), new.to_string());
        self.by_container.insert(new.to_string(), identity);
        Ok(())
    }

    /// Drop the lock held by `container_id`; absent entries are ignored.
    pub fn unlock(&mut self, container_id: &str) {
        if let Some(identity) = self.by_container.remove(container_id) {
            debug!(service = %identity, container = container_id, "service unlocked");
            self.by_identity.remove(&identity);
        }
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}
