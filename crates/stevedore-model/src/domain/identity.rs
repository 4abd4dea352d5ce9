use std::fmt;

use serde::Serialize;

use crate::domain::Labels;

/// Composite key identifying all replicas of one logical service.
///
/// Holds `key=value` parts in the configured order of identity label keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ServiceIdentity(Vec<String>);

/// Outcome of looking up the identity labels on a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityLookup {
    /// Every configured label is present.
    Complete(ServiceIdentity),
    /// None of the configured labels is present.
    Absent,
    /// Some labels are present, the listed ones are missing.
    Partial { missing: Vec<String> },
}

impl ServiceIdentity {
    /// Build an identity directly from its parts.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Look up the identity of a container from its labels.
    ///
    /// An empty key list never yields an identity.
    pub fn lookup(labels: &Labels, keys: &[String]) -> IdentityLookup {
        let mut parts = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();

        for key in keys {
            match labels.get(key) {
                Some(value) => parts.push(format!("{key}={value}")),
                None => missing.push(key.clone()),
            }
        }

        if parts.is_empty() {
            IdentityLookup::Absent
        } else if missing.is_empty() {
            IdentityLookup::Complete(ServiceIdentity(parts))
        } else {
            IdentityLookup::Partial { missing }
        }
    }

    /// `key=value` parts in configured order.
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl IdentityLookup {
    /// The identity, if it was found completely.
    pub fn into_identity(self) -> Option<ServiceIdentity> {
        match self {
            IdentityLookup::Complete(id) => Some(id),
            _ => None,
        }
    }
}
