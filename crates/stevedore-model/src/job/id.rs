use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::ServiceIdentity;

/// Deterministic identifier of a scheduled job.
///
/// Derived from the service identity (or the container id, when the container has none) and
/// the job name. Serviced jobs keep their id when moved to another container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Derive the id of job `name` hosted by `container_id`.
    pub fn derive(identity: Option<&ServiceIdentity>, container_id: &str, name: &str) -> Self {
        let mut seed = match identity {
            Some(identity) => identity.parts().concat(),
            None => container_id.to_string(),
        };
        seed.push_str(name);
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_give_same_id() {
        let a = JobId::derive(None, "abc123", "backup");
        let b = JobId::derive(None, "abc123", "backup");
        assert_eq!(a, b);
        assert_ne!(a, JobId::derive(None, "abc123", "cleanup"));
    }

    #[test]
    fn serviced_jobs_ignore_container() {
        let service = ServiceIdentity::from_parts(["p=shop", "s=web"]);
        let a = JobId::derive(Some(&service), "container-a", "beep");
        let b = JobId::derive(Some(&service), "container-b", "beep");
        assert_eq!(a, b);
        assert_ne!(a, JobId::derive(None, "container-a", "beep"));
    }

    #[test]
    fn id_is_uuid5_over_concatenated_seed() {
        let id = JobId::derive(None, "abc", "def");
        let expected = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"abcdef").to_string();
        assert_eq!(id.as_str(), expected);
    }
}
