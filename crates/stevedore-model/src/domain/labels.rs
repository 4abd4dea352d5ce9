use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Container or image labels based on [`BTreeMap`].
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(pub BTreeMap<String, String>);

impl Labels {
    /// Create an empty set of labels.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns `true` if no labels are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Insert or overwrite a label.
    ///
    /// Returns `self` for chaining.
    pub fn insert<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), val.into());
        self
    }

    /// Get the value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    /// Remove a label and return its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterate through all labels as `(&str, &str)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keep only labels whose key starts with `prefix`.
    ///
    /// Keys are returned unchanged, including the prefix.
    pub fn with_prefix(&self, prefix: &str) -> Labels {
        Labels(
            self.0
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Merge `self` on top of `base`; keys of `self` win on collision.
    pub fn layered_over(&self, base: &Labels) -> Labels {
        let mut out = base.0.clone();
        out.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Labels(out)
    }
}

impl<K, V> FromIterator<(K, V)> for Labels
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Labels(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::Labels;

    #[test]
    fn with_prefix_filters_foreign_keys() {
        let labels: Labels = [
            ("stevedore.backup.command", "backup.sh"),
            ("stevedore.backup.cron", "0 0 * * *"),
            ("com.docker.compose.project", "web"),
        ]
        .into_iter()
        .collect();

        let ns = labels.with_prefix("stevedore.");
        assert_eq!(ns.len(), 2);
        assert!(ns.get("com.docker.compose.project").is_none());
    }

    #[test]
    fn layered_over_prefers_own_values() {
        let image: Labels = [("a", "image"), ("b", "image")].into_iter().collect();
        let container: Labels = [("a", "container"), ("c", "container")].into_iter().collect();

        let merged = container.layered_over(&image);
        assert_eq!(merged.get("a"), Some("container"));
        assert_eq!(merged.get("b"), Some("image"));
        assert_eq!(merged.get("c"), Some("container"));
    }
}
