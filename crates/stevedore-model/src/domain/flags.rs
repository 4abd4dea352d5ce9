use std::{collections::BTreeSet, convert::Infallible, fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::domain::constants::{FLAG_IMAGE, FLAG_SERVICE};

/// Resolved set of behavior toggles for one container.
///
/// Always kept sorted and de-duplicated; the canonical text form is the comma-joined set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Flags(BTreeSet<String>);

impl Flags {
    /// Resolve a comma-separated flag value against a default set.
    ///
    /// Each token is added to the set, unless it is prefixed with `no`,
    /// in which case the remainder is removed from it.
    ///
    /// # Examples
    /// ```
    /// use stevedore_model::Flags;
    ///
    /// let defaults: Flags = "image,service".parse().unwrap();
    /// assert_eq!(Flags::resolve(&defaults, "noservice").to_string(), "image");
    /// ```
    pub fn resolve(defaults: &Flags, value: &str) -> Flags {
        let mut out = defaults.0.clone();
        for token in tokens(value) {
            match token.strip_prefix("no") {
                Some(negated) => {
                    out.remove(negated);
                }
                None => {
                    out.insert(token.to_string());
                }
            }
        }
        Flags(out)
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }

    /// Image labels are merged under container labels.
    pub fn image(&self) -> bool {
        self.contains(FLAG_IMAGE)
    }

    /// Jobs are registered once per service identity.
    pub fn service(&self) -> bool {
        self.contains(FLAG_SERVICE)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }
}

fn tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty())
}

impl FromStr for Flags {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Flags(tokens(s).map(str::to_string).collect()))
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

impl Serialize for Flags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::Flags;

    fn defaults(s: &str) -> Flags {
        s.parse().unwrap()
    }

    #[test]
    fn empty_value_keeps_defaults() {
        let got = Flags::resolve(&defaults("image,service"), "");
        assert_eq!(got.to_string(), "image,service");
    }

    #[test]
    fn negation_removes_default() {
        assert_eq!(
            Flags::resolve(&defaults("image,service"), "noservice").to_string(),
            "image"
        );
        assert_eq!(
            Flags::resolve(&defaults("image,service"), "noimage").to_string(),
            "service"
        );
    }

    #[test]
    fn addition_is_sorted_and_idempotent() {
        let got = Flags::resolve(&defaults("service"), "image");
        assert_eq!(got.to_string(), "image,service");

        let again = Flags::resolve(&defaults("service"), "image, image ,service");
        assert_eq!(again, got);
    }

    #[test]
    fn order_of_tokens_does_not_matter() {
        let a = Flags::resolve(&defaults(""), "service,image");
        let b = Flags::resolve(&defaults(""), "image,service");
        assert_eq!(a, b);
        assert!(a.image() && a.service());
    }

    #[test]
    fn negating_unknown_flag_is_noop() {
        let got = Flags::resolve(&defaults("image"), "nofoo");
        assert_eq!(got.to_string(), "image");
    }

    #[test]
    fn empty_tokens_are_ignored() {
        let got = Flags::resolve(&defaults("image"), ",,service,");
        assert_eq!(got.to_string(), "image,service");
    }

    #[test]
    fn serializes_as_joined_string() {
        let json = serde_json::to_string(&defaults("service,image")).unwrap();
        assert_eq!(json, r#""image,service""#);
    }
}
