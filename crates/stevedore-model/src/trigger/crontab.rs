use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{ModelError, ModelResult};

/// Number of fields a cron trigger is instantiated with.
pub const CRON_FIELD_COUNT: usize = 7;

/// Cron fields in the order second, minute, hour, day, month, day-of-week, year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CronFields(Vec<String>);

impl CronFields {
    /// Collapse whitespace and prepend `*` until there are seven fields.
    ///
    /// Supplied tokens always stay the trailing fields in their original order,
    /// so a five-token value gets two leading `*`. More than seven tokens are kept as-is
    /// and rejected by [`CronFields::compile`].
    pub fn normalize(raw: &str) -> Self {
        let tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
        let pad = CRON_FIELD_COUNT.saturating_sub(tokens.len());

        let mut fields = vec!["*".to_string(); pad];
        fields.extend(tokens);
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub(crate) fn compile(&self) -> ModelResult<cron::Schedule> {
        let expr = self.to_string();
        if self.0.len() != CRON_FIELD_COUNT {
            return Err(ModelError::Trigger {
                kind: "cron",
                args: expr,
                detail: format!(
                    "expected {CRON_FIELD_COUNT} fields, got {}",
                    self.0.len()
                ),
            });
        }
        cron::Schedule::from_str(&expr).map_err(|e| ModelError::Trigger {
            kind: "cron",
            args: expr.clone(),
            detail: e.to_string(),
        })
    }
}

impl fmt::Display for CronFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_fields_get_two_leading_wildcards() {
        let fields = CronFields::normalize("*/10 * * * *");
        assert_eq!(fields.fields(), ["*", "*", "*/10", "*", "*", "*", "*"]);
    }

    #[test]
    fn padding_count_is_seven_minus_tokens() {
        for (raw, pad) in [("5", 6), ("0 5", 5), ("0 0 5 * * *", 1), ("0 0 5 * * * 2030", 0)] {
            let fields = CronFields::normalize(raw);
            assert_eq!(fields.fields().len(), CRON_FIELD_COUNT);
            assert!(fields.fields()[..pad].iter().all(|f| f == "*"), "raw {raw:?}");
        }
    }

    #[test]
    fn whitespace_is_collapsed() {
        let fields = CronFields::normalize("  0   */2\t* *  * ");
        assert_eq!(fields.to_string(), "* * 0 */2 * * *");
    }

    #[test]
    fn compile_accepts_valid_expressions() {
        assert!(CronFields::normalize("0 0 4 * * *").compile().is_ok());
        assert!(CronFields::normalize("*/10 * * * *").compile().is_ok());
    }

    #[test]
    fn compile_rejects_bad_fields() {
        let err = CronFields::normalize("0 61 * * *").compile().unwrap_err();
        assert!(matches!(err, ModelError::Trigger { kind: "cron", .. }));

        let too_many = CronFields::normalize("0 0 0 * * * * *");
        assert_eq!(too_many.fields().len(), 8);
        assert!(too_many.compile().is_err());
    }
}
