use chrono_tz::Tz;
use regex::Regex;

use crate::{
    FieldError, JobDefinition, ModelError, ModelResult, RawJob, TriggerKind, TriggerSpec,
    ValidationError, parse_duration,
};
use crate::trigger::schedulable;

/// Attributes a job definition may carry besides `env.*` entries.
const KNOWN_ATTRIBUTES: [&str; 9] = [
    "command", "cron", "date", "interval", "jitter", "max", "timezone", "user", "workdir",
];

const USER_PATTERN: &str = r"^[a-zA-Z0-9_.][a-zA-Z0-9_.-]*$";

/// Defaults and switches applied while validating job definitions.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Max instances for jobs that don't set `max`.
    pub default_max: u32,
    /// Timezone for jobs that don't set `timezone`.
    pub default_timezone: Tz,
    /// Pattern a job name must fully match.
    pub name_pattern: String,
    /// Append low-level error text to trigger errors.
    pub debug: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            default_max: 1,
            default_timezone: Tz::UTC,
            name_pattern: "[a-z0-9-]+".to_string(),
            debug: false,
        }
    }
}

/// Schema validation of one job's attribute map.
#[derive(Debug, Clone)]
pub struct JobValidator {
    cfg: ValidatorConfig,
    name_re: Regex,
    user_re: Regex,
}

impl JobValidator {
    /// Compile the validator; fails if the configured name pattern is not a valid regex.
    pub fn new(cfg: ValidatorConfig) -> ModelResult<Self> {
        let name_re = Regex::new(&format!("^(?:{})$", cfg.name_pattern))
            .map_err(|e| ModelError::Invalid(format!("job name pattern: {e}")))?;
        let user_re =
            Regex::new(USER_PATTERN).map_err(|e| ModelError::Invalid(format!("user pattern: {e}")))?;
        Ok(Self {
            cfg,
            name_re,
            user_re,
        })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.cfg
    }

    /// Validate one job and apply defaults.
    ///
    /// Every rule is checked so that all errors of a job are reported together.
    pub fn validate(&self, raw: &RawJob) -> Result<JobDefinition, ValidationError> {
        let mut errors = Vec::new();

        for key in raw.attributes.keys() {
            if !KNOWN_ATTRIBUTES.contains(&key.as_str()) {
                errors.push(FieldError::new(key.as_str(), "unknown field"));
            }
        }

        if !self.name_re.is_match(&raw.name) {
            errors.push(FieldError::new(
                "name",
                format!("value does not match regex '{}'", self.cfg.name_pattern),
            ));
        }

        let command = match raw.get("command") {
            None => {
                errors.push(FieldError::new("command", "required field"));
                None
            }
            Some(c) if c.trim().is_empty() => {
                errors.push(FieldError::new("command", "empty values not allowed"));
                None
            }
            Some(c) => Some(c.to_string()),
        };

        let tz = match raw.get("timezone") {
            None => self.cfg.default_timezone,
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                errors.push(FieldError::new("timezone", format!("unknown timezone '{name}'")));
                self.cfg.default_timezone
            }),
        };

        let trigger = self.trigger(raw, tz, &mut errors);

        let jitter = raw
            .get("jitter")
            .and_then(|value| match coerce_seconds(value) {
                Ok(secs) if schedulable(secs).is_none() => {
                    errors.push(FieldError::new("jitter", format!("'{value}' is out of range")));
                    None
                }
                Ok(secs) => Some(secs),
                Err(message) => {
                    errors.push(FieldError::new("jitter", message));
                    None
                }
            });
        if jitter.is_some() && raw.get(TriggerKind::Date.as_str()).is_some() {
            errors.push(FieldError::new(
                "jitter",
                "must not be combined with a date trigger",
            ));
        }

        let max_instances = match raw.get("max") {
            None => self.cfg.default_max,
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    errors.push(FieldError::new(
                        "max",
                        format!("'{value}' is not a positive integer"),
                    ));
                    self.cfg.default_max
                }
            },
        };

        let user = match raw.get("user") {
            None => {
                errors.push(FieldError::new("user", "required field"));
                String::new()
            }
            Some(user) if user.is_empty() || self.user_re.is_match(user) => user.to_string(),
            Some(user) => {
                errors.push(FieldError::new("user", format!("invalid user name '{user}'")));
                String::new()
            }
        };

        let workdir = raw.get("workdir").and_then(|dir| {
            if dir.starts_with('/') {
                Some(dir.to_string())
            } else {
                errors.push(FieldError::new("workdir", "must be an absolute path"));
                None
            }
        });

        match (command, trigger) {
            (Some(command), Some(trigger)) if errors.is_empty() => Ok(JobDefinition {
                name: raw.name.clone(),
                command,
                trigger,
                user,
                workdir,
                environment: raw.environment.clone(),
                jitter,
                max_instances,
                timezone: tz.name().to_string(),
                service_identity: None,
            }),
            _ => Err(ValidationError {
                job: raw.name.clone(),
                errors,
            }),
        }
    }

    fn trigger(
        &self,
        raw: &RawJob,
        tz: Tz,
        errors: &mut Vec<FieldError>,
    ) -> Option<crate::Trigger> {
        let present: Vec<(TriggerKind, &str)> = TriggerKind::ALL
            .into_iter()
            .filter_map(|kind| raw.get(kind.as_str()).map(|v| (kind, v)))
            .collect();

        let (kind, value) = match present.as_slice() {
            [] => {
                errors.push(FieldError::new(
                    "trigger",
                    "one of 'cron', 'date' or 'interval' is required",
                ));
                return None;
            }
            [single] => *single,
            many => {
                let names: Vec<&str> = many.iter().map(|(k, _)| k.as_str()).collect();
                for (kind, _) in many {
                    errors.push(FieldError::new(
                        kind.as_str(),
                        format!("must not be combined with {}", names.join(", ")),
                    ));
                }
                return None;
            }
        };

        let validated = TriggerSpec::coerce(kind, value).and_then(|spec| spec.validate(tz));
        match validated {
            Ok(trigger) => Some(trigger),
            Err(e) => {
                errors.push(FieldError::new(kind.as_str(), self.describe(&e)));
                None
            }
        }
    }

    fn describe(&self, err: &ModelError) -> String {
        match err {
            ModelError::Trigger { detail, .. } if self.cfg.debug => format!("{err}: {detail}"),
            _ => err.to_string(),
        }
    }
}

/// Coerce a seconds value that may be written with time units.
fn coerce_seconds(value: &str) -> Result<u64, String> {
    if value.chars().any(char::is_alphabetic) {
        return parse_duration(value).ok_or_else(|| format!("cannot coerce '{value}' to seconds"));
    }
    let secs: i64 = value
        .trim()
        .parse()
        .map_err(|_| format!("cannot coerce '{value}' to seconds"))?;
    u64::try_from(secs).map_err(|_| "min value is 0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> JobValidator {
        JobValidator::new(ValidatorConfig::default()).unwrap()
    }

    fn job(name: &str, attrs: &[(&str, &str)]) -> RawJob {
        let mut raw = RawJob::new(name);
        for (k, v) in attrs {
            raw.set(*k, *v);
        }
        raw
    }

    #[test]
    fn minimal_job_gets_defaults() {
        let raw = job("backup", &[("command", "backup.sh"), ("interval", "daily"), ("user", "")]);
        let def = validator().validate(&raw).unwrap();

        assert_eq!(def.name, "backup");
        assert_eq!(def.trigger.kind(), TriggerKind::Interval);
        assert_eq!(def.max_instances, 1);
        assert_eq!(def.timezone, "UTC");
        assert!(def.environment.is_empty());
        assert!(def.jitter.is_none());
        assert!(def.workdir.is_none());
    }

    #[test]
    fn trigger_kind_matches_supplied_key() {
        for (key, value) in [("cron", "*/10 * * * *"), ("date", "2030-01-01"), ("interval", "15")] {
            let raw = job("j", &[("command", "true"), (key, value), ("user", "root")]);
            let def = validator().validate(&raw).unwrap();
            assert_eq!(def.trigger.kind().as_str(), key);
        }
    }

    #[test]
    fn missing_command_and_trigger_are_reported_together() {
        let raw = job("broken", &[("user", "root")]);
        let err = validator().validate(&raw).unwrap_err();

        assert_eq!(err.job, "broken");
        assert!(err.has_field("command"));
        assert!(err.has_field("trigger"));
    }

    #[test]
    fn triggers_are_mutually_exclusive() {
        let raw = job(
            "j",
            &[("command", "x"), ("cron", "* * * * *"), ("interval", "5"), ("user", "")],
        );
        let err = validator().validate(&raw).unwrap_err();
        assert!(err.has_field("cron"));
        assert!(err.has_field("interval"));
    }

    #[test]
    fn date_trigger_rejects_jitter() {
        let raw = job(
            "j",
            &[("command", "x"), ("date", "2030-01-01 00:00:00"), ("jitter", "10"), ("user", "")],
        );
        let err = validator().validate(&raw).unwrap_err();
        assert!(err.has_field("jitter"));
    }

    #[test]
    fn jitter_accepts_units_and_rejects_negatives() {
        let ok = job(
            "j",
            &[("command", "x"), ("interval", "hourly"), ("jitter", "2m"), ("user", "")],
        );
        assert_eq!(validator().validate(&ok).unwrap().jitter, Some(120));

        let negative = job(
            "j",
            &[("command", "x"), ("interval", "hourly"), ("jitter", "-3"), ("user", "")],
        );
        assert!(validator().validate(&negative).unwrap_err().has_field("jitter"));
    }

    #[test]
    fn out_of_range_durations_are_field_errors() {
        for interval in ["30000000000000000:0:0:0:0", "20000000w"] {
            let raw = job("j", &[("command", "x"), ("interval", interval), ("user", "")]);
            let err = validator().validate(&raw).unwrap_err();
            assert!(err.has_field("interval"), "interval {interval:?}");
        }

        for jitter in ["20000000w", "9223372036854775807"] {
            let raw = job(
                "j",
                &[("command", "x"), ("interval", "hourly"), ("jitter", jitter), ("user", "")],
            );
            let err = validator().validate(&raw).unwrap_err();
            assert!(err.has_field("jitter"), "jitter {jitter:?}");
        }
    }

    #[test]
    fn name_user_and_workdir_patterns() {
        let raw = job(
            "Bad_Name",
            &[("command", "x"), ("interval", "5"), ("user", "-nope"), ("workdir", "tmp")],
        );
        let err = validator().validate(&raw).unwrap_err();
        assert!(err.has_field("name"));
        assert!(err.has_field("user"));
        assert!(err.has_field("workdir"));

        let good = job(
            "good-name-1",
            &[("command", "x"), ("interval", "5"), ("user", "www-data"), ("workdir", "/srv")],
        );
        let def = validator().validate(&good).unwrap();
        assert_eq!(def.user, "www-data");
        assert_eq!(def.workdir.as_deref(), Some("/srv"));
    }

    #[test]
    fn user_key_is_required() {
        let raw = job("j", &[("command", "x"), ("interval", "5")]);
        assert!(validator().validate(&raw).unwrap_err().has_field("user"));
    }

    #[test]
    fn max_must_be_positive() {
        for bad in ["0", "-1", "many"] {
            let raw = job("j", &[("command", "x"), ("interval", "5"), ("max", bad), ("user", "")]);
            assert!(validator().validate(&raw).unwrap_err().has_field("max"), "max {bad:?}");
        }
        let raw = job("j", &[("command", "x"), ("interval", "5"), ("max", "3"), ("user", "")]);
        assert_eq!(validator().validate(&raw).unwrap().max_instances, 3);
    }

    #[test]
    fn unknown_timezone_and_fields_are_rejected() {
        let raw = job(
            "j",
            &[("command", "x"), ("interval", "5"), ("timezone", "Mars/Olympus"), ("colour", "red"), ("user", "")],
        );
        let err = validator().validate(&raw).unwrap_err();
        assert!(err.has_field("timezone"));
        assert!(err.has_field("colour"));
    }

    #[test]
    fn timezone_override_is_kept() {
        let raw = job(
            "j",
            &[("command", "x"), ("cron", "0 0 0 * * * *"), ("timezone", "Europe/Berlin"), ("user", "")],
        );
        let def = validator().validate(&raw).unwrap();
        assert_eq!(def.timezone, "Europe/Berlin");
        assert_eq!(def.trigger.timezone(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn trigger_errors_carry_details_only_in_debug() {
        let raw = job("j", &[("command", "x"), ("cron", "0 99 * * *"), ("user", "")]);

        let quiet = validator().validate(&raw).unwrap_err();
        let loud = JobValidator::new(ValidatorConfig {
            debug: true,
            ..Default::default()
        })
        .unwrap()
        .validate(&raw)
        .unwrap_err();

        let quiet_msg = &quiet.errors[0].message;
        let loud_msg = &loud.errors[0].message;
        assert!(quiet_msg.starts_with("error while instantiating a cron trigger"));
        assert!(loud_msg.starts_with(quiet_msg.as_str()));
        assert!(loud_msg.len() > quiet_msg.len());
    }

    #[test]
    fn custom_name_pattern_is_anchored() {
        let v = JobValidator::new(ValidatorConfig {
            name_pattern: "[a-z]+".into(),
            ..Default::default()
        })
        .unwrap();
        let raw = job("abc1", &[("command", "x"), ("interval", "5"), ("user", "")]);
        assert!(v.validate(&raw).unwrap_err().has_field("name"));
    }

    #[test]
    fn invalid_name_pattern_fails_construction() {
        let res = JobValidator::new(ValidatorConfig {
            name_pattern: "([".into(),
            ..Default::default()
        });
        assert!(matches!(res, Err(ModelError::Invalid(_))));
    }
}
