//! Trigger descriptors and their validated, schedulable form.
//!
//! A [`TriggerSpec`] is the coerced label value. [`TriggerSpec::validate`] instantiates it with a
//! timezone into a [`Trigger`] that can compute fire times.
mod crontab;
pub use crontab::CronFields;

mod date;

mod interval;
pub use interval::IntervalFields;

use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::{ModelError, ModelResult};

/// The three supported trigger families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Cron,
    Date,
    Interval,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 3] = [TriggerKind::Cron, TriggerKind::Date, TriggerKind::Interval];

    /// Attribute name used in labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Cron => "cron",
            TriggerKind::Date => "date",
            TriggerKind::Interval => "interval",
        }
    }
}

impl FromStr for TriggerKind {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cron" => Ok(Self::Cron),
            "date" => Ok(Self::Date),
            "interval" => Ok(Self::Interval),
            _ => Err(ModelError::UnknownTriggerKind(s.to_string())),
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coerced trigger arguments, not yet bound to a timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "args", rename_all = "lowercase")]
pub enum TriggerSpec {
    /// Seven cron fields: second, minute, hour, day, month, day-of-week, year.
    Cron(CronFields),
    /// Absolute timestamp as written in the label.
    Date(String),
    /// Fixed period.
    Interval(IntervalFields),
}

impl TriggerSpec {
    /// Coerce a raw label value for the given trigger kind.
    pub fn coerce(kind: TriggerKind, raw: &str) -> ModelResult<TriggerSpec> {
        match kind {
            TriggerKind::Cron => Ok(TriggerSpec::Cron(CronFields::normalize(raw))),
            TriggerKind::Date => Ok(TriggerSpec::Date(raw.to_string())),
            TriggerKind::Interval => IntervalFields::coerce(raw).map(TriggerSpec::Interval),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerSpec::Cron(_) => TriggerKind::Cron,
            TriggerSpec::Date(_) => TriggerKind::Date,
            TriggerSpec::Interval(_) => TriggerKind::Interval,
        }
    }

    /// Instantiate the trigger in `tz`.
    ///
    /// Failure is a validation error for the trigger attribute, never a panic.
    pub fn validate(&self, tz: Tz) -> ModelResult<Trigger> {
        let plan = match self {
            TriggerSpec::Cron(fields) => Plan::Cron(Box::new(fields.compile()?)),
            TriggerSpec::Date(raw) => Plan::Date(date::parse_in(raw, tz)?),
            TriggerSpec::Interval(fields) => Plan::Interval(fields.period()?),
        };
        Ok(Trigger {
            spec: self.clone(),
            tz,
            plan,
        })
    }
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSpec::Cron(fields) => write!(f, "cron[{fields}]"),
            TriggerSpec::Date(raw) => write!(f, "date[{raw}]"),
            TriggerSpec::Interval(fields) => write!(f, "interval[{fields}]"),
        }
    }
}

#[derive(Debug, Clone)]
enum Plan {
    Cron(Box<cron::Schedule>),
    Date(DateTime<Utc>),
    Interval(TimeDelta),
}

/// Validated trigger bound to a timezone.
#[derive(Debug, Clone)]
pub struct Trigger {
    spec: TriggerSpec,
    tz: Tz,
    plan: Plan,
}

impl Trigger {
    pub fn spec(&self) -> &TriggerSpec {
        &self.spec
    }

    pub fn kind(&self) -> TriggerKind {
        self.spec.kind()
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Date triggers fire once and are then discarded.
    pub fn is_one_shot(&self) -> bool {
        matches!(self.plan, Plan::Date(_))
    }

    /// Compute the next fire time.
    ///
    /// `previous` is the last scheduled fire time, `None` before the first firing.
    /// Interval triggers skip periods that already elapsed. A date trigger returns its
    /// timestamp once, even if it lies in the past, so the caller can report it as missed.
    pub fn next_fire(
        &self,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match &self.plan {
            Plan::Cron(schedule) => {
                let from = previous.map_or(now, |p| p.max(now));
                schedule
                    .after(&from.with_timezone(&self.tz))
                    .next()
                    .map(|t| t.with_timezone(&Utc))
            }
            Plan::Date(at) => match previous {
                None => Some(*at),
                Some(_) => None,
            },
            Plan::Interval(period) => {
                let Some(previous) = previous else {
                    return now.checked_add_signed(*period);
                };
                let next = previous.checked_add_signed(*period)?;
                if next > now {
                    return Some(next);
                }
                let period_ms = period.num_milliseconds().max(1);
                let behind_ms = (now - previous).num_milliseconds();
                let skips = behind_ms / period_ms + 1;
                let ahead = TimeDelta::try_milliseconds(period_ms.checked_mul(skips)?)?;
                previous.checked_add_signed(ahead)
            }
        }
    }
}

/// `secs` as a delta that can still be added to the current time.
pub(crate) fn schedulable(secs: u64) -> Option<TimeDelta> {
    let delta = TimeDelta::try_seconds(i64::try_from(secs).ok()?)?;
    Utc::now().checked_add_signed(delta).map(|_| delta)
}

impl Serialize for Trigger {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.spec.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn kind_parses_and_displays() {
        for kind in TriggerKind::ALL {
            assert_eq!(kind.as_str().parse::<TriggerKind>().unwrap(), kind);
        }
        assert!("weekly".parse::<TriggerKind>().is_err());
    }

    #[test]
    fn coerce_keeps_kind() {
        for (kind, raw) in [
            (TriggerKind::Cron, "0 0 * * *"),
            (TriggerKind::Date, "2030-01-01 00:00:00"),
            (TriggerKind::Interval, "daily"),
        ] {
            let spec = TriggerSpec::coerce(kind, raw).unwrap();
            assert_eq!(spec.kind(), kind);
        }
    }

    #[test]
    fn interval_next_fire_is_anchored_to_previous() {
        let trigger = TriggerSpec::coerce(TriggerKind::Interval, "10m")
            .unwrap()
            .validate(Tz::UTC)
            .unwrap();

        let now = utc(2030, 1, 1, 12, 0, 0);
        assert_eq!(trigger.next_fire(None, now), Some(utc(2030, 1, 1, 12, 10, 0)));

        let prev = utc(2030, 1, 1, 12, 10, 0);
        let later = utc(2030, 1, 1, 12, 10, 1);
        assert_eq!(
            trigger.next_fire(Some(prev), later),
            Some(utc(2030, 1, 1, 12, 20, 0))
        );
    }

    #[test]
    fn interval_skips_elapsed_periods() {
        let trigger = TriggerSpec::coerce(TriggerKind::Interval, "1m")
            .unwrap()
            .validate(Tz::UTC)
            .unwrap();

        let prev = utc(2030, 1, 1, 12, 0, 0);
        let now = utc(2030, 1, 1, 12, 5, 30);
        assert_eq!(
            trigger.next_fire(Some(prev), now),
            Some(utc(2030, 1, 1, 12, 6, 0))
        );
    }

    #[test]
    fn interval_past_the_calendar_has_no_next_fire() {
        let trigger = TriggerSpec::coerce(TriggerKind::Interval, "520w")
            .unwrap()
            .validate(Tz::UTC)
            .unwrap();

        assert!(trigger.next_fire(None, DateTime::<Utc>::MAX_UTC).is_none());
        let near_end = DateTime::<Utc>::MAX_UTC - TimeDelta::days(1);
        assert!(trigger.next_fire(Some(near_end), near_end).is_none());
    }

    #[test]
    fn date_fires_exactly_once() {
        let trigger = TriggerSpec::coerce(TriggerKind::Date, "2030-05-08 00:01:00")
            .unwrap()
            .validate(Tz::UTC)
            .unwrap();
        let now = utc(2030, 1, 1, 0, 0, 0);

        let first = trigger.next_fire(None, now);
        assert_eq!(first, Some(utc(2030, 5, 8, 0, 1, 0)));
        assert_eq!(trigger.next_fire(first, now), None);
        assert!(trigger.is_one_shot());
    }

    #[test]
    fn cron_honours_timezone() {
        let trigger = TriggerSpec::coerce(TriggerKind::Cron, "0 0 12 * * * *")
            .unwrap()
            .validate(chrono_tz::Europe::Berlin)
            .unwrap();

        // noon in Berlin during winter is 11:00 UTC
        let now = utc(2030, 1, 15, 0, 0, 0);
        assert_eq!(trigger.next_fire(None, now), Some(utc(2030, 1, 15, 11, 0, 0)));
    }

    #[test]
    fn serializes_as_tagged_spec() {
        let trigger = TriggerSpec::coerce(TriggerKind::Interval, "hourly")
            .unwrap()
            .validate(Tz::UTC)
            .unwrap();

        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["kind"], "interval");
        assert_eq!(json["args"]["hours"], 1);
    }
}
