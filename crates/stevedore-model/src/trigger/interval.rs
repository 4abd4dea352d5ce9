use std::fmt;

use chrono::TimeDelta;
use serde::Serialize;

use super::schedulable;
use crate::{ModelError, ModelResult, decompose, parse_duration};

const NAMED_INTERVALS: [(&str, (u64, u64, u64, u64, u64)); 5] = [
    ("weekly", (1, 0, 0, 0, 0)),
    ("daily", (0, 1, 0, 0, 0)),
    ("hourly", (0, 0, 1, 0, 0)),
    ("every minute", (0, 0, 0, 1, 0)),
    ("every second", (0, 0, 0, 0, 1)),
];

/// Interval period split into calendar-free units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntervalFields {
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl From<(u64, u64, u64, u64, u64)> for IntervalFields {
    fn from((weeks, days, hours, minutes, seconds): (u64, u64, u64, u64, u64)) -> Self {
        Self {
            weeks,
            days,
            hours,
            minutes,
            seconds,
        }
    }
}

impl IntervalFields {
    /// Coerce an interval label value.
    ///
    /// Accepts a named shorthand (`daily`), a duration with units (`2h 30m`),
    /// or up to five numbers separated by `.`, `:`, `/` or spaces, filled from the left with
    /// zeros: `"15"` is fifteen seconds and `"1:00:00"` is one hour.
    pub fn coerce(raw: &str) -> ModelResult<Self> {
        if let Some((_, tuple)) = NAMED_INTERVALS.iter().find(|(name, _)| *name == raw) {
            return Ok((*tuple).into());
        }

        if raw.chars().any(char::is_alphabetic) {
            return parse_duration(raw)
                .filter(|secs| *secs > 0)
                .map(|secs| decompose(secs).into())
                .ok_or_else(|| coercion_error(raw));
        }

        let normalized: String = raw
            .chars()
            .map(|c| if matches!(c, '.' | ':' | '/') { ' ' } else { c })
            .collect();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        if tokens.is_empty() || tokens.len() > 5 {
            return Err(coercion_error(raw));
        }

        let mut numbers = [0u64; 5];
        let offset = 5 - tokens.len();
        for (i, token) in tokens.iter().enumerate() {
            numbers[offset + i] = token.parse().map_err(|_| coercion_error(raw))?;
        }
        let [w, d, h, m, s] = numbers;
        Ok((w, d, h, m, s).into())
    }

    /// Length of the interval in seconds; `None` if it does not fit into a `u64`.
    pub fn total_seconds(&self) -> Option<u64> {
        [
            (self.weeks, 604_800),
            (self.days, 86_400),
            (self.hours, 3_600),
            (self.minutes, 60),
            (self.seconds, 1),
        ]
        .into_iter()
        .try_fold(0u64, |total, (count, unit)| {
            count.checked_mul(unit).and_then(|secs| total.checked_add(secs))
        })
    }

    /// Period of the trigger. A zero-length interval runs every second.
    ///
    /// Periods that cannot be added to the current time are rejected.
    pub(crate) fn period(&self) -> ModelResult<TimeDelta> {
        self.total_seconds()
            .map(|secs| secs.max(1))
            .and_then(schedulable)
            .ok_or_else(|| ModelError::Trigger {
                kind: "interval",
                args: self.to_string(),
                detail: "interval is out of range".into(),
            })
    }
}

fn coercion_error(raw: &str) -> ModelError {
    ModelError::Coercion {
        kind: "interval",
        value: raw.to_string(),
    }
}

impl fmt::Display for IntervalFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}w {}d {}h {}m {}s",
            self.weeks, self.days, self.hours, self.minutes, self.seconds
        )
    }
}
