//! Human-readable durations such as `"2 weeks"`, `"1h30m"` or `"0.5 day"`.

pub const SECONDS_PER_MINUTE: u64 = 60;
pub const SECONDS_PER_HOUR: u64 = 3_600;
pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_WEEK: u64 = 604_800;

fn unit_seconds(c: char) -> Option<u64> {
    match c.to_ascii_lowercase() {
        's' => Some(1),
        'm' => Some(SECONDS_PER_MINUTE),
        'h' => Some(SECONDS_PER_HOUR),
        'd' => Some(SECONDS_PER_DAY),
        'w' => Some(SECONDS_PER_WEEK),
        _ => None,
    }
}

/// Parse a duration made of `<number><unit>` pairs into whole seconds.
///
/// Only the first letter of a unit word counts (`2 weeks` reads as `2w`), everything after it up
/// to the next digit is ignored. A trailing number without unit is taken as seconds.
/// Returns `None` for malformed numbers or a unit without a preceding number.
///
/// # Examples
/// ```
/// use stevedore_model::parse_duration;
///
/// assert_eq!(parse_duration("2 weeks"), Some(1_209_600));
/// assert_eq!(parse_duration("1h 30m"), Some(5_400));
/// assert_eq!(parse_duration("0.5 day"), Some(43_200));
/// assert_eq!(parse_duration("1.2.3s"), None);
/// ```
pub fn parse_duration(text: &str) -> Option<u64> {
    let mut total = 0f64;
    let mut number = String::new();
    let mut skipping = false;

    for c in text.chars() {
        if c.is_ascii_digit() || c == '.' {
            skipping = false;
            number.push(c);
            continue;
        }
        if skipping {
            continue;
        }
        if let Some(factor) = unit_seconds(c) {
            let value: f64 = number.parse().ok()?;
            total += value * factor as f64;
            number.clear();
            skipping = true;
        }
    }

    if !number.is_empty() {
        total += number.parse::<f64>().ok()?;
    }
    Some(total as u64)
}

/// Split seconds into `(weeks, days, hours, minutes, seconds)`.
pub fn decompose(seconds: u64) -> (u64, u64, u64, u64, u64) {
    let weeks = seconds / SECONDS_PER_WEEK;
    let rest = seconds % SECONDS_PER_WEEK;
    let days = rest / SECONDS_PER_DAY;
    let rest = rest % SECONDS_PER_DAY;
    let hours = rest / SECONDS_PER_HOUR;
    let rest = rest % SECONDS_PER_HOUR;
    let minutes = rest / SECONDS_PER_MINUTE;
    (weeks, days, hours, minutes, rest % SECONDS_PER_MINUTE)
}
