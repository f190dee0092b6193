//! ISO 8601 durations as exchanged by the API (`PT15M`, `-PT6H`, `R/PT1H`).
//!
//! Only fixed-length designators are accepted: weeks, days, hours, minutes
//! and (fractional) seconds. Years and months have no fixed length and are
//! rejected.

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ISO 8601 duration '{input}': {reason}")]
pub struct DurationParseError {
    pub input: String,
    pub reason: &'static str,
}

impl DurationParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// Parses a signed ISO 8601 duration such as `PT15M`, `P1DT2H` or `-PT6H`.
///
/// # Errors
/// Returns an error if the string is not a fixed-length ISO 8601 duration.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let s = input.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let body = s
        .strip_prefix('P')
        .ok_or_else(|| DurationParseError::new(input, "must start with 'P'"))?;
    if body.is_empty() {
        return Err(DurationParseError::new(input, "no components"));
    }

    let mut total = Duration::zero();
    let mut in_time = false;
    let mut seen_component = false;
    let mut number = String::new();

    for c in body.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            designator => {
                if number.is_empty() {
                    return Err(DurationParseError::new(input, "designator without value"));
                }
                let part = component(&number, designator, in_time)
                    .map_err(|reason| DurationParseError::new(input, reason))?;
                total = total
                    .checked_add(&part)
                    .ok_or_else(|| DurationParseError::new(input, "out of range"))?;
                seen_component = true;
                number.clear();
            }
        }
    }

    if !number.is_empty() {
        return Err(DurationParseError::new(input, "trailing value without designator"));
    }
    if !seen_component {
        return Err(DurationParseError::new(input, "no components"));
    }

    Ok(if negative { -total } else { total })
}

fn component(number: &str, designator: char, in_time: bool) -> Result<Duration, &'static str> {
    const INVALID: &str = "invalid number";
    const OUT_OF_RANGE: &str = "out of range";

    if designator == 'S' && in_time {
        let seconds: f64 = number.parse().map_err(|_| INVALID)?;
        let millis = (seconds * 1000.0).round();
        if !millis.is_finite() || millis >= i64::MAX as f64 {
            return Err(OUT_OF_RANGE);
        }
        return Duration::try_milliseconds(millis as i64).ok_or(OUT_OF_RANGE);
    }
    let build: fn(i64) -> Option<Duration> = match (designator, in_time) {
        ('W', false) => Duration::try_weeks,
        ('D', false) => Duration::try_days,
        ('H', true) => Duration::try_hours,
        ('M', true) => Duration::try_minutes,
        _ => return Err("unsupported component"),
    };
    // Digits that overflow i64 are out of range rather than malformed.
    let value: i64 = match number.parse() {
        Ok(value) => value,
        Err(_) if number.bytes().all(|b| b.is_ascii_digit()) => return Err(OUT_OF_RANGE),
        Err(_) => return Err(INVALID),
    };
    build(value).ok_or(OUT_OF_RANGE)
}

/// Parses a horizon, where an `R/` prefix marks a rolling horizon.
///
/// # Errors
/// Returns an error if the duration part cannot be parsed.
pub fn parse_horizon(input: &str) -> Result<(Duration, bool), DurationParseError> {
    match input.trim().strip_prefix("R/") {
        Some(rest) => Ok((parse_duration(rest)?, true)),
        None => Ok((parse_duration(input)?, false)),
    }
}

/// Formats a duration in ISO 8601 form, e.g. `PT1H`, `P1DT30M`, `-PT15M`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration == Duration::zero() {
        return "PT0S".to_string();
    }
    let negative = duration < Duration::zero();
    let sign = if negative { "-" } else { "" };
    let abs = if negative { -duration } else { duration };

    let days = abs.num_days();
    let hours = abs.num_hours() % 24;
    let minutes = abs.num_minutes() % 60;
    let millis = abs.num_milliseconds() % 60_000;

    let mut out = format!("{sign}P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || millis > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if millis > 0 {
            if millis % 1000 == 0 {
                out.push_str(&format!("{}S", millis / 1000));
            } else {
                out.push_str(&format!("{}S", millis as f64 / 1000.0));
            }
        }
    }
    out
}
