//! Interval parsing for configuration values.
//!
//! Accepts a bare integer (seconds) or a compound duration literal with
//! `ms`/`s`/`m`/`h` units, e.g. `10`, `10s`, `1m30s`, `500ms`.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("invalid interval {0:?}")]
pub struct ParseIntervalError(String);

pub fn parse_interval(s: &str) -> Result<Duration, ParseIntervalError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseIntervalError(s.to_string()));
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(ParseIntervalError(s.to_string()));
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| ParseIntervalError(s.to_string()))?;
        digits.clear();
        total += match c {
            'h' => Duration::from_secs(n * 3600),
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                Duration::from_millis(n)
            }
            'm' => Duration::from_secs(n * 60),
            's' => Duration::from_secs(n),
            _ => return Err(ParseIntervalError(s.to_string())),
        };
    }
    if !digits.is_empty() {
        return Err(ParseIntervalError(s.to_string()));
    }
    Ok(total)
}
