//! Last-modified cutoff filtering.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the cutoff is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeDirection {
    /// Keep objects modified at or after the cutoff; skip older ones
    #[default]
    YoungerThan,
    /// Keep objects modified at or before the cutoff; skip younger ones
    OlderThan,
}

/// A last-modified cutoff with a direction.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use sm_types::{AgeDirection, AgeFilter};
///
/// // Only objects touched in the last day
/// let filter = AgeFilter::new(Utc::now() - Duration::days(1), AgeDirection::YoungerThan);
/// assert!(filter.admits(Some(Utc::now())));
/// assert!(!filter.admits(Some(Utc::now() - Duration::days(2))));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeFilter {
    pub cutoff: DateTime<Utc>,
    pub direction: AgeDirection,
}

impl AgeFilter {
    pub fn new(cutoff: DateTime<Utc>, direction: AgeDirection) -> Self {
        Self { cutoff, direction }
    }

    /// Check whether an object with this timestamp passes the filter.
    ///
    /// Returns `true` if no last_modified is available (the filter does not apply).
    pub fn admits(&self, last_modified: Option<DateTime<Utc>>) -> bool {
        let Some(modified) = last_modified else {
            return true;
        };

        match self.direction {
            AgeDirection::YoungerThan => modified >= self.cutoff,
            AgeDirection::OlderThan => modified <= self.cutoff,
        }
    }

    /// Short human description, e.g. `younger than 2024-01-15 00:00:00`.
    pub fn description(&self) -> String {
        let side = match self.direction {
            AgeDirection::YoungerThan => "younger",
            AgeDirection::OlderThan => "older",
        };
        format!("{side} than {}", self.cutoff.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Parse an age cutoff relative to `now`.
///
/// Supported formats:
/// - Relative: `7d`, `-24h`, `30m`, `90s`, `2w`, `3M` (30-day months), `1y`
/// - ISO 8601: `2024-01-15T10:30:00Z`
/// - Date only: `2024-01-15` (assumes 00:00:00 UTC)
pub fn parse_age(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("Invalid date: {input}"))?;
        return Ok(DateTime::from_naive_utc_and_offset(datetime, Utc));
    }

    let ago = parse_relative(input)?;
    now.checked_sub_signed(ago)
        .ok_or_else(|| format!("Age out of range: {input}"))
}

fn parse_relative(input: &str) -> Result<Duration, String> {
    let body = input.trim_start_matches('-');
    let Some(unit) = body.chars().last() else {
        return Err("Empty age".to_string());
    };

    let num_str = &body[..body.len() - unit.len_utf8()];
    let num: i64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in age: {input}"))?;

    let out_of_range = || format!("Age out of range: {input}");
    let days_of = |per: i64| num.checked_mul(per).and_then(Duration::try_days);

    let duration = match unit {
        's' | 'S' => Duration::try_seconds(num),
        'm' => Duration::try_minutes(num),
        'h' | 'H' => Duration::try_hours(num),
        'd' | 'D' => Duration::try_days(num),
        'w' | 'W' => Duration::try_weeks(num),
        'M' => days_of(30),
        'y' | 'Y' => days_of(365),
        _ => {
            return Err(format!(
                "Invalid age: {input}. Expected a relative age (7d, 24h, 30m, 2w, 1y), \
                 a date (2024-01-15) or ISO 8601 (2024-01-15T10:30:00Z)"
            ))
        }
    };
    duration.ok_or_else(out_of_range)
}
