//! Time windows and timestamp parsing
//!
//! A validity window ("data alive time") is written in the feature table as a
//! date or date-time, `YYYY-MM-DDThh:mm:ss` or `YYYY-MM-DD`, but it is read as
//! a duration offset: `0001-06-00T00:00:00` means one year and six months.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn window_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:T(\d{2}):(\d{2}):(\d{2}))?$")
            .expect("window pattern is a valid regex")
    })
}

/// Duration offset used to compute the oldest acceptable observation date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeWindow {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TimeWindow {
    /// Parse a window from the table grammar
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let caps = window_pattern()
            .captures(trimmed)
            .ok_or_else(|| CoreError::InvalidTimeFormat(input.to_string()))?;

        let field = |idx: usize| -> u32 {
            caps.get(idx)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0)
        };

        let window = TimeWindow {
            years: field(1),
            months: field(2),
            days: field(3),
            hours: field(4),
            minutes: field(5),
            seconds: field(6),
        };

        if window.months > 12
            || window.days > 31
            || window.hours > 23
            || window.minutes > 59
            || window.seconds > 59
        {
            return Err(CoreError::InvalidTimeFormat(input.to_string()));
        }

        Ok(window)
    }

    /// Window spanning whole days only
    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    /// Window spanning whole years only
    pub fn years(years: u32) -> Self {
        Self {
            years,
            ..Self::default()
        }
    }

    /// Returns true when the window has no extent
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Oldest instant still inside the window: `reference - window`.
    ///
    /// Years and months are subtracted first on the calendar (the day is
    /// clamped to the end of a shorter month), then days and clock time.
    pub fn lower_bound(&self, reference: NaiveDateTime) -> NaiveDateTime {
        let months = self.years.saturating_mul(12).saturating_add(self.months);
        let shifted = reference
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDateTime::MIN);

        let clock = Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
            + Duration::seconds(i64::from(self.seconds));

        shifted.checked_sub_signed(clock).unwrap_or(NaiveDateTime::MIN)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.years, self.months, self.days, self.hours, self.minutes, self.seconds
        )
    }
}

impl std::str::FromStr for TimeWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse an observation timestamp.
///
/// Accepts RFC 3339 (the offset is dropped, wall time kept), date-times with
/// or without seconds and fractional seconds, and plain dates (midnight).
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }

    let without_zulu = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(without_zulu, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(without_zulu, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
