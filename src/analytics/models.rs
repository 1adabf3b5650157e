//! Data models for analytics

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Day key format used on the wire and in chart output
pub const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Inclusive calendar-day range selected in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse a range from two `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
        Ok(Self::new(parse_day(start)?, parse_day(end)?))
    }

    /// Default dashboard selection: the `days` days leading up to tomorrow
    ///
    /// The end is tomorrow so that visits stamped in a time zone ahead of
    /// ours still fall inside the range. Both ends clamp to the dates chrono
    /// can represent.
    pub fn trailing(days: u32, today: NaiveDate) -> Self {
        let end = today.succ_opt().unwrap_or(today);
        let start = end
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Number of days in the range, inclusive; zero for an inverted range
    pub fn days(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Iterate every calendar day from start to end, inclusive
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format(DAY_FORMAT),
            self.end.format(DAY_FORMAT)
        )
    }
}

pub fn parse_day(value: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(value.trim(), DAY_FORMAT)
        .map_err(|_| RangeError::InvalidDate(value.to_string()))
}

/// Truncate an ISO timestamp to its calendar day
///
/// Only the Y-M-D components as written are kept; time of day and any
/// embedded offset are discarded.
pub fn day_of(timestamp: &str) -> Option<NaiveDate> {
    let timestamp = timestamp.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }

    // Plain dates, and anything else that starts with one
    timestamp
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, DAY_FORMAT).ok())
}

/// Per-day hit counts for one alias
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyVisitRecord {
    pub day: NaiveDate,
    pub pv: u64,
    pub uv: u64,
}

/// Raw `stat=time` row as returned by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeHist {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub pv: u64,
    #[serde(default)]
    pub uv: u64,
}

impl TimeHist {
    pub fn to_record(&self) -> Option<DailyVisitRecord> {
        let day = day_of(&self.time)?;
        Some(DailyVisitRecord {
            day,
            pv: self.pv,
            uv: self.uv,
        })
    }
}

/// Raw `stat=referer` row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefererCount {
    #[serde(default)]
    pub referer: String,
    #[serde(default)]
    pub count: u64,
}

/// Raw `stat=ua` row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentCount {
    #[serde(default)]
    pub ua: String,
    #[serde(default)]
    pub count: u64,
}

/// Series label in the PV/UV line chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesCategory {
    #[serde(rename = "PV")]
    Pv,
    #[serde(rename = "UV")]
    Uv,
}

/// One point of the multi-series line chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(with = "day_key")]
    pub time: NaiveDate,
    pub value: u64,
    pub category: SeriesCategory,
}

/// Named count ready for a pie or bar chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub name: String,
    pub value: u64,
}

impl RankedEntry {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

mod day_key {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DAY_FORMAT;

    pub fn serialize<S: Serializer>(day: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&day.format(DAY_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, DAY_FORMAT).map_err(serde::de::Error::custom)
    }
}
