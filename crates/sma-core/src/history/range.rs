//! Date range a channel export is restricted to.

use chrono::{DateTime, NaiveDate, Utc};

use super::HistoryError;

/// Largest 32-bit unix timestamp; used as the open upper bound.
pub const DEFAULT_TO_SECS: i64 = 2_147_483_647;

/// Inclusive `[from, to]` range over message timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            from: DateTime::<Utc>::UNIX_EPOCH,
            to: default_to(),
        }
    }
}

fn default_to() -> DateTime<Utc> {
    DateTime::from_timestamp(DEFAULT_TO_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl DateRange {
    /// Missing bounds fall back to the open defaults.
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        let default = Self::default();
        Self {
            from: from.unwrap_or(default.from),
            to: to.unwrap_or(default.to),
        }
    }

    /// Parses optional `YYYY-MM-DD` / RFC 3339 bounds.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, HistoryError> {
        let from = from.map(parse_date).transpose()?;
        let to = to.map(parse_date).transpose()?;
        Ok(Self::new(from, to))
    }

    pub fn has_default_from(&self) -> bool {
        self.from == DateTime::<Utc>::UNIX_EPOCH
    }

    pub fn has_default_to(&self) -> bool {
        self.to == default_to()
    }

    /// True when `ts` (seconds since epoch) lies within the range, bounds included.
    pub fn contains_ts(&self, ts: f64) -> bool {
        let millis = (ts * 1000.0).round() as i64;
        millis >= self.from.timestamp_millis() && millis <= self.to.timestamp_millis()
    }

    /// Archive-name suffix: empty, `__to_X`, `__from_X` or `__X-Y` (dates as YYYYMMDD).
    pub fn filename_suffix(&self) -> String {
        match (self.has_default_from(), self.has_default_to()) {
            (true, true) => String::new(),
            (true, false) => format!("__to_{}", self.to.format("%Y%m%d")),
            (false, true) => format!("__from_{}", self.from.format("%Y%m%d")),
            (false, false) => format!(
                "__{}-{}",
                self.from.format("%Y%m%d"),
                self.to.format("%Y%m%d")
            ),
        }
    }
}

/// Accepts `2016-09-10` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, HistoryError> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| HistoryError::InvalidDate(s.to_string()))
}
