use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use polars::prelude::*;
use tracing::debug;

use crate::loader::{CALL_DATE, DIRECTION_TYPE, DURATION_SEC};

pub const CALL_DATE_STATUS: &str = "call_date_status";
pub const DATE: &str = "date";
pub const YEAR_MONTH: &str = "year_month";
pub const DURATION_HOUR: &str = "duration_hour";
pub const CALL_HOUR: &str = "call_hour";
pub const COUNT: &str = "count";

const SECONDS_PER_HOUR: f64 = 3600.0;
const DAYS_FROM_CE_TO_UNIX_EPOCH: i32 = 719_163;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStatus {
    Valid,
    Missing,
    Invalid,
}

impl TimestampStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampStatus::Valid => "valid",
            TimestampStatus::Missing => "missing",
            TimestampStatus::Invalid => "invalid",
        }
    }
}

/// Outcome of reading a raw `call_date` cell. Text that cannot be read is `Invalid`,
/// which is kept apart from an empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTimestamp {
    Valid(NaiveDateTime),
    Missing,
    Invalid,
}

impl CallTimestamp {
    pub fn status(&self) -> TimestampStatus {
        match self {
            CallTimestamp::Valid(_) => TimestampStatus::Valid,
            CallTimestamp::Missing => TimestampStatus::Missing,
            CallTimestamp::Invalid => TimestampStatus::Invalid,
        }
    }

    pub fn instant(&self) -> Option<NaiveDateTime> {
        match self {
            CallTimestamp::Valid(instant) => Some(*instant),
            _ => None,
        }
    }
}

/// Offsets are folded into UTC; values without an offset are taken as they are written.
pub fn parse_call_timestamp(raw: Option<&str>) -> CallTimestamp {
    let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
        return CallTimestamp::Missing;
    };

    for format in NAIVE_FORMATS {
        if let Ok(instant) = NaiveDateTime::parse_from_str(text, format) {
            return CallTimestamp::Valid(instant);
        }
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return CallTimestamp::Valid(instant.naive_utc());
    }
    for format in OFFSET_FORMATS {
        if let Ok(instant) = DateTime::parse_from_str(text, format) {
            return CallTimestamp::Valid(instant.naive_utc());
        }
    }

    match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .map_or(CallTimestamp::Invalid, CallTimestamp::Valid),
        Err(_) => CallTimestamp::Invalid,
    }
}

/// Rounds to `decimals` places, ties to the even neighbour, on the value scaled by 10^decimals.
pub fn round_half_even(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

pub fn duration_hours(duration_sec: i64) -> f64 {
    round_half_even(duration_sec as f64 / SECONDS_PER_HOUR, 2)
}

/// Lookup table from raw direction codes to report labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionLabels {
    labels: BTreeMap<String, String>,
}

impl Default for DirectionLabels {
    fn default() -> Self {
        Self::from_map(BTreeMap::from([
            ("internal".to_string(), "Internal".to_string()),
            ("in".to_string(), "Inbound".to_string()),
            ("out".to_string(), "Outbound".to_string()),
        ]))
    }
}

impl DirectionLabels {
    pub fn from_map(labels: BTreeMap<String, String>) -> Self {
        Self { labels }
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.labels
    }

    /// Codes missing from the table are returned unchanged.
    pub fn relabel<'a>(&'a self, code: &'a str) -> &'a str {
        self.labels.get(code).map_or(code, String::as_str)
    }
}

/// Parses `call_date` and attaches the derived calendar, duration, direction and counter columns.
pub fn normalize_calls(df: &DataFrame, directions: &DirectionLabels) -> PolarsResult<DataFrame> {
    let len = df.height();

    let raw_dates = df.column(CALL_DATE)?.str()?;
    let durations = df.column(DURATION_SEC)?.i64()?;
    let raw_directions = df.column(DIRECTION_TYPE)?.str()?;

    let mut instants: Vec<Option<i64>> = Vec::with_capacity(len);
    let mut statuses: Vec<&'static str> = Vec::with_capacity(len);
    let mut dates: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut year_months: Vec<Option<String>> = Vec::with_capacity(len);
    let mut hours: Vec<Option<u32>> = Vec::with_capacity(len);
    let mut duration_hour: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut labels: Vec<Option<&str>> = Vec::with_capacity(len);
    let mut invalid = 0usize;

    for idx in 0..len {
        let parsed = parse_call_timestamp(raw_dates.get(idx));
        if parsed.status() == TimestampStatus::Invalid {
            invalid += 1;
        }
        statuses.push(parsed.status().as_str());

        match parsed.instant() {
            Some(instant) => {
                instants.push(Some(instant.and_utc().timestamp_micros()));
                dates.push(Some(
                    instant.date().num_days_from_ce() - DAYS_FROM_CE_TO_UNIX_EPOCH,
                ));
                year_months.push(Some(instant.format("%Y-%m").to_string()));
                hours.push(Some(instant.hour()));
            }
            None => {
                instants.push(None);
                dates.push(None);
                year_months.push(None);
                hours.push(None);
            }
        }

        duration_hour.push(durations.get(idx).map(duration_hours));
        labels.push(raw_directions.get(idx).map(|code| directions.relabel(code)));
    }

    debug!(rows = len, invalid_timestamps = invalid, "normalized call records");

    let call_date = Series::new(CALL_DATE.into(), instants)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    let date = Series::new(DATE.into(), dates).cast(&DataType::Date)?;

    // Derived columns replace any extract column of the same name.
    let mut output = df.clone();
    for series in [
        call_date,
        Series::new(DIRECTION_TYPE.into(), labels),
        Series::new(CALL_DATE_STATUS.into(), statuses),
        date,
        Series::new(YEAR_MONTH.into(), year_months),
        Series::new(DURATION_HOUR.into(), duration_hour),
        Series::new(CALL_HOUR.into(), hours),
        Series::new(COUNT.into(), vec![1i32; len]),
    ] {
        output.with_column(series)?;
    }

    Ok(output)
}
