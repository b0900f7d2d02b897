use polars::prelude::*;

use crate::loader::DURATION_SEC;
use crate::normalize::{TimestampStatus, CALL_DATE_STATUS};

/// Row counts for one pass of [`filter_calls`]. A row failing both checks is counted as a
/// duration drop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub input_rows: usize,
    pub kept_rows: usize,
    pub short_or_missing_duration: usize,
    pub missing_timestamp: usize,
    pub invalid_timestamp: usize,
}

impl FilterSummary {
    pub fn dropped_rows(&self) -> usize {
        self.input_rows - self.kept_rows
    }
}

/// Keeps calls lasting at least `min_duration_sec` whose timestamp parsed.
pub fn filter_calls(
    df: &DataFrame,
    min_duration_sec: i64,
) -> PolarsResult<(DataFrame, FilterSummary)> {
    let len = df.height();
    let durations = df.column(DURATION_SEC)?.i64()?;
    let statuses = df.column(CALL_DATE_STATUS)?.str()?;

    let valid = TimestampStatus::Valid.as_str();
    let missing = TimestampStatus::Missing.as_str();

    let mut summary = FilterSummary {
        input_rows: len,
        ..FilterSummary::default()
    };
    let mut keep = Vec::with_capacity(len);

    for idx in 0..len {
        let long_enough = durations
            .get(idx)
            .is_some_and(|seconds| seconds >= min_duration_sec);
        let status = statuses.get(idx);
        let timestamp_ok = status == Some(valid);

        if !long_enough {
            summary.short_or_missing_duration += 1;
        } else if !timestamp_ok {
            if status.is_none() || status == Some(missing) {
                summary.missing_timestamp += 1;
            } else {
                summary.invalid_timestamp += 1;
            }
        }

        keep.push(long_enough && timestamp_ok);
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let filtered = df.filter(&mask)?;
    summary.kept_rows = filtered.height();

    Ok((filtered, summary))
}
