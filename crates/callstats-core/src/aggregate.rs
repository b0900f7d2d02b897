use polars::prelude::*;
use tracing::debug;

use crate::bucketize::{TIME_BIN, TIME_BIN_RANK};
use crate::loader::{DIRECTION_TYPE, MANAGER};
use crate::normalize::{round_half_even, COUNT, DURATION_HOUR, YEAR_MONTH};

/// The three published report tables.
#[derive(Debug, Clone)]
pub struct MetricTables {
    /// `manager, direction_type, year_month, count`
    pub call_by_type: DataFrame,
    /// `manager, time_bin, year_month, count`
    pub call_by_time_bin: DataFrame,
    /// `manager, year_month, duration_hour`
    pub avg_call_duration: DataFrame,
}

impl MetricTables {
    pub fn row_counts(&self) -> [(&'static str, usize); 3] {
        [
            ("call_by_type", self.call_by_type.height()),
            ("call_by_time_bin", self.call_by_time_bin.height()),
            ("avg_call_duration", self.avg_call_duration.height()),
        ]
    }
}

pub fn aggregate_calls(df: &DataFrame, working_days: f64) -> PolarsResult<MetricTables> {
    let tables = MetricTables {
        call_by_type: call_by_type(df)?,
        call_by_time_bin: call_by_time_bin(df)?,
        avg_call_duration: avg_call_duration(df, working_days)?,
    };
    debug!(
        call_by_type = tables.call_by_type.height(),
        call_by_time_bin = tables.call_by_time_bin.height(),
        avg_call_duration = tables.avg_call_duration.height(),
        "aggregated call metrics"
    );
    Ok(tables)
}

fn keys_present(keys: &[&str]) -> Expr {
    keys.iter()
        .map(|key| col(*key).is_not_null())
        .reduce(|acc, expr| acc.and(expr))
        .unwrap_or_else(|| lit(true))
}

/// Number of calls per manager, direction label and month.
pub fn call_by_type(df: &DataFrame) -> PolarsResult<DataFrame> {
    let keys = [MANAGER, DIRECTION_TYPE, YEAR_MONTH];
    df.clone()
        .lazy()
        .filter(keys_present(&keys))
        .group_by(keys.map(col))
        .agg([col(COUNT).count()])
        .sort_by_exprs(keys.map(col), SortMultipleOptions::default())
        .collect()
}

/// Number of calls per manager, time-of-day bucket and month. Calls outside every bucket
/// are not counted. Rows follow bucket order rather than label order.
pub fn call_by_time_bin(df: &DataFrame) -> PolarsResult<DataFrame> {
    let keys = [MANAGER, TIME_BIN, YEAR_MONTH];
    df.clone()
        .lazy()
        .filter(keys_present(&keys))
        .group_by(keys.map(col))
        .agg([col(COUNT).count(), col(TIME_BIN_RANK).first()])
        .sort_by_exprs(
            [col(MANAGER), col(TIME_BIN_RANK), col(YEAR_MONTH)],
            SortMultipleOptions::default(),
        )
        .select([col(MANAGER), col(TIME_BIN), col(YEAR_MONTH), col(COUNT)])
        .collect()
}

/// Monthly talk time in hours spread over `working_days`, rounded to two places.
pub fn avg_call_duration(df: &DataFrame, working_days: f64) -> PolarsResult<DataFrame> {
    let keys = [MANAGER, YEAR_MONTH];
    let mut sums = df
        .clone()
        .lazy()
        .filter(keys_present(&keys))
        .group_by(keys.map(col))
        .agg([col(DURATION_HOUR).sum()])
        .sort_by_exprs(keys.map(col), SortMultipleOptions::default())
        .collect()?;

    let averages: Vec<Option<f64>> = sums
        .column(DURATION_HOUR)?
        .f64()?
        .into_iter()
        .map(|total| total.map(|hours| round_half_even(hours / working_days, 2)))
        .collect();

    sums.with_column(Series::new(DURATION_HOUR.into(), averages))?;
    Ok(sums)
}
