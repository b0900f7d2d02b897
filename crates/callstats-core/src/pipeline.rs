use polars::prelude::DataFrame;
use tracing::info;

use crate::aggregate::{aggregate_calls, MetricTables};
use crate::bucketize::{bucketize_calls, TIME_BIN};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::filter::{filter_calls, FilterSummary};
use crate::loader::CallBatch;
use crate::normalize::normalize_calls;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub filter: FilterSummary,
    /// Kept calls whose hour falls in no time bucket.
    pub outside_time_buckets: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub tables: MetricTables,
    pub summary: RunSummary,
}

/// Normalize, filter, bucketize and aggregate one batch of call records.
pub fn run_pipeline(batch: CallBatch, config: &PipelineConfig) -> Result<PipelineOutput> {
    let frame = batch.into_frame()?;
    run_pipeline_on_frame(&frame, config)
}

pub fn run_pipeline_on_frame(frame: &DataFrame, config: &PipelineConfig) -> Result<PipelineOutput> {
    config.validate()?;
    let buckets = config.time_buckets()?;
    let directions = config.direction_labels();

    let normalized = normalize_calls(frame, &directions)?;
    let (filtered, filter) = filter_calls(&normalized, config.min_duration_sec)?;
    info!(
        input_rows = filter.input_rows,
        kept_rows = filter.kept_rows,
        short_or_missing_duration = filter.short_or_missing_duration,
        missing_timestamp = filter.missing_timestamp,
        invalid_timestamp = filter.invalid_timestamp,
        "filtered call records"
    );

    let bucketized = bucketize_calls(&filtered, &buckets)?;
    let outside_time_buckets = bucketized.column(TIME_BIN)?.null_count();

    let tables = aggregate_calls(&bucketized, config.working_days)?;

    Ok(PipelineOutput {
        tables,
        summary: RunSummary {
            filter,
            outside_time_buckets,
        },
    })
}
