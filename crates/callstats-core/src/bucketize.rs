use polars::prelude::*;

use crate::error::{PipelineError, Result};
use crate::normalize::CALL_HOUR;

pub const TIME_BIN: &str = "time_bin";
/// Position of `time_bin` in the bucket list, used to order report rows.
pub const TIME_BIN_RANK: &str = "time_bin_rank";

/// Ordered hour-of-day intervals `(lo, hi]` built from consecutive boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBuckets {
    boundaries: Vec<u32>,
    labels: Vec<String>,
}

impl Default for TimeBuckets {
    fn default() -> Self {
        Self {
            boundaries: crate::config::DEFAULT_BUCKET_BOUNDARIES.to_vec(),
            labels: interval_labels(&crate::config::DEFAULT_BUCKET_BOUNDARIES),
        }
    }
}

fn interval_labels(boundaries: &[u32]) -> Vec<String> {
    boundaries
        .windows(2)
        .map(|pair| format!("({},{}]", pair[0], pair[1]))
        .collect()
}

impl TimeBuckets {
    pub fn new(boundaries: Vec<u32>, labels: Vec<String>) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(PipelineError::Config(
                "time buckets need at least two boundaries".into(),
            ));
        }
        if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(PipelineError::Config(format!(
                "time bucket boundaries must be strictly increasing, got {boundaries:?}"
            )));
        }
        if labels.len() != boundaries.len() - 1 {
            return Err(PipelineError::Config(format!(
                "expected {} time bucket labels, got {}",
                boundaries.len() - 1,
                labels.len()
            )));
        }
        Ok(Self { boundaries, labels })
    }

    pub fn with_interval_labels(boundaries: Vec<u32>) -> Result<Self> {
        let labels = interval_labels(&boundaries);
        Self::new(boundaries, labels)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Index of the bucket containing `hour`. An hour equal to a boundary belongs to the
    /// bucket that ends there; hours at or below the first boundary or above the last have none.
    pub fn classify(&self, hour: u32) -> Option<usize> {
        self.boundaries
            .windows(2)
            .position(|pair| pair[0] < hour && hour <= pair[1])
    }

    pub fn label_for_hour(&self, hour: u32) -> Option<&str> {
        self.classify(hour).map(|idx| self.labels[idx].as_str())
    }
}

/// Adds `time_bin` and `time_bin_rank`; both are null when the hour falls in no bucket.
pub fn bucketize_calls(df: &DataFrame, buckets: &TimeBuckets) -> PolarsResult<DataFrame> {
    let len = df.height();
    let hours = df.column(CALL_HOUR)?.u32()?;

    let mut bins: Vec<Option<&str>> = Vec::with_capacity(len);
    let mut ranks: Vec<Option<u32>> = Vec::with_capacity(len);

    for idx in 0..len {
        let bucket = hours.get(idx).and_then(|hour| buckets.classify(hour));
        bins.push(bucket.map(|i| buckets.labels[i].as_str()));
        ranks.push(bucket.map(|i| i as u32));
    }

    let mut output = df.clone();
    output.with_column(Series::new(TIME_BIN.into(), bins))?;
    output.with_column(Series::new(TIME_BIN_RANK.into(), ranks))?;

    Ok(output)
}
