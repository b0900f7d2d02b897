use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bucketize::TimeBuckets;
use crate::error::{PipelineError, Result};
use crate::normalize::DirectionLabels;

/// Calls shorter than this many seconds are not counted.
pub const DEFAULT_MIN_DURATION_SEC: i64 = 40;
/// Approximate working days per month used to turn monthly talk time into a daily average.
pub const DEFAULT_WORKING_DAYS: f64 = 23.0;
pub const DEFAULT_BUCKET_BOUNDARIES: [u32; 5] = [8, 11, 14, 16, 19];

/// Tunable business constants of a run. Every field defaults to the reported values, so an
/// empty TOML document yields the standard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_duration_sec: i64,
    pub working_days: f64,
    pub time_buckets: TimeBucketConfig,
    pub direction_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBucketConfig {
    pub boundaries: Vec<u32>,
    /// One label per interval; interval notation such as `(8,11]` when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl Default for TimeBucketConfig {
    fn default() -> Self {
        Self {
            boundaries: DEFAULT_BUCKET_BOUNDARIES.to_vec(),
            labels: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_duration_sec: DEFAULT_MIN_DURATION_SEC,
            working_days: DEFAULT_WORKING_DAYS,
            time_buckets: TimeBucketConfig::default(),
            direction_labels: DirectionLabels::default().into_map(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| PipelineError::Config(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_duration_sec < 0 {
            return Err(PipelineError::Config(format!(
                "min_duration_sec must be non-negative, got {}",
                self.min_duration_sec
            )));
        }
        if !(self.working_days.is_finite() && self.working_days > 0.0) {
            return Err(PipelineError::Config(format!(
                "working_days must be a positive number, got {}",
                self.working_days
            )));
        }
        self.time_buckets()?;
        Ok(())
    }

    pub fn time_buckets(&self) -> Result<TimeBuckets> {
        match &self.time_buckets.labels {
            Some(labels) => TimeBuckets::new(self.time_buckets.boundaries.clone(), labels.clone()),
            None => TimeBuckets::with_interval_labels(self.time_buckets.boundaries.clone()),
        }
    }

    pub fn direction_labels(&self) -> DirectionLabels {
        DirectionLabels::from_map(self.direction_labels.clone())
    }
}
