pub mod aggregate;
pub mod bucketize;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod publish;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{run_pipeline, run_pipeline_on_frame, PipelineOutput, RunSummary};
