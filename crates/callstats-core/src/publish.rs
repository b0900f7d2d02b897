use std::io::Cursor;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use callstats_bucket::BucketStore;
use polars::prelude::*;
use tracing::info;

use crate::aggregate::MetricTables;
use crate::error::Result;

pub const CALL_BY_TYPE_FILE: &str = "call_by_type.csv";
pub const CALL_BY_TIME_BIN_FILE: &str = "call_by_time_bin.csv";
pub const AVG_CALL_DURATION_FILE: &str = "avg_call_duration.csv";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// A serialized report table and the fixed name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: &'static str,
    pub bytes: Bytes,
}

fn create_csv_bytes(df: &DataFrame) -> PolarsResult<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let mut clone = df.clone();
        CsvWriter::new(&mut cursor)
            .include_header(true)
            .finish(&mut clone)?;
    }
    Ok(buffer)
}

/// Serializes each table as comma-separated text with a header row.
pub fn render_artifacts(tables: &MetricTables) -> Result<Vec<Artifact>> {
    let named = [
        (CALL_BY_TYPE_FILE, &tables.call_by_type),
        (CALL_BY_TIME_BIN_FILE, &tables.call_by_time_bin),
        (AVG_CALL_DURATION_FILE, &tables.avg_call_duration),
    ];

    let mut artifacts = Vec::with_capacity(named.len());
    for (name, df) in named {
        artifacts.push(Artifact {
            name,
            bytes: Bytes::from(create_csv_bytes(df)?),
        });
    }
    Ok(artifacts)
}

pub fn write_local_copies(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(artifact.name);
        std::fs::write(&path, &artifact.bytes)?;
        written.push(path);
    }
    Ok(written)
}

/// Uploads artifacts one at a time, stopping at the first failure.
pub async fn upload_artifacts(
    store: &dyn BucketStore,
    bucket: &str,
    artifacts: &[Artifact],
) -> Result<()> {
    for artifact in artifacts {
        store
            .put_object(bucket, artifact.name, artifact.bytes.clone(), CSV_CONTENT_TYPE)
            .await?;
        info!(bucket, key = artifact.name, size = artifact.bytes.len(), "uploaded artifact");
    }
    Ok(())
}
