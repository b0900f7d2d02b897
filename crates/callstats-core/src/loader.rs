use std::collections::HashSet;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

pub const CALL_DATE: &str = "call_date";
pub const DURATION_SEC: &str = "duration_sec";
pub const DIRECTION_TYPE: &str = "direction_type";
pub const MANAGER: &str = "manager";

/// One row of the raw call-log extract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallRecord {
    pub manager: Option<String>,
    pub call_date: Option<String>,
    pub duration_sec: Option<i64>,
    pub direction_type: Option<String>,
    /// Values of the remaining columns, aligned with `CallBatch::passthrough_columns`.
    pub passthrough: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct CallBatch {
    pub passthrough_columns: Vec<String>,
    pub records: Vec<CallRecord>,
}

struct ColumnLayout {
    manager: usize,
    call_date: usize,
    duration_sec: usize,
    direction_type: usize,
    passthrough: Vec<(usize, String)>,
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or(PipelineError::MissingColumn(name))
        };

        let manager = find(MANAGER)?;
        let call_date = find(CALL_DATE)?;
        let duration_sec = find(DURATION_SEC)?;
        let direction_type = find(DIRECTION_TYPE)?;
        let required = [manager, call_date, duration_sec, direction_type];

        let mut taken: HashSet<String> = [MANAGER, CALL_DATE, DURATION_SEC, DIRECTION_TYPE]
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut passthrough = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if required.contains(&idx) {
                continue;
            }
            let base = match header.trim() {
                "" => format!("column_{idx}"),
                name => name.to_string(),
            };
            let name = unique_name(base, &taken);
            taken.insert(name.clone());
            passthrough.push((idx, name));
        }

        Ok(Self {
            manager,
            call_date,
            duration_sec,
            direction_type,
            passthrough,
        })
    }

    fn record(&self, row: &StringRecord) -> CallRecord {
        CallRecord {
            manager: cell(row, self.manager),
            call_date: cell(row, self.call_date),
            duration_sec: cell(row, self.duration_sec).and_then(|value| parse_duration(&value)),
            direction_type: cell(row, self.direction_type),
            passthrough: self
                .passthrough
                .iter()
                .map(|(idx, _)| cell(row, *idx))
                .collect(),
        }
    }
}

/// Later copies of a repeated header become `name.1`, `name.2`, ...
fn unique_name(base: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}.{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

fn cell(row: &StringRecord, idx: usize) -> Option<String> {
    row.get(idx)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Accepts integers and integral decimals such as `"100.0"`; anything else reads as missing.
fn parse_duration(value: &str) -> Option<i64> {
    if let Ok(seconds) = value.parse::<i64>() {
        return Some(seconds);
    }
    let seconds = value.parse::<f64>().ok()?;
    (seconds.is_finite() && seconds.fract() == 0.0).then_some(seconds as i64)
}

/// Reads a call-log CSV with a header row. The whole batch is materialized before returning.
pub fn load_calls<R: io::Read>(reader: R) -> Result<CallBatch> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let layout = ColumnLayout::from_headers(&headers)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        records.push(layout.record(&row?));
    }

    debug!(
        passthrough = layout.passthrough.len(),
        "resolved call-log column layout"
    );

    Ok(CallBatch {
        passthrough_columns: layout.passthrough.into_iter().map(|(_, name)| name).collect(),
        records,
    })
}

pub fn load_calls_from_path(path: impl AsRef<Path>) -> Result<CallBatch> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let batch = load_calls(io::BufReader::new(file))?;
    info!(path = %path.display(), rows = batch.records.len(), "loaded call records");
    Ok(batch)
}

impl CallBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Builds the working frame: required columns first, then passthrough columns as strings.
    pub fn into_frame(self) -> Result<DataFrame> {
        let len = self.records.len();
        let mut manager: Vec<Option<String>> = Vec::with_capacity(len);
        let mut call_date: Vec<Option<String>> = Vec::with_capacity(len);
        let mut duration: Vec<Option<i64>> = Vec::with_capacity(len);
        let mut direction: Vec<Option<String>> = Vec::with_capacity(len);
        let mut passthrough: Vec<Vec<Option<String>>> =
            vec![Vec::with_capacity(len); self.passthrough_columns.len()];

        for record in self.records {
            manager.push(record.manager);
            call_date.push(record.call_date);
            duration.push(record.duration_sec);
            direction.push(record.direction_type);
            let mut values = record.passthrough.into_iter();
            for column in passthrough.iter_mut() {
                column.push(values.next().flatten());
            }
        }

        let mut columns: Vec<Column> = vec![
            Series::new(MANAGER.into(), manager).into(),
            Series::new(CALL_DATE.into(), call_date).into(),
            Series::new(DURATION_SEC.into(), duration).into(),
            Series::new(DIRECTION_TYPE.into(), direction).into(),
        ];
        for (name, values) in self.passthrough_columns.iter().zip(passthrough) {
            columns.push(Series::new(name.as_str().into(), values).into());
        }

        Ok(DataFrame::new(columns)?)
    }
}
