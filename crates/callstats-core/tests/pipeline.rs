use std::collections::HashMap;

use polars::prelude::*;

use callstats_core::loader::load_calls;
use callstats_core::publish::render_artifacts;
use callstats_core::{run_pipeline, PipelineConfig, PipelineOutput};

fn run(csv: &str) -> PipelineOutput {
    let batch = load_calls(csv.as_bytes()).expect("extract loads");
    run_pipeline(batch, &PipelineConfig::default()).expect("pipeline succeeds")
}

fn row_strings(df: &DataFrame, name: &str) -> Vec<String> {
    df.column(name)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect()
}

fn row_counts(df: &DataFrame) -> Vec<u64> {
    df.column("count")
        .unwrap()
        .cast(&DataType::UInt64)
        .unwrap()
        .u64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}

const MIXED_EXTRACT: &str = "\
manager,call_date,duration_sec,direction_type
A,2024-03-10T10:00:00,100,in
A,2024-03-10T11:00:00,39,out
A,2024-03-11T20:15:00,600,out
A,broken,900,in
A,,900,in
A,2024-04-02T14:00:00,75,internal
B,2024-03-12T16:00:00,40,voicemail
B,2024-03-12T08:00:00,3600,in
";

#[test]
fn single_inbound_call_scenario() {
    let output = run("\
manager,call_date,duration_sec,direction_type
A,2024-03-10T10:00:00,100,in
");
    let tables = &output.tables;

    assert_eq!(row_strings(&tables.call_by_type, "manager"), ["A"]);
    assert_eq!(row_strings(&tables.call_by_type, "direction_type"), ["Inbound"]);
    assert_eq!(row_strings(&tables.call_by_type, "year_month"), ["2024-03"]);
    assert_eq!(row_counts(&tables.call_by_type), [1]);

    assert_eq!(row_strings(&tables.call_by_time_bin, "time_bin"), ["(8,11]"]);
    assert_eq!(row_strings(&tables.call_by_time_bin, "year_month"), ["2024-03"]);
    assert_eq!(row_counts(&tables.call_by_time_bin), [1]);

    let avg = tables
        .avg_call_duration
        .column("duration_hour")
        .unwrap()
        .f64()
        .unwrap();
    let expected = (100.0_f64 / 3600.0 / 23.0 * 100.0).round() / 100.0;
    assert_eq!(avg.get(0), Some(expected));
    assert_eq!(row_strings(&tables.avg_call_duration, "year_month"), ["2024-03"]);
}

#[test]
fn single_short_call_leaves_every_table_empty() {
    let output = run("\
manager,call_date,duration_sec,direction_type
A,2024-03-10T10:00:00,30,in
");

    for (name, rows) in output.tables.row_counts() {
        assert_eq!(rows, 0, "{name}");
    }
    assert_eq!(output.summary.filter.kept_rows, 0);
}

#[test]
fn short_and_undated_calls_are_absent_from_every_table() {
    let output = run(MIXED_EXTRACT);
    let tables = &output.tables;

    // Kept: A 03-10 10h in, A 03-11 20h out, A 04-02 14h internal, B 03-12 16h voicemail,
    // B 03-12 08h in.
    assert_eq!(output.summary.filter.kept_rows, 5);
    assert_eq!(output.summary.filter.short_or_missing_duration, 1);
    assert_eq!(output.summary.filter.invalid_timestamp, 1);
    assert_eq!(output.summary.filter.missing_timestamp, 1);
    assert_eq!(output.summary.outside_time_buckets, 2);

    let total: u64 = row_counts(&tables.call_by_type).iter().sum();
    assert_eq!(total, 5);

    assert_eq!(
        row_strings(&tables.call_by_type, "direction_type"),
        ["Inbound", "Internal", "Outbound", "Inbound", "voicemail"]
    );
}

#[test]
fn hour_twenty_contributes_no_time_bin_row() {
    let output = run("\
manager,call_date,duration_sec,direction_type
A,2024-03-11T20:15:00,600,out
");

    assert_eq!(output.tables.call_by_time_bin.height(), 0);
    assert_eq!(output.tables.call_by_type.height(), 1);
    assert_eq!(output.tables.avg_call_duration.height(), 1);
}

#[test]
fn type_counts_match_filtered_records_per_manager_and_month() {
    let output = run(MIXED_EXTRACT);
    let table = &output.tables.call_by_type;

    let managers = row_strings(table, "manager");
    let months = row_strings(table, "year_month");
    let counts = row_counts(table);

    let mut totals: HashMap<(String, String), u64> = HashMap::new();
    for ((manager, month), count) in managers.into_iter().zip(months).zip(counts) {
        *totals.entry((manager, month)).or_insert(0) += count;
    }

    assert_eq!(totals[&("A".to_string(), "2024-03".to_string())], 2);
    assert_eq!(totals[&("A".to_string(), "2024-04".to_string())], 1);
    assert_eq!(totals[&("B".to_string(), "2024-03".to_string())], 2);
    assert_eq!(totals.len(), 3);
}

#[test]
fn avg_duration_matches_rounded_monthly_hours() {
    let output = run(MIXED_EXTRACT);
    let table = &output.tables.avg_call_duration;

    assert_eq!(row_strings(table, "manager"), ["A", "A", "B"]);
    assert_eq!(row_strings(table, "year_month"), ["2024-03", "2024-04", "2024-03"]);

    let hours: Vec<f64> = table
        .column("duration_hour")
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    // A/2024-03: 0.03 + 0.17 = 0.20 h; A/2024-04: 0.02 h; B/2024-03: 0.01 + 1.0 = 1.01 h.
    assert_eq!(hours, vec![0.01, 0.0, 0.04]);
}

#[test]
fn repeated_runs_produce_identical_artifacts() {
    let first = render_artifacts(&run(MIXED_EXTRACT).tables).expect("render");
    let second = render_artifacts(&run(MIXED_EXTRACT).tables).expect("render");

    assert_eq!(first, second);
    let names: Vec<&str> = first.iter().map(|artifact| artifact.name).collect();
    assert_eq!(
        names,
        ["call_by_type.csv", "call_by_time_bin.csv", "avg_call_duration.csv"]
    );
}

#[test]
fn invalid_config_is_rejected_before_processing() {
    let batch = load_calls(MIXED_EXTRACT.as_bytes()).expect("extract loads");
    let config = PipelineConfig {
        working_days: 0.0,
        ..PipelineConfig::default()
    };

    assert!(run_pipeline(batch, &config).is_err());
}

#[test]
fn extract_date_column_is_replaced_by_the_derived_one() {
    let output = run("\
manager,call_date,duration_sec,direction_type,date
A,2024-03-10T10:00:00,100,in,1999-01-01
");
    let tables = &output.tables;

    assert_eq!(row_strings(&tables.call_by_type, "direction_type"), ["Inbound"]);
    assert_eq!(row_strings(&tables.call_by_type, "year_month"), ["2024-03"]);
    assert_eq!(row_counts(&tables.call_by_type), [1]);
    assert_eq!(row_strings(&tables.call_by_time_bin, "time_bin"), ["(8,11]"]);
    assert_eq!(tables.avg_call_duration.height(), 1);
}

#[test]
fn extract_count_and_time_bin_columns_do_not_leak_into_tables() {
    let output = run("\
manager,call_date,duration_sec,direction_type,count,time_bin
A,2024-03-10T10:00:00,100,in,7,night
A,2024-03-10T10:30:00,200,in,,
");
    let tables = &output.tables;

    assert_eq!(row_strings(&tables.call_by_type, "year_month"), ["2024-03"]);
    assert_eq!(row_counts(&tables.call_by_type), [2]);
    assert_eq!(row_strings(&tables.call_by_time_bin, "time_bin"), ["(8,11]"]);
    assert_eq!(row_counts(&tables.call_by_time_bin), [2]);
}
