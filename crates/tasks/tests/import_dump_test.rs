//! # Import and Dump Integration Tests

use anyhow::Result;
use chrono::NaiveDate;
use gapi_helper::GapiError;
use gapi_helper_sheets::{Sheet, SheetsService};
use gapi_helper_tasks::{
    integer_parser, DumpColumn, DumpTask, FieldFormatter, FieldMapping, ImportSheet, ImportSource,
    Mapping,
};
use gapi_helper_test_utils::TestSetup;
use httpmock::Method;
use serde_json::json;
use std::sync::Arc;

fn sheet(setup: &TestSetup) -> Sheet {
    SheetsService::with_token_provider(&setup.config, setup.token_provider())
        .spreadsheet("sid", Some("People"))
        .add_sheet("list", Some(4))
}

fn people_mapping() -> Mapping {
    Mapping::new()
        .with_header_rows(1)
        .field(FieldMapping::new("name", 0))
        .field(FieldMapping::new("age", 1).with_parser(integer_parser()))
}

#[tokio::test]
async fn test_online_import_downloads_and_maps_rows() -> Result<()> {
    // --- Arrange ---
    let setup = TestSetup::new()?;
    let export_mock = setup.server.mock(|when, then| {
        when.method(Method::GET)
            .path("/spreadsheets/d/sid/export")
            .query_param("gid", "4");
        then.status(200)
            .header("content-type", "text/csv")
            .body("Name,Age\r\nAda,36\r\nGrace,\r\n");
    });
    let source = ImportSheet::new(sheet(&setup), Some(people_mapping()), false, None)?;

    // --- Act ---
    let records = source.records().await?;

    // --- Assert ---
    export_mock.assert();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("name"), Some(&json!("Ada")));
    assert_eq!(records[0].get("age"), Some(&json!(36)));
    assert_eq!(records[1].get("age"), Some(&json!(null)));
    assert_eq!(
        records[0].changed_fields(&records[1], source.mapping()),
        vec!["name".to_string(), "age".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_offline_import_reads_the_dated_backup() -> Result<()> {
    let setup = TestSetup::new()?;
    let export_mock = setup.server.mock(|when, then| {
        when.method(Method::GET).path("/spreadsheets/d/sid/export");
        then.status(200).header("content-type", "text/csv").body("unused\r\n");
    });
    std::fs::write(
        setup.backup_dir().join("People - list-2024-05-02.csv"),
        "Name,Age\r\nAlan,41\r\n",
    )?;
    let date = NaiveDate::from_ymd_opt(2024, 5, 2).expect("valid date");
    let source = ImportSheet::new(sheet(&setup), Some(people_mapping()), true, Some(date))?;

    let records = source.records().await?;

    export_mock.assert_hits(0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("age"), Some(&json!(41)));
    Ok(())
}

#[tokio::test]
async fn test_import_falls_back_to_the_sheet_mapping() -> Result<()> {
    // --- Arrange ---
    let setup = TestSetup::new()?;
    let export_mock = setup.server.mock(|when, then| {
        when.method(Method::GET)
            .path("/spreadsheets/d/sid/export")
            .query_param("gid", "4");
        then.status(200)
            .header("content-type", "text/csv")
            .body("Name,Age\r\nLinus,54\r\n");
    });
    let mapped = sheet(&setup).with_mapping(people_mapping());
    let source = ImportSheet::new(mapped, None, false, None)?;

    // --- Act ---
    let records = source.records().await?;

    // --- Assert ---
    export_mock.assert();
    assert_eq!(source.mapping().fields().len(), 2);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("name"), Some(&json!("Linus")));
    assert_eq!(records[0].get("age"), Some(&json!(54)));
    Ok(())
}

#[tokio::test]
async fn test_import_requires_a_mapping() -> Result<()> {
    let setup = TestSetup::new()?;

    let result = ImportSheet::new(sheet(&setup), None, false, None);

    assert!(matches!(
        result,
        Err(GapiError::Configuration(msg)) if msg == "Sheet mapping cannot be None"
    ));
    Ok(())
}

fn dump_columns() -> Vec<DumpColumn> {
    let upper: FieldFormatter = Arc::new(|value| value.as_str().unwrap_or_default().to_uppercase());
    vec![
        DumpColumn::new("zip", "Zip code", 2),
        DumpColumn::new("id", "Id", 0),
        DumpColumn::new("city", "City", 1).with_formatter(upper),
    ]
}

#[tokio::test]
async fn test_dump_rows_are_ordered_and_protect_leading_zeros() -> Result<()> {
    let setup = TestSetup::new()?;
    let task = DumpTask::new(sheet(&setup), dump_columns())?;
    let records = vec![
        json!({"id": 1, "city": "lyon", "zip": "01000"}),
        json!({"id": 2, "city": "paris"}),
    ];

    let rows = task.rows(&records);

    assert_eq!(task.clear_range(), "A1:C");
    assert_eq!(
        rows,
        vec![
            vec!["Id".to_string(), "City".to_string(), "Zip code".to_string()],
            vec!["1".to_string(), "LYON".to_string(), "'01000".to_string()],
            vec!["2".to_string(), "PARIS".to_string(), String::new()],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_dump_cleans_then_writes_from_a1() -> Result<()> {
    // --- Arrange ---
    let setup = TestSetup::new()?;
    let filter_mock = setup.server.mock(|when, then| {
        when.method(Method::POST)
            .path("/spreadsheets/sid:batchUpdate")
            .body_contains("clearBasicFilter");
        then.status(200).json_body(json!({}));
    });
    let clear_mock = setup.server.mock(|when, then| {
        when.method(Method::POST)
            .path_contains("/spreadsheets/sid/values/")
            .path_contains(":clear");
        then.status(200).json_body(json!({}));
    });
    let write_mock = setup.server.mock(|when, then| {
        when.method(Method::POST)
            .path("/spreadsheets/sid:batchUpdate")
            .body_contains("pasteData")
            .body_contains("\"rowIndex\":0")
            .body_contains("'01000");
        then.status(200).json_body(json!({}));
    });
    let task = DumpTask::new(sheet(&setup), dump_columns())?;
    let records = vec![json!({"id": 1, "city": "lyon", "zip": "01000"})];

    // --- Act ---
    let written = task.run(&records, false).await?;

    // --- Assert ---
    filter_mock.assert();
    clear_mock.assert();
    write_mock.assert();
    assert_eq!(written, 1);
    Ok(())
}

#[tokio::test]
async fn test_dump_columns_must_start_at_zero() -> Result<()> {
    let setup = TestSetup::new()?;

    let result = DumpTask::new(sheet(&setup), vec![DumpColumn::new("id", "Id", 1)]);

    assert!(matches!(result, Err(GapiError::Configuration(_))));
    Ok(())
}
