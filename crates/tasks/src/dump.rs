//! # Dumps
//!
//! A [`DumpTask`] replaces the content of a sheet with a header row followed by one row
//! per record.

use gapi_helper::{GapiError, GapiResult};
use gapi_helper_sheets::{num2col, Row, Sheet};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Renders a field value as cell text.
pub type FieldFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// A record that can be dumped, field by field.
pub trait DumpRecord {
    /// Value of a field; `None` when the record has no such field.
    fn field(&self, name: &str) -> Option<Value>;
}

impl DumpRecord for Map<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl DumpRecord for Value {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl DumpRecord for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned().map(Value::String)
    }
}

fn display_formatter() -> FieldFormatter {
    Arc::new(|value| match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// One column of a dump.
#[derive(Clone)]
pub struct DumpColumn {
    pub field: String,
    pub header: String,
    /// Zero-based column index.
    pub column_number: usize,
    pub formatter: FieldFormatter,
}

impl fmt::Debug for DumpColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpColumn")
            .field("field", &self.field)
            .field("header", &self.header)
            .field("column_number", &self.column_number)
            .finish_non_exhaustive()
    }
}

impl DumpColumn {
    pub fn new(field: &str, header: &str, column_number: usize) -> Self {
        Self {
            field: field.to_string(),
            header: header.to_string(),
            column_number,
            formatter: display_formatter(),
        }
    }

    pub fn with_formatter(mut self, formatter: FieldFormatter) -> Self {
        self.formatter = formatter;
        self
    }
}

/// Dumps records into a sheet.
#[derive(Debug, Clone)]
pub struct DumpTask {
    sheet: Sheet,
    columns: Vec<DumpColumn>,
}

impl DumpTask {
    /// Columns are sorted by number. The first one must be column 0.
    pub fn new(sheet: Sheet, columns: Vec<DumpColumn>) -> GapiResult<Self> {
        let mut columns = columns;
        columns.sort_by_key(|c| c.column_number);
        match columns.first() {
            Some(first) if first.column_number == 0 => Ok(Self { sheet, columns }),
            Some(first) => Err(GapiError::Configuration(format!(
                "The first dump column must be column 0, got {} for {}",
                first.column_number, first.field
            ))),
            None => Err(GapiError::Configuration(
                "A dump needs at least one column".to_string(),
            )),
        }
    }

    /// The range cleared before writing, e.g. `A1:C`.
    pub fn clear_range(&self) -> String {
        let last = self.columns.iter().map(|c| c.column_number).max().unwrap_or(0);
        format!("A1:{}", num2col(last + 1))
    }

    /// The header row followed by one row per record.
    ///
    /// Values starting with `0` get a leading `'` so that the sheet keeps them as text.
    pub fn rows<R: DumpRecord>(&self, records: &[R]) -> Vec<Row> {
        let header = self.columns.iter().map(|c| c.header.clone()).collect();
        let mut rows = vec![header];
        for record in records {
            let row = self
                .columns
                .iter()
                .map(|column| {
                    let value = record.field(&column.field).unwrap_or(Value::Null);
                    let text = (column.formatter)(&value);
                    if text.starts_with('0') {
                        format!("'{text}")
                    } else {
                        text
                    }
                })
                .collect();
            rows.push(row);
        }
        rows
    }

    /// Clears the sheet columns, then writes every record from A1. Returns the number of
    /// records written.
    pub async fn run<R: DumpRecord>(&self, records: &[R], dryrun: bool) -> GapiResult<usize> {
        let rows = self.rows(records);
        info!(
            "Dumping {} records into {}",
            records.len(),
            self.sheet.tab_name()
        );
        self.sheet.bulk_clean(&self.clear_range(), dryrun, true).await?;
        self.sheet.bulk_write(&rows, 0, 0, dryrun, false).await?;
        Ok(records.len())
    }
}
