//! # Bulk Operations
//!
//! The write primitives behind [`crate::Sheet`]. Each one takes a resolved
//! [`SheetTarget`], honors `force_test_spreadsheet` and `dryrun`, and optionally removes the
//! tab's basic filter first (a filter would otherwise hide pasted rows).

use crate::range::qualify;
use crate::service::{SheetTarget, SheetsService};
use crate::Row;
use gapi_helper::{GapiError, GapiResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

/// Value written by [`SheetsService::bulk_update`] for each matched key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateValue {
    /// The same value for every key.
    Single(String),
    /// A value per key.
    PerKey(HashMap<String, String>),
}

impl UpdateValue {
    fn for_key(&self, key: &str) -> GapiResult<String> {
        match self {
            UpdateValue::Single(value) => Ok(value.clone()),
            UpdateValue::PerKey(values) => values
                .get(key)
                .cloned()
                .ok_or_else(|| GapiError::NotFound(format!("No update value for key {key}"))),
        }
    }
}

/// Encodes rows as CSV (comma-separated, `"`-quoted when needed, CRLF line endings).
///
/// Rows may have different lengths.
pub fn to_csv<R, S>(rows: &[R]) -> GapiResult<String>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row.as_ref().iter().map(|cell| cell.as_ref()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| GapiError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))?;
    String::from_utf8(bytes)
        .map_err(|e| GapiError::Addressing(format!("Invalid UTF-8 in CSV: {e}")))
}

/// A `pasteData` request placing `csv` at a zero-based coordinate.
pub fn paste_request(tab_id: i64, row_index: usize, column_index: usize, csv: &str) -> Value {
    json!({
        "pasteData": {
            "data": csv,
            "type": "PASTE_NORMAL",
            "delimiter": ",",
            "coordinate": {
                "sheetId": tab_id,
                "rowIndex": row_index,
                "columnIndex": column_index,
            },
        }
    })
}

impl SheetsService {
    /// Removes any active basic filter on the tab.
    pub async fn remove_filter(&self, target: &SheetTarget, dryrun: bool) -> GapiResult<()> {
        let target = self.write_target(target).await?;
        info!(
            "Removing filter in {} ({})",
            target.spreadsheet_id, target.tab_id
        );
        if dryrun {
            return Ok(());
        }
        self.batch_update(
            &target.spreadsheet_id,
            vec![json!({"clearBasicFilter": {"sheetId": target.tab_id}})],
        )
        .await?;
        Ok(())
    }

    /// Writes a value in `column` for every row whose first cell of `source_range` is one
    /// of `keys`.
    ///
    /// `row_offset` maps the index within `source_range` to a sheet row (typically the
    /// first row of `source_range` minus one). Returns the `(row, value)` pairs written.
    #[allow(clippy::too_many_arguments)]
    pub async fn bulk_update(
        &self,
        target: &SheetTarget,
        keys: &[&str],
        source_range: &str,
        row_offset: usize,
        column: usize,
        value: &UpdateValue,
        dryrun: bool,
        remove_filter: bool,
    ) -> GapiResult<Vec<(usize, String)>> {
        let target = self.write_target(target).await?;
        if remove_filter {
            self.remove_filter(&target, dryrun).await?;
        }
        let full_range = qualify(&target.tab_name, source_range);

        info!(
            "Getting values from {} {} ({}) in {} ({})...",
            full_range,
            target.spreadsheet_id,
            target.spreadsheet_name,
            target.tab_id,
            target.tab_name
        );
        let values = self.get_values(&target.spreadsheet_id, &full_range).await?;
        if values.is_empty() {
            info!("No input data to update");
            return Ok(Vec::new());
        }

        let mut index = Vec::new();
        for (idx, row) in values.iter().enumerate() {
            if let Some(key) = row.first().filter(|k| keys.contains(&k.as_str())) {
                index.push((idx + row_offset, value.for_key(key)?));
            }
        }
        if index.is_empty() {
            info!("Nothing to update");
            return Ok(index);
        }

        let requests = index
            .iter()
            .map(|(row, value)| paste_request(target.tab_id, *row, column, value))
            .collect();
        info!(
            "Writing to {} ({}) in {} ({})...",
            target.spreadsheet_id, target.spreadsheet_name, target.tab_id, target.tab_name
        );
        if dryrun {
            info!("Stubbed");
        } else {
            self.batch_update(&target.spreadsheet_id, requests).await?;
        }
        Ok(index)
    }

    /// Removes all values in a range.
    pub async fn bulk_clean(
        &self,
        target: &SheetTarget,
        range: &str,
        dryrun: bool,
        remove_filter: bool,
    ) -> GapiResult<()> {
        let target = self.write_target(target).await?;
        if remove_filter {
            self.remove_filter(&target, dryrun).await?;
        }
        let full_range = qualify(&target.tab_name, range);
        info!(
            "Cleaning {} {} ({}) in {} ({})...",
            full_range,
            target.spreadsheet_id,
            target.spreadsheet_name,
            target.tab_id,
            target.tab_name
        );
        if dryrun {
            return Ok(());
        }
        self.clear_values(&target.spreadsheet_id, &full_range).await
    }

    /// Pastes rows with their first cell at (`row_index`, `column_index`), both zero-based.
    pub async fn bulk_write(
        &self,
        target: &SheetTarget,
        rows: &[Row],
        row_index: usize,
        column_index: usize,
        dryrun: bool,
        remove_filter: bool,
    ) -> GapiResult<()> {
        let target = self.write_target(target).await?;
        let csv = to_csv(rows)?;
        if remove_filter {
            self.remove_filter(&target, dryrun).await?;
        }
        info!(
            "Writing to {} ({}) in {} ({})...",
            target.spreadsheet_id, target.spreadsheet_name, target.tab_id, target.tab_name
        );
        if dryrun {
            info!("Stubbed");
            return Ok(());
        }
        self.batch_update(
            &target.spreadsheet_id,
            vec![paste_request(target.tab_id, row_index, column_index, &csv)],
        )
        .await?;
        Ok(())
    }

    /// Appends rows after the table found in `range`.
    pub async fn bulk_append(
        &self,
        target: &SheetTarget,
        rows: &[Row],
        range: &str,
        dryrun: bool,
        remove_filter: bool,
    ) -> GapiResult<()> {
        let target = self.write_target(target).await?;
        if remove_filter {
            self.remove_filter(&target, dryrun).await?;
        }
        let full_range = qualify(&target.tab_name, range);
        info!(
            "Writing to {} ({}) in {} ({})...",
            target.spreadsheet_id, target.spreadsheet_name, target.tab_id, target.tab_name
        );
        if dryrun {
            info!("Stubbed");
            return Ok(());
        }
        self.append_values(&target.spreadsheet_id, &full_range, rows)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_csv_quotes_and_uses_crlf() {
        let rows = vec![
            vec!["ROW1,COL1".to_string(), "plain".to_string()],
            vec!["say \"hi\"".to_string()],
        ];
        assert_eq!(
            to_csv(&rows).unwrap(),
            "\"ROW1,COL1\",plain\r\n\"say \"\"hi\"\"\"\r\n"
        );
    }

    #[test]
    fn test_paste_request_shape() {
        assert_eq!(
            paste_request(7, 2, 5, "abcdef"),
            json!({"pasteData": {
                "data": "abcdef",
                "type": "PASTE_NORMAL",
                "delimiter": ",",
                "coordinate": {"sheetId": 7, "rowIndex": 2, "columnIndex": 5}
            }})
        );
    }

    #[test]
    fn test_update_value_lookup() {
        let single = UpdateValue::Single("x".to_string());
        assert_eq!(single.for_key("anything").unwrap(), "x");

        let per_key =
            UpdateValue::PerKey(HashMap::from([("14802".to_string(), "abcdef".to_string())]));
        assert_eq!(per_key.for_key("14802").unwrap(), "abcdef");
        assert!(matches!(per_key.for_key("1"), Err(GapiError::NotFound(_))));
    }
}
