//! # Column Mappings
//!
//! A [`Mapping`] reads typed records out of sheet rows. Each [`FieldMapping`] names a
//! field and its column, with a parser for the cell text and a comparator for values.

use gapi_helper::{GapiError, GapiResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Converts the text of a cell into a field value.
pub type FieldParser = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

/// Tells whether two values of a field are the same.
pub type FieldComparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Keeps the cell text as-is.
pub fn text_parser() -> FieldParser {
    Arc::new(|cell| Ok(Value::String(cell.to_string())))
}

/// Parses an integer. Blank cells become `null`.
pub fn integer_parser() -> FieldParser {
    Arc::new(|cell| {
        let cell = cell.trim();
        if cell.is_empty() {
            return Ok(Value::Null);
        }
        cell.parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("'{cell}' is not an integer: {e}"))
    })
}

pub fn equality_comparator() -> FieldComparator {
    Arc::new(|a, b| a == b)
}

/// How one field is read from a row.
#[derive(Clone)]
pub struct FieldMapping {
    pub field: String,
    /// Zero-based column of the field in the source rows.
    pub column: usize,
    pub parser: FieldParser,
    pub comparator: FieldComparator,
}

impl fmt::Debug for FieldMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("field", &self.field)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

impl FieldMapping {
    /// A text field compared by equality.
    pub fn new(field: &str, column: usize) -> Self {
        Self {
            field: field.to_string(),
            column,
            parser: text_parser(),
            comparator: equality_comparator(),
        }
    }

    pub fn with_parser(mut self, parser: FieldParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_comparator(mut self, comparator: FieldComparator) -> Self {
        self.comparator = comparator;
        self
    }
}

/// The fields of a record and where to find them in a row.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    fields: Vec<FieldMapping>,
    header_rows: usize,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leading rows that are headers, not records.
    pub fn with_header_rows(mut self, header_rows: usize) -> Self {
        self.header_rows = header_rows;
        self
    }

    pub fn field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn header_rows(&self) -> usize {
        self.header_rows
    }

    /// Parses every field of `row`. Missing trailing cells read as empty.
    ///
    /// `index` is only used in error messages.
    pub fn map_row(&self, index: usize, row: &[String]) -> GapiResult<MappedRow> {
        let mut values = BTreeMap::new();
        for mapping in &self.fields {
            let cell = row.get(mapping.column).map_or("", String::as_str);
            let value = (mapping.parser)(cell).map_err(|e| {
                GapiError::Addressing(format!(
                    "Could not parse {} on row {}: {}",
                    mapping.field,
                    index + 1,
                    e
                ))
            })?;
            values.insert(mapping.field.clone(), value);
        }
        Ok(MappedRow(values))
    }
}

/// Field name to parsed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappedRow(BTreeMap<String, Value>);

impl MappedRow {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_string(), value);
    }

    /// Fields of `mapping` whose values differ between `self` and `other`, per field
    /// comparator. A field missing on one side compares as `null`.
    pub fn changed_fields(&self, other: &MappedRow, mapping: &Mapping) -> Vec<String> {
        mapping
            .fields()
            .iter()
            .filter(|m| {
                let mine = self.get(&m.field).unwrap_or(&Value::Null);
                let theirs = other.get(&m.field).unwrap_or(&Value::Null);
                !(m.comparator)(mine, theirs)
            })
            .map(|m| m.field.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Row;
    use serde_json::json;

    fn mapping() -> Mapping {
        Mapping::new()
            .with_header_rows(1)
            .field(FieldMapping::new("name", 0))
            .field(FieldMapping::new("age", 2).with_parser(integer_parser()))
    }

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_map_row_parses_each_field() {
        let mapped = mapping().map_row(1, &row(&["Ada", "ignored", "36"])).unwrap();
        assert_eq!(mapped.get("name"), Some(&json!("Ada")));
        assert_eq!(mapped.get("age"), Some(&json!(36)));
    }

    #[test]
    fn test_missing_cells_read_as_empty() {
        let mapped = mapping().map_row(1, &row(&["Ada"])).unwrap();
        assert_eq!(mapped.get("age"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_errors_name_the_field_and_row() {
        let err = mapping().map_row(4, &row(&["Ada", "", "old"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not parse age on row 5: 'old' is not an integer: invalid digit found in string"
        );
    }

    #[test]
    fn test_changed_fields_uses_comparators() {
        let case_insensitive: FieldComparator = Arc::new(|a, b| {
            a.as_str().map(str::to_lowercase) == b.as_str().map(str::to_lowercase)
        });
        let mapping = Mapping::new()
            .field(FieldMapping::new("name", 0).with_comparator(case_insensitive))
            .field(FieldMapping::new("city", 1));

        let before = mapping.map_row(0, &row(&["ADA", "London"])).unwrap();
        let after = mapping.map_row(0, &row(&["ada", "Paris"])).unwrap();

        assert_eq!(before.changed_fields(&after, &mapping), vec!["city".to_string()]);
        assert!(before.changed_fields(&before, &mapping).is_empty());
    }
}
