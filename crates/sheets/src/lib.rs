//! # gapi-helper-sheets: Google Sheets Helpers
//!
//! Reading and writing spreadsheet tabs through the Sheets v4 API.
//!
//! - [`SheetsService`] holds the client and the shared settings (cache, backups, test sheet).
//! - [`Spreadsheet`] discovers and registers tabs, and can dump or copy itself.
//! - [`Sheet`] downloads a tab as CSV and exposes the bulk write primitives.
//! - [`Range`] converts between A1 notation and zero-based coordinates.
//! - [`Mapping`] reads typed records out of rows.

pub mod mapping;
pub mod operations;
pub mod range;
pub mod reader;
pub mod service;
pub mod sheet;
pub mod spreadsheet;

/// One row of cell values, as text.
pub type Row = Vec<String>;

pub use mapping::{
    equality_comparator, integer_parser, text_parser, FieldComparator, FieldMapping, FieldParser,
    MappedRow, Mapping,
};
pub use operations::{paste_request, to_csv, UpdateValue};
pub use range::{col2num, num2col, qualify, Range};
pub use reader::SheetReader;
pub use service::{
    export_url, parse_spreadsheet_id, SheetTarget, SheetsService, SpreadsheetInfo,
};
pub use sheet::Sheet;
pub use spreadsheet::Spreadsheet;
