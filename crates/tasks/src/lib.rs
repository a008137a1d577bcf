//! # gapi-helper-tasks: Sheet Transfer, Import and Dump Tasks
//!
//! Small orchestration layers over [`gapi_helper_sheets`]:
//!
//! - [`transfer`]: copies ranges of in-memory rows (from a CSV file, a sheet or custom code)
//!   into one or more destination sheets.
//! - [`import_sheet`]: presents a sheet as a source of mapped, typed records.
//! - [`dump`]: writes records into a sheet, one column per field.

pub mod dump;
pub mod import_sheet;
pub mod options;
pub mod transfer;

pub use dump::{DumpColumn, DumpRecord, DumpTask, FieldFormatter};
pub use import_sheet::{
    equality_comparator, integer_parser, text_parser, FieldComparator, FieldMapping, FieldParser,
    ImportSheet, ImportSource, MappedRow, Mapping,
};
pub use options::{DispatchPolicy, TaskOptions};
pub use transfer::{
    compute_payloads, read_csv_file, DestinationFailure, DestinationOutcome, RangePayload,
    RowAdapter, RowFilter, TransferCsvTask, TransferDestination, TransferReport,
    TransferSheetTask, TransferTask, TransferredRange, MAX_BATCH_BYTES,
};
