//! # Sheet Imports
//!
//! An [`ImportSheet`] turns the rows of a sheet into [`MappedRow`]s: one typed value per
//! field, parsed by the [`Mapping`]. Callers compare mapped rows with
//! [`MappedRow::changed_fields`] to decide what to update downstream.

use async_trait::async_trait;
use chrono::NaiveDate;
use gapi_helper::{GapiError, GapiResult};
use gapi_helper_sheets::{Row, Sheet};
use tracing::info;

pub use gapi_helper_sheets::{
    equality_comparator, integer_parser, text_parser, FieldComparator, FieldMapping, FieldParser,
    MappedRow, Mapping,
};

/// A source of raw rows, read through a [`Mapping`].
#[async_trait]
pub trait ImportSource: Send + Sync {
    fn mapping(&self) -> &Mapping;

    /// Every raw row, headers included.
    async fn rows(&self) -> GapiResult<Vec<Row>>;

    /// The mapped records, headers skipped.
    async fn records(&self) -> GapiResult<Vec<MappedRow>> {
        let mapping = self.mapping();
        let rows = self.rows().await?;
        rows.iter()
            .enumerate()
            .skip(mapping.header_rows())
            .map(|(index, row)| mapping.map_row(index, row))
            .collect()
    }
}

/// A sheet as an import source.
pub struct ImportSheet {
    sheet: Sheet,
    mapping: Mapping,
    offline: bool,
    date: Option<NaiveDate>,
}

impl ImportSheet {
    /// Reads `sheet` through `mapping`, or through the mapping attached to the sheet.
    ///
    /// Offline imports read the backup for `date`; online imports download the sheet.
    pub fn new(
        sheet: Sheet,
        mapping: Option<Mapping>,
        offline: bool,
        date: Option<NaiveDate>,
    ) -> GapiResult<Self> {
        let mapping = mapping
            .or_else(|| sheet.mapping().cloned())
            .ok_or_else(|| GapiError::Configuration("Sheet mapping cannot be None".to_string()))?;
        Ok(Self {
            sheet,
            mapping,
            offline,
            date,
        })
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }
}

#[async_trait]
impl ImportSource for ImportSheet {
    fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    async fn rows(&self) -> GapiResult<Vec<Row>> {
        let date = if self.offline { self.date } else { None };
        info!(
            "Importing {} ({})",
            self.sheet.tab_name(),
            if date.is_some() { "offline" } else { "online" }
        );
        self.sheet.read_rows(date).await
    }
}
