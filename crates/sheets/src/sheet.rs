use crate::mapping::Mapping;
use crate::operations::UpdateValue;
use crate::reader::SheetReader;
use crate::service::SheetTarget;
use crate::spreadsheet::Spreadsheet;
use crate::Row;
use chrono::NaiveDate;
use gapi_helper::GapiResult;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// One tab of a [`Spreadsheet`].
#[derive(Clone)]
pub struct Sheet {
    spreadsheet: Spreadsheet,
    tab_name: String,
    tab_id: Option<i64>,
    /// Default mapping for imports of this tab.
    mapping: Option<Arc<Mapping>>,
}

impl fmt::Debug for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sheet")
            .field("spreadsheet_id", &self.spreadsheet.id())
            .field("tab_name", &self.tab_name)
            .field("tab_id", &self.tab_id)
            .field("mapping", &self.mapping)
            .finish()
    }
}

impl Sheet {
    pub(crate) fn new(spreadsheet: Spreadsheet, tab_name: &str, tab_id: Option<i64>) -> Self {
        Self {
            spreadsheet,
            tab_name: tab_name.to_string(),
            tab_id,
            mapping: None,
        }
    }

    /// Attaches the mapping used when an import does not provide its own.
    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = Some(Arc::new(mapping));
        self
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_deref()
    }

    pub fn spreadsheet(&self) -> &Spreadsheet {
        &self.spreadsheet
    }

    pub fn tab_name(&self) -> &str {
        &self.tab_name
    }

    /// The tab ID given at registration, without any lookup.
    pub fn known_tab_id(&self) -> Option<i64> {
        self.tab_id
    }

    /// The tab ID, resolved from the spreadsheet metadata when it was not given.
    pub async fn tab_id(&self) -> GapiResult<i64> {
        match self.tab_id {
            Some(id) => Ok(id),
            None => self.spreadsheet.resolve_tab_id(&self.tab_name).await,
        }
    }

    /// Everything a request needs to address this tab.
    pub async fn target(&self) -> GapiResult<SheetTarget> {
        Ok(SheetTarget {
            spreadsheet_id: self.spreadsheet.id().to_string(),
            spreadsheet_name: self.spreadsheet.name().await?,
            tab_id: self.tab_id().await?,
            tab_name: self.tab_name.clone(),
        })
    }

    /// Path of the backup of this tab for `date`.
    pub async fn filepath(&self, date: NaiveDate) -> GapiResult<PathBuf> {
        let location = self.spreadsheet.service().config().backup_location()?;
        let name = self.spreadsheet.name().await?;
        Ok(location.join(format!(
            "{} - {}-{}.csv",
            name,
            self.tab_name,
            date.format("%Y-%m-%d")
        )))
    }

    /// Downloads the tab as CSV to `path`.
    pub async fn download(&self, path: &Path) -> GapiResult<PathBuf> {
        let tab_id = self.tab_id().await?;
        self.spreadsheet
            .service()
            .export_csv(self.spreadsheet.id(), tab_id, path)
            .await?;
        Ok(path.to_path_buf())
    }

    /// Downloads the tab into the backup location.
    pub async fn backup(&self, date: NaiveDate) -> GapiResult<PathBuf> {
        let path = self.filepath(date).await?;
        info!("Backing up {} to {}", self.tab_name, path.display());
        self.download(&path).await
    }

    /// Rows of the tab: the backup for `date`, or a fresh download without one.
    pub async fn csv_reader(&self, date: Option<NaiveDate>) -> GapiResult<SheetReader> {
        match date {
            Some(date) => SheetReader::from_path(&self.filepath(date).await?),
            None => {
                let download = tempfile::Builder::new()
                    .prefix("gapi-sheet-")
                    .suffix(".csv")
                    .tempfile()?;
                self.download(download.path()).await?;
                SheetReader::from_download(download)
            }
        }
    }

    /// Materializes every row of the tab.
    pub async fn read_rows(&self, date: Option<NaiveDate>) -> GapiResult<Vec<Row>> {
        self.csv_reader(date).await?.collect()
    }

    pub async fn remove_filter(&self, dryrun: bool) -> GapiResult<()> {
        let target = self.target().await?;
        self.spreadsheet.service().remove_filter(&target, dryrun).await
    }

    /// See [`crate::SheetsService::bulk_update`].
    #[allow(clippy::too_many_arguments)]
    pub async fn bulk_update(
        &self,
        keys: &[&str],
        source_range: &str,
        row_offset: usize,
        column: usize,
        value: &UpdateValue,
        dryrun: bool,
        remove_filter: bool,
    ) -> GapiResult<Vec<(usize, String)>> {
        let target = self.target().await?;
        self.spreadsheet
            .service()
            .bulk_update(
                &target,
                keys,
                source_range,
                row_offset,
                column,
                value,
                dryrun,
                remove_filter,
            )
            .await
    }

    pub async fn bulk_clean(
        &self,
        range: &str,
        dryrun: bool,
        remove_filter: bool,
    ) -> GapiResult<()> {
        let target = self.target().await?;
        self.spreadsheet
            .service()
            .bulk_clean(&target, range, dryrun, remove_filter)
            .await
    }

    /// Pastes `rows` with the first cell at the zero-based (`row_index`, `column_index`).
    pub async fn bulk_write(
        &self,
        rows: &[Row],
        row_index: usize,
        column_index: usize,
        dryrun: bool,
        remove_filter: bool,
    ) -> GapiResult<()> {
        let target = self.target().await?;
        self.spreadsheet
            .service()
            .bulk_write(&target, rows, row_index, column_index, dryrun, remove_filter)
            .await
    }

    pub async fn bulk_append(
        &self,
        rows: &[Row],
        range: &str,
        dryrun: bool,
        remove_filter: bool,
    ) -> GapiResult<()> {
        let target = self.target().await?;
        self.spreadsheet
            .service()
            .bulk_append(&target, rows, range, dryrun, remove_filter)
            .await
    }
}
