//! # Transfers
//!
//! A transfer runs in three sequential steps:
//!
//! 1. **Collect** the source rows with [`TransferTask::get_data`].
//! 2. **Materialize** them in memory as a `Vec<Row>` (memory bounds the size of a transfer).
//! 3. **Dispatch** them to every [`TransferDestination`], in order. Each destination gets
//!    one `pasteData` request per [`TransferredRange`], sent in a single batch update unless
//!    the payload exceeds [`MAX_BATCH_BYTES`].
//!
//! Writes are not transactional: a failed destination may keep a partial write, and the
//! destinations before it stay written.

use crate::options::{DispatchPolicy, TaskOptions};
use async_trait::async_trait;
use gapi_helper::{GapiError, GapiResult};
use gapi_helper_sheets::{paste_request, to_csv, Range, Row, Sheet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Above this payload size, each range is sent in its own batch update.
pub const MAX_BATCH_BYTES: usize = 20_000_000;

/// Decides whether a source row (by index) is transferred to a destination.
pub type RowFilter = Arc<dyn Fn(usize, &[String]) -> bool + Send + Sync>;

/// Rewrites a source row (by index) before it is written.
pub type RowAdapter = Arc<dyn Fn(usize, &[String]) -> Row + Send + Sync>;

// --- Ranges and destinations ---

/// Cells of the source data copied into a range of the destination sheet.
#[derive(Clone)]
pub struct TransferredRange {
    source: Range,
    destination: Range,
    adapter: Option<RowAdapter>,
    partial_adapter: Option<RowAdapter>,
    clean: bool,
}

impl TransferredRange {
    /// Maps `source` (e.g. `"C2:D"`) onto `destination` (e.g. `"A1:B"`).
    ///
    /// Fails when both ranges are bounded in a dimension and their sizes differ.
    pub fn new(source: &str, destination: &str) -> GapiResult<Self> {
        Self::from_ranges(Range::from_a1(source)?, Range::from_a1(destination)?)
    }

    pub fn from_ranges(source: Range, destination: Range) -> GapiResult<Self> {
        if !source.matches(&destination) {
            return Err(GapiError::Addressing(format!(
                "destination dimension does not match source dimension for {source}->{destination}"
            )));
        }
        Ok(Self::unchecked(source, destination))
    }

    /// Transfers `adapter(index, row)` computed from the whole source row.
    ///
    /// Only the rows of `source` are transferred; the shape is checked against the data.
    pub fn with_adapter(source: &str, destination: &str, adapter: RowAdapter) -> GapiResult<Self> {
        let mut range = Self::unchecked(Range::from_a1(source)?, Range::from_a1(destination)?);
        range.adapter = Some(adapter);
        Ok(range)
    }

    /// Transfers `adapter(index, cells)` computed from the cells of `source` only.
    pub fn with_partial_adapter(
        source: &str,
        destination: &str,
        adapter: RowAdapter,
    ) -> GapiResult<Self> {
        let mut range = Self::unchecked(Range::from_a1(source)?, Range::from_a1(destination)?);
        range.partial_adapter = Some(adapter);
        Ok(range)
    }

    /// Clears the destination range before writing.
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    fn unchecked(source: Range, destination: Range) -> Self {
        Self {
            source,
            destination,
            adapter: None,
            partial_adapter: None,
            clean: false,
        }
    }

    pub fn source(&self) -> &Range {
        &self.source
    }

    pub fn destination(&self) -> &Range {
        &self.destination
    }

    fn select(&self, index: usize, row: &[String]) -> Row {
        if let Some(adapter) = &self.adapter {
            return adapter(index, row);
        }
        let start = self.source.start_col.min(row.len());
        let end = self
            .source
            .end_col
            .map_or(row.len(), |end| (end + 1).min(row.len()))
            .max(start);
        let cells = &row[start..end];
        match &self.partial_adapter {
            Some(adapter) => adapter(index, cells),
            None => cells.to_vec(),
        }
    }
}

/// A destination sheet and the ranges written into it.
#[derive(Clone)]
pub struct TransferDestination {
    sheet: Sheet,
    ranges: Vec<TransferredRange>,
    filter: Option<RowFilter>,
    clean: bool,
}

impl TransferDestination {
    pub fn new(sheet: Sheet, ranges: Vec<TransferredRange>) -> Self {
        Self {
            sheet,
            ranges,
            filter: None,
            clean: false,
        }
    }

    /// Shorthand for ranges given as `(source, destination)` A1 pairs.
    pub fn from_pairs(sheet: Sheet, pairs: &[(&str, &str)]) -> GapiResult<Self> {
        let ranges = pairs
            .iter()
            .map(|(source, destination)| TransferredRange::new(source, destination))
            .collect::<GapiResult<_>>()?;
        Ok(Self::new(sheet, ranges))
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Clears every destination range before writing.
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    pub fn ranges(&self) -> &[TransferredRange] {
        &self.ranges
    }

    /// The same destination, written to another sheet.
    pub fn replace_sheet(&self, sheet: Sheet) -> Self {
        Self {
            sheet,
            ..self.clone()
        }
    }
}

// --- Computing payloads ---

/// The CSV written into one destination range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePayload {
    /// Destination range, with an open width fixed by the data.
    pub destination: Range,
    /// CSV text; empty when no row was selected.
    pub data: String,
}

/// Builds the payload of every range of `destination`, in order.
///
/// A destination range open horizontally takes the width of its first row. Any other row
/// of a different width is an error.
pub fn compute_payloads(
    data: &[Row],
    destination: &TransferDestination,
) -> GapiResult<Vec<RangePayload>> {
    let mut selected: Vec<Vec<Row>> = vec![Vec::new(); destination.ranges.len()];
    let mut resolved: Vec<Range> = destination.ranges.iter().map(|r| r.destination).collect();

    for (index, row) in data.iter().enumerate() {
        if let Some(filter) = &destination.filter {
            if !filter(index, row) {
                continue;
            }
        }

        for (idx, range) in destination.ranges.iter().enumerate() {
            if !range.source.contains_row(index) {
                continue;
            }
            let cells = range.select(index, row);
            let target = &mut resolved[idx];
            match target.width() {
                None if !cells.is_empty() => {
                    target.end_col = Some(target.start_col + cells.len() - 1);
                }
                Some(width) if width != cells.len() => {
                    return Err(GapiError::Addressing(format!(
                        "destination dimension does not match data dimension: expected {}, got {}",
                        width,
                        cells.len()
                    )));
                }
                _ => {}
            }
            selected[idx].push(cells);
        }
    }

    selected
        .iter()
        .zip(resolved)
        .map(|(rows, destination)| {
            Ok(RangePayload {
                destination,
                data: to_csv(rows)?,
            })
        })
        .collect()
}

// --- Reports ---

/// A destination written successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationOutcome {
    pub spreadsheet_id: String,
    pub tab_name: String,
    pub requests_sent: usize,
}

/// A destination that could not be written.
#[derive(Debug)]
pub struct DestinationFailure {
    pub spreadsheet_id: String,
    pub tab_name: String,
    pub error: GapiError,
}

/// Per-destination outcome of a transfer, in dispatch order.
#[derive(Debug, Default)]
pub struct TransferReport {
    pub succeeded: Vec<DestinationOutcome>,
    pub failures: Vec<DestinationFailure>,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

// --- Tasks ---

/// A transfer of rows into one or more sheets.
#[async_trait]
pub trait TransferTask: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Collects the rows to transfer.
    async fn get_data(&self, options: &TaskOptions) -> GapiResult<Vec<Row>>;

    /// Where the rows go, in dispatch order.
    fn destinations(&self) -> Vec<TransferDestination>;

    /// Collects the data, then writes it to every destination.
    ///
    /// Invalid ranges or data shapes abort the run whatever the dispatch policy.
    async fn run(&self, options: &TaskOptions) -> GapiResult<TransferReport> {
        let data = self.get_data(options).await?;
        info!(task = self.name(), "Collected {} rows", data.len());

        let mut report = TransferReport::default();
        for destination in self.destinations() {
            let service = destination.sheet.spreadsheet().service().clone();
            let use_test_sheet =
                options.use_testing || service.config().sheets.force_test_spreadsheet;
            let destination = if use_test_sheet {
                info!(task = self.name(), "Using test spreadsheet instead");
                destination.replace_sheet(service.test_sheet()?)
            } else {
                destination
            };

            let payloads = compute_payloads(&data, &destination)?;
            let spreadsheet = destination.sheet.spreadsheet();
            let spreadsheet_name = spreadsheet.known_name().await.unwrap_or_default();

            match write_destination(self.name(), &destination, &payloads, options.dryrun).await {
                Ok(requests_sent) => {
                    info!(
                        task = self.name(),
                        "Done writing to {} ({}): {} requests sent",
                        spreadsheet.id(),
                        spreadsheet_name,
                        requests_sent
                    );
                    report.succeeded.push(DestinationOutcome {
                        spreadsheet_id: spreadsheet.id().to_string(),
                        tab_name: destination.sheet.tab_name().to_string(),
                        requests_sent,
                    });
                }
                Err(e) => {
                    error!(
                        task = self.name(),
                        "Could not export to {} ({}): {}",
                        spreadsheet.id(),
                        spreadsheet_name,
                        e
                    );
                    if options.dispatch == DispatchPolicy::FailFast {
                        return Err(e);
                    }
                    report.failures.push(DestinationFailure {
                        spreadsheet_id: spreadsheet.id().to_string(),
                        tab_name: destination.sheet.tab_name().to_string(),
                        error: e,
                    });
                }
            }
        }
        Ok(report)
    }
}

/// Removes the filter, cleans, then pastes. Returns the number of batch updates sent.
async fn write_destination(
    task: &str,
    destination: &TransferDestination,
    payloads: &[RangePayload],
    dryrun: bool,
) -> GapiResult<usize> {
    let sheet = &destination.sheet;
    sheet.remove_filter(dryrun).await?;
    let target = sheet.target().await?;
    let service = sheet.spreadsheet().service();

    let mut requests = Vec::new();
    let mut requests_size = 0;
    for (payload, range) in payloads.iter().zip(&destination.ranges) {
        if payload.data.is_empty() {
            continue;
        }
        if destination.clean || range.clean {
            service
                .bulk_clean(&target, &payload.destination.to_a1(), dryrun, false)
                .await?;
        }
        requests.push(paste_request(
            target.tab_id,
            payload.destination.start_row,
            payload.destination.start_col,
            &payload.data,
        ));
        requests_size += payload.data.len();
    }

    if requests.is_empty() {
        info!(
            task,
            "Nothing to write to {} ({}) in {} ({})",
            target.spreadsheet_id,
            target.spreadsheet_name,
            target.tab_id,
            target.tab_name
        );
        return Ok(0);
    }

    let batches: Vec<(Vec<_>, usize)> = if requests_size > MAX_BATCH_BYTES {
        info!(
            task,
            "Size of data is {}, larger than 20M, splitting into {} requests...",
            requests_size,
            requests.len()
        );
        requests
            .into_iter()
            .map(|request| {
                let size = request["pasteData"]["data"].as_str().map_or(0, str::len);
                (vec![request], size)
            })
            .collect()
    } else {
        vec![(requests, requests_size)]
    };

    let mut requests_sent = 0;
    for (batch, size) in batches {
        info!(
            task,
            "Writing to {} ({}) in {} ({}) (size={})...",
            target.spreadsheet_id,
            target.spreadsheet_name,
            target.tab_id,
            target.tab_name,
            size
        );
        debug!(task, "Sending: {:?}", batch);
        if dryrun {
            info!(task, "Stubbed");
        } else {
            service.batch_update(&target.spreadsheet_id, batch).await?;
        }
        requests_sent += 1;
    }
    Ok(requests_sent)
}

/// Reads a CSV file (no header handling: every line is a row).
pub async fn read_csv_file(path: &Path, delimiter: u8, quote: u8) -> GapiResult<Vec<Row>> {
    let content = tokio::fs::read(path).await?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .quote(quote)
        .from_reader(content.as_slice());
    reader
        .records()
        .map(|record| Ok(record?.iter().map(String::from).collect()))
        .collect()
}

/// Transfers the rows of a CSV file.
pub struct TransferCsvTask {
    name: String,
    path: PathBuf,
    delimiter: u8,
    quote: u8,
    destinations: Vec<TransferDestination>,
}

impl TransferCsvTask {
    /// Reads `path` as comma-separated, `"`-quoted values.
    pub fn new(path: impl Into<PathBuf>, destinations: Vec<TransferDestination>) -> Self {
        Self {
            name: "TransferCsvTask".to_string(),
            path: path.into(),
            delimiter: b',',
            quote: b'"',
            destinations,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }
}

#[async_trait]
impl TransferTask for TransferCsvTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_data(&self, _options: &TaskOptions) -> GapiResult<Vec<Row>> {
        read_csv_file(&self.path, self.delimiter, self.quote).await
    }

    fn destinations(&self) -> Vec<TransferDestination> {
        self.destinations.clone()
    }
}

/// Transfers the rows of another sheet.
pub struct TransferSheetTask {
    name: String,
    source: Sheet,
    use_cache: bool,
    destinations: Vec<TransferDestination>,
}

impl TransferSheetTask {
    /// With `use_cache`, the source is read from its backup for the task date, downloaded
    /// there first if it does not exist yet.
    pub fn new(source: Sheet, use_cache: bool, destinations: Vec<TransferDestination>) -> Self {
        Self {
            name: "TransferSheetTask".to_string(),
            source,
            use_cache,
            destinations,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

#[async_trait]
impl TransferTask for TransferSheetTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_data(&self, options: &TaskOptions) -> GapiResult<Vec<Row>> {
        if !self.use_cache {
            return self.source.read_rows(None).await;
        }
        let path = self.source.filepath(options.date).await?;
        if !path.exists() {
            info!(task = self.name(), "No cached copy at {}, downloading", path.display());
            self.source.backup(options.date).await?;
        }
        self.source.read_rows(Some(options.date)).await
    }

    fn destinations(&self) -> Vec<TransferDestination> {
        self.destinations.clone()
    }
}
