use crate::Row;
use gapi_helper::GapiResult;
use std::fs::File;
use std::path::Path;
use tempfile::NamedTempFile;

/// Row iterator over a downloaded tab.
///
/// When the rows come from a fresh download, the temporary file lives as long as the
/// reader and is deleted when the reader is dropped, including after an early `break`.
pub struct SheetReader {
    reader: csv::Reader<File>,
    record: csv::StringRecord,
    _download: Option<NamedTempFile>,
}

impl SheetReader {
    /// Reads an existing CSV file.
    pub fn from_path(path: &Path) -> GapiResult<Self> {
        Ok(Self::new(File::open(path)?, None))
    }

    /// Reads a downloaded temporary file, taking ownership of it.
    pub(crate) fn from_download(download: NamedTempFile) -> GapiResult<Self> {
        let file = download.reopen()?;
        Ok(Self::new(file, Some(download)))
    }

    fn new(file: File, download: Option<NamedTempFile>) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(b',')
            .quote(b'"')
            .from_reader(file);
        Self {
            reader,
            record: csv::StringRecord::new(),
            _download: download,
        }
    }
}

impl Iterator for SheetReader {
    type Item = GapiResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => Some(Ok(self.record.iter().map(String::from).collect())),
            Ok(false) => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}
