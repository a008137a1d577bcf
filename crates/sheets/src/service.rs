use crate::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use gapi_helper::constants::SHEETS_SCOPES;
use gapi_helper::{
    retry, Access, ApiClient, GapiConfig, GapiError, GapiResult, ServiceAccountCredentials,
    TokenProvider, NO_QUERY,
};
use regex::Regex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

static SPREADSHEET_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/spreadsheets/d/([a-zA-Z0-9-_]+)").expect("spreadsheet URL pattern is valid")
});

// --- Metadata ---

/// The subset of `spreadsheets.get` used to discover names and tabs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetInfo {
    pub properties: SpreadsheetProperties,
    #[serde(default)]
    pub sheets: Vec<SheetEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetProperties {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetEntry {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
}

/// A fully resolved tab: what every read or write request needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub spreadsheet_name: String,
    pub tab_id: i64,
    pub tab_name: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

// --- URL helpers ---

/// Builds the CSV export URL of one tab.
pub fn export_url(docs_base: &str, spreadsheet_id: &str, tab_id: i64) -> String {
    format!("{docs_base}/spreadsheets/d/{spreadsheet_id}/export?format=csv&gid={tab_id}")
}

/// Extracts the spreadsheet ID from a Google Sheets URL. Anything else is taken as an ID.
pub fn parse_spreadsheet_id(url_or_id: &str) -> String {
    SPREADSHEET_URL
        .captures(url_or_id)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| url_or_id.to_string(), |m| m.as_str().to_string())
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// --- Service ---

/// Sheets v4 client, plus the settings shared by every spreadsheet it opens.
#[derive(Debug, Clone)]
pub struct SheetsService {
    client: ApiClient,
    config: Arc<GapiConfig>,
    test_target: Arc<OnceCell<SheetTarget>>,
}

impl SheetsService {
    pub fn new(config: &GapiConfig, credentials: &ServiceAccountCredentials) -> Self {
        let client =
            ApiClient::service_account(credentials, SHEETS_SCOPES, None, config.retry.clone());
        Self::with_client(config, client)
    }

    pub fn with_token_provider(config: &GapiConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_client(config, ApiClient::new(tokens, config.retry.clone()))
    }

    fn with_client(config: &GapiConfig, client: ApiClient) -> Self {
        Self {
            client,
            config: Arc::new(config.clone()),
            test_target: Arc::new(OnceCell::new()),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn config(&self) -> &GapiConfig {
        &self.config
    }

    /// The service-account email the requests are made as, when known.
    pub fn identity(&self) -> Option<&str> {
        self.client.identity()
    }

    /// Drops the cached access token.
    pub async fn reset(&self) {
        self.client.reset().await;
    }

    /// Opens a spreadsheet. Its name is discovered from the API when not given.
    pub fn spreadsheet(&self, spreadsheet_id: &str, name: Option<&str>) -> Spreadsheet {
        Spreadsheet::new(self.clone(), spreadsheet_id, name)
    }

    /// The sheet used instead of real destinations when testing.
    pub fn test_sheet(&self) -> GapiResult<Sheet> {
        let settings = &self.config.sheets;
        match (&settings.test_spreadsheet_id, &settings.test_sheet_name) {
            (Some(id), Some(tab)) => Ok(self.spreadsheet(id, None).add_sheet(tab, None)),
            _ => Err(GapiError::Configuration(
                "Test spreadsheet is not configured".to_string(),
            )),
        }
    }

    /// Where writes to `target` actually go: the test sheet when `force_test_spreadsheet`
    /// is configured, `target` otherwise.
    pub async fn write_target(&self, target: &SheetTarget) -> GapiResult<SheetTarget> {
        if !self.config.sheets.force_test_spreadsheet {
            return Ok(target.clone());
        }
        let this = self;
        let test = self
            .test_target
            .get_or_try_init(move || async move { this.test_sheet()?.target().await })
            .await?;
        Ok(test.clone())
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!("{}/spreadsheets/{}", self.config.endpoints.sheets_api, spreadsheet_id)
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    // --- Raw API calls ---

    /// `spreadsheets.get`: title and tabs of a spreadsheet.
    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> GapiResult<SpreadsheetInfo> {
        self.client
            .get_json(
                &self.spreadsheet_url(spreadsheet_id),
                &[("fields", "properties.title,sheets.properties")],
            )
            .await
    }

    /// `spreadsheets.batchUpdate` with the given requests.
    pub async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> GapiResult<Value> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url(spreadsheet_id));
        debug!("Sending {} requests to {}", requests.len(), spreadsheet_id);
        self.client
            .send_json(
                Access::Write,
                Method::POST,
                &url,
                NO_QUERY,
                &json!({"requests": requests}),
            )
            .await
    }

    /// `values.get`: the formatted values of a range, as text.
    pub async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> GapiResult<Vec<Vec<String>>> {
        let result: ValueRange = self
            .client
            .get_json(&self.values_url(spreadsheet_id, range), NO_QUERY)
            .await?;
        Ok(result
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    /// `values.clear`.
    pub async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> GapiResult<()> {
        let url = format!("{}:clear", self.values_url(spreadsheet_id, range));
        let _: Value = self
            .client
            .send_json(Access::Write, Method::POST, &url, NO_QUERY, &json!({}))
            .await?;
        Ok(())
    }

    /// `values.append`: inserts rows after the table found in `range`.
    pub async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> GapiResult<()> {
        let url = format!("{}:append", self.values_url(spreadsheet_id, range));
        let body = json!({"range": range, "majorDimension": "ROWS", "values": rows});
        let _: Value = self
            .client
            .send_json(
                Access::Write,
                Method::POST,
                &url,
                &[
                    ("valueInputOption", "USER_ENTERED"),
                    ("insertDataOption", "INSERT_ROWS"),
                ],
                &body,
            )
            .await?;
        Ok(())
    }

    /// Downloads the CSV export of a tab to `destination`.
    ///
    /// A response that is not `text/csv` (typically an HTML login or error page) counts as
    /// a failed attempt.
    pub async fn export_csv(
        &self,
        spreadsheet_id: &str,
        tab_id: i64,
        destination: &Path,
    ) -> GapiResult<()> {
        let url = export_url(&self.config.endpoints.docs, spreadsheet_id, tab_id);
        let this = self;
        let url = url.as_str();
        retry::execute(self.client.retry_policy(), move || async move {
            info!("Downloading {}...", destination.display());
            let result = this.export_once(url, destination).await;
            if let Err(e) = &result {
                if e.is_unauthorized() {
                    this.client.reset().await;
                }
            }
            result
        })
        .await
    }

    async fn export_once(&self, url: &str, destination: &Path) -> GapiResult<()> {
        let response = self
            .client
            .send_once(Access::Read, |http| http.get(url))
            .await?;
        let status = response.status().as_u16();
        let is_csv = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .is_some_and(|mime| mime.trim() == "text/csv");
        if !is_csv {
            return Err(Access::Read.error(Some(status), "Bad format received"));
        }
        let content = response
            .bytes()
            .await
            .map_err(|e| Access::Read.error(Some(status), e.to_string()))?;
        tokio::fs::write(destination, &content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_url() {
        assert_eq!(
            export_url("https://docs.google.com", "abc-123", 42),
            "https://docs.google.com/spreadsheets/d/abc-123/export?format=csv&gid=42"
        );
    }

    #[test]
    fn test_parse_spreadsheet_id() {
        assert_eq!(
            parse_spreadsheet_id("https://docs.google.com/spreadsheets/d/1aB_c-9/edit#gid=0"),
            "1aB_c-9"
        );
        assert_eq!(parse_spreadsheet_id("1aB_c-9"), "1aB_c-9");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(json!("14802")), "14802");
        assert_eq!(cell_text(json!(3.5)), "3.5");
        assert_eq!(cell_text(Value::Null), "");
    }
}
