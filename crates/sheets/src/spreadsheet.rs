//! # Spreadsheets
//!
//! A [`Spreadsheet`] is a cheap, clonable handle: clones share the registry of known tabs
//! and the metadata loaded from `spreadsheets.get`. Tabs are not discovered until
//! [`Spreadsheet::load_infos`] runs, which happens on demand whenever a tab ID or the
//! spreadsheet name is needed.

use crate::service::{SheetsService, SpreadsheetInfo};
use crate::sheet::Sheet;
use crate::Row;
use gapi_helper::{GapiError, GapiResult};
use gapi_helper_drive::{File, Folder, Role, SPREADSHEET_MIME_TYPE};
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Default)]
struct Registry {
    name: Option<String>,
    /// Registered tabs in registration order.
    sheets: Vec<(String, Option<i64>)>,
    loaded: bool,
}

impl Registry {
    fn tab_id(&self, tab_name: &str) -> Option<i64> {
        self.sheets
            .iter()
            .find(|(name, _)| name == tab_name)
            .and_then(|(_, id)| *id)
    }

    /// Registers a tab unless it is already known. Returns the registered ID.
    fn register(&mut self, tab_name: &str, tab_id: Option<i64>) -> Option<i64> {
        match self.sheets.iter().find(|(name, _)| name == tab_name) {
            Some((_, id)) => *id,
            None => {
                self.sheets.push((tab_name.to_string(), tab_id));
                tab_id
            }
        }
    }

    /// Registers a tab, or sets the ID of an already known one.
    fn upsert(&mut self, tab_name: &str, tab_id: i64) {
        match self.sheets.iter_mut().find(|(name, _)| name == tab_name) {
            Some((_, id)) => *id = Some(tab_id),
            None => self.sheets.push((tab_name.to_string(), Some(tab_id))),
        }
    }

    fn apply(&mut self, info: &SpreadsheetInfo) {
        if self.name.is_none() {
            self.name = Some(info.properties.title.clone());
        }
        for sheet in &info.sheets {
            self.upsert(&sheet.properties.title, sheet.properties.sheet_id);
        }
        self.loaded = true;
    }
}

struct Inner {
    id: String,
    service: SheetsService,
    /// Only locked for short, synchronous updates.
    registry: Mutex<Registry>,
    /// Serializes metadata loads.
    loading: tokio::sync::Mutex<()>,
}

/// A Google spreadsheet and the tabs registered on it.
#[derive(Clone)]
pub struct Spreadsheet {
    inner: Arc<Inner>,
}

impl fmt::Debug for Spreadsheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spreadsheet")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

impl Spreadsheet {
    /// Opens a spreadsheet by ID.
    ///
    /// Giving `name` keeps it stable in backup file names; otherwise the title is
    /// discovered from the API.
    pub fn new(service: SheetsService, spreadsheet_id: &str, name: Option<&str>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: spreadsheet_id.to_string(),
                service,
                registry: Mutex::new(Registry {
                    name: name.map(String::from),
                    ..Registry::default()
                }),
                loading: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn service(&self) -> &SheetsService {
        &self.inner.service
    }

    /// The name given at construction or discovered so far, without any API call.
    pub async fn known_name(&self) -> Option<String> {
        self.registry().name.clone()
    }

    /// The spreadsheet name, loading metadata if needed.
    pub async fn name(&self) -> GapiResult<String> {
        if let Some(name) = self.known_name().await {
            return Ok(name);
        }
        self.load_infos(false).await?;
        self.known_name()
            .await
            .ok_or_else(|| GapiError::NotFound(format!("No title for spreadsheet {}", self.id())))
    }

    fn cache_path(&self) -> Option<PathBuf> {
        self.service()
            .config()
            .cache_location()
            .map(|dir| dir.join(format!("gs_infos-{}.json", self.id())))
    }

    /// Loads the title and the tabs of the spreadsheet, registering every tab.
    ///
    /// Metadata is fetched once per handle. When a cache directory is configured it is also
    /// stored there and reused by later runs; `force` bypasses both caches.
    pub async fn load_infos(&self, force: bool) -> GapiResult<()> {
        let _loading = self.inner.loading.lock().await;
        let (loaded, known_name) = {
            let registry = self.registry();
            (registry.loaded, registry.name.clone())
        };
        if loaded && !force {
            return Ok(());
        }

        let cache_path = self.cache_path();
        let info = match cache_path.as_ref().filter(|p| p.exists() && !force) {
            Some(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                serde_json::from_str::<SpreadsheetInfo>(&content)?
            }
            None => {
                info!(
                    "Downloading cache info for {} ({})...",
                    known_name.as_deref().unwrap_or("?"),
                    self.id()
                );
                let info = self.service().get_spreadsheet(self.id()).await?;
                if let Some(path) = &cache_path {
                    tokio::fs::write(path, serde_json::to_vec(&info)?).await?;
                }
                info
            }
        };

        self.registry().apply(&info);
        Ok(())
    }

    /// Forgets cached metadata, both in memory and in the cache directory.
    pub async fn clear_infos(&self) -> GapiResult<()> {
        self.registry().loaded = false;
        if let Some(path) = self.cache_path() {
            if path.exists() {
                tokio::fs::remove_file(path).await?;
            }
        }
        Ok(())
    }

    /// Resolves a tab ID from the registry, reloading metadata once if it is unknown.
    pub(crate) async fn resolve_tab_id(&self, tab_name: &str) -> GapiResult<i64> {
        self.load_infos(false).await?;
        let known = self.registry().tab_id(tab_name);
        if let Some(id) = known {
            return Ok(id);
        }
        self.load_infos(true).await?;
        let reloaded = self.registry().tab_id(tab_name);
        reloaded.ok_or_else(|| {
            GapiError::NotFound(format!("Sheet '{}' not found in {}", tab_name, self.id()))
        })
    }

    /// Maps a tab of this spreadsheet.
    ///
    /// `tab_name` may differ from the real tab name when `tab_id` is given. Registering a
    /// name twice returns the first registration.
    pub fn add_sheet(&self, tab_name: &str, tab_id: Option<i64>) -> Sheet {
        let registered = self.registry().register(tab_name, tab_id);
        Sheet::new(self.clone(), tab_name, registered)
    }

    /// Registers an existing sheet handle on this spreadsheet.
    pub async fn add_known_sheet(&self, sheet: &Sheet) -> Sheet {
        let id = self
            .registry()
            .register(sheet.tab_name(), sheet.known_tab_id());
        let known = Sheet::new(self.clone(), sheet.tab_name(), id);
        match sheet.mapping() {
            Some(mapping) => known.with_mapping(mapping.clone()),
            None => known,
        }
    }

    /// A registered tab, by name.
    pub async fn sheet(&self, tab_name: &str) -> Option<Sheet> {
        let registry = self.registry();
        registry
            .sheets
            .iter()
            .find(|(name, _)| name == tab_name)
            .map(|(name, id)| Sheet::new(self.clone(), name, *id))
    }

    /// Every registered tab, in registration order.
    pub async fn sheets(&self) -> Vec<Sheet> {
        let registry = self.registry();
        registry
            .sheets
            .iter()
            .map(|(name, id)| Sheet::new(self.clone(), name, *id))
            .collect()
    }

    /// Adds a tab to the spreadsheet, or returns the existing tab of that name.
    ///
    /// `properties` are extra `SheetProperties` fields (e.g. `gridProperties`).
    pub async fn create_sheet(
        &self,
        tab_name: &str,
        tab_id: Option<i64>,
        properties: Map<String, Value>,
        dryrun: bool,
    ) -> GapiResult<Sheet> {
        self.load_infos(false).await?;
        if let Some(sheet) = self.sheet(tab_name).await {
            return Ok(sheet);
        }

        let mut properties = properties;
        properties.insert("title".to_string(), json!(tab_name));
        if let Some(id) = tab_id {
            properties.insert("sheetId".to_string(), json!(id));
        }

        info!(
            "Creating sheet {} in {} ({})...",
            tab_name,
            self.known_name().await.unwrap_or_default(),
            self.id()
        );
        if dryrun {
            return Ok(Sheet::new(self.clone(), "Stubbed", None));
        }

        let reply = self
            .service()
            .batch_update(
                self.id(),
                vec![json!({"addSheet": {"properties": properties}})],
            )
            .await?;
        let created = &reply["replies"][0]["addSheet"]["properties"];
        let (Some(title), Some(id)) = (created["title"].as_str(), created["sheetId"].as_i64())
        else {
            return Err(GapiError::RemoteWrite {
                status: None,
                message: format!("Unexpected addSheet reply: {reply}"),
            });
        };

        self.registry().upsert(title, id);
        Ok(Sheet::new(self.clone(), title, Some(id)))
    }

    /// Copies the values of every tab into `destination`, creating tabs as needed.
    ///
    /// Unlike a Drive copy, formulas are flattened to their values.
    pub async fn dump_to(&self, destination: &Spreadsheet, dryrun: bool) -> GapiResult<()> {
        self.load_infos(false).await?;

        for sheet in self.sheets().await {
            let rows: Vec<Row> = sheet
                .csv_reader(None)
                .await?
                .collect::<GapiResult<_>>()?;

            let mut properties = Map::new();
            properties.insert(
                "gridProperties".to_string(),
                json!({"rowCount": 1, "columnCount": 1}),
            );
            let new_sheet = destination
                .create_sheet(sheet.tab_name(), None, properties, dryrun)
                .await?;

            if dryrun {
                info!("Stubbed writing {} rows of {}", rows.len(), sheet.tab_name());
                continue;
            }
            new_sheet.bulk_write(&rows, 0, 0, false, false).await?;
        }
        Ok(())
    }

    /// Creates a new spreadsheet in `folder` and dumps the values of this one into it.
    pub async fn dump_in(
        &self,
        folder: &Folder,
        name: &str,
        dryrun: bool,
    ) -> GapiResult<Spreadsheet> {
        let id = if dryrun {
            "stubbed".to_string()
        } else {
            let file = folder.insert_file(name, SPREADSHEET_MIME_TYPE).await?;
            self.share_with_service_account(&file).await?;
            file.id
        };

        let spreadsheet = Spreadsheet::new(self.service().clone(), &id, Some(name));
        self.dump_to(&spreadsheet, dryrun).await?;
        Ok(spreadsheet)
    }

    /// Clones this spreadsheet into `folder` with a Drive copy (formulas included).
    pub async fn copy_in(
        &self,
        folder: &Folder,
        name: &str,
        dryrun: bool,
    ) -> GapiResult<Spreadsheet> {
        let own_name = self.name().await?;
        if dryrun {
            info!("Stubbed copy of {} into {}", own_name, folder.name);
            return Ok(Spreadsheet::new(self.service().clone(), "stubbed", Some(name)));
        }

        let file = File::new(&own_name, self.id(), folder.service().clone());
        let copy = file.copy_to(folder, name).await?;
        self.share_with_service_account(&copy).await?;
        Ok(Spreadsheet::new(self.service().clone(), &copy.id, Some(name)))
    }

    async fn share_with_service_account(&self, file: &File) -> GapiResult<()> {
        if let Some(identity) = self.service().identity() {
            file.share(identity, Role::Writer, false).await?;
        }
        Ok(())
    }
}
