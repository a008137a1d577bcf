use crate::service::{DriveFile, DriveService, FOLDER_MIME_TYPE};
use gapi_helper::GapiResult;
use serde::Serialize;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::info;

/// Access level granted by a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Commenter,
    Writer,
    Owner,
}

/// A Drive file. The name may differ from the actual name on the drive.
#[derive(Debug, Clone)]
pub struct File {
    pub name: String,
    pub id: String,
    service: DriveService,
}

impl File {
    pub fn new(name: &str, id: &str, service: DriveService) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            service,
        }
    }

    pub fn service(&self) -> &DriveService {
        &self.service
    }

    /// Shares this file with a user.
    pub async fn share(&self, user: &str, role: Role, notify: bool) -> GapiResult<&Self> {
        info!("Sharing {} ({}) with {} as {:?}", self.name, self.id, user, role);
        self.service
            .create_permission(&self.id, user, role, notify)
            .await?;
        Ok(self)
    }

    /// Makes `user` the owner of this file.
    pub async fn transfer_ownership(&self, user: &str) -> GapiResult<&Self> {
        info!("Transferring ownership of {} ({}) to {}", self.name, self.id, user);
        self.service
            .create_permission(&self.id, user, Role::Owner, false)
            .await?;
        Ok(self)
    }

    pub async fn delete(&self) -> GapiResult<()> {
        info!("Deleting {} ({})", self.name, self.id);
        self.service.delete_file(&self.id).await
    }

    /// Copies this file into `folder` under a new name.
    pub async fn copy_to(&self, folder: &Folder, new_name: &str) -> GapiResult<File> {
        info!(
            "Copying {} ({}) into {} ({}) as {}",
            self.name, self.id, folder.name, folder.id, new_name
        );
        let copy = self
            .service
            .copy_file(&self.id, new_name, &folder.id)
            .await?;
        Ok(File::new(new_name, &copy.id, self.service.clone()))
    }
}

/// A Drive folder.
#[derive(Debug, Clone)]
pub struct Folder {
    file: File,
}

impl Deref for Folder {
    type Target = File;

    fn deref(&self) -> &File {
        &self.file
    }
}

impl Folder {
    pub fn new(name: &str, id: &str, service: DriveService) -> Self {
        Self {
            file: File::new(name, id, service),
        }
    }

    /// Finds a file of this folder by name.
    ///
    /// When several files share the name, the first one listed is returned.
    pub async fn find_file(&self, name: &str) -> GapiResult<Option<DriveFile>> {
        info!("Searching for file {} in {} ({})...", name, self.name, self.id);
        let files = self.service.find_files(name, &self.id).await?;
        Ok(files.into_iter().next())
    }

    /// Lists every file in this folder.
    pub async fn list(&self) -> GapiResult<Vec<DriveFile>> {
        info!("Retrieving files in {} ({})...", self.name, self.id);
        self.service.list_files(&self.id).await
    }

    /// Downloads a file of this folder to `destination`. `None` when there is no such file.
    pub async fn download_file(
        &self,
        name: &str,
        destination: &Path,
    ) -> GapiResult<Option<PathBuf>> {
        let Some(file) = self.find_file(name).await? else {
            return Ok(None);
        };
        info!("Downloading file {} from {} ({})...", name, self.name, self.id);
        self.service
            .download_file(&file.id, destination)
            .await
            .map(Some)
    }

    /// Returns `destination` if it already exists, otherwise tries to download `name` there.
    pub async fn has_file(&self, name: &str, destination: &Path) -> GapiResult<Option<PathBuf>> {
        if destination.is_file() {
            return Ok(Some(destination.to_path_buf()));
        }
        self.download_file(name, destination).await
    }

    /// Uploads a local file into this folder and returns the Drive file ID.
    ///
    /// With `update`, an existing file of the same name gets a new revision instead.
    pub async fn upload_file(&self, path: &Path, mime: &str, update: bool) -> GapiResult<String> {
        if update {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(existing) = self.find_file(&name).await? {
                info!(
                    "Uploading file {} as new revision into {} ({})...",
                    path.display(),
                    self.name,
                    self.id
                );
                return self.service.update_file(path, &existing.id, mime).await;
            }
        }
        info!(
            "Uploading file {} as new file into {} ({})...",
            path.display(),
            self.name,
            self.id
        );
        self.service.upload_file(path, &self.id, mime).await
    }

    /// Creates a new empty file in this folder, even if one with the same name exists.
    pub async fn insert_file(&self, name: &str, mime: &str) -> GapiResult<File> {
        let id = self.service.insert_file(name, &self.id, mime).await?;
        Ok(File::new(name, &id, self.service.clone()))
    }

    /// Creates a sub-folder, even if one with the same name exists.
    pub async fn create_folder(&self, name: &str) -> GapiResult<Folder> {
        let id = self
            .service
            .insert_file(name, &self.id, FOLDER_MIME_TYPE)
            .await?;
        Ok(Folder::new(name, &id, self.service.clone()))
    }
}
