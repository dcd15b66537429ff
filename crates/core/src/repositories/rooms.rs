//! Room repository.
//!
//! Rooms are a hierarchy of directories under `DB/ROOMS` (building, floor, room, ...).
//! Every level may carry an `info.json` and asset files. The hierarchy itself is managed
//! outside the store: rooms are never created here, only described and enumerated.

use crate::config::CoreConfig;
use crate::constants::ROOMS_DIR_NAME;
use crate::documents::{RoomInfo, RoomPatch};
use crate::error::{StoreError, StoreResult};
use crate::paths::common::{ArchiveDir, InfoFile};
use crate::previews::PreviewCache;
use crate::repositories::shared::is_dir;
use crate::versioned_documents::{DocumentStore, WriteOutcome};
use inventory_files::{is_transient, AssetDirectory, AssetUpload};
use inventory_ids::RoomPath;
use inventory_types::AssetName;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::fs;

/// A file inside a room, with its path relative to the rooms root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoomFile {
    pub name: String,
    pub path: String,
}

/// One level of the room hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode {
    pub name: String,
    /// `/`-separated path relative to the rooms root; empty for the root itself.
    pub path: String,
    pub info: RoomInfo,
    pub files: Vec<RoomFile>,
    pub children: Vec<TreeNode>,
}

/// A single room with its document and assets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoomDetail {
    pub path: RoomPath,
    pub info: RoomInfo,
    pub files: Vec<String>,
}

#[derive(Clone)]
pub struct RoomService {
    cfg: Arc<CoreConfig>,
    documents: DocumentStore<RoomInfo>,
    previews: PreviewCache,
}

impl std::fmt::Debug for RoomService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomService")
            .field("rooms_dir", &self.cfg.rooms_dir())
            .finish()
    }
}

type TreeFuture<'a> = Pin<Box<dyn Future<Output = StoreResult<TreeNode>> + Send + 'a>>;

impl RoomService {
    pub fn new(cfg: Arc<CoreConfig>, previews: PreviewCache) -> Self {
        Self {
            documents: DocumentStore::new(&cfg),
            cfg,
            previews,
        }
    }

    pub fn room_dir(&self, room: &RoomPath) -> PathBuf {
        room.dir_in(&self.cfg.rooms_dir())
    }

    fn cache_dir(&self, room: &RoomPath) -> PathBuf {
        room.dir_in(&self.cfg.rooms_cache_dir())
    }

    fn assets(&self, room: &RoomPath) -> AssetDirectory {
        AssetDirectory::new(self.room_dir(room), self.cfg.staging_dir())
            .with_reserved([InfoFile::NAME])
    }

    async fn existing_dir(&self, room: &RoomPath) -> StoreResult<PathBuf> {
        let dir = self.room_dir(room);
        if !is_dir(&dir).await? {
            return Err(StoreError::NotFound(dir));
        }
        Ok(dir)
    }

    /// Enumerates the hierarchy below `root`.
    ///
    /// Read-only: rooms without `info.json` get the default record in memory. Children
    /// and files are sorted by name. `ARCHIVE` directories, `info.json` and transient
    /// files are left out.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if `root` does not exist.
    /// - [`StoreError::MalformedDocument`] if any `info.json` in the tree is invalid.
    pub async fn build_tree(&self, root: &RoomPath) -> StoreResult<TreeNode> {
        let dir = self.existing_dir(root).await?;
        let name = if root.is_root() {
            ROOMS_DIR_NAME.to_string()
        } else {
            root.name().to_string()
        };
        self.load_node(dir, name, root.to_string()).await
    }

    fn load_node(&self, dir: PathBuf, name: String, path: String) -> TreeFuture<'_> {
        Box::pin(async move {
            let info = self.documents.read(&dir).await?;
            let mut children = Vec::new();
            let mut files = Vec::new();

            for (entry_name, is_directory) in list_entries(&dir).await? {
                let entry_path = if path.is_empty() {
                    entry_name.clone()
                } else {
                    format!("{}/{}", path, entry_name)
                };
                if is_directory {
                    if entry_name == ArchiveDir::NAME {
                        continue;
                    }
                    let child = self
                        .load_node(dir.join(&entry_name), entry_name, entry_path)
                        .await?;
                    children.push(child);
                } else if entry_name != InfoFile::NAME {
                    files.push(RoomFile {
                        name: entry_name,
                        path: entry_path,
                    });
                }
            }

            Ok(TreeNode {
                name,
                path,
                info,
                files,
                children,
            })
        })
    }

    /// Loads one room.
    pub async fn get_room(&self, room: &RoomPath) -> StoreResult<RoomDetail> {
        let dir = self.existing_dir(room).await?;
        let info = self.documents.read(&dir).await?;
        let files = self.assets(room).list().await?.into_iter().collect();
        Ok(RoomDetail {
            path: room.clone(),
            info,
            files,
        })
    }

    /// Replaces the room document with the defaults merged with `patch`.
    ///
    /// The room directory must already exist.
    pub async fn write_info(&self, room: &RoomPath, patch: RoomPatch) -> StoreResult<WriteOutcome> {
        let dir = self.existing_dir(room).await?;
        self.documents.write(&dir, patch).await
    }

    /// Merges `patch` into the current room document.
    pub async fn update_info(
        &self,
        room: &RoomPath,
        patch: RoomPatch,
    ) -> StoreResult<WriteOutcome> {
        let dir = self.existing_dir(room).await?;
        self.documents.update(&dir, patch).await
    }

    pub async fn write_info_if_current(
        &self,
        room: &RoomPath,
        patch: RoomPatch,
        expected_date: &str,
    ) -> StoreResult<WriteOutcome> {
        let dir = self.existing_dir(room).await?;
        self.documents
            .write_if_current(&dir, patch, expected_date)
            .await
    }

    pub async fn history(&self, room: &RoomPath) -> StoreResult<Vec<String>> {
        self.documents.history(&self.room_dir(room)).await
    }

    pub async fn resolve_file(&self, room: &RoomPath, name: &AssetName) -> StoreResult<PathBuf> {
        Ok(self.assets(room).resolve(name).await?)
    }

    pub async fn store_file(&self, room: &RoomPath, name: &AssetName) -> StoreResult<AssetUpload> {
        self.existing_dir(room).await?;
        Ok(self.assets(room).store(name).await?)
    }

    /// Removes an asset and its cached preview. Already absent is not an error.
    pub async fn remove_file(&self, room: &RoomPath, name: &AssetName) -> StoreResult<bool> {
        let removed = self.assets(room).remove(name).await?;
        self.previews.evict(&self.cache_dir(room), name).await?;
        Ok(removed)
    }

    pub async fn preview(&self, room: &RoomPath, name: &AssetName) -> StoreResult<PathBuf> {
        self.previews
            .get(&self.room_dir(room), &self.cache_dir(room), name)
            .await
    }
}

/// Directory entries as `(name, is_directory)`, sorted by name.
///
/// Symlinks are followed. Transient files and names that are not valid UTF-8 are
/// skipped.
async fn list_entries(dir: &Path) -> StoreResult<Vec<(String, bool)>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::io("list", dir, e))?;

    let mut listed = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io("list", dir, e))?
    {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            tracing::warn!("skipping non UTF-8 entry in {}", dir.display());
            continue;
        };
        if is_transient(name) {
            continue;
        }
        let path = entry.path();
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StoreError::io("inspect", &path, e))?;
        listed.push((name.to_string(), meta.is_dir()));
    }
    listed.sort();
    Ok(listed)
}
