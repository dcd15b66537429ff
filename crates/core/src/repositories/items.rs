//! Item repository.
//!
//! An item is a directory `DB/ITEMS/<id>` holding `info.json`, its archive, uploaded
//! assets and, for computers, a derived `pc.json`. Previews of its pictures live in
//! `DB/CACHE/<id>`.

use crate::config::CoreConfig;
use crate::documents::{ItemInfo, ItemPatch, PcInfo};
use crate::error::{StoreError, StoreResult};
use crate::paths::common::InfoFile;
use crate::paths::items::{PcFile, ReportFile};
use crate::previews::PreviewCache;
use crate::report::ReportParser;
use crate::repositories::shared::{
    is_dir, is_file, parse_json, read_optional, remove_if_exists, write_json_atomic,
};
use crate::versioned_documents::{DocumentStore, WriteOutcome};
use inventory_files::{AssetDirectory, AssetUpload};
use inventory_ids::ItemId;
use inventory_types::AssetName;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

/// Everything known about one item.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemDetail {
    pub id: ItemId,
    pub info: ItemInfo,
    pub files: Vec<String>,
    /// Hardware summary; only loaded for computer-like items with a report.
    pub pc: Option<PcInfo>,
}

#[derive(Clone)]
pub struct ItemService {
    cfg: Arc<CoreConfig>,
    documents: DocumentStore<ItemInfo>,
    previews: PreviewCache,
    reports: Option<Arc<dyn ReportParser>>,
}

impl std::fmt::Debug for ItemService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemService")
            .field("items_dir", &self.cfg.items_dir())
            .field("reports", &self.reports.is_some())
            .finish()
    }
}

impl ItemService {
    pub fn new(cfg: Arc<CoreConfig>, previews: PreviewCache) -> Self {
        Self {
            documents: DocumentStore::new(&cfg),
            cfg,
            previews,
            reports: None,
        }
    }

    /// Enables deriving `pc.json` from `Report.htm`.
    pub fn with_report_parser(mut self, parser: Arc<dyn ReportParser>) -> Self {
        self.reports = Some(parser);
        self
    }

    pub fn item_dir(&self, id: ItemId) -> PathBuf {
        id.dir_in(&self.cfg.items_dir())
    }

    fn cache_dir(&self, id: ItemId) -> PathBuf {
        id.dir_in(&self.cfg.cache_dir())
    }

    fn assets(&self, id: ItemId) -> AssetDirectory {
        AssetDirectory::new(self.item_dir(id), self.cfg.staging_dir())
            .with_reserved([InfoFile::NAME, PcFile::NAME])
    }

    /// Lists the identifiers of all item directories, in ascending order.
    ///
    /// The items root is created if it does not exist yet.
    pub async fn ids(&self) -> StoreResult<Vec<ItemId>> {
        let items_dir = self.cfg.items_dir();
        fs::create_dir_all(&items_dir)
            .await
            .map_err(|e| StoreError::io("create items directory", &items_dir, e))?;
        let mut entries = fs::read_dir(&items_dir)
            .await
            .map_err(|e| StoreError::io("list", &items_dir, e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("list", &items_dir, e))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !ItemId::is_canonical(&name) {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io("inspect", &entry.path(), e))?;
            if file_type.is_dir() {
                ids.push(ItemId::parse(&name)?);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Loads an item with its asset list and, for computers, its hardware summary.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the item directory does not exist.
    /// - [`StoreError::MalformedDocument`] if `info.json` or `pc.json` cannot be parsed.
    /// - [`StoreError::DerivationFailure`] if the report parser fails.
    pub async fn get_item(&self, id: ItemId) -> StoreResult<ItemDetail> {
        let dir = self.item_dir(id);
        if !is_dir(&dir).await? {
            return Err(StoreError::NotFound(dir));
        }

        let files = self.assets(id).list().await?.into_iter().collect();
        let info = self.documents.read(&dir).await?;
        let pc = if info.is_computer() {
            self.load_pc(id).await?
        } else {
            None
        };

        Ok(ItemDetail {
            id,
            info,
            files,
            pc,
        })
    }

    /// Reads `info.json` if the item has one.
    ///
    /// Returns `None` for items without a document, so listings can show them by
    /// identifier only.
    pub async fn read_info(&self, id: ItemId) -> StoreResult<Option<ItemInfo>> {
        let path = InfoFile::path_in(&self.item_dir(id));
        match read_optional(&path).await? {
            Some(bytes) => Ok(Some(parse_json(&path, &bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_pc(&self, id: ItemId) -> StoreResult<Option<PcInfo>> {
        let dir = self.item_dir(id);
        let pc_path = dir.join(PcFile::NAME);
        if let Some(bytes) = read_optional(&pc_path).await? {
            return Ok(Some(parse_json(&pc_path, &bytes)?));
        }

        let Some(parser) = &self.reports else {
            return Ok(None);
        };
        let report = dir.join(ReportFile::NAME);
        if !is_file(&report).await? {
            return Ok(None);
        }

        let pc = parser
            .parse(&report)
            .await
            .map_err(|e| StoreError::derivation(&report, e))?;
        write_json_atomic(&pc_path, &pc).await?;
        tracing::info!("derived {} from {}", pc_path.display(), ReportFile::NAME);
        Ok(Some(pc))
    }

    /// Deletes the cached `pc.json` so the next load parses the report again.
    pub async fn drop_pc_cache(&self, id: ItemId) -> StoreResult<bool> {
        remove_if_exists(&self.item_dir(id).join(PcFile::NAME)).await
    }

    /// Replaces the item document with the defaults merged with `patch`.
    pub async fn write_info(&self, id: ItemId, patch: ItemPatch) -> StoreResult<WriteOutcome> {
        self.documents.write(&self.item_dir(id), patch).await
    }

    /// Merges `patch` into the current item document.
    pub async fn update_info(&self, id: ItemId, patch: ItemPatch) -> StoreResult<WriteOutcome> {
        self.documents.update(&self.item_dir(id), patch).await
    }

    pub async fn write_info_if_current(
        &self,
        id: ItemId,
        patch: ItemPatch,
        expected_date: &str,
    ) -> StoreResult<WriteOutcome> {
        self.documents
            .write_if_current(&self.item_dir(id), patch, expected_date)
            .await
    }

    pub async fn history(&self, id: ItemId) -> StoreResult<Vec<String>> {
        self.documents.history(&self.item_dir(id)).await
    }

    pub async fn resolve_file(&self, id: ItemId, name: &AssetName) -> StoreResult<PathBuf> {
        Ok(self.assets(id).resolve(name).await?)
    }

    /// Opens an upload for `name`. The item directory is created when the upload finishes.
    pub async fn store_file(&self, id: ItemId, name: &AssetName) -> StoreResult<AssetUpload> {
        Ok(self.assets(id).store(name).await?)
    }

    /// Removes an asset and its cached preview. Already absent is not an error.
    pub async fn remove_file(&self, id: ItemId, name: &AssetName) -> StoreResult<bool> {
        let removed = self.assets(id).remove(name).await?;
        self.previews.evict(&self.cache_dir(id), name).await?;
        Ok(removed)
    }

    pub async fn preview(&self, id: ItemId, name: &AssetName) -> StoreResult<PathBuf> {
        self.previews
            .get(&self.item_dir(id), &self.cache_dir(id), name)
            .await
    }
}
