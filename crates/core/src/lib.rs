//! # Inventory Core
//!
//! Core storage logic for the inventory: items and rooms kept as plain directories.
//!
//! This crate contains pure data operations and file/folder management:
//! - Item identifier allocation under `DB/ITEMS`
//! - Versioned `info.json` documents with an `ARCHIVE/` of previous versions
//! - Lazily generated picture previews under `DB/CACHE`
//! - Hardware summaries (`pc.json`) derived from vendor reports
//! - Listings and queries over all items, and the room hierarchy under `DB/ROOMS`
//!
//! **No transport concerns**: HTTP routing, sessions, multipart parsing and archive
//! downloads belong to the callers. Configuration is resolved once into a [`CoreConfig`]
//! and passed in; nothing here reads environment variables.

pub mod allocator;
pub mod collection;
pub mod config;
pub mod constants;
pub mod documents;
mod error;
pub mod locks;
pub mod paths;
pub mod previews;
pub mod report;
pub mod repositories;
pub mod transcoder;
pub mod versioned_documents;

pub use allocator::IdAllocator;
pub use collection::{Collection, ItemSummary, RefreshProgress};
pub use config::{ConcurrencyMode, CoreConfig};
pub use documents::{ItemInfo, ItemPatch, MetadataDocument, PcInfo, RoomInfo, RoomPatch};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use previews::PreviewCache;
pub use report::{ReportError, ReportParser};
pub use repositories::items::{ItemDetail, ItemService};
pub use repositories::rooms::{RoomDetail, RoomFile, RoomService, TreeNode};
pub use transcoder::{FfmpegTranscoder, TranscodeError, Transcoder};
pub use versioned_documents::{DocumentStore, WriteOutcome};

pub use inventory_files::AssetUpload;
pub use inventory_ids::{ItemId, RoomPath, Stamp};
pub use inventory_types::AssetName;

use std::sync::Arc;

/// All store services wired to one configuration.
///
/// Cheap to clone; clones share the preview cache and, in serialized mode, its locks.
#[derive(Clone, Debug)]
pub struct InventoryService {
    cfg: Arc<CoreConfig>,
    allocator: IdAllocator,
    rooms: RoomService,
    collection: Collection,
}

impl InventoryService {
    /// Wires the services for `cfg` with the given transcoder and no report parser.
    pub fn new(cfg: Arc<CoreConfig>, transcoder: Arc<dyn Transcoder>) -> Self {
        let previews = PreviewCache::new(cfg.clone(), transcoder);
        Self {
            allocator: IdAllocator::new(cfg.clone()),
            rooms: RoomService::new(cfg.clone(), previews.clone()),
            collection: Collection::new(ItemService::new(cfg.clone(), previews)),
            cfg,
        }
    }

    /// Wires the services with an `ffmpeg` transcoder as configured.
    pub fn with_ffmpeg(cfg: Arc<CoreConfig>) -> Self {
        let ffmpeg = FfmpegTranscoder::new(cfg.transcoder_program());
        Self::new(cfg, Arc::new(ffmpeg))
    }

    /// Enables deriving `pc.json` from vendor reports.
    pub fn with_report_parser(mut self, parser: Arc<dyn ReportParser>) -> Self {
        let items = self.collection.items().clone().with_report_parser(parser);
        self.collection = Collection::new(items);
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    pub fn items(&self) -> &ItemService {
        self.collection.items()
    }

    pub fn rooms(&self) -> &RoomService {
        &self.rooms
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }
}
