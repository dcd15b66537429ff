//! Item identifier allocation.
//!
//! Identifiers are the names of the item directories. A new batch continues after the
//! highest existing four-digit name (or the configured floor), and each identifier is
//! claimed by creating its directory.
//!
//! In [`ConcurrencyMode::Relaxed`] two allocations running at the same time can compute
//! the same maximum and hand out the same identifiers. Directory creation is idempotent,
//! so both callers succeed and share the directories. [`ConcurrencyMode::Serialized`]
//! makes allocations mutually exclusive within the process.

use crate::config::{ConcurrencyMode, CoreConfig};
use crate::error::{StoreError, StoreResult};
use inventory_ids::ItemId;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct IdAllocator {
    cfg: Arc<CoreConfig>,
    serial: Option<Arc<Mutex<()>>>,
}

impl IdAllocator {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        let serial = match cfg.concurrency() {
            ConcurrencyMode::Relaxed => None,
            ConcurrencyMode::Serialized => Some(Arc::new(Mutex::new(()))),
        };
        Self { cfg, serial }
    }

    /// Creates `count` new item directories and returns their identifiers in order.
    ///
    /// The items root is created if it does not exist. `count == 0` allocates nothing.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidInput`] if the batch would go past `9999`. Nothing is created.
    /// - [`StoreError::Io`] if the items root cannot be scanned or a directory cannot be
    ///   created.
    pub async fn allocate(&self, count: u32) -> StoreResult<Vec<ItemId>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let _guard = match &self.serial {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let items_dir = self.cfg.items_dir();
        fs::create_dir_all(&items_dir)
            .await
            .map_err(|e| StoreError::io("create items directory", &items_dir, e))?;

        let last = highest_id(&items_dir)
            .await?
            .unwrap_or(0)
            .max(self.cfg.id_floor());
        let first = last + 1;
        let end = last
            .checked_add(count)
            .filter(|end| *end <= ItemId::MAX)
            .ok_or_else(|| {
                StoreError::InvalidInput(format!(
                    "cannot allocate {} identifiers after {}: the four-digit range ends at {}",
                    count,
                    last,
                    ItemId::MAX
                ))
            })?;

        let ids = (first..=end)
            .map(ItemId::from_number)
            .collect::<Result<Vec<_>, _>>()?;
        for id in &ids {
            let dir = id.dir_in(&items_dir);
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::io("create item directory", &dir, e))?;
        }

        tracing::info!("allocated {} item ids ({}..={})", ids.len(), first, end);
        Ok(ids)
    }
}

/// Highest canonical item directory name under `items_dir`.
async fn highest_id(items_dir: &Path) -> StoreResult<Option<u32>> {
    let mut entries = fs::read_dir(items_dir)
        .await
        .map_err(|e| StoreError::io("list", items_dir, e))?;

    let mut highest = None;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io("list", items_dir, e))?
    {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !ItemId::is_canonical(&name) {
            continue;
        }
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| StoreError::io("inspect", &entry.path(), e))?
            .is_dir();
        if !is_dir {
            continue;
        }
        let id = ItemId::parse(&name)?;
        highest = highest.max(Some(id.number()));
    }
    Ok(highest)
}
