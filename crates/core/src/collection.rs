//! Queries across all items.
//!
//! Every query walks the items directory and reads the documents from disk; nothing is
//! cached between calls.

use crate::error::StoreResult;
use crate::repositories::items::{ItemDetail, ItemService};
use crate::documents::ItemInfo;
use inventory_ids::ItemId;
use serde::Serialize;
use std::collections::BTreeSet;

/// One row of the item listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemSummary {
    pub id: ItemId,
    /// `None` when the item has no `info.json` yet.
    pub info: Option<ItemInfo>,
    pub tags: Vec<String>,
}

/// Progress of [`Collection::refresh_reports`].
#[derive(Debug)]
pub struct RefreshProgress<'a> {
    /// Zero-based position of the item being refreshed.
    pub index: usize,
    pub total: usize,
    pub detail: &'a ItemDetail,
}

#[derive(Clone, Debug)]
pub struct Collection {
    items: ItemService,
}

impl Collection {
    pub fn new(items: ItemService) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &ItemService {
        &self.items
    }

    /// Lists every item in identifier order.
    ///
    /// # Errors
    ///
    /// Any unparsable `info.json` fails the whole listing with
    /// [`StoreError::MalformedDocument`](crate::StoreError::MalformedDocument).
    pub async fn list_all(&self) -> StoreResult<Vec<ItemSummary>> {
        let mut summaries = Vec::new();
        for id in self.items.ids().await? {
            let info = self.items.read_info(id).await?;
            let tags = info.as_ref().map(ItemInfo::tags).unwrap_or_default();
            summaries.push(ItemSummary { id, info, tags });
        }
        Ok(summaries)
    }

    /// Sorted distinct non-empty places.
    pub async fn distinct_places(&self) -> StoreResult<Vec<String>> {
        let places: BTreeSet<String> = self
            .list_all()
            .await?
            .into_iter()
            .filter_map(|summary| summary.info.map(|info| info.place))
            .filter(|place| !place.is_empty())
            .collect();
        Ok(places.into_iter().collect())
    }

    /// Sorted distinct `#tags` over all comments.
    pub async fn distinct_tags(&self) -> StoreResult<Vec<String>> {
        let tags: BTreeSet<String> = self
            .list_all()
            .await?
            .into_iter()
            .flat_map(|summary| summary.tags)
            .collect();
        Ok(tags.into_iter().collect())
    }

    /// Full details of every item placed in `room`.
    pub async fn list_by_room(&self, room: &str) -> StoreResult<Vec<ItemDetail>> {
        let mut details = Vec::new();
        for summary in self.list_all().await? {
            let in_room = summary
                .info
                .as_ref()
                .map(|info| info.place == room)
                .unwrap_or(false);
            if in_room {
                details.push(self.items.get_item(summary.id).await?);
            }
        }
        Ok(details)
    }

    /// Re-derives `pc.json` for every computer-like item.
    ///
    /// The cached summary is deleted and the item reloaded, which parses `Report.htm`
    /// again when a report parser is configured. `progress` is called after each item.
    ///
    /// # Returns
    ///
    /// The number of items refreshed.
    pub async fn refresh_reports<F>(&self, mut progress: F) -> StoreResult<usize>
    where
        F: FnMut(RefreshProgress<'_>) + Send,
    {
        let computers: Vec<ItemId> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|summary| {
                summary
                    .info
                    .as_ref()
                    .map(ItemInfo::is_computer)
                    .unwrap_or(false)
            })
            .map(|summary| summary.id)
            .collect();

        let total = computers.len();
        for (index, id) in computers.into_iter().enumerate() {
            self.items.drop_pc_cache(id).await?;
            let detail = self.items.get_item(id).await?;
            progress(RefreshProgress {
                index,
                total,
                detail: &detail,
            });
        }
        tracing::info!("refreshed hardware reports for {} items", total);
        Ok(total)
    }
}
