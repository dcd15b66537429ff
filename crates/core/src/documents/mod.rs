//! Typed metadata documents.
//!
//! Every entity directory holds one flat JSON object in `info.json`. Each entity kind has a
//! typed record for it ([`ItemInfo`], [`RoomInfo`]) and a matching patch type. A write
//! always starts from the default record and applies a validated patch, so the set of
//! fields is fixed by the type rather than by whatever the caller sent.
//!
//! Keys found on disk that the record does not know about are kept in an `extra` map and
//! written back unchanged.

mod item;
mod pc;
mod room;

pub use item::{ItemInfo, ItemPatch};
pub use pc::PcInfo;
pub use room::{RoomInfo, RoomPatch};

use inventory_ids::Stamp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the timestamp field every metadata document carries.
pub const DATE_FIELD: &str = "date";

/// A versioned metadata document stored as `info.json`.
pub trait MetadataDocument:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Partial update accepted by [`apply`](MetadataDocument::apply).
    type Patch: DeserializeOwned + Clone + fmt::Debug + Send + Sync;

    /// Merges `patch` into `self`. Fields absent from the patch keep their current value.
    fn apply(&mut self, patch: Self::Patch);

    /// The last-write timestamp as persisted. Empty for documents never written.
    fn date(&self) -> &str;

    fn set_date(&mut self, date: String);

    fn stamp(&mut self, stamp: &Stamp) {
        self.set_date(stamp.to_string());
    }

    /// Field-by-field equality ignoring the timestamp.
    fn same_content(&self, other: &Self) -> bool {
        let mut left = self.clone();
        let mut right = other.clone();
        left.set_date(String::new());
        right.set_date(String::new());
        left == right
    }
}

/// Merges patch extras into a document's extras. The timestamp is never taken from a
/// patch, so a stray `date` key is dropped.
pub(crate) fn merge_extra(target: &mut BTreeMap<String, Value>, extra: BTreeMap<String, Value>) {
    for (key, value) in extra {
        if key == DATE_FIELD {
            continue;
        }
        target.insert(key, value);
    }
}
