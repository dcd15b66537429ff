use super::{merge_extra, MetadataDocument};
use crate::constants::COMPUTER_TYPES;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\S+").expect("tag pattern is a valid regex"));

/// Metadata of one inventoried item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub brand: String,
    pub model: String,
    /// Room path the item is located in.
    pub place: String,
    pub comment: String,
    pub date: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ItemInfo {
    /// Returns true if the type names a computer, whose vendor report is parsed into
    /// `pc.json`.
    pub fn is_computer(&self) -> bool {
        let kind = self.kind.trim();
        COMPUTER_TYPES
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(kind))
    }

    /// `#hashtag` tokens found in the comment, deduplicated and sorted.
    pub fn tags(&self) -> Vec<String> {
        TAG_PATTERN
            .find_iter(&self.comment)
            .map(|m| m.as_str().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Partial update for [`ItemInfo`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemPatch {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MetadataDocument for ItemInfo {
    type Patch = ItemPatch;

    fn apply(&mut self, patch: ItemPatch) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(brand) = patch.brand {
            self.brand = brand;
        }
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(place) = patch.place {
            self.place = place;
        }
        if let Some(comment) = patch.comment {
            self.comment = comment;
        }
        merge_extra(&mut self.extra, patch.extra);
    }

    fn date(&self) -> &str {
        &self.date
    }

    fn set_date(&mut self, date: String) {
        self.date = date;
    }
}
