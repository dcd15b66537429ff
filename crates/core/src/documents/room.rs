use super::{merge_extra, MetadataDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata of a room directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomInfo {
    /// Free-form room number or label.
    pub id: String,
    pub comment: String,
    /// Facility checklist (network socket present, projector present, ...).
    pub params: Vec<bool>,
    pub issues: Vec<String>,
    pub date: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Partial update for [`RoomInfo`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MetadataDocument for RoomInfo {
    type Patch = RoomPatch;

    fn apply(&mut self, patch: RoomPatch) {
        if let Some(id) = patch.id {
            self.id = id;
        }
        if let Some(comment) = patch.comment {
            self.comment = comment;
        }
        if let Some(params) = patch.params {
            self.params = params;
        }
        if let Some(issues) = patch.issues {
            self.issues = issues;
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
