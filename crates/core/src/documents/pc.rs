use serde::{Deserialize, Serialize};

/// Hardware summary derived from a vendor report and cached as `pc.json`.
///
/// Not versioned: it is regenerated from the report whenever the cache is dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcInfo {
    pub os: String,
    pub cpu: String,
    pub cpuid: String,
    pub ram: String,
    /// Motherboard.
    pub mb: String,
    pub drives: Vec<String>,
}
