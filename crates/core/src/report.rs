//! Vendor hardware report seam.
//!
//! Computer-like items may carry a hardware report exported by a diagnostics tool
//! (`Report.htm`). The store does not parse it itself; a [`ReportParser`] turns it into a
//! [`PcInfo`], which the item repository caches as `pc.json`.

use crate::documents::PcInfo;
use async_trait::async_trait;
use std::path::Path;

pub type ReportError = Box<dyn std::error::Error + Send + Sync>;

/// Extracts a hardware summary from a vendor report file.
#[async_trait]
pub trait ReportParser: Send + Sync {
    async fn parse(&self, report: &Path) -> Result<PcInfo, ReportError>;
}
