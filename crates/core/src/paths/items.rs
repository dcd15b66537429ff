//! Item-only file names.

/// Derived hardware summary, cached from the vendor report.
pub struct PcFile;

impl PcFile {
    pub const NAME: &'static str = "pc.json";
}

/// Vendor hardware report uploaded alongside computer-like items.
pub struct ReportFile;

impl ReportFile {
    pub const NAME: &'static str = "Report.htm";
}
