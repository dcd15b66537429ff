//! Names shared by item and room directories.

use inventory_ids::Stamp;
use std::path::{Path, PathBuf};

/// Metadata document filename.
pub struct InfoFile;

impl InfoFile {
    pub const NAME: &'static str = "info.json";

    pub fn path_in(entity_dir: &Path) -> PathBuf {
        entity_dir.join(Self::NAME)
    }
}

/// Directory holding prior snapshots of the metadata document.
pub struct ArchiveDir;

impl ArchiveDir {
    pub const NAME: &'static str = "ARCHIVE";

    pub fn path_in(entity_dir: &Path) -> PathBuf {
        entity_dir.join(Self::NAME)
    }

    /// Snapshot filename for `stamp`; `attempt` 0 is the plain name, later attempts add a
    /// `-n` counter for snapshots taken within the same second.
    pub fn snapshot_name(stamp: &Stamp, attempt: u32) -> String {
        if attempt == 0 {
            format!("info.{}.json", stamp)
        } else {
            format!("info.{}-{}.json", stamp, attempt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_names() {
        let stamp = Stamp::parse("20240131235959").unwrap();
        assert_eq!(
            ArchiveDir::snapshot_name(&stamp, 0),
            "info.20240131235959.json"
        );
        assert_eq!(
            ArchiveDir::snapshot_name(&stamp, 2),
            "info.20240131235959-2.json"
        );
    }
}
