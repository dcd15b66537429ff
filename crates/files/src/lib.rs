//! Inventory asset storage
//!
//! This crate manages the files an entity (an item or a room) owns: photos, scanned
//! documents, vendor reports. Assets live directly in the entity directory, next to the
//! entity's metadata document:
//!
//! ```text
//! <entity dir>/
//! ├── info.json        # metadata document (reserved, not an asset)
//! ├── ARCHIVE/         # metadata history (directory, never listed)
//! ├── photo.jpg        # asset
//! └── Report.htm       # asset
//! ```
//!
//! ## Guarantees
//!
//! - Asset names are single path segments ([`AssetName`]); nothing can be read, written
//!   or removed outside the entity directory.
//! - Uploads are staged in a private directory and only moved under their real name once
//!   the stream has completed ([`AssetUpload::finish`]). An aborted or dropped upload
//!   leaves nothing behind.
//! - Removing an asset that is already gone is not an error.
//!
//! ## Example Usage
//!
//! ```no_run
//! use inventory_files::{AssetDirectory, AssetName};
//! use tokio::io::AsyncWriteExt;
//!
//! # async fn run() -> Result<(), inventory_files::FilesError> {
//! let assets = AssetDirectory::new("storage/DB/ITEMS/1013", "storage/DB/TMP")
//!     .with_reserved(["info.json"]);
//!
//! let name = AssetName::new("photo.jpg")?;
//! let mut upload = assets.store(&name).await?;
//! upload.write_all(b"...").await?;
//! upload.finish().await?;
//!
//! for file in assets.list().await? {
//!     println!("{}", file);
//! }
//! # Ok(())
//! # }
//! ```

mod assets;
mod constants;
mod upload;

pub use assets::AssetDirectory;
pub use constants::{is_transient, transient_name};
pub use inventory_types::{AssetName, AssetNameError};
pub use upload::AssetUpload;

use std::path::PathBuf;

/// Errors that can occur during asset operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// The entity directory or the named asset does not exist
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The asset name is not a single path segment
    #[error("Invalid asset name: {0}")]
    InvalidName(#[from] AssetNameError),

    /// The name belongs to a file the store manages itself (e.g. the metadata document)
    #[error("Reserved name: {0}")]
    ReservedName(String),

    /// A resolved path left the entity directory (symlink)
    #[error("Path escapes entity directory: {}", .0.display())]
    OutsideEntity(PathBuf),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilesError {
    /// Wraps an I/O error with the path and action that produced it.
    ///
    /// `NotFound` is kept as its own variant so callers can tell "absent" from a
    /// genuine failure.
    pub(crate) fn io(action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return FilesError::NotFound(path.to_path_buf());
        }
        FilesError::Io(std::io::Error::new(
            err.kind(),
            format!("Failed to {} {}: {}", action, path.display(), err),
        ))
    }
}
