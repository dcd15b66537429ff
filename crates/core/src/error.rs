use inventory_files::FilesError;
use inventory_ids::IdError;
use std::path::{Path, PathBuf};

/// Coarse classification of a [`StoreError`].
///
/// Callers at the edge (HTTP handlers, the CLI) map these to outcomes: `NotFound` to a
/// routing miss, everything else to a failure of the appropriate kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    MalformedDocument,
    DerivationFailure,
    IoFailure,
    InvalidInput,
    Conflict,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("malformed document {}: {source}", path.display())]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to derive {}: {source}", path.display())]
    DerivationFailure {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("asset storage failed: {0}")]
    AssetIo(std::io::Error),
    #[error("failed to serialize document: {0}")]
    Serialization(serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(
        "document {} changed concurrently: expected date '{expected}', found '{found}'",
        path.display()
    )]
    Conflict {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Wraps an I/O error with the action and path that produced it, keeping
    /// "not found" distinct.
    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return StoreError::NotFound(path.to_path_buf());
        }
        StoreError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, source: serde_json::Error) -> Self {
        StoreError::MalformedDocument {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn derivation(
        path: &Path,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StoreError::DerivationFailure {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::MalformedDocument { .. } => ErrorKind::MalformedDocument,
            StoreError::DerivationFailure { .. } => ErrorKind::DerivationFailure,
            StoreError::Io { .. } | StoreError::AssetIo(_) | StoreError::Serialization(_) => {
                ErrorKind::IoFailure
            }
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<IdError> for StoreError {
    fn from(err: IdError) -> Self {
        StoreError::InvalidInput(err.to_string())
    }
}

impl From<inventory_types::AssetNameError> for StoreError {
    fn from(err: inventory_types::AssetNameError) -> Self {
        StoreError::InvalidInput(err.to_string())
    }
}

impl From<FilesError> for StoreError {
    fn from(err: FilesError) -> Self {
        match err {
            FilesError::NotFound(path) => StoreError::NotFound(path),
            FilesError::InvalidName(e) => StoreError::InvalidInput(e.to_string()),
            FilesError::ReservedName(name) => {
                StoreError::InvalidInput(format!("'{}' is managed by the store", name))
            }
            FilesError::OutsideEntity(path) => StoreError::InvalidInput(format!(
                "'{}' resolves outside its entity",
                path.display()
            )),
            FilesError::Io(source) => StoreError::AssetIo(source),
        }
    }
}
