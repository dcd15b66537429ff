//! Shared repository utilities.
//!
//! File-level primitives used by the document store, the preview cache and the derived
//! `pc.json` cache:
//!
//! - **Reading**: [`read_optional`] and [`read_json_or_default`] treat a missing file as
//!   "no document" and everything else as an error.
//! - **Writing**: [`write_atomic`] writes to a hidden transient file next to the target,
//!   syncs it and renames it over the target, so readers see either the old or the new
//!   bytes and never a prefix.
//! - **Removal**: [`remove_if_exists`] treats an already-absent file as success.

use crate::error::{StoreError, StoreResult};
use inventory_files::transient_name;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Serializes `value` as pretty JSON indented with four spaces.
pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    value
        .serialize(&mut serializer)
        .map_err(StoreError::Serialization)?;
    Ok(bytes)
}

/// Reads a file, returning `None` if it does not exist.
pub(crate) async fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io("read", path, e)),
    }
}

/// Parses a JSON document; unparsable content is a [`StoreError::MalformedDocument`].
pub(crate) fn parse_json<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::malformed(path, e))
}

/// Reads a JSON document, or the default value when the file does not exist.
pub(crate) async fn read_json_or_default<T>(path: &Path) -> StoreResult<T>
where
    T: DeserializeOwned + Default,
{
    match read_optional(path).await? {
        Some(bytes) => parse_json(path, &bytes),
        None => Ok(T::default()),
    }
}

/// Returns the path of a fresh transient file in the same directory as `target`.
pub(crate) fn transient_path_for(target: &Path) -> StoreResult<PathBuf> {
    let parent = target.parent().ok_or_else(|| {
        StoreError::InvalidInput(format!("'{}' has no parent directory", target.display()))
    })?;
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            StoreError::InvalidInput(format!("'{}' has no file name", target.display()))
        })?;
    Ok(parent.join(transient_name(file_name)))
}

/// Removes a file, treating "not found" as success.
///
/// Returns true if a file was removed.
pub(crate) async fn remove_if_exists(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io("remove", path, e)),
    }
}

/// Best-effort removal of a transient file after a failed operation.
pub(crate) async fn discard_transient(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("failed to remove transient file {}: {}", path.display(), e);
        }
    }
}

/// Atomically replaces `target` with `bytes`.
///
/// The parent directory must exist. On any failure the transient file is removed and
/// `target` keeps its previous content.
pub(crate) async fn write_atomic(target: &Path, bytes: &[u8]) -> StoreResult<()> {
    let transient = transient_path_for(target)?;

    let written: StoreResult<()> = async {
        let mut file = fs::File::create(&transient)
            .await
            .map_err(|e| StoreError::io("create", &transient, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::io("write", &transient, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io("sync", &transient, e))?;
        drop(file);
        fs::rename(&transient, target)
            .await
            .map_err(|e| StoreError::io("replace", target, e))
    }
    .await;

    if written.is_err() {
        discard_transient(&transient).await;
    }
    written
}

/// Serializes `value` and atomically replaces `target` with it.
pub(crate) async fn write_json_atomic<T: Serialize>(target: &Path, value: &T) -> StoreResult<()> {
    let bytes = to_pretty_json(value)?;
    write_atomic(target, &bytes).await
}

/// Returns true if `path` is an existing directory.
pub(crate) async fn is_dir(path: &Path) -> StoreResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io("inspect", path, e)),
    }
}

/// Returns true if `path` is an existing regular file.
pub(crate) async fn is_file(path: &Path) -> StoreResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io("inspect", path, e)),
    }
}
