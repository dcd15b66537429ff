//! Versioned metadata documents.
//!
//! Each entity directory holds its current metadata in `info.json`. Changing it goes
//! through [`DocumentStore`], which keeps the history:
//!
//! 1. the new record is built (default record plus patch, or current record plus patch for
//!    [`DocumentStore::update`]) and stamped with the current local time,
//! 2. the current document is loaded; if it equals the new one ignoring `date`, nothing is
//!    written,
//! 3. otherwise the current bytes are copied unchanged to `ARCHIVE/info.<stamp>.json`,
//! 4. the new document replaces `info.json` atomically (transient file, sync, rename).
//!
//! The archive copy always completes before the replace starts. If either step fails the
//! live document is left as it was.

use crate::config::{ConcurrencyMode, CoreConfig};
use crate::documents::MetadataDocument;
use crate::error::{StoreError, StoreResult};
use crate::locks::{KeyGuard, KeyedLocks};
use crate::paths::common::{ArchiveDir, InfoFile};
use crate::repositories::shared::{parse_json, read_optional, write_json_atomic};
use inventory_ids::Stamp;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Result of a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The stored document already had this content. Nothing was touched.
    Unchanged,
    /// There was no document before.
    Created,
    /// The previous document was archived at `archived` and replaced.
    Updated { archived: PathBuf },
}

/// Reads and writes one kind of metadata document.
///
/// In [`ConcurrencyMode::Serialized`] writes to the same entity directory wait for each
/// other. In relaxed mode concurrent writers are last-write-wins; each of them still
/// archives the version it replaced.
pub struct DocumentStore<D> {
    locks: Option<Arc<KeyedLocks>>,
    _document: PhantomData<fn() -> D>,
}

impl<D> Clone for DocumentStore<D> {
    fn clone(&self) -> Self {
        Self {
            locks: self.locks.clone(),
            _document: PhantomData,
        }
    }
}

impl<D> std::fmt::Debug for DocumentStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("serialized", &self.locks.is_some())
            .finish()
    }
}

impl<D: MetadataDocument> DocumentStore<D> {
    pub fn new(cfg: &CoreConfig) -> Self {
        let locks = match cfg.concurrency() {
            ConcurrencyMode::Relaxed => None,
            ConcurrencyMode::Serialized => Some(Arc::new(KeyedLocks::new())),
        };
        Self {
            locks,
            _document: PhantomData,
        }
    }

    /// Reads the document in `entity_dir`.
    ///
    /// A missing file yields the default record. Fields missing from the file take their
    /// default values.
    ///
    /// # Errors
    ///
    /// - [`StoreError::MalformedDocument`] if the file is not a valid document.
    /// - [`StoreError::Io`] for any other read failure.
    pub async fn read(&self, entity_dir: &Path) -> StoreResult<D> {
        Ok(self
            .read_current(entity_dir)
            .await?
            .map(|(doc, _)| doc)
            .unwrap_or_default())
    }

    /// Replaces the document with the default record merged with `patch`.
    ///
    /// Fields the patch leaves out are reset to their defaults; use
    /// [`update`](Self::update) to keep them. The entity directory is created if needed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::MalformedDocument`] if the current document cannot be parsed. The
    ///   write is aborted rather than archiving bytes it cannot compare.
    /// - [`StoreError::Io`] if archiving or replacing fails. The live document is untouched.
    pub async fn write(&self, entity_dir: &Path, patch: D::Patch) -> StoreResult<WriteOutcome> {
        let _guard = self.lock(entity_dir).await;
        let current = self.read_current(entity_dir).await?;
        let mut next = D::default();
        next.apply(patch);
        self.commit(entity_dir, next, current).await
    }

    /// Applies `patch` on top of the current document and writes the result.
    pub async fn update(&self, entity_dir: &Path, patch: D::Patch) -> StoreResult<WriteOutcome> {
        let _guard = self.lock(entity_dir).await;
        let current = self.read_current(entity_dir).await?;
        let mut next = current
            .as_ref()
            .map(|(doc, _)| doc.clone())
            .unwrap_or_default();
        next.apply(patch);
        self.commit(entity_dir, next, current).await
    }

    /// Like [`write`](Self::write), but only if the stored `date` still equals
    /// `expected_date`. An absent document has an empty date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the document changed since `expected_date`
    /// was read.
    pub async fn write_if_current(
        &self,
        entity_dir: &Path,
        patch: D::Patch,
        expected_date: &str,
    ) -> StoreResult<WriteOutcome> {
        let _guard = self.lock(entity_dir).await;
        let current = self.read_current(entity_dir).await?;
        let found = current
            .as_ref()
            .map(|(doc, _)| doc.date().to_string())
            .unwrap_or_default();
        if found != expected_date {
            return Err(StoreError::Conflict {
                path: InfoFile::path_in(entity_dir),
                expected: expected_date.to_string(),
                found,
            });
        }
        let mut next = D::default();
        next.apply(patch);
        self.commit(entity_dir, next, current).await
    }

    /// Lists archived snapshot file names, oldest first.
    pub async fn history(&self, entity_dir: &Path) -> StoreResult<Vec<String>> {
        let archive_dir = ArchiveDir::path_in(entity_dir);
        let mut entries = match fs::read_dir(&archive_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("list", &archive_dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("list", &archive_dir, e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with("info.") && name.ends_with(".json") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort_by_key(|name| snapshot_order(name));
        Ok(names)
    }

    async fn lock(&self, entity_dir: &Path) -> Option<KeyGuard> {
        match &self.locks {
            Some(locks) => Some(locks.lock(entity_dir).await),
            None => None,
        }
    }

    async fn read_current(&self, entity_dir: &Path) -> StoreResult<Option<(D, Vec<u8>)>> {
        let path = InfoFile::path_in(entity_dir);
        match read_optional(&path).await? {
            Some(bytes) => {
                let doc = parse_json(&path, &bytes)?;
                Ok(Some((doc, bytes)))
            }
            None => Ok(None),
        }
    }

    async fn commit(
        &self,
        entity_dir: &Path,
        mut next: D,
        current: Option<(D, Vec<u8>)>,
    ) -> StoreResult<WriteOutcome> {
        let stamp = Stamp::now();
        next.stamp(&stamp);
        let path = InfoFile::path_in(entity_dir);

        let outcome = match current {
            Some((doc, _)) if doc.same_content(&next) => {
                tracing::debug!("{} unchanged, skipping write", path.display());
                return Ok(WriteOutcome::Unchanged);
            }
            Some((_, bytes)) => {
                let archived = archive_snapshot(entity_dir, &stamp, &bytes).await?;
                WriteOutcome::Updated { archived }
            }
            None => {
                fs::create_dir_all(entity_dir)
                    .await
                    .map_err(|e| StoreError::io("create entity directory", entity_dir, e))?;
                WriteOutcome::Created
            }
        };

        write_json_atomic(&path, &next).await?;
        match &outcome {
            WriteOutcome::Updated { archived } => tracing::info!(
                "updated {} (previous version at {})",
                path.display(),
                archived.display()
            ),
            _ => tracing::info!("created {}", path.display()),
        }
        Ok(outcome)
    }
}

/// Sort key for `info.<stamp>[-<n>].json`: stamp first, then the collision counter.
fn snapshot_order(name: &str) -> (String, u32) {
    let core = name
        .trim_start_matches("info.")
        .trim_end_matches(".json");
    match core.split_once('-') {
        Some((stamp, attempt)) => (stamp.to_string(), attempt.parse().unwrap_or(u32::MAX)),
        None => (core.to_string(), 0),
    }
}

/// Copies `bytes` into a new snapshot file in the archive directory.
///
/// Snapshot names never collide: a second snapshot within the same second gets a `-n`
/// counter instead of overwriting the first.
async fn archive_snapshot(entity_dir: &Path, stamp: &Stamp, bytes: &[u8]) -> StoreResult<PathBuf> {
    let archive_dir = ArchiveDir::path_in(entity_dir);
    fs::create_dir_all(&archive_dir)
        .await
        .map_err(|e| StoreError::io("create archive directory", &archive_dir, e))?;

    let mut attempt = 0;
    loop {
        let path = archive_dir.join(ArchiveDir::snapshot_name(stamp, attempt));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                let copied = async {
                    file.write_all(bytes).await?;
                    file.sync_all().await
                }
                .await;
                if let Err(e) = copied {
                    drop(file);
                    if let Err(cleanup) = fs::remove_file(&path).await {
                        tracing::warn!("failed to remove {}: {}", path.display(), cleanup);
                    }
                    return Err(StoreError::io("archive", &path, e));
                }
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(StoreError::io("archive", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{ItemInfo, ItemPatch, RoomInfo, RoomPatch};
    use std::fs as std_fs;
    use tempfile::TempDir;

    fn store(mode: ConcurrencyMode) -> DocumentStore<ItemInfo> {
        DocumentStore::new(&CoreConfig::new("unused").with_concurrency(mode))
    }

    fn patch(comment: &str) -> ItemPatch {
        ItemPatch {
            kind: Some("monitor".into()),
            comment: Some(comment.into()),
            ..ItemPatch::default()
        }
    }

    fn archive_entries(dir: &Path) -> Vec<PathBuf> {
        match std_fs::read_dir(dir.join("ARCHIVE")) {
            Ok(entries) => {
                let mut paths: Vec<PathBuf> = entries.map(|e| e.unwrap().path()).collect();
                paths.sort();
                paths
            }
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_read_missing_document_is_default() {
        let temp = TempDir::new().unwrap();
        let info = store(ConcurrencyMode::Relaxed)
            .read(&temp.path().join("1001"))
            .await
            .unwrap();
        assert_eq!(info, ItemInfo::default());
    }

    #[tokio::test]
    async fn test_read_malformed_document_is_fatal() {
        let temp = TempDir::new().unwrap();
        std_fs::write(temp.path().join("info.json"), b"{\"type\": ").unwrap();

        let err = store(ConcurrencyMode::Relaxed)
            .read(temp.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::MalformedDocument);
    }

    #[tokio::test]
    async fn test_first_write_creates_directory_and_document() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("ITEMS/1001");
        let docs = store(ConcurrencyMode::Relaxed);

        let outcome = docs.write(&dir, patch("new")).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Created);

        let info = docs.read(&dir).await.unwrap();
        assert_eq!(info.comment, "new");
        assert_eq!(info.date.len(), 14);
        assert!(archive_entries(&dir).is_empty());

        let text = std_fs::read_to_string(dir.join("info.json")).unwrap();
        assert!(text.contains("\n    \"type\": \"monitor\""));
    }

    #[tokio::test]
    async fn test_identical_writes_archive_once() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("1001");
        std_fs::create_dir_all(&dir).unwrap();
        std_fs::write(
            dir.join("info.json"),
            br#"{"type": "monitor", "comment": "old", "date": "20200101000000"}"#,
        )
        .unwrap();
        let docs = store(ConcurrencyMode::Relaxed);

        let first = docs.write(&dir, patch("fresh")).await.unwrap();
        assert!(matches!(first, WriteOutcome::Updated { .. }));
        let live_after_first = std_fs::read(dir.join("info.json")).unwrap();

        let second = docs.write(&dir, patch("fresh")).await.unwrap();
        assert_eq!(second, WriteOutcome::Unchanged);
        assert_eq!(archive_entries(&dir).len(), 1);
        assert_eq!(std_fs::read(dir.join("info.json")).unwrap(), live_after_first);
    }

    #[tokio::test]
    async fn test_archive_holds_previous_bytes() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("1001");
        std_fs::create_dir_all(&dir).unwrap();
        let before: &[u8] = b"{\"type\":\"monitor\",\"comment\":\"v1\",\"date\":\"20200101000000\"}";
        std_fs::write(dir.join("info.json"), before).unwrap();
        let docs = store(ConcurrencyMode::Relaxed);

        let outcome = docs.write(&dir, patch("v2")).await.unwrap();
        let WriteOutcome::Updated { archived } = outcome else {
            panic!("expected an update, got {:?}", outcome);
        };

        assert_eq!(std_fs::read(&archived).unwrap(), before);
        let name = archived.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("info.") && name.ends_with(".json"));
        assert_eq!(docs.read(&dir).await.unwrap().comment, "v2");
        assert_eq!(docs.history(&dir).await.unwrap(), vec![name]);
    }

    #[test]
    fn test_snapshot_order_puts_counter_after_base_name() {
        let mut names = vec![
            "info.20260102090000.json",
            "info.20260101120000-1.json",
            "info.20260101120000.json",
            "info.20260101120000-10.json",
            "info.20260101120000-2.json",
        ];
        names.sort_by_key(|name| snapshot_order(name));
        assert_eq!(
            names,
            vec![
                "info.20260101120000.json",
                "info.20260101120000-1.json",
                "info.20260101120000-2.json",
                "info.20260101120000-10.json",
                "info.20260102090000.json",
            ]
        );
    }

    #[tokio::test]
    async fn test_snapshots_within_one_second_do_not_collide() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("1001");
        let docs = store(ConcurrencyMode::Relaxed);

        docs.write(&dir, patch("a")).await.unwrap();
        docs.write(&dir, patch("b")).await.unwrap();
        docs.write(&dir, patch("c")).await.unwrap();

        let archived = archive_entries(&dir);
        assert_eq!(archived.len(), 2);
        let contents: Vec<ItemInfo> = archived
            .iter()
            .map(|p| serde_json::from_slice(&std_fs::read(p).unwrap()).unwrap())
            .collect();
        let mut comments: Vec<&str> = contents.iter().map(|i| i.comment.as_str()).collect();
        comments.sort();
        assert_eq!(comments, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_write_resets_fields_update_keeps_them() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("1001");
        let docs = store(ConcurrencyMode::Relaxed);
        docs.write(
            &dir,
            ItemPatch {
                brand: Some("HP".into()),
                place: Some("A/1".into()),
                ..ItemPatch::default()
            },
        )
        .await
        .unwrap();

        docs.update(
            &dir,
            ItemPatch {
                place: Some("B/2".into()),
                ..ItemPatch::default()
            },
        )
        .await
        .unwrap();
        let info = docs.read(&dir).await.unwrap();
        assert_eq!((info.brand.as_str(), info.place.as_str()), ("HP", "B/2"));

        docs.write(
            &dir,
            ItemPatch {
                place: Some("C/3".into()),
                ..ItemPatch::default()
            },
        )
        .await
        .unwrap();
        let info = docs.read(&dir).await.unwrap();
        assert_eq!((info.brand.as_str(), info.place.as_str()), ("", "C/3"));
    }

    #[tokio::test]
    async fn test_write_over_malformed_document_is_aborted() {
        let temp = TempDir::new().unwrap();
        std_fs::write(temp.path().join("info.json"), b"garbage").unwrap();

        let err = store(ConcurrencyMode::Relaxed)
            .write(temp.path(), patch("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::MalformedDocument);
        assert_eq!(std_fs::read(temp.path().join("info.json")).unwrap(), b"garbage");
        assert!(archive_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_write_if_current_detects_conflicts() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("Building/Floor1");
        let docs: DocumentStore<RoomInfo> = DocumentStore::new(&CoreConfig::new("unused"));

        docs.write_if_current(
            &dir,
            RoomPatch {
                id: Some("101".into()),
                ..RoomPatch::default()
            },
            "",
        )
        .await
        .unwrap();
        let seen = docs.read(&dir).await.unwrap().date;

        let err = docs
            .write_if_current(&dir, RoomPatch::default(), "19990101000000")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);

        let outcome = docs
            .write_if_current(
                &dir,
                RoomPatch {
                    id: Some("102".into()),
                    ..RoomPatch::default()
                },
                &seen,
            )
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Updated { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reader_sees_complete_documents() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("1001");
        let docs = store(ConcurrencyMode::Relaxed);
        docs.write(&dir, patch("start")).await.unwrap();

        let reader_dir = dir.clone();
        let reader = tokio::spawn(async move {
            for _ in 0..200 {
                let bytes = tokio::fs::read(reader_dir.join("info.json")).await.unwrap();
                serde_json::from_slice::<ItemInfo>(&bytes).expect("complete document");
                tokio::task::yield_now().await;
            }
        });

        for i in 0..50 {
            let long = "x".repeat(1000 + i * 37);
            docs.write(&dir, patch(&long)).await.unwrap();
        }
        reader.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_serialized_writers_archive_every_replaced_version() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("1001");
        let docs = store(ConcurrencyMode::Serialized);

        let mut handles = Vec::new();
        for i in 0..10 {
            let docs = docs.clone();
            let dir = dir.clone();
            handles.push(tokio::spawn(async move {
                docs.write(&dir, patch(&format!("writer {}", i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // One writer created the document, the other nine each archived what they replaced.
        assert_eq!(archive_entries(&dir).len(), 9);
    }
}
