//! Entity-scoped asset directory.
//!
//! [`AssetDirectory`] is bound to one entity directory. It never creates that directory
//! on read paths; the directory appears on the first completed upload (or when the
//! metadata store writes the entity's document).

use crate::constants::is_transient;
use crate::upload::AssetUpload;
use crate::{AssetName, FilesError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Service for the files owned by a single entity.
///
/// # Design
///
/// - Entity-scoped: each instance is bound to one entity directory
/// - Reserved names (metadata documents) are neither listed nor writable through it
/// - Uploads are staged outside the entity directory until complete
#[derive(Debug, Clone)]
pub struct AssetDirectory {
    /// Directory holding the entity's files
    entity_dir: PathBuf,

    /// Private directory where uploads are written before they are complete
    staging_dir: PathBuf,

    /// Filenames managed by the store itself
    reserved: Vec<String>,
}

impl AssetDirectory {
    /// Creates a directory service for `entity_dir`, staging uploads in `staging_dir`.
    pub fn new(entity_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            entity_dir: entity_dir.into(),
            staging_dir: staging_dir.into(),
            reserved: Vec::new(),
        }
    }

    /// Marks filenames that belong to the store rather than to the user.
    #[must_use]
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    /// Returns the entity directory this service is bound to.
    pub fn entity_dir(&self) -> &Path {
        &self.entity_dir
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.reserved.iter().any(|r| r == name)
    }

    fn ensure_not_reserved(&self, name: &AssetName) -> Result<(), FilesError> {
        if self.is_reserved(name.as_str()) {
            return Err(FilesError::ReservedName(name.to_string()));
        }
        Ok(())
    }

    /// Lists the asset filenames of the entity.
    ///
    /// Only regular files are returned; subdirectories (such as the metadata archive),
    /// reserved names and transient files are skipped. Names that are not valid UTF-8
    /// are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::NotFound`] if the entity directory does not exist, or
    /// [`FilesError::Io`] if it cannot be read.
    pub async fn list(&self) -> Result<BTreeSet<String>, FilesError> {
        let mut entries = fs::read_dir(&self.entity_dir)
            .await
            .map_err(|e| FilesError::io("read directory", &self.entity_dir, e))?;

        let mut names = BTreeSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FilesError::io("read directory", &self.entity_dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| FilesError::io("inspect", &entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }

            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!("skipping non UTF-8 filename in {}", self.entity_dir.display());
                continue;
            };

            if self.is_reserved(&name) || is_transient(&name) {
                continue;
            }
            names.insert(name);
        }

        Ok(names)
    }

    /// Resolves the absolute path to an existing asset.
    ///
    /// The path is canonicalised (symlinks resolved) and must still lie inside the
    /// entity directory. Separators are normalised to `/` so the value can be handed to
    /// consumers that expect URL-like paths.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if the asset (or the entity) does not exist or is not a
    ///   regular file
    /// - [`FilesError::ReservedName`] for store-managed files
    /// - [`FilesError::OutsideEntity`] if a symlink points outside the entity directory
    pub async fn resolve(&self, name: &AssetName) -> Result<PathBuf, FilesError> {
        self.ensure_not_reserved(name)?;

        let candidate = self.entity_dir.join(name.as_str());
        let resolved = fs::canonicalize(&candidate)
            .await
            .map_err(|e| FilesError::io("resolve", &candidate, e))?;
        let entity_root = fs::canonicalize(&self.entity_dir)
            .await
            .map_err(|e| FilesError::io("resolve", &self.entity_dir, e))?;

        if !resolved.starts_with(&entity_root) {
            return Err(FilesError::OutsideEntity(candidate));
        }

        let metadata = fs::metadata(&resolved)
            .await
            .map_err(|e| FilesError::io("inspect", &resolved, e))?;
        if !metadata.is_file() {
            return Err(FilesError::NotFound(candidate));
        }

        Ok(normalise_separators(&resolved))
    }

    /// Opens an upload sink for `name`.
    ///
    /// Bytes written to the returned [`AssetUpload`] go to a uniquely named file in the
    /// staging directory. Nothing appears under `name` until [`AssetUpload::finish`]
    /// succeeds; an existing asset of the same name is replaced at that point.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::ReservedName`] for store-managed files, or
    /// [`FilesError::Io`] if the staging file cannot be created.
    pub async fn store(&self, name: &AssetName) -> Result<AssetUpload, FilesError> {
        self.ensure_not_reserved(name)?;

        fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| FilesError::io("create staging directory", &self.staging_dir, e))?;

        let staging_path = self.staging_dir.join(Uuid::new_v4().simple().to_string());
        let file = fs::File::create(&staging_path)
            .await
            .map_err(|e| FilesError::io("create staging file", &staging_path, e))?;

        tracing::debug!(
            "staging upload of {} into {}",
            name,
            staging_path.display()
        );

        Ok(AssetUpload::new(
            file,
            staging_path,
            self.entity_dir.clone(),
            name.clone(),
        ))
    }

    /// Removes an asset.
    ///
    /// # Returns
    ///
    /// `true` if a file was removed, `false` if it was already absent.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::ReservedName`] for store-managed files, or
    /// [`FilesError::Io`] for failures other than "not found".
    pub async fn remove(&self, name: &AssetName) -> Result<bool, FilesError> {
        self.ensure_not_reserved(name)?;

        let path = self.entity_dir.join(name.as_str());
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("removed asset {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesError::io("remove", &path, e)),
        }
    }
}

fn normalise_separators(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    fn create_entity(temp: &TempDir) -> AssetDirectory {
        let entity_dir = temp.path().join("ITEMS").join("1001");
        std_fs::create_dir_all(&entity_dir).unwrap();
        AssetDirectory::new(entity_dir, temp.path().join("TMP")).with_reserved(["info.json"])
    }

    fn name(value: &str) -> AssetName {
        AssetName::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_list_skips_metadata_archive_and_transients() {
        let temp = TempDir::new().unwrap();
        let assets = create_entity(&temp);
        let dir = assets.entity_dir().to_path_buf();

        std_fs::write(dir.join("info.json"), "{}").unwrap();
        std_fs::create_dir_all(dir.join("ARCHIVE")).unwrap();
        std_fs::write(dir.join("ARCHIVE").join("info.20240101000000.json"), "{}").unwrap();
        std_fs::write(dir.join("photo.jpg"), b"jpg").unwrap();
        std_fs::write(dir.join("Report.htm"), b"<html/>").unwrap();
        std_fs::write(dir.join(crate::transient_name("info.json")), b"{").unwrap();

        let listed: Vec<String> = assets.list().await.unwrap().into_iter().collect();
        assert_eq!(listed, vec!["Report.htm".to_string(), "photo.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_list_missing_entity_is_not_found() {
        let temp = TempDir::new().unwrap();
        let assets = AssetDirectory::new(temp.path().join("nope"), temp.path().join("TMP"));
        assert!(matches!(assets.list().await, Err(FilesError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_empty_entity() {
        let temp = TempDir::new().unwrap();
        let assets = create_entity(&temp);
        assert!(assets.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_existing_asset() {
        let temp = TempDir::new().unwrap();
        let assets = create_entity(&temp);
        std_fs::write(assets.entity_dir().join("scan.pdf"), b"pdf").unwrap();

        let path = assets.resolve(&name("scan.pdf")).await.unwrap();
        assert!(path.is_absolute());
        assert!(path.to_string_lossy().ends_with("1001/scan.pdf"));
        assert!(!path.to_string_lossy().contains('\\'));
        assert_eq!(std_fs::read(&path).unwrap(), b"pdf");
    }

    #[tokio::test]
    async fn test_resolve_missing_asset_is_not_found() {
        let temp = TempDir::new().unwrap();
        let assets = create_entity(&temp);
        assert!(matches!(
            assets.resolve(&name("missing.jpg")).await,
            Err(FilesError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let assets = create_entity(&temp);
        std_fs::create_dir_all(assets.entity_dir().join("ARCHIVE")).unwrap();
        assert!(matches!(
            assets.resolve(&name("ARCHIVE")).await,
            Err(FilesError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reserved_names_are_refused() {
        let temp = TempDir::new().unwrap();
        let assets = create_entity(&temp);
        std_fs::write(assets.entity_dir().join("info.json"), "{}").unwrap();

        assert!(matches!(
            assets.resolve(&name("info.json")).await,
            Err(FilesError::ReservedName(_))
        ));
        assert!(matches!(
            assets.store(&name("info.json")).await,
            Err(FilesError::ReservedName(_))
        ));
        assert!(matches!(
            assets.remove(&name("info.json")).await,
            Err(FilesError::ReservedName(_))
        ));
        assert!(assets.entity_dir().join("info.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_symlink_escape() {
        let temp = TempDir::new().unwrap();
        let assets = create_entity(&temp);
        let outside = temp.path().join("secret.txt");
        std_fs::write(&outside, b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, assets.entity_dir().join("link.txt")).unwrap();

        assert!(matches!(
            assets.resolve(&name("link.txt")).await,
            Err(FilesError::OutsideEntity(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let assets = create_entity(&temp);
        std_fs::write(assets.entity_dir().join("old.jpg"), b"x").unwrap();

        assert!(assets.remove(&name("old.jpg")).await.unwrap());
        assert!(!assets.remove(&name("old.jpg")).await.unwrap());
        assert!(!assets.entity_dir().join("old.jpg").exists());
    }

    #[tokio::test]
    async fn test_store_creates_missing_entity_dir_on_finish() {
        let temp = TempDir::new().unwrap();
        let entity_dir = temp.path().join("ITEMS").join("2000");
        let assets = AssetDirectory::new(&entity_dir, temp.path().join("TMP"));

        let mut upload = assets.store(&name("photo.png")).await.unwrap();
        assert!(!entity_dir.exists());
        upload.write_all(b"png bytes").await.unwrap();
        let final_path = upload.finish().await.unwrap();

        assert_eq!(final_path, entity_dir.join("photo.png"));
        assert_eq!(std_fs::read(&final_path).unwrap(), b"png bytes");
        assert_eq!(std_fs::read_dir(temp.path().join("TMP")).unwrap().count(), 0);
    }
}
