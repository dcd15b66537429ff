//! Lazily generated image previews.
//!
//! Previews live in a cache tree that mirrors the entity directories (`DB/CACHE/<id>`,
//! `DB/CACHE/ROOMS/<room path>`). They are derived data: a preview is created the first
//! time it is requested and can be deleted at any time.
//!
//! A cached preview is returned as is, without checking it against the original. Replacing
//! an original therefore keeps serving the old preview until it is evicted; removing an
//! original through the item or room services evicts it.
//!
//! In relaxed mode two requests that miss at the same time both run the transcoder. Each
//! writes its own transient file and renames it into place, so the last rename wins and
//! the cache path never holds a partial image. In serialized mode the second request
//! waits for the first and then finds the preview in the cache.

use crate::config::{ConcurrencyMode, CoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::locks::KeyedLocks;
use crate::repositories::shared::{
    discard_transient, is_file, remove_if_exists, transient_path_for,
};
use crate::transcoder::{TranscodeError, Transcoder};
use inventory_types::AssetName;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

#[derive(Clone)]
pub struct PreviewCache {
    cfg: Arc<CoreConfig>,
    transcoder: Arc<dyn Transcoder>,
    inflight: Option<Arc<KeyedLocks>>,
}

impl std::fmt::Debug for PreviewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewCache")
            .field("width", &self.cfg.preview_width())
            .field("single_flight", &self.inflight.is_some())
            .finish()
    }
}

impl PreviewCache {
    pub fn new(cfg: Arc<CoreConfig>, transcoder: Arc<dyn Transcoder>) -> Self {
        let inflight = match cfg.concurrency() {
            ConcurrencyMode::Relaxed => None,
            ConcurrencyMode::Serialized => Some(Arc::new(KeyedLocks::new())),
        };
        Self {
            cfg,
            transcoder,
            inflight,
        }
    }

    /// Returns the path of the preview for `name`, generating it on a miss.
    ///
    /// # Arguments
    ///
    /// * `original_dir` - Entity directory holding the original file.
    /// * `cache_dir` - Cache directory mirroring `original_dir`.
    /// * `name` - Asset file name; the preview has the same name.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the original does not exist, whatever its extension.
    ///   The transcoder is not run.
    /// - [`StoreError::InvalidInput`] if the original exists but is not a picture.
    /// - [`StoreError::DerivationFailure`] if the transcoder fails. Its cause is kept as
    ///   the error source and no file is left behind.
    /// - [`StoreError::Io`] for filesystem failures.
    pub async fn get(
        &self,
        original_dir: &Path,
        cache_dir: &Path,
        name: &AssetName,
    ) -> StoreResult<PathBuf> {
        let cache_path = cache_dir.join(name.as_str());
        if is_file(&cache_path).await? {
            tracing::debug!("preview hit {}", cache_path.display());
            return Ok(cache_path);
        }

        let original = original_dir.join(name.as_str());
        if !is_file(&original).await? {
            return Err(StoreError::NotFound(original));
        }

        let is_picture = name
            .extension()
            .map(|ext| self.cfg.is_picture_extension(&ext))
            .unwrap_or(false);
        if !is_picture {
            return Err(StoreError::InvalidInput(format!(
                "no preview available for '{}': not a picture",
                name
            )));
        }

        let _guard = match &self.inflight {
            Some(locks) => {
                let guard = locks.lock(&cache_path).await;
                if is_file(&cache_path).await? {
                    tracing::debug!("preview generated while waiting {}", cache_path.display());
                    return Ok(cache_path);
                }
                Some(guard)
            }
            None => None,
        };

        tracing::debug!("preview miss {}", cache_path.display());
        self.generate(&original, cache_dir, &cache_path).await?;
        Ok(cache_path)
    }

    async fn generate(
        &self,
        original: &Path,
        cache_dir: &Path,
        cache_path: &Path,
    ) -> StoreResult<()> {
        fs::create_dir_all(cache_dir)
            .await
            .map_err(|e| StoreError::io("create cache directory", cache_dir, e))?;

        let transient = transient_path_for(cache_path)?;
        let width = self.cfg.preview_width();

        if let Err(e) = self.transcoder.scale(original, &transient, width).await {
            discard_transient(&transient).await;
            return Err(StoreError::derivation(cache_path, e));
        }
        if !is_file(&transient).await? {
            return Err(StoreError::derivation(
                cache_path,
                TranscodeError::MissingOutput {
                    program: "transcoder".into(),
                    output: transient,
                },
            ));
        }
        if let Err(e) = fs::rename(&transient, cache_path).await {
            discard_transient(&transient).await;
            return Err(StoreError::io("store preview", cache_path, e));
        }

        tracing::info!(
            "generated {}px preview {}",
            width,
            cache_path.display()
        );
        Ok(())
    }

    /// Removes the cached preview for `name`. Returns false if there was none.
    pub async fn evict(&self, cache_dir: &Path, name: &AssetName) -> StoreResult<bool> {
        let cache_path = cache_dir.join(name.as_str());
        let removed = remove_if_exists(&cache_path).await?;
        if removed {
            tracing::debug!("evicted preview {}", cache_path.display());
        }
        Ok(removed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::error::Error as _;
    use std::fs as std_fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Writes a marker instead of an image and counts its calls.
    #[derive(Default)]
    pub(crate) struct FakeTranscoder {
        pub(crate) calls: AtomicUsize,
        pub(crate) fail: bool,
        pub(crate) delay: Option<Duration>,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn scale(
            &self,
            source: &Path,
            dest: &Path,
            width: u32,
        ) -> Result<(), TranscodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            // Leave a partial file behind to check that failures clean up.
            tokio::fs::write(dest, b"partial").await.unwrap();
            if self.fail {
                return Err(TranscodeError::Spawn {
                    program: "fake".into(),
                    source: std::io::Error::other("boom"),
                });
            }
            let original = tokio::fs::read(source).await.unwrap();
            let marker = format!("{}px:{}", width, String::from_utf8_lossy(&original));
            tokio::fs::write(dest, marker).await.unwrap();
            Ok(())
        }
    }

    struct Fixture {
        _temp: TempDir,
        original_dir: PathBuf,
        cache_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let original_dir = temp.path().join("DB/ITEMS/1001");
        let cache_dir = temp.path().join("DB/CACHE/1001");
        std_fs::create_dir_all(&original_dir).unwrap();
        std_fs::write(original_dir.join("photo.jpg"), b"jpeg-bytes").unwrap();
        Fixture {
            _temp: temp,
            original_dir,
            cache_dir,
        }
    }

    fn cache(fake: Arc<FakeTranscoder>, mode: ConcurrencyMode) -> PreviewCache {
        let cfg = CoreConfig::new("unused").with_concurrency(mode);
        PreviewCache::new(Arc::new(cfg), fake)
    }

    fn name(value: &str) -> AssetName {
        AssetName::new(value).unwrap()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std_fs::read_dir(dir)
            .map(|it| {
                it.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_miss_generates_once_then_hits() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder::default());
        let previews = cache(fake.clone(), ConcurrencyMode::Relaxed);

        let path = previews
            .get(&fx.original_dir, &fx.cache_dir, &name("photo.jpg"))
            .await
            .unwrap();
        assert_eq!(path, fx.cache_dir.join("photo.jpg"));
        assert_eq!(std_fs::read(&path).unwrap(), b"300px:jpeg-bytes");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);

        previews
            .get(&fx.original_dir, &fx.cache_dir, &name("photo.jpg"))
            .await
            .unwrap();
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dir_entries(&fx.cache_dir), vec!["photo.jpg"]);
    }

    #[tokio::test]
    async fn test_missing_original_never_runs_transcoder() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder::default());
        let previews = cache(fake.clone(), ConcurrencyMode::Relaxed);

        for missing in ["absent.png", "absent.pdf", "absent.gif", "absent"] {
            let err = previews
                .get(&fx.original_dir, &fx.cache_dir, &name(missing))
                .await
                .unwrap_err();
            assert!(err.is_not_found(), "{} gave {:?}", missing, err.kind());
        }
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert!(dir_entries(&fx.cache_dir).is_empty());
    }

    #[tokio::test]
    async fn test_non_picture_is_rejected() {
        let fx = fixture();
        std_fs::write(fx.original_dir.join("manual.pdf"), b"%PDF").unwrap();
        let fake = Arc::new(FakeTranscoder::default());
        let previews = cache(fake.clone(), ConcurrencyMode::Relaxed);

        let err = previews
            .get(&fx.original_dir, &fx.cache_dir, &name("manual.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transcoder_failure_keeps_cause_and_cleans_up() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder {
            fail: true,
            ..FakeTranscoder::default()
        });
        let previews = cache(fake, ConcurrencyMode::Relaxed);

        let err = previews
            .get(&fx.original_dir, &fx.cache_dir, &name("photo.jpg"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DerivationFailure);
        assert!(err.source().unwrap().to_string().contains("boom"));
        assert!(dir_entries(&fx.cache_dir).is_empty());
    }

    #[tokio::test]
    async fn test_evict() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder::default());
        let previews = cache(fake.clone(), ConcurrencyMode::Relaxed);
        previews
            .get(&fx.original_dir, &fx.cache_dir, &name("photo.jpg"))
            .await
            .unwrap();

        assert!(previews.evict(&fx.cache_dir, &name("photo.jpg")).await.unwrap());
        assert!(!previews.evict(&fx.cache_dir, &name("photo.jpg")).await.unwrap());

        previews
            .get(&fx.original_dir, &fx.cache_dir, &name("photo.jpg"))
            .await
            .unwrap();
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_serialized_mode_is_single_flight() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder {
            delay: Some(Duration::from_millis(50)),
            ..FakeTranscoder::default()
        });
        let previews = cache(fake.clone(), ConcurrencyMode::Serialized);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let previews = previews.clone();
            let original_dir = fx.original_dir.clone();
            let cache_dir = fx.cache_dir.clone();
            handles.push(tokio::spawn(async move {
                previews
                    .get(&original_dir, &cache_dir, &name("photo.jpg"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_relaxed_concurrent_misses_leave_one_complete_preview() {
        let fx = fixture();
        let fake = Arc::new(FakeTranscoder {
            delay: Some(Duration::from_millis(20)),
            ..FakeTranscoder::default()
        });
        let previews = cache(fake.clone(), ConcurrencyMode::Relaxed);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let previews = previews.clone();
            let original_dir = fx.original_dir.clone();
            let cache_dir = fx.cache_dir.clone();
            handles.push(tokio::spawn(async move {
                previews
                    .get(&original_dir, &cache_dir, &name("photo.jpg"))
                    .await
            }));
        }
        for handle in handles {
            let path = handle.await.unwrap().unwrap();
            assert_eq!(std_fs::read(path).unwrap(), b"300px:jpeg-bytes");
        }

        assert!(fake.calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(dir_entries(&fx.cache_dir), vec!["photo.jpg"]);
    }
}
