//! Staged upload sink.

use crate::constants::transient_name;
use crate::{AssetName, FilesError};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A writable destination for one asset.
///
/// Callers stream bytes into it (it implements [`AsyncWrite`], so `tokio::io::copy`
/// works) and then call [`finish`](AssetUpload::finish). Until then the bytes only
/// exist in the staging directory. Dropping the upload without finishing it, or
/// calling [`abort`](AssetUpload::abort), deletes the staging file.
#[derive(Debug)]
pub struct AssetUpload {
    file: Option<fs::File>,
    staging_path: PathBuf,
    entity_dir: PathBuf,
    name: AssetName,
    written: u64,
    completed: bool,
}

impl AssetUpload {
    pub(crate) fn new(
        file: fs::File,
        staging_path: PathBuf,
        entity_dir: PathBuf,
        name: AssetName,
    ) -> Self {
        Self {
            file: Some(file),
            staging_path,
            entity_dir,
            name,
            written: 0,
            completed: false,
        }
    }

    /// Returns the number of bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Returns the staging file path (useful for diagnostics).
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Completes the upload and moves the file under its real name.
    ///
    /// The staging file is flushed and synced, the entity directory is created if it
    /// does not exist, and the file is renamed into place. When a rename is not
    /// possible (staging on another filesystem), the bytes are copied to a transient
    /// name inside the entity directory and renamed from there, so the real name never
    /// shows a partial file.
    ///
    /// # Returns
    ///
    /// The final path of the asset.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Io`] if any step fails; the staging file is removed when the
    /// upload is dropped.
    pub async fn finish(mut self) -> Result<PathBuf, FilesError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| FilesError::Io(io::Error::other("upload already closed")))?;
        file.flush()
            .await
            .map_err(|e| FilesError::io("flush", &self.staging_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| FilesError::io("sync", &self.staging_path, e))?;
        drop(file);

        fs::create_dir_all(&self.entity_dir)
            .await
            .map_err(|e| FilesError::io("create entity directory", &self.entity_dir, e))?;

        let final_path = self.entity_dir.join(self.name.as_str());
        self.move_into_place(&final_path).await?;

        self.completed = true;
        tracing::info!(
            "stored asset {} ({} bytes)",
            final_path.display(),
            self.written
        );
        Ok(final_path)
    }

    async fn move_into_place(&self, final_path: &Path) -> Result<(), FilesError> {
        match fs::rename(&self.staging_path, final_path).await {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                tracing::debug!(
                    "rename from staging failed ({}), copying into {}",
                    rename_err,
                    self.entity_dir.display()
                );
                self.copy_into_place(final_path).await
            }
        }
    }

    /// Fallback for staging and entity directories on different filesystems.
    async fn copy_into_place(&self, final_path: &Path) -> Result<(), FilesError> {
        let transient = self.entity_dir.join(transient_name(self.name.as_str()));

        let moved = async {
            fs::copy(&self.staging_path, &transient)
                .await
                .map_err(|e| FilesError::io("copy upload", &transient, e))?;
            fs::rename(&transient, final_path)
                .await
                .map_err(|e| FilesError::io("move upload", final_path, e))
        }
        .await;

        if moved.is_err() {
            if let Err(e) = fs::remove_file(&transient).await {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("failed to remove {}: {}", transient.display(), e);
                }
            }
            return moved;
        }

        if let Err(e) = fs::remove_file(&self.staging_path).await {
            tracing::warn!(
                "failed to remove staging file {}: {}",
                self.staging_path.display(),
                e
            );
        }
        Ok(())
    }

    /// Discards the upload and its staging file.
    pub async fn abort(mut self) {
        drop(self.file.take());
        match fs::remove_file(&self.staging_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "failed to remove staging file {}: {}",
                self.staging_path.display(),
                e
            ),
        }
        self.completed = true;
    }

    fn closed() -> io::Error {
        io::Error::other("upload already closed")
    }
}

impl AsyncWrite for AssetUpload {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let Some(file) = this.file.as_mut() else {
            return Poll::Ready(Err(Self::closed()));
        };
        match Pin::new(file).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.written += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Err(Self::closed())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl Drop for AssetUpload {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        drop(self.file.take());
        if let Err(e) = std::fs::remove_file(&self.staging_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    "failed to remove staging file {}: {}",
                    self.staging_path.display(),
                    e
                );
            }
        }
    }
}
