//! Image downscaling through an external transcoder.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// How much of the transcoder's stderr is kept in errors.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{program} reported success but wrote nothing to {}", output.display())]
    MissingOutput { program: String, output: PathBuf },
}

/// Produces a scaled copy of an image.
///
/// Implementations write the complete result to `dest` (whose extension selects the
/// output format) before returning `Ok`.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Scales `source` to `width` pixels wide, keeping the aspect ratio.
    async fn scale(&self, source: &Path, dest: &Path, width: u32) -> Result<(), TranscodeError>;
}

/// [`Transcoder`] that runs `ffmpeg` as a child process.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, source: &Path, dest: &Path, width: u32) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-hide_banner")
            .arg("-y")
            .arg("-i")
            .arg(source)
            .arg("-vf")
            .arg(format!("scale={}:-1", width))
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn scale(&self, source: &Path, dest: &Path, width: u32) -> Result<(), TranscodeError> {
        tracing::debug!(
            "scaling {} to {}px into {}",
            source.display(),
            width,
            dest.display()
        );
        let output = self
            .command(source, dest, width)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
