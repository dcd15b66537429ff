//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read process-wide environment variables
//! themselves; the binary turns the environment into a [`CoreConfig`] through the
//! `*_from_env_value` helpers below, which take plain `Option<String>` values so they can be
//! tested without touching the environment.

use crate::constants::{
    CACHE_DIR_NAME, DB_DIR_NAME, DEFAULT_ID_FLOOR, DEFAULT_PICTURE_EXTENSIONS,
    DEFAULT_PREVIEW_WIDTH, DEFAULT_STORAGE_DIR, DEFAULT_TRANSCODER_PROGRAM, ITEMS_DIR_NAME,
    ROOMS_DIR_NAME, STAGING_DIR_NAME,
};
use crate::{StoreError, StoreResult};
use inventory_ids::ItemId;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the store coordinates concurrent operations inside one process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// No locks. Concurrent allocations may hand out the same identifiers, concurrent
    /// writes to one document are last-write-wins, concurrent preview misses may both
    /// transcode.
    #[default]
    Relaxed,
    /// Allocation is mutually exclusive, writes to one entity are serialized and preview
    /// generation is single-flight per cache path.
    Serialized,
}

impl FromStr for ConcurrencyMode {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relaxed" => Ok(ConcurrencyMode::Relaxed),
            "serialized" | "serialised" => Ok(ConcurrencyMode::Serialized),
            other => Err(StoreError::InvalidInput(format!(
                "unknown concurrency mode '{}' (expected 'relaxed' or 'serialized')",
                other
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    storage_dir: PathBuf,
    transcoder_program: String,
    preview_width: u32,
    picture_extensions: Vec<String>,
    id_floor: u32,
    concurrency: ConcurrencyMode,
}

impl CoreConfig {
    /// Create a new `CoreConfig` rooted at `storage_dir` with default settings.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            transcoder_program: DEFAULT_TRANSCODER_PROGRAM.to_string(),
            preview_width: DEFAULT_PREVIEW_WIDTH,
            picture_extensions: DEFAULT_PICTURE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            id_floor: DEFAULT_ID_FLOOR,
            concurrency: ConcurrencyMode::default(),
        }
    }

    pub fn with_transcoder_program(mut self, program: impl Into<String>) -> Self {
        self.transcoder_program = program.into();
        self
    }

    /// Sets the preview width. Zero is rejected because the transcoder would produce an
    /// empty image.
    pub fn with_preview_width(mut self, width: u32) -> StoreResult<Self> {
        if width == 0 {
            return Err(StoreError::InvalidInput(
                "preview width must be greater than zero".into(),
            ));
        }
        self.preview_width = width;
        Ok(self)
    }

    pub fn with_picture_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.picture_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn with_id_floor(mut self, floor: u32) -> StoreResult<Self> {
        if floor > ItemId::MAX {
            return Err(StoreError::InvalidInput(format!(
                "id floor {} is outside the four-digit range",
                floor
            )));
        }
        self.id_floor = floor;
        Ok(self)
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn db_dir(&self) -> PathBuf {
        self.storage_dir.join(DB_DIR_NAME)
    }

    pub fn items_dir(&self) -> PathBuf {
        self.db_dir().join(ITEMS_DIR_NAME)
    }

    pub fn rooms_dir(&self) -> PathBuf {
        self.db_dir().join(ROOMS_DIR_NAME)
    }

    /// Root of the preview cache. Item previews live directly below it, keyed by id.
    pub fn cache_dir(&self) -> PathBuf {
        self.db_dir().join(CACHE_DIR_NAME)
    }

    pub fn rooms_cache_dir(&self) -> PathBuf {
        self.cache_dir().join(ROOMS_DIR_NAME)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.db_dir().join(STAGING_DIR_NAME)
    }

    pub fn transcoder_program(&self) -> &str {
        &self.transcoder_program
    }

    pub fn preview_width(&self) -> u32 {
        self.preview_width
    }

    pub fn picture_extensions(&self) -> &[String] {
        &self.picture_extensions
    }

    /// Returns true if previews can be generated for files with this (lowercase) extension.
    pub fn is_picture_extension(&self, extension: &str) -> bool {
        self.picture_extensions.iter().any(|ext| ext == extension)
    }

    pub fn id_floor(&self) -> u32 {
        self.id_floor
    }

    pub fn concurrency(&self) -> ConcurrencyMode {
        self.concurrency
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the storage directory from the primary and legacy variable values.
///
/// The first non-empty value wins; with neither set the default `storage` directory
/// (relative to the working directory) is used.
pub fn storage_dir_from_env_value(primary: Option<String>, legacy: Option<String>) -> PathBuf {
    non_empty(primary)
        .or_else(|| non_empty(legacy))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR))
}

/// Parse the transcoder program. Empty or missing values fall back to `ffmpeg`.
pub fn transcoder_program_from_env_value(value: Option<String>) -> String {
    non_empty(value).unwrap_or_else(|| DEFAULT_TRANSCODER_PROGRAM.to_string())
}

/// Parse the preview width in pixels.
///
/// If `value` is `None` or empty/whitespace, returns the default width.
pub fn preview_width_from_env_value(value: Option<String>) -> StoreResult<u32> {
    let Some(value) = non_empty(value) else {
        return Ok(DEFAULT_PREVIEW_WIDTH);
    };
    match value.parse::<u32>() {
        Ok(width) if width > 0 => Ok(width),
        _ => Err(StoreError::InvalidInput(format!(
            "preview width must be a positive integer, got '{}'",
            value
        ))),
    }
}

/// Parse the concurrency mode. Missing values select [`ConcurrencyMode::Relaxed`].
pub fn concurrency_from_env_value(value: Option<String>) -> StoreResult<ConcurrencyMode> {
    non_empty(value)
        .map(|v| v.parse::<ConcurrencyMode>())
        .transpose()
        .map(Option::unwrap_or_default)
}
