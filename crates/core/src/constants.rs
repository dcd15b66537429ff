//! Constants used throughout the inventory core crate.
//!
//! This module contains all path and filename constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default storage directory when no explicit directory is configured.
pub const DEFAULT_STORAGE_DIR: &str = "storage";

/// Directory name for the database root below the storage directory.
pub const DB_DIR_NAME: &str = "DB";

/// Directory name for item records.
pub const ITEMS_DIR_NAME: &str = "ITEMS";

/// Directory name for the room hierarchy.
pub const ROOMS_DIR_NAME: &str = "ROOMS";

/// Directory name for derived previews.
pub const CACHE_DIR_NAME: &str = "CACHE";

/// Directory name for staged uploads.
pub const STAGING_DIR_NAME: &str = "TMP";

/// Lowest item number considered taken when allocating identifiers.
pub const DEFAULT_ID_FLOOR: u32 = 1000;

/// Target width of generated previews, in pixels.
pub const DEFAULT_PREVIEW_WIDTH: u32 = 300;

/// Transcoder executable looked up on `PATH`.
pub const DEFAULT_TRANSCODER_PROGRAM: &str = "ffmpeg";

/// File extensions (lowercase) for which previews can be generated.
pub const DEFAULT_PICTURE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif"];

/// Item types (compared case-insensitively) whose vendor report is parsed into `pc.json`.
pub const COMPUTER_TYPES: &[&str] = &["pc", "aio", "laptop", "nbk", "mbl", "monoblock"];
