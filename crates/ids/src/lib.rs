//! Entity identifiers and timestamp stamps.
//!
//! The inventory store keeps every entity in its own directory, so an identifier is
//! also a path fragment. This crate owns the canonical forms and the path derivation
//! for both namespaces:
//!
//! - [`ItemId`]: exactly four ASCII digits (`0000`..=`9999`), the directory name under
//!   `DB/ITEMS/`.
//! - [`RoomPath`]: a `/`-separated path relative to `DB/ROOMS/`. Backslashes are
//!   normalised to `/`, and `.`/`..` segments are rejected so a room path can never
//!   escape the rooms root.
//! - [`Stamp`]: the `YYYYMMDDHHmmss` local-time string written into the `date` field of
//!   every metadata document and embedded in archive filenames. It is fixed-width, so
//!   lexical order is chronological order.
//!
//! ## Canonical item id form
//! - Length: 4
//! - Characters: `0-9` only
//! - Example: `1013`
//!
//! Non-canonical values (`13`, `01013`, `10a3`, ` 1013`) are rejected by
//! [`ItemId::parse`]; directory scans use [`ItemId::is_canonical`] to skip foreign
//! directories entirely.

mod item;
mod room;
mod stamp;

pub use item::ItemId;
pub use room::RoomPath;
pub use stamp::Stamp;

/// Error type for identifier parsing.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The item identifier is not four ASCII digits
    #[error("invalid item id: {0}")]
    InvalidItemId(String),

    /// The room path contains a forbidden segment
    #[error("invalid room path: {0}")]
    InvalidRoomPath(String),

    /// The stamp is not a `YYYYMMDDHHmmss` date-time
    #[error("invalid stamp: {0}")]
    InvalidStamp(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
