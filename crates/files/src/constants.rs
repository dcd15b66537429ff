//! Naming conventions for in-flight files.
//!
//! Every file the store writes atomically (uploads moved across filesystems, metadata
//! documents, previews) is first written under a transient name in the destination
//! directory and then renamed. Transient names are hidden (`.` prefix) and end in
//! [`TRANSIENT_SUFFIX`], so directory listings can skip them.

use uuid::Uuid;

/// Suffix shared by all transient files.
pub const TRANSIENT_SUFFIX: &str = ".tmp";

/// Returns a unique transient name for a file that will be renamed to `final_name`.
///
/// The final name stays at the end so tools that pick an output format from the
/// extension (ffmpeg) still see it: `.<uuid>.tmp.photo.jpg`.
pub fn transient_name(final_name: &str) -> String {
    format!(
        ".{}{}.{}",
        Uuid::new_v4().simple(),
        TRANSIENT_SUFFIX,
        final_name
    )
}

/// Returns true if `name` was produced by [`transient_name`].
pub fn is_transient(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('.') else {
        return false;
    };
    match rest.split_once(TRANSIENT_SUFFIX) {
        Some((id, tail)) => {
            id.len() == 32
                && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
                && tail.starts_with('.')
        }
        None => false,
    }
}
