/// Errors that can occur when validating an asset filename.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssetNameError {
    /// The input was empty
    #[error("Asset name cannot be empty")]
    Empty,

    /// The input contained a path separator or NUL byte
    #[error("Asset name must be a single path segment: {0}")]
    NotASegment(String),

    /// The input was `.` or `..`
    #[error("Asset name cannot be a relative path component: {0}")]
    Relative(String),
}

/// A filename that is guaranteed to be a single path segment.
///
/// Asset names come from upload forms and URL segments, so they are joined onto an
/// entity directory. This type guarantees the join cannot leave that directory:
/// separators (`/` and `\`), NUL bytes and the `.`/`..` components are rejected. Unlike
/// free text the input is **not** trimmed; `" photo.jpg"` is a distinct, valid name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetName(String);

impl AssetName {
    /// Creates a new `AssetName` from the given input.
    ///
    /// # Returns
    ///
    /// Returns `Ok(AssetName)` if the input is a single path segment, or the matching
    /// [`AssetNameError`] otherwise.
    pub fn new(input: impl AsRef<str>) -> Result<Self, AssetNameError> {
        let input = input.as_ref();
        if input.is_empty() {
            return Err(AssetNameError::Empty);
        }
        if input.contains(['/', '\\', '\0']) {
            return Err(AssetNameError::NotASegment(input.to_owned()));
        }
        if input == "." || input == ".." {
            return Err(AssetNameError::Relative(input.to_owned()));
        }
        Ok(Self(input.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the lowercase extension (without the dot), if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.0.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl std::fmt::Display for AssetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AssetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for AssetName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl serde::Serialize for AssetName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for AssetName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        AssetName::new(&s).map_err(serde::de::Error::custom)
    }
}
