use crate::{IdError, IdResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// A room location relative to the rooms root.
///
/// Rooms are an implicit hierarchy of directories, so the identifier is the relative
/// path itself. The canonical form joins segments with `/`, has no leading or trailing
/// separator, and the empty path denotes the rooms root.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomPath {
    segments: Vec<String>,
}

impl RoomPath {
    /// The rooms root itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a relative room path.
    ///
    /// Backslashes are treated as separators, empty segments (`a//b`, leading or
    /// trailing `/`) are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidRoomPath`] if any segment is `.`, `..`, or contains a
    /// NUL byte, or if the path is a Windows drive prefix such as `C:`.
    pub fn parse(input: &str) -> IdResult<Self> {
        let normalised = input.replace('\\', "/");
        let mut segments = Vec::new();

        for segment in normalised.split('/').filter(|s| !s.is_empty()) {
            Self::validate_segment(segment).map_err(|reason| {
                IdError::InvalidRoomPath(format!("'{}': {}", input, reason))
            })?;
            segments.push(segment.to_owned());
        }

        Ok(Self { segments })
    }

    fn validate_segment(segment: &str) -> Result<(), &'static str> {
        if segment == "." || segment == ".." {
            return Err("relative segments are not allowed");
        }
        if segment.contains('\0') {
            return Err("NUL bytes are not allowed");
        }
        if segment.ends_with(':') {
            return Err("drive prefixes are not allowed");
        }
        Ok(())
    }

    /// Returns a child path one level below `self`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidRoomPath`] if `name` is not a single valid segment.
    pub fn join(&self, name: &str) -> IdResult<Self> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(IdError::InvalidRoomPath(format!(
                "'{}' is not a single path segment",
                name
            )));
        }
        Self::validate_segment(name)
            .map_err(|reason| IdError::InvalidRoomPath(format!("'{}': {}", name, reason)))?;

        let mut segments = self.segments.clone();
        segments.push(name.to_owned());
        Ok(Self { segments })
    }

    /// Returns true for the rooms root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the last segment, or an empty string for the root.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Returns the path segments from the root downwards.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the directory for this room under `parent_dir`.
    pub fn dir_in(&self, parent_dir: &Path) -> PathBuf {
        self.segments
            .iter()
            .fold(parent_dir.to_path_buf(), |dir, segment| dir.join(segment))
    }
}

impl fmt::Display for RoomPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for RoomPath {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoomPath::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RoomPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RoomPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RoomPath::parse(&s).map_err(serde::de::Error::custom)
    }
}
