use crate::{IdError, IdResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Canonical item identifier: four ASCII digits, zero-padded.
///
/// Once constructed the value is guaranteed to render as exactly four digits, so it can
/// be used directly as a directory name under the items root.
///
/// # Construction
/// - [`ItemId::parse`] validates an externally supplied identifier (CLI input, API
///   path segment, directory name).
/// - [`ItemId::from_number`] builds an identifier from an allocated integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(u16);

impl ItemId {
    /// Number of digits in the canonical form.
    pub const WIDTH: usize = 4;

    /// Largest number representable in the canonical form.
    pub const MAX: u32 = 9999;

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidItemId`] if `input` is not exactly four ASCII digits.
    pub fn parse(input: &str) -> IdResult<Self> {
        if !Self::is_canonical(input) {
            return Err(IdError::InvalidItemId(format!(
                "item id must be exactly {} digits, got: '{}'",
                Self::WIDTH,
                input
            )));
        }
        let value = input
            .parse::<u16>()
            .map_err(|e| IdError::InvalidItemId(format!("'{}': {}", input, e)))?;
        Ok(Self(value))
    }

    /// Builds an identifier from a number in `0..=9999`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidItemId`] if `value` needs more than four digits.
    pub fn from_number(value: u32) -> IdResult<Self> {
        if value > Self::MAX {
            return Err(IdError::InvalidItemId(format!(
                "{} does not fit in {} digits",
                value,
                Self::WIDTH
            )));
        }
        Ok(Self(value as u16))
    }

    /// Returns true if `input` is in canonical form.
    ///
    /// This is a purely syntactic check and is what directory scans use to decide
    /// whether a name belongs to the item namespace at all.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == Self::WIDTH && input.bytes().all(|b| b.is_ascii_digit())
    }

    /// Returns the numeric value.
    pub fn number(self) -> u32 {
        u32::from(self.0)
    }

    /// Returns `parent_dir/<id>`.
    pub fn dir_in(self, parent_dir: &Path) -> PathBuf {
        parent_dir.join(self.to_string())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = Self::WIDTH)
    }
}

impl FromStr for ItemId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ItemId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ItemId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_id() {
        let id = ItemId::parse("1013").unwrap();
        assert_eq!(id.number(), 1013);
        assert_eq!(id.to_string(), "1013");
    }

    #[test]
    fn test_parse_keeps_leading_zeros() {
        let id = ItemId::parse("0042").unwrap();
        assert_eq!(id.number(), 42);
        assert_eq!(id.to_string(), "0042");
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        for input in ["", "13", "01013", "10a3", " 1013", "1013 ", "-101", "+101"] {
            assert!(ItemId::parse(input).is_err(), "accepted '{}'", input);
        }
    }

    #[test]
    fn test_is_canonical_rejects_unicode_digits() {
        assert!(!ItemId::is_canonical("１２３４"));
        assert!(ItemId::is_canonical("9999"));
    }

    #[test]
    fn test_from_number_pads_and_bounds() {
        assert_eq!(ItemId::from_number(7).unwrap().to_string(), "0007");
        assert_eq!(ItemId::from_number(9999).unwrap().to_string(), "9999");
        assert!(matches!(
            ItemId::from_number(10000),
            Err(IdError::InvalidItemId(_))
        ));
    }

    #[test]
    fn test_dir_in() {
        let id = ItemId::parse("1001").unwrap();
        assert_eq!(
            id.dir_in(Path::new("/storage/DB/ITEMS")),
            PathBuf::from("/storage/DB/ITEMS/1001")
        );
    }

    #[test]
    fn test_ordering_follows_number() {
        let mut ids = vec![
            ItemId::parse("1012").unwrap(),
            ItemId::parse("0999").unwrap(),
            ItemId::parse("1005").unwrap(),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["0999", "1005", "1012"]);
    }

    #[test]
    fn test_serde_as_string() {
        let id = ItemId::parse("1013").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1013\"");
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ItemId>("\"13\"").is_err());
    }
}
