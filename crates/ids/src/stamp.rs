use crate::{IdError, IdResult};
use chrono::{Local, NaiveDateTime};
use std::{fmt, str::FromStr};

const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// A fixed-width local date-time: `YYYYMMDDHHmmss`.
///
/// Example: `20240315143522`
///
/// Stamps sort lexically in chronological order, which is what archive listings rely
/// on. They carry no timezone: they are rendered from the process' local time, the
/// same clock an operator reads when browsing the archive directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp(NaiveDateTime);

impl Stamp {
    /// Returns the current local time truncated to whole seconds.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    /// Wraps an explicit date-time, dropping sub-second precision.
    pub fn from_naive(value: NaiveDateTime) -> Self {
        let rendered = value.format(STAMP_FORMAT).to_string();
        // Round-trip through the format to discard nanoseconds.
        let truncated = NaiveDateTime::parse_from_str(&rendered, STAMP_FORMAT).unwrap_or(value);
        Self(truncated)
    }

    /// Parses a `YYYYMMDDHHmmss` string.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidStamp`] if the input is not 14 digits forming a valid
    /// date-time.
    pub fn parse(input: &str) -> IdResult<Self> {
        if input.len() != 14 || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::InvalidStamp(format!(
                "stamp must be 14 digits (YYYYMMDDHHmmss), got: '{}'",
                input
            )));
        }
        NaiveDateTime::parse_from_str(input, STAMP_FORMAT)
            .map(Self)
            .map_err(|e| IdError::InvalidStamp(format!("'{}': {}", input, e)))
    }

    /// Returns the underlying date-time.
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(STAMP_FORMAT))
    }
}

impl FromStr for Stamp {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stamp::parse(s)
    }
}
