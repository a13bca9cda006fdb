//! Broadcast band selection.
//!
//! The tuner runs in exactly one of two receive functions at a time, AM or
//! FM. The band is parsed from request paths (`tune/fm/9990`) and CLI
//! arguments, so anything outside `{AM, FM}` is rejected at the parsing
//! boundary with [`ParseBandError`], which converts to
//! [`Error::InvalidBand`](crate::Error::InvalidBand).
//!
//! # Example
//!
//! ```
//! use webradio_core::Band;
//!
//! let band: Band = "fm".parse().unwrap();
//! assert_eq!(band, Band::Fm);
//! assert_eq!(band.to_string(), "FM");
//! assert_eq!(band.path_segment(), "fm");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Broadcast band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    /// Medium-wave AM. Frequencies in kHz.
    Am,
    /// VHF FM. Frequencies in units of 10 kHz.
    Fm,
}

impl Band {
    /// Both bands, in the order the station list renders them.
    pub const ALL: [Band; 2] = [Band::Fm, Band::Am];

    /// Lower-case name as used in URLs.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Band::Am => "am",
            Band::Fm => "fm",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Band::Am => "AM",
            Band::Fm => "FM",
        };
        write!(f, "{s}")
    }
}

/// Error returned when parsing a band name fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBandError(String);

impl fmt::Display for ParseBandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown band: '{}'", self.0)
    }
}

impl std::error::Error for ParseBandError {}

impl From<ParseBandError> for Error {
    fn from(e: ParseBandError) -> Self {
        Error::InvalidBand(e.0)
    }
}

impl FromStr for Band {
    type Err = ParseBandError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "am" => Ok(Band::Am),
            "fm" => Ok(Band::Fm),
            _ => Err(ParseBandError(s.to_string())),
        }
    }
}
