//! Defines [`StationId`], the USAF/WBAN code pair identifying an ISD station.

use crate::stations::error::StationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a weather station by its USAF and WBAN codes.
///
/// Both codes are fixed-format strings. USAF codes may carry a leading letter
/// (e.g. `"A00001"`), so neither part is treated as a number. Only ASCII
/// alphanumeric characters are accepted, which keeps the `USAF-WBAN` rendering
/// used for file names unambiguous.
///
/// # Examples
///
/// ```
/// use isd_lite::StationId;
///
/// let id = StationId::new("724670", "03017").unwrap();
/// assert_eq!(id.to_string(), "724670-03017");
/// assert_eq!("724670 03017".parse::<StationId>().unwrap(), id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId {
    usaf: String,
    wban: String,
}

impl StationId {
    /// Creates a station id, validating both codes.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::InvalidId`] if either code is empty or contains
    /// characters other than ASCII letters and digits.
    pub fn new(usaf: impl Into<String>, wban: impl Into<String>) -> Result<Self, StationError> {
        let usaf = usaf.into().trim().to_string();
        let wban = wban.into().trim().to_string();
        for code in [&usaf, &wban] {
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(StationError::InvalidId(format!("{usaf} {wban}")));
            }
        }
        Ok(Self { usaf, wban })
    }

    /// The Air Force station code.
    pub fn usaf(&self) -> &str {
        &self.usaf
    }

    /// The Weather Bureau Army Navy station code.
    pub fn wban(&self) -> &str {
        &self.wban
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.usaf, self.wban)
    }
}

/// Parses `"USAF WBAN"` (as listed in the station history file) or `"USAF-WBAN"`.
impl FromStr for StationId {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(|c: char| c.is_whitespace() || c == '-').filter(|p| !p.is_empty());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(usaf), Some(wban), None) => Self::new(usaf, wban),
            _ => Err(StationError::InvalidId(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_space_and_dash_forms() {
        let a: StationId = "724670 03017".parse().unwrap();
        let b: StationId = "724670-03017".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.usaf(), "724670");
        assert_eq!(a.wban(), "03017");
    }

    #[test]
    fn test_leading_letter_is_kept() {
        let id = StationId::new("A00023", "63890").unwrap();
        assert_eq!(id.to_string(), "A00023-63890");
    }

    #[test]
    fn test_rejects_separators_inside_codes() {
        assert!(StationId::new("72-670", "03017").is_err());
        assert!(StationId::new("", "03017").is_err());
        assert!("724670".parse::<StationId>().is_err());
        assert!("1 2 3".parse::<StationId>().is_err());
    }
}
