use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive range of Gregorian years, e.g. `2020..=2023`.
///
/// ISD-Lite archives are published one file per station and year, so every
/// acquisition and decoding step iterates over a `YearRange` in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    /// Creates a range covering `start` through `end`, both inclusive.
    ///
    /// Returns `None` if `end < start`.
    pub fn new(start: i32, end: i32) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// A range covering a single year.
    pub fn single(year: i32) -> Self {
        Self {
            start: year,
            end: year,
        }
    }

    /// First year of the range.
    pub fn start(&self) -> i32 {
        self.start
    }

    /// Last year of the range (inclusive).
    pub fn end(&self) -> i32 {
        self.end
    }

    /// Number of years in the range.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    /// Iterates the years in increasing order.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:04}", self.start, self.end)
    }
}
