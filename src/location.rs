use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A position in a source file. Lines are 1-indexed; columns are 0-indexed
/// byte offsets within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (line, column) = s
            .split_once(':')
            .ok_or_else(|| Error::BadFormat(format!("expected 'line:column', got '{}'", s)))?;
        let line: usize = line
            .parse()
            .map_err(|_| Error::BadFormat(format!("bad line number in location '{}'", s)))?;
        let column: usize = column
            .parse()
            .map_err(|_| Error::BadFormat(format!("bad column number in location '{}'", s)))?;
        if line == 0 {
            return Err(Error::BadFormat(format!("line numbers start at 1: '{}'", s)));
        }
        Ok(Location { line, column })
    }
}

impl TryFrom<String> for Location {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Location> for String {
    fn from(location: Location) -> String {
        location.to_string()
    }
}

/// A half-open range of locations: `start <= loc < stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationRange {
    pub start: Location,
    pub stop: Location,
}

impl LocationRange {
    pub fn new(start: Location, stop: Location) -> Self {
        LocationRange { start, stop }
    }

    pub fn contains(&self, location: Location) -> bool {
        self.start <= location && location < self.stop
    }
}

impl fmt::Display for LocationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.start, self.stop)
    }
}

impl FromStr for LocationRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (start, stop) = s
            .split_once("::")
            .ok_or_else(|| Error::BadFormat(format!("expected 'start::stop', got '{}'", s)))?;
        let range = LocationRange::new(start.parse()?, stop.parse()?);
        if range.stop < range.start {
            return Err(Error::BadFormat(format!("range stops before it starts: '{}'", s)));
        }
        Ok(range)
    }
}

impl TryFrom<String> for LocationRange {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<LocationRange> for String {
    fn from(range: LocationRange) -> String {
        range.to_string()
    }
}

/// A contiguous span of text in one named file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileLocationRange {
    pub filename: String,
    pub range: LocationRange,
}

impl FileLocationRange {
    pub fn new(filename: impl Into<String>, range: LocationRange) -> Self {
        FileLocationRange {
            filename: filename.into(),
            range,
        }
    }

    pub fn start(&self) -> Location {
        self.range.start
    }

    pub fn stop(&self) -> Location {
        self.range.stop
    }
}

impl fmt::Display for FileLocationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.filename, self.range)
    }
}

impl FromStr for FileLocationRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // filenames may themselves contain '@'
        let (filename, range) = s
            .rsplit_once('@')
            .ok_or_else(|| Error::BadFormat(format!("expected 'file@range', got '{}'", s)))?;
        if filename.is_empty() {
            return Err(Error::BadFormat(format!("missing filename in '{}'", s)));
        }
        Ok(FileLocationRange::new(filename, range.parse()?))
    }
}

impl TryFrom<String> for FileLocationRange {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<FileLocationRange> for String {
    fn from(location: FileLocationRange) -> String {
        location.to_string()
    }
}
