//! Content identifiers for data addressed by hash.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when constructing a [`ContentId`] from invalid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("content identifier must not be empty")]
pub struct InvalidContentId;

/// Opaque content-addressed key for a piece of data.
///
/// The tracker never interprets the encoding; equality is exact string
/// equality and the value is immutable once constructed. The only
/// rejected input is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Create a content identifier from its canonical string form.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidContentId> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidContentId);
        }
        Ok(Self(id))
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentId {
    type Err = InvalidContentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
