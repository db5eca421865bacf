//! Sample lookup keys.

use chrono::NaiveDateTime;

use crate::core::{parse_timestamp, TemporalIndex};
use crate::util::{Error, Result};

/// Selects a sample by ordinal, timestamp or timestamp text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleKey {
    /// Position in the temporal index.
    Ordinal(usize),
    Timestamp(NaiveDateTime),
    /// ISO-style text such as `2022-11-01T00:15:00`.
    Text(String),
}

impl SampleKey {
    /// Timestamp this key refers to.
    ///
    /// Ordinals past the end fail with [`Error::SampleOutOfBounds`], text
    /// that does not parse with [`Error::InvalidTimestamp`].
    pub fn resolve(&self, index: &TemporalIndex) -> Result<NaiveDateTime> {
        match self {
            Self::Ordinal(i) => index.get(*i).ok_or(Error::SampleOutOfBounds {
                index: *i,
                count: index.len(),
            }),
            Self::Timestamp(t) => Ok(*t),
            Self::Text(text) => parse_timestamp(text),
        }
    }
}

impl From<usize> for SampleKey {
    fn from(index: usize) -> Self {
        Self::Ordinal(index)
    }
}

impl From<NaiveDateTime> for SampleKey {
    fn from(time: NaiveDateTime) -> Self {
        Self::Timestamp(time)
    }
}

impl From<&str> for SampleKey {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for SampleKey {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}
