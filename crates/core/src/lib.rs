//! Core types and traits for castflow.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod parse;
pub mod records;
pub mod state;

pub use parse::parse_batch;
pub use records::{AppearanceRecord, RatingRecord};
pub use state::{Accumulator, MovieCount, RatingSum, StateStore};

/// Index of a scheduling cycle. Tick `0` is the first batch after startup.
pub type Tick = u64;

/// Real-world votes represented by a single rating record.
pub const VOTES_PER_RECORD: u64 = 1000;

/// The two input feeds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Appearance,
    Rating,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Appearance => "appearance",
            Feed::Rating => "rating",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("malformed {feed} record {line:?}: {reason}")]
    MalformedRecord {
        feed: Feed,
        line: String,
        reason: String,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CoreError {
    pub(crate) fn malformed(feed: Feed, line: &str, reason: impl Into<String>) -> Self {
        CoreError::MalformedRecord {
            feed,
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
