//! Batch sources: where each tick's raw lines come from.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cf_core::{parse_batch, AppearanceRecord, CoreError, Feed, RatingRecord, Tick};

/// Raw lines delivered for one tick, one list per feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawBatch {
    pub appearances: Vec<String>,
    pub ratings: Vec<String>,
}

impl RawBatch {
    pub fn new<A, R>(appearances: A, ratings: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            appearances: appearances.into_iter().map(Into::into).collect(),
            ratings: ratings.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lines(&self, feed: Feed) -> &[String] {
        match feed {
            Feed::Appearance => &self.appearances,
            Feed::Rating => &self.ratings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.appearances.is_empty() && self.ratings.is_empty()
    }

    /// Parse both feeds, failing on the first malformed line.
    pub fn parse(&self) -> Result<ParsedBatch, CoreError> {
        Ok(ParsedBatch {
            appearances: parse_batch(&self.appearances)?,
            ratings: parse_batch(&self.ratings)?,
        })
    }
}

/// Typed records of one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBatch {
    pub appearances: Vec<AppearanceRecord>,
    pub ratings: Vec<RatingRecord>,
}

pub trait BatchSource {
    /// The batch for `tick`. A tick without new input yields an empty batch.
    fn next_batch(&mut self, tick: Tick) -> Result<RawBatch>;
}

/// Hands out queued batches in order, then empty batches forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    batches: VecDeque<RawBatch>,
}

impl ScriptedSource {
    pub fn new(batches: impl IntoIterator<Item = RawBatch>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl BatchSource for ScriptedSource {
    fn next_batch(&mut self, _tick: Tick) -> Result<RawBatch> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

/// Watches one directory per feed. Each tick consumes the next unseen file of
/// each directory in file-name order. Hidden files are ignored so writers can
/// stage a file under a dot-name and rename it into place.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    appearances: FeedDir,
    ratings: FeedDir,
}

impl DirectorySource {
    pub fn new(appearances: impl Into<PathBuf>, ratings: impl Into<PathBuf>) -> Self {
        Self {
            appearances: FeedDir::new(appearances.into()),
            ratings: FeedDir::new(ratings.into()),
        }
    }
}

impl BatchSource for DirectorySource {
    fn next_batch(&mut self, tick: Tick) -> Result<RawBatch> {
        Ok(RawBatch {
            appearances: self.appearances.next_lines(tick),
            ratings: self.ratings.next_lines(tick),
        })
    }
}

#[derive(Debug, Clone)]
struct FeedDir {
    dir: PathBuf,
    seen: HashSet<PathBuf>,
}

impl FeedDir {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            seen: HashSet::new(),
        }
    }

    /// Lines of the next unseen file, or nothing when there is none. An
    /// unreadable directory or file is logged and yields an empty batch; the
    /// file stays unseen and is retried on the next tick.
    fn next_lines(&mut self, tick: Tick) -> Vec<String> {
        let path = match self.next_file() {
            Ok(Some(path)) => path,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(tick, dir = %self.dir.display(), error = %e, "feed directory unavailable");
                return Vec::new();
            }
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(tick, file = %path.display(), error = %e, "failed to read batch file");
                return Vec::new();
            }
        };
        let lines: Vec<String> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();
        debug!(tick, file = %path.display(), lines = lines.len(), "picked up batch file");
        self.seen.insert(path);
        lines
    }

    fn next_file(&self) -> io::Result<Option<PathBuf>> {
        let mut next: Option<PathBuf> = None;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || is_hidden(&path) || self.seen.contains(&path) {
                continue;
            }
            if next.as_ref().map_or(true, |current| path < *current) {
                next = Some(path);
            }
        }
        Ok(next)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}
