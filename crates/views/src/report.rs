use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use cf_core::Tick;

use crate::appearances::ProlificActor;
use crate::busy::BusyActor;
use crate::ratings::RatedActor;

/// The three continuous queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Actors with the most movies.
    MostProlific,
    /// Highest average rating among actors with enough votes.
    BestRated,
    /// Highest average rating among actors with enough movies.
    BestBusy,
}

impl Query {
    pub fn as_str(&self) -> &'static str {
        match self {
            Query::MostProlific => "most_prolific",
            Query::BestRated => "best_rated",
            Query::BestBusy => "best_busy",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked list, best first, tagged with the query that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ranked<T> {
    pub query: Query,
    pub entries: Vec<T>,
}

impl<T> Ranked<T> {
    pub fn new(query: Query, entries: Vec<T>) -> Self {
        Self { query, entries }
    }
}

/// Everything emitted for one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickReport {
    pub tick: Tick,
    pub most_prolific: Ranked<ProlificActor>,
    pub best_rated: Ranked<RatedActor>,
    pub best_busy: Ranked<BusyActor>,
}

impl TickReport {
    pub fn empty(tick: Tick) -> Self {
        Self {
            tick,
            most_prolific: Ranked::new(Query::MostProlific, Vec::new()),
            best_rated: Ranked::new(Query::BestRated, Vec::new()),
            best_busy: Ranked::new(Query::BestBusy, Vec::new()),
        }
    }

    /// Every actor named in any of the three lists.
    pub fn actors(&self) -> BTreeSet<&str> {
        self.most_prolific
            .entries
            .iter()
            .map(|e| e.actor.as_str())
            .chain(self.best_rated.entries.iter().map(|e| e.actor.as_str()))
            .chain(self.best_busy.entries.iter().map(|e| e.actor.as_str()))
            .collect()
    }

    pub fn to_json_line(&self) -> Result<String, cf_core::CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}
