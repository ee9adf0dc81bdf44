use serde::{Deserialize, Serialize};

/// One actor credited in one movie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppearanceRecord {
    pub actor: String,
    pub movie: String,
    pub year: String,
}

impl AppearanceRecord {
    pub fn new(actor: impl Into<String>, movie: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            movie: movie.into(),
            year: year.into(),
        }
    }
}

/// One vote unit for a movie. Each record stands for [`crate::VOTES_PER_RECORD`] real votes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingRecord {
    pub rate: f64,
    pub movie: String,
    pub year: String,
}

impl RatingRecord {
    pub fn new(rate: f64, movie: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            rate,
            movie: movie.into(),
            year: year.into(),
        }
    }
}
