use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use cf_core::{AppearanceRecord, RatingRecord, RatingSum, StateStore};

use crate::{rank_desc, top_k};

/// One rating record credited to one actor of the rated movie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingContribution {
    pub actor: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatedActor {
    pub actor: String,
    pub real_votes: u64,
    pub average_rating: f64,
}

/// Inner join of one tick's appearances and ratings on movie name.
///
/// Every actor of a movie is paired with every rating of that movie seen in
/// the same input. Records without a counterpart contribute nothing.
pub fn join_on_movie<'a, A, R>(appearances: A, ratings: R) -> Vec<RatingContribution>
where
    A: IntoIterator<Item = (&'a str, &'a str)>,
    R: IntoIterator<Item = (&'a str, f64)>,
{
    let mut rates_by_movie: HashMap<&str, Vec<f64>> = HashMap::new();
    for (movie, rate) in ratings {
        rates_by_movie.entry(movie).or_default().push(rate);
    }
    if rates_by_movie.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    for (actor, movie) in appearances {
        if let Some(rates) = rates_by_movie.get(movie) {
            out.extend(rates.iter().map(|&rate| RatingContribution {
                actor: actor.to_string(),
                rate,
            }));
        }
    }
    out
}

/// [`join_on_movie`] over parsed records of a single tick.
pub fn join_same_tick(
    appearances: &[AppearanceRecord],
    ratings: &[RatingRecord],
) -> Vec<RatingContribution> {
    join_on_movie(
        appearances.iter().map(|a| (a.actor.as_str(), a.movie.as_str())),
        ratings.iter().map(|r| (r.movie.as_str(), r.rate)),
    )
}

/// Running vote units and rating sum per actor.
#[derive(Debug, Clone, Default)]
pub struct RatingAggregator {
    sums: StateStore<String, RatingSum>,
}

impl RatingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one tick of join output. Returns the number of actors touched.
    pub fn apply<I>(&mut self, contributions: I) -> usize
    where
        I: IntoIterator<Item = RatingContribution>,
    {
        self.sums
            .merge_all(contributions.into_iter().map(|c| (c.actor, RatingSum::unit(c.rate))))
    }

    pub fn absorb(&mut self, actor: String, sum: RatingSum) {
        self.sums.merge(actor, sum);
    }

    pub fn get(&self, actor: &str) -> Option<&RatingSum> {
        self.sums.get(actor)
    }

    pub fn average(&self, actor: &str) -> Option<f64> {
        self.sums.get(actor).and_then(RatingSum::average)
    }

    /// Actors with at least `min_votes` real votes (inclusive).
    pub fn view(&self, min_votes: u64) -> impl Iterator<Item = RatedActor> + '_ {
        self.sums.iter().filter_map(move |(actor, sum)| {
            let average_rating = sum.average()?;
            let real_votes = sum.real_votes();
            (real_votes >= min_votes).then(|| RatedActor {
                actor: actor.clone(),
                real_votes,
                average_rating,
            })
        })
    }

    pub fn top(&self, min_votes: u64, k: usize) -> Vec<RatedActor> {
        top_k(self.view(min_votes), k, |a, b| {
            rank_desc(
                (a.average_rating, a.actor.as_str()),
                (b.average_rating, b.actor.as_str()),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }
}
