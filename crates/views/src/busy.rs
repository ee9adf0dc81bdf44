use serde::{Deserialize, Serialize};

use crate::appearances::AppearanceAggregator;
use crate::ratings::RatingAggregator;
use crate::{rank_desc, top_k};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusyActor {
    pub actor: String,
    pub average_rating: f64,
    pub movie_count: u64,
}

/// Actors with at least `min_movies` movies (inclusive) joined with their
/// average rating. Vote totals play no part here.
pub fn best_busy_actors(
    counts: &AppearanceAggregator,
    ratings: &RatingAggregator,
    min_movies: u64,
) -> Vec<BusyActor> {
    counts
        .view()
        .filter(|p| p.movie_count >= min_movies)
        .filter_map(|p| {
            ratings.average(&p.actor).map(|average_rating| BusyActor {
                actor: p.actor,
                average_rating,
                movie_count: p.movie_count,
            })
        })
        .collect()
}

pub fn top_busy_actors(
    counts: &AppearanceAggregator,
    ratings: &RatingAggregator,
    min_movies: u64,
    k: usize,
) -> Vec<BusyActor> {
    top_k(best_busy_actors(counts, ratings, min_movies), k, |a, b| {
        rank_desc(
            (a.average_rating, a.actor.as_str()),
            (b.average_rating, b.actor.as_str()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::RatingContribution;

    fn contribution(actor: &str, rate: f64) -> RatingContribution {
        RatingContribution {
            actor: actor.to_string(),
            rate,
        }
    }

    #[test]
    fn single_movie_actor_is_excluded() {
        let mut counts = AppearanceAggregator::new();
        counts.apply(["Perfect", "Busy", "Busy"]);
        let mut ratings = RatingAggregator::new();
        ratings.apply([contribution("Perfect", 10.0), contribution("Busy", 6.0)]);

        let busy = top_busy_actors(&counts, &ratings, 2, 10);
        assert_eq!(
            busy,
            vec![BusyActor {
                actor: "Busy".to_string(),
                average_rating: 6.0,
                movie_count: 2
            }]
        );
    }

    #[test]
    fn unrated_actors_do_not_join() {
        let mut counts = AppearanceAggregator::new();
        counts.apply(["A1", "A1", "A2", "A2"]);
        let mut ratings = RatingAggregator::new();
        ratings.apply([contribution("A2", 4.0)]);

        let busy = best_busy_actors(&counts, &ratings, 0);
        assert_eq!(busy.len(), 1);
        assert_eq!(busy[0].actor, "A2");
    }
}
