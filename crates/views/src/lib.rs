//! Aggregate views over the appearance and rating feeds: per-actor state,
//! the same-tick movie join, the derived "busy actor" view and top-K ranking.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub mod appearances;
pub mod busy;
pub mod ratings;
pub mod report;
pub mod stats;

pub use appearances::{AppearanceAggregator, ProlificActor};
pub use busy::{best_busy_actors, top_busy_actors, BusyActor};
pub use ratings::{join_on_movie, join_same_tick, RatedActor, RatingAggregator, RatingContribution};
pub use report::{Query, Ranked, TickReport};
pub use stats::{ActorSnapshot, ActorStats};

/// Thresholds and ranking size shared by the three queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryConfig {
    /// Inclusive lower bound on real votes for the best-rated query.
    pub min_votes: u64,
    /// Inclusive lower bound on movie count for the best-busy query.
    pub min_movies: u64,
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_votes: 10_000,
            min_movies: 5,
            top_k: 10,
        }
    }
}

/// Keep the `k` best items, best first. `cmp` orders better items before worse ones.
pub fn top_k<T, F>(items: impl IntoIterator<Item = T>, k: usize, mut cmp: F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    if k == 0 {
        return Vec::new();
    }
    let mut vals: Vec<T> = items.into_iter().collect();
    if vals.len() > k {
        vals.select_nth_unstable_by(k - 1, &mut cmp);
        vals.truncate(k);
    }
    vals.sort_by(cmp);
    vals
}

/// Descending by score, ties by ascending name so rankings are reproducible.
pub(crate) fn rank_desc<S: PartialOrd>(a: (S, &str), b: (S, &str)) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.cmp(b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_best_k_in_order() {
        let top = top_k(vec![3, 9, 1, 7, 5, 8], 3, |a, b| b.cmp(a));
        assert_eq!(top, vec![9, 8, 7]);
    }

    #[test]
    fn short_inputs_and_zero_k() {
        assert_eq!(top_k(vec![2, 4], 10, |a, b| b.cmp(a)), vec![4, 2]);
        assert!(top_k(vec![2, 4], 0, |a: &i32, b: &i32| b.cmp(a)).is_empty());
        assert!(top_k(Vec::<i32>::new(), 10, |a, b| b.cmp(a)).is_empty());
    }

    #[test]
    fn ties_break_by_name() {
        assert_eq!(rank_desc((2.0, "b"), (2.0, "a")), Ordering::Greater);
        assert_eq!(rank_desc((3.0, "b"), (2.0, "a")), Ordering::Less);
    }
}
