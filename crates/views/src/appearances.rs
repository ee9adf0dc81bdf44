use serde::{Deserialize, Serialize};

use cf_core::{MovieCount, StateStore};

use crate::{rank_desc, top_k};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProlificActor {
    pub actor: String,
    pub movie_count: u64,
}

/// Running movie count per actor.
#[derive(Debug, Clone, Default)]
pub struct AppearanceAggregator {
    counts: StateStore<String, MovieCount>,
}

impl AppearanceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one movie per appearance. Returns the number of actors touched.
    pub fn apply<'a, I>(&mut self, actors: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.counts
            .merge_all(actors.into_iter().map(|actor| (actor.to_string(), MovieCount(1))))
    }

    /// Fold an already aggregated count into the state.
    pub fn absorb(&mut self, actor: String, count: u64) {
        self.counts.merge(actor, MovieCount(count));
    }

    pub fn movie_count(&self, actor: &str) -> Option<u64> {
        self.counts.get(actor).map(|c| c.0)
    }

    pub fn view(&self) -> impl Iterator<Item = ProlificActor> + '_ {
        self.counts.iter().map(|(actor, count)| ProlificActor {
            actor: actor.clone(),
            movie_count: count.0,
        })
    }

    pub fn top(&self, k: usize) -> Vec<ProlificActor> {
        top_k(self.view(), k, |a, b| {
            rank_desc((a.movie_count, a.actor.as_str()), (b.movie_count, b.actor.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_across_ticks() {
        let mut agg = AppearanceAggregator::new();
        assert_eq!(agg.apply(["A1", "A2", "A1"]), 2);
        assert_eq!(agg.apply(["A2"]), 1);
        assert_eq!(agg.apply(std::iter::empty()), 0);
        assert_eq!(agg.movie_count("A1"), Some(2));
        assert_eq!(agg.movie_count("A2"), Some(2));
        assert_eq!(agg.movie_count("A3"), None);
    }

    #[test]
    fn top_orders_by_count() {
        let mut agg = AppearanceAggregator::new();
        agg.apply(["A", "B", "B", "C", "C", "C"]);
        let top: Vec<_> = agg.top(2).into_iter().map(|p| (p.actor, p.movie_count)).collect();
        assert_eq!(top, vec![("C".to_string(), 3), ("B".to_string(), 2)]);
    }
}
