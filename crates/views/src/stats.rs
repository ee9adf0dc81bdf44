//! Per-actor state for all three queries, applied one tick at a time.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cf_core::{AppearanceRecord, RatingRecord, RatingSum, Tick};

use crate::appearances::AppearanceAggregator;
use crate::busy::top_busy_actors;
use crate::ratings::{join_same_tick, RatingAggregator, RatingContribution};
use crate::report::{Query, Ranked, TickReport};
use crate::QueryConfig;

/// Full accumulated state of one actor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorSnapshot {
    pub actor: String,
    pub movie_count: u64,
    pub rating: RatingSum,
}

/// Owns the movie-count and rating state and renders the three views.
#[derive(Debug, Clone, Default)]
pub struct ActorStats {
    cfg: QueryConfig,
    appearances: AppearanceAggregator,
    ratings: RatingAggregator,
}

impl ActorStats {
    pub fn new(cfg: QueryConfig) -> Self {
        Self {
            cfg,
            appearances: AppearanceAggregator::new(),
            ratings: RatingAggregator::new(),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.cfg
    }

    pub fn appearances(&self) -> &AppearanceAggregator {
        &self.appearances
    }

    pub fn ratings(&self) -> &RatingAggregator {
        &self.ratings
    }

    /// Apply one tick: count appearances, join them with this tick's ratings
    /// and accumulate the joined contributions. Returns the number of joined
    /// actor/rating pairs.
    pub fn apply(&mut self, appearances: &[AppearanceRecord], ratings: &[RatingRecord]) -> usize {
        let contributions = join_same_tick(appearances, ratings);
        let joined = contributions.len();
        let actors_counted = self.count_appearances(appearances.iter().map(|a| a.actor.as_str()));
        let actors_rated = self.accumulate(contributions);
        debug!(joined, actors_counted, actors_rated, "applied tick");
        joined
    }

    pub fn count_appearances<'a, I>(&mut self, actors: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.appearances.apply(actors)
    }

    pub fn accumulate<I>(&mut self, contributions: I) -> usize
    where
        I: IntoIterator<Item = RatingContribution>,
    {
        self.ratings.apply(contributions)
    }

    /// Fold a snapshot taken from another `ActorStats` into this one.
    pub fn absorb(&mut self, snapshot: ActorSnapshot) {
        let ActorSnapshot {
            actor,
            movie_count,
            rating,
        } = snapshot;
        if rating.vote_units > 0 {
            self.ratings.absorb(actor.clone(), rating);
        }
        if movie_count > 0 {
            self.appearances.absorb(actor, movie_count);
        }
    }

    pub fn snapshot(&self, actor: &str) -> Option<ActorSnapshot> {
        let movie_count = self.appearances.movie_count(actor);
        let rating = self.ratings.get(actor).copied();
        if movie_count.is_none() && rating.is_none() {
            return None;
        }
        Some(ActorSnapshot {
            actor: actor.to_string(),
            movie_count: movie_count.unwrap_or_default(),
            rating: rating.unwrap_or_default(),
        })
    }

    pub fn report(&self, tick: Tick) -> TickReport {
        let k = self.cfg.top_k;
        TickReport {
            tick,
            most_prolific: Ranked::new(Query::MostProlific, self.appearances.top(k)),
            best_rated: Ranked::new(Query::BestRated, self.ratings.top(self.cfg.min_votes, k)),
            best_busy: Ranked::new(
                Query::BestBusy,
                top_busy_actors(&self.appearances, &self.ratings, self.cfg.min_movies, k),
            ),
        }
    }

    /// Snapshots of every actor ranked in `report`.
    ///
    /// When the actors are partitioned across several `ActorStats`, the union
    /// of each partition's candidates contains the global top-K of every view.
    pub fn candidates(&self, report: &TickReport) -> Vec<ActorSnapshot> {
        report
            .actors()
            .into_iter()
            .filter_map(|actor| self.snapshot(actor))
            .collect()
    }

    pub fn actor_count(&self) -> usize {
        self.appearances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn app(actor: &str, movie: &str) -> AppearanceRecord {
        AppearanceRecord::new(actor, movie, "2000")
    }

    fn rate(rate: f64, movie: &str) -> RatingRecord {
        RatingRecord::new(rate, movie, "2000")
    }

    fn open_thresholds() -> QueryConfig {
        QueryConfig {
            min_votes: 0,
            min_movies: 0,
            top_k: 10,
        }
    }

    #[test]
    fn two_tick_example() {
        let mut stats = ActorStats::new(open_thresholds());

        stats.apply(&[app("A1", "M1"), app("A2", "M1")], &[rate(8.0, "M1")]);
        assert_eq!(stats.appearances().movie_count("A1"), Some(1));
        assert_eq!(stats.appearances().movie_count("A2"), Some(1));
        let rated = stats.report(0).best_rated.entries;
        assert_eq!(rated.len(), 2);
        for r in &rated {
            assert_eq!((r.real_votes, r.average_rating), (1000, 8.0));
        }

        // The rating lands a tick later than the appearances: no join.
        stats.apply(&[], &[rate(6.0, "M1")]);
        let a1 = stats.snapshot("A1").unwrap();
        assert_eq!(a1.movie_count, 1);
        assert_eq!(a1.rating.vote_units, 1);
        assert_eq!(a1.rating.rating_sum, 8.0);
    }

    #[test]
    fn same_tick_rating_accumulates() {
        let mut stats = ActorStats::new(open_thresholds());
        stats.apply(&[app("A1", "M1"), app("A2", "M1")], &[rate(8.0, "M1")]);
        let joined = stats.apply(&[app("A1", "M1"), app("A2", "M1")], &[rate(6.0, "M1")]);
        assert_eq!(joined, 2);

        let report = stats.report(1);
        let a1 = report
            .best_rated
            .entries
            .iter()
            .find(|r| r.actor == "A1")
            .unwrap();
        assert_eq!((a1.real_votes, a1.average_rating), (2000, 7.0));
    }

    #[test]
    fn join_is_tick_local() {
        let mut stats = ActorStats::new(open_thresholds());
        assert_eq!(stats.apply(&[app("A1", "M1")], &[]), 0);
        assert_eq!(stats.apply(&[], &[rate(9.0, "M1")]), 0);
        assert!(stats.ratings().is_empty());
        assert!(stats.report(1).best_rated.entries.is_empty());
    }

    #[test]
    fn thresholds_are_inclusive() {
        let mut stats = ActorStats::new(QueryConfig {
            min_votes: 2000,
            min_movies: 2,
            top_k: 10,
        });
        stats.apply(
            &[app("Exact", "M1"), app("Exact", "M2"), app("Short", "M3")],
            &[rate(7.0, "M1"), rate(9.0, "M3")],
        );
        // Exact has two movies but a single vote unit so far.
        let report = stats.report(0);
        assert!(report.best_rated.entries.is_empty());
        assert_eq!(report.best_busy.entries.len(), 1);
        assert_eq!(report.best_busy.entries[0].actor, "Exact");

        stats.apply(&[app("Exact", "M4")], &[rate(5.0, "M4")]);
        let report = stats.report(1);
        assert_eq!(report.best_rated.entries.len(), 1);
        assert_eq!(report.best_rated.entries[0].real_votes, 2000);
        assert_eq!(report.best_rated.entries[0].average_rating, 6.0);
    }

    #[test]
    fn perfect_single_movie_actor_not_busy() {
        let mut stats = ActorStats::new(QueryConfig {
            min_votes: 0,
            min_movies: 2,
            top_k: 10,
        });
        stats.apply(
            &[app("Star", "M1"), app("Worker", "M2"), app("Worker", "M3")],
            &[rate(10.0, "M1"), rate(5.0, "M2")],
        );
        let busy: Vec<_> = stats
            .report(0)
            .best_busy
            .entries
            .into_iter()
            .map(|b| b.actor)
            .collect();
        assert_eq!(busy, vec!["Worker".to_string()]);
    }

    #[test]
    fn reports_are_capped_at_k() {
        let mut stats = ActorStats::new(open_thresholds());
        let apps: Vec<_> = (0..25).map(|i| app(&format!("A{i:02}"), "M")).collect();
        stats.apply(&apps, &[rate(7.0, "M")]);
        let report = stats.report(0);
        assert_eq!(report.most_prolific.entries.len(), 10);
        assert_eq!(report.best_rated.entries.len(), 10);
        assert_eq!(report.best_busy.entries.len(), 10);
        assert_eq!(report.most_prolific.entries[0].actor, "A00");
    }

    #[test]
    fn partitioned_candidates_reproduce_report() {
        let cfg = QueryConfig {
            min_votes: 2000,
            min_movies: 2,
            top_k: 3,
        };
        let mut whole = ActorStats::new(cfg);
        let mut shards = [ActorStats::new(cfg), ActorStats::new(cfg)];
        for t in 0..6u64 {
            let apps: Vec<_> = (0..12u64)
                .map(|i| app(&format!("A{}", (i * 7 + t) % 9), &format!("M{}", (i + t) % 5)))
                .collect();
            let rates: Vec<_> = (0..4u64)
                .map(|i| rate(((i * 3 + t) % 10) as f64, &format!("M{}", (i * 2 + t) % 5)))
                .collect();
            whole.apply(&apps, &rates);

            let joined = join_same_tick(&apps, &rates);
            for (n, shard) in shards.iter_mut().enumerate() {
                // Partition by the parity of the actor's digit.
                let mine = |actor: &str| actor.as_bytes()[1] % 2 == n as u8;
                shard.count_appearances(apps.iter().map(|a| a.actor.as_str()).filter(|a| mine(a)));
                shard.accumulate(joined.iter().filter(|c| mine(&c.actor)).cloned());
            }
        }

        let mut gathered = ActorStats::new(cfg);
        for shard in &shards {
            let local = shard.report(5);
            for snapshot in shard.candidates(&local) {
                gathered.absorb(snapshot);
            }
        }
        assert_eq!(gathered.report(5), whole.report(5));
    }

    fn tick_strategy() -> impl Strategy<Value = (Vec<(u8, u8)>, Vec<(u8, u8)>)> {
        (
            prop::collection::vec((0u8..5, 0u8..4), 0..12),
            prop::collection::vec((0u8..21, 0u8..4), 0..8),
        )
    }

    proptest! {
        #[test]
        fn state_is_monotone(ticks in prop::collection::vec(tick_strategy(), 1..10)) {
            let mut stats = ActorStats::new(open_thresholds());
            let mut previous: Vec<ActorSnapshot> = Vec::new();
            for (apps, rates) in ticks {
                let apps: Vec<_> = apps
                    .iter()
                    .map(|(a, m)| app(&format!("A{a}"), &format!("M{m}")))
                    .collect();
                let rates: Vec<_> = rates
                    .iter()
                    .map(|(r, m)| rate(*r as f64 * 0.5, &format!("M{m}")))
                    .collect();
                stats.apply(&apps, &rates);
                for before in &previous {
                    let now = stats.snapshot(&before.actor).expect("actors are never removed");
                    prop_assert!(now.movie_count >= before.movie_count);
                    prop_assert!(now.rating.vote_units >= before.rating.vote_units);
                    prop_assert!(now.rating.rating_sum >= before.rating.rating_sum);
                }
                previous = (0..5u8)
                    .filter_map(|a| stats.snapshot(&format!("A{a}")))
                    .collect();
            }
        }
    }
}
