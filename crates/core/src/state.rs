//! Cumulative per-key state.
//!
//! A [`StateStore`] only ever grows: keys are added on their first merge and
//! accumulators are combined with increments, never replaced or removed.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// A commutative monoid. `Default` is the identity and `combine` must be
/// associative and commutative so that merge order inside a tick is irrelevant.
pub trait Accumulator: Default + Clone {
    fn combine(&mut self, increment: &Self);
}

/// Number of movies an actor appeared in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct MovieCount(pub u64);

impl Accumulator for MovieCount {
    fn combine(&mut self, increment: &Self) {
        self.0 = self.0.saturating_add(increment.0);
    }
}

/// Running rating totals for an actor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingSum {
    pub vote_units: u64,
    pub rating_sum: f64,
}

impl RatingSum {
    /// The contribution of a single rating record.
    pub fn unit(rate: f64) -> Self {
        Self {
            vote_units: 1,
            rating_sum: rate,
        }
    }

    pub fn real_votes(&self) -> u64 {
        self.vote_units.saturating_mul(crate::VOTES_PER_RECORD)
    }

    /// Always derived from the two sums, `None` before the first vote unit.
    pub fn average(&self) -> Option<f64> {
        (self.vote_units > 0).then(|| self.rating_sum / self.vote_units as f64)
    }
}

impl Accumulator for RatingSum {
    fn combine(&mut self, increment: &Self) {
        self.vote_units = self.vote_units.saturating_add(increment.vote_units);
        self.rating_sum += increment.rating_sum;
    }
}

#[derive(Debug, Clone)]
pub struct StateStore<K, A> {
    entries: HashMap<K, A>,
}

impl<K, A> Default for StateStore<K, A> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, A> StateStore<K, A>
where
    K: Hash + Eq,
    A: Accumulator,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine `increment` into the accumulator for `key`, starting from the
    /// identity for unseen keys, and return the new accumulator.
    pub fn merge(&mut self, key: K, increment: A) -> &A {
        let acc = self.entries.entry(key).or_default();
        acc.combine(&increment);
        acc
    }

    /// Merge a whole tick of increments. Increments are first combined per
    /// key, so each touched key is written once. Returns the touched key count.
    pub fn merge_all<I>(&mut self, increments: I) -> usize
    where
        I: IntoIterator<Item = (K, A)>,
    {
        let mut pending: HashMap<K, A> = HashMap::new();
        for (key, inc) in increments {
            pending.entry(key).or_default().combine(&inc);
        }
        let touched = pending.len();
        for (key, inc) in pending {
            self.merge(key, inc);
        }
        touched
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&A>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &A)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn merge_starts_from_identity() {
        let mut store: StateStore<String, MovieCount> = StateStore::new();
        assert_eq!(*store.merge("A1".into(), MovieCount(1)), MovieCount(1));
        assert_eq!(*store.merge("A1".into(), MovieCount(2)), MovieCount(3));
        assert_eq!(store.get("A2"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn untouched_keys_are_preserved() {
        let mut store: StateStore<&str, RatingSum> = StateStore::new();
        store.merge_all([("A1", RatingSum::unit(8.0)), ("A2", RatingSum::unit(6.0))]);
        let touched = store.merge_all([("A1", RatingSum::unit(6.0))]);
        assert_eq!(touched, 1);
        assert_eq!(
            store.get("A1"),
            Some(&RatingSum {
                vote_units: 2,
                rating_sum: 14.0
            })
        );
        assert_eq!(store.get("A2"), Some(&RatingSum::unit(6.0)));
    }

    #[test]
    fn average_is_derived() {
        assert_eq!(RatingSum::default().average(), None);
        let acc = RatingSum {
            vote_units: 4,
            rating_sum: 30.0,
        };
        assert_eq!(acc.average(), Some(7.5));
        assert_eq!(acc.real_votes(), 4000);
    }

    fn increments() -> impl Strategy<Value = Vec<(u8, u32, u8)>> {
        // (key, vote units, rating in half steps); half steps keep float sums exact.
        prop::collection::vec((0u8..6, 1u32..4, 0u8..21), 0..60)
    }

    proptest! {
        #[test]
        fn merge_order_does_not_matter(
            (incs, shuffled, split) in increments().prop_flat_map(|incs| {
                let len = incs.len();
                (Just(incs.clone()), Just(incs).prop_shuffle(), 0..=len)
            })
        ) {
            let as_acc = |&(k, units, half): &(u8, u32, u8)| {
                (k, RatingSum { vote_units: units as u64, rating_sum: half as f64 * 0.5 })
            };

            let mut one_shot: StateStore<u8, RatingSum> = StateStore::new();
            one_shot.merge_all(incs.iter().map(as_acc));

            // Same increments, permuted and split into a batched and a one-by-one part.
            let mut grouped: StateStore<u8, RatingSum> = StateStore::new();
            grouped.merge_all(shuffled[..split].iter().map(as_acc));
            for inc in &shuffled[split..] {
                let (k, acc) = as_acc(inc);
                grouped.merge(k, acc);
            }

            prop_assert_eq!(one_shot.len(), grouped.len());
            for (k, acc) in one_shot.iter() {
                prop_assert_eq!(grouped.get(k), Some(acc));
            }
        }

        #[test]
        fn accumulators_never_decrease(ticks in prop::collection::vec(increments(), 1..8)) {
            let mut store: StateStore<u8, RatingSum> = StateStore::new();
            let mut previous: HashMap<u8, RatingSum> = HashMap::new();
            for tick in ticks {
                store.merge_all(tick.iter().map(|&(k, units, half)| {
                    (k, RatingSum { vote_units: units as u64, rating_sum: half as f64 * 0.5 })
                }));
                for (k, before) in &previous {
                    let now = store.get(k).expect("keys are never removed");
                    prop_assert!(now.vote_units >= before.vote_units);
                    prop_assert!(now.rating_sum >= before.rating_sum);
                }
                previous = store.iter().map(|(k, v)| (*k, *v)).collect();
            }
        }
    }
}
