//! Timely dataflow rendition of the tick engine.
//!
//! Each tick is one timely timestamp. Appearances and ratings are exchanged by
//! movie so the same-tick join runs locally on every worker; appearances and
//! join output are then exchanged by actor into a shard operator that owns
//! that shard's [`ActorStats`]. After a tick, every shard that changed sends
//! its local top-K candidates to worker 0, which keeps the latest candidate
//! set per shard and ranks their union.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

use timely::communication::allocator::Generic;
use timely::communication::Allocate;
use timely::dataflow::channels::pact::Exchange as ExchangePact;
use timely::dataflow::operators::probe::Handle as ProbeHandle;
use timely::dataflow::operators::{Exchange, Input, Inspect, Operator, Probe};
use timely::dataflow::InputHandle;
use timely::worker::Worker;

use cf_core::{RatingSum, Tick};
use cf_views::{join_on_movie, ActorSnapshot, ActorStats, QueryConfig, RatingContribution};

use crate::engine::{TickEngine, TickOutcome};
use crate::metrics::MetricsRegistry;
use crate::scheduler::{Scheduler, SchedulerConfig, Termination};
use crate::shutdown::ShutdownSignal;
use crate::sink::ResultSink;
use crate::source::{BatchSource, ParsedBatch};
use crate::start_runtime;

/// (actor, movie)
type AppearanceRow = (String, String);
/// (movie, rate)
type RatingRow = (String, f64);
/// (actor, rate)
type ContributionRow = (String, f64);
/// (shard, actor, movie count, vote units, rating sum)
type CandidateRow = (usize, String, u64, u64, f64);

const LEADER: usize = 0;

fn route(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

pub struct DataflowEngine<'w, A: Allocate> {
    worker: &'w mut Worker<A>,
    appearances: InputHandle<Tick, AppearanceRow>,
    ratings: InputHandle<Tick, RatingRow>,
    probe: ProbeHandle<Tick>,
    gathered: Rc<RefCell<Vec<(Tick, CandidateRow)>>>,
    latest: HashMap<usize, Vec<ActorSnapshot>>,
    joined: Arc<AtomicU64>,
    cfg: QueryConfig,
}

impl<'w, A: Allocate> DataflowEngine<'w, A> {
    /// Build the dataflow on this worker. Every worker must call this, all
    /// with the same `joined` counter, which collects join output counts.
    pub fn build(worker: &'w mut Worker<A>, cfg: QueryConfig, joined: Arc<AtomicU64>) -> Self {
        let mut appearances = InputHandle::new();
        let mut ratings = InputHandle::new();
        let mut probe = ProbeHandle::new();
        let gathered = Rc::new(RefCell::new(Vec::new()));

        let shard = worker.index();
        let collected = Rc::clone(&gathered);
        let join_count = Arc::clone(&joined);

        worker.dataflow::<Tick, _, _>(|scope| {
            let apps = scope.input_from(&mut appearances);
            let rates = scope.input_from(&mut ratings);

            let mut pending: HashMap<Tick, (Vec<AppearanceRow>, Vec<RatingRow>)> = HashMap::new();
            let mut app_buf = Vec::new();
            let mut rate_buf = Vec::new();
            let contributions = apps.binary_notify(
                &rates,
                ExchangePact::new(|row: &AppearanceRow| route(&row.1)),
                ExchangePact::new(|row: &RatingRow| route(&row.0)),
                "SameTickJoin",
                Vec::new(),
                move |apps_in, rates_in, output, notificator| {
                    apps_in.for_each(|time, data| {
                        data.swap(&mut app_buf);
                        pending
                            .entry(*time.time())
                            .or_insert_with(Default::default)
                            .0
                            .extend(app_buf.drain(..));
                        notificator.notify_at(time.retain());
                    });
                    rates_in.for_each(|time, data| {
                        data.swap(&mut rate_buf);
                        pending
                            .entry(*time.time())
                            .or_insert_with(Default::default)
                            .1
                            .extend(rate_buf.drain(..));
                        notificator.notify_at(time.retain());
                    });
                    notificator.for_each(|time, _, _| {
                        if let Some((apps, rates)) = pending.remove(time.time()) {
                            let joined = join_on_movie(
                                apps.iter().map(|(actor, movie)| (actor.as_str(), movie.as_str())),
                                rates.iter().map(|(movie, rate)| (movie.as_str(), *rate)),
                            );
                            join_count.fetch_add(joined.len() as u64, Ordering::SeqCst);
                            let mut session = output.session(&time);
                            for c in joined {
                                session.give((c.actor, c.rate));
                            }
                        }
                    });
                },
            );

            let mut stats = ActorStats::new(cfg);
            let mut pending: HashMap<Tick, (Vec<AppearanceRow>, Vec<ContributionRow>)> = HashMap::new();
            let mut app_buf = Vec::new();
            let mut contrib_buf = Vec::new();
            let candidates = apps.binary_notify(
                &contributions,
                ExchangePact::new(|row: &AppearanceRow| route(&row.0)),
                ExchangePact::new(|row: &ContributionRow| route(&row.0)),
                "ActorShard",
                Vec::new(),
                move |apps_in, contrib_in, output, notificator| {
                    apps_in.for_each(|time, data| {
                        data.swap(&mut app_buf);
                        pending
                            .entry(*time.time())
                            .or_insert_with(Default::default)
                            .0
                            .extend(app_buf.drain(..));
                        notificator.notify_at(time.retain());
                    });
                    contrib_in.for_each(|time, data| {
                        data.swap(&mut contrib_buf);
                        pending
                            .entry(*time.time())
                            .or_insert_with(Default::default)
                            .1
                            .extend(contrib_buf.drain(..));
                        notificator.notify_at(time.retain());
                    });
                    notificator.for_each(|time, _, _| {
                        let Some((apps, contribs)) = pending.remove(time.time()) else {
                            return;
                        };
                        let tick = *time.time();
                        stats.count_appearances(apps.iter().map(|(actor, _)| actor.as_str()));
                        stats.accumulate(
                            contribs
                                .into_iter()
                                .map(|(actor, rate)| RatingContribution { actor, rate }),
                        );
                        let local = stats.report(tick);
                        let candidates = stats.candidates(&local);
                        debug!(
                            shard,
                            tick,
                            actors = stats.actor_count(),
                            candidates = candidates.len(),
                            "shard updated"
                        );
                        let mut session = output.session(&time);
                        for s in candidates {
                            session.give((
                                shard,
                                s.actor,
                                s.movie_count,
                                s.rating.vote_units,
                                s.rating.rating_sum,
                            ));
                        }
                    });
                },
            );

            candidates
                .exchange(|_| LEADER as u64)
                .inspect_batch(move |time, rows: &[CandidateRow]| {
                    collected
                        .borrow_mut()
                        .extend(rows.iter().cloned().map(|row| (*time, row)));
                })
                .probe_with(&mut probe);
        });

        Self {
            worker,
            appearances,
            ratings,
            probe,
            gathered,
            latest: HashMap::new(),
            joined,
            cfg,
        }
    }
}

impl<'w, A: Allocate> TickEngine for DataflowEngine<'w, A> {
    fn run_tick(&mut self, tick: Tick, batch: ParsedBatch) -> Result<TickOutcome> {
        let frontier = *self.appearances.time();
        if tick < frontier {
            bail!("tick {tick} is behind the dataflow frontier {frontier}");
        }
        if tick > frontier {
            self.appearances.advance_to(tick);
            self.ratings.advance_to(tick);
        }

        for a in batch.appearances {
            self.appearances.send((a.actor, a.movie));
        }
        for r in batch.ratings {
            self.ratings.send((r.movie, r.rate));
        }

        let next = tick + 1;
        self.appearances.advance_to(next);
        self.ratings.advance_to(next);
        while self.probe.less_than(&next) {
            self.worker.step();
        }

        let mut fresh: HashMap<usize, Vec<ActorSnapshot>> = HashMap::new();
        for (time, (shard, actor, movie_count, vote_units, rating_sum)) in
            self.gathered.borrow_mut().drain(..)
        {
            debug_assert_eq!(time, tick);
            fresh.entry(shard).or_default().push(ActorSnapshot {
                actor,
                movie_count,
                rating: RatingSum {
                    vote_units,
                    rating_sum,
                },
            });
        }
        // A shard that saw no input this tick still holds its previous candidates.
        self.latest.extend(fresh);

        let mut merged = ActorStats::new(self.cfg);
        for snapshot in self.latest.values().flatten() {
            merged.absorb(snapshot.clone());
        }
        // Every join operator has finished this tick once the probe passed it.
        Ok(TickOutcome {
            report: merged.report(tick),
            joined_pairs: self.joined.swap(0, Ordering::SeqCst),
        })
    }
}

/// Run the scheduler over a `workers`-thread timely runtime. Worker 0 owns the
/// source, the sink and the scheduler; the other workers only host shards.
/// Returns how the scheduler stopped together with the sink.
pub fn run_dataflow<S, K>(
    workers: usize,
    query: QueryConfig,
    schedule: SchedulerConfig,
    source: S,
    sink: K,
    shutdown: ShutdownSignal,
    metrics: MetricsRegistry,
) -> Result<(Termination, K)>
where
    S: BatchSource + Send + 'static,
    K: ResultSink + Send + 'static,
{
    let parts = Arc::new(Mutex::new(Some((source, sink))));
    let joined = Arc::new(AtomicU64::new(0));

    let results = start_runtime(workers, move |index, worker: &mut Worker<Generic>| {
        let engine = DataflowEngine::build(worker, query, Arc::clone(&joined));
        if index != LEADER {
            return Ok(None);
        }
        let (source, sink) = parts
            .lock()
            .map_err(|_| anyhow!("scheduler parts lock poisoned"))?
            .take()
            .context("scheduler parts already taken")?;

        info!(workers, "dataflow scheduler starting on worker {index}");
        let mut scheduler = Scheduler::new(schedule.clone(), source, sink, engine)
            .with_shutdown(shutdown.clone())
            .with_metrics(metrics.clone());
        let outcome = scheduler.run();
        let (_, sink, _) = scheduler.into_parts();
        outcome.map(|termination| Some((termination, sink)))
    })?;

    let mut leader = None;
    for result in results {
        if let Some(done) = result? {
            leader = Some(done);
        }
    }
    leader.context("leader worker returned no result")
}
