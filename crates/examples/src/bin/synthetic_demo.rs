use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cf_core::Tick;
use cf_runtime::metrics::MetricsRegistry;
use cf_runtime::{
    init_tracing, run_dataflow, RawBatch, SchedulerConfig, ScriptedSource, ShutdownSignal, VecSink,
};
use cf_views::QueryConfig;

/// Run generated feeds through the dataflow engine and log the final rankings.
#[derive(Debug, Parser)]
#[command(name = "synthetic_demo")]
struct Args {
    #[arg(long, default_value_t = 2)]
    workers: usize,
    #[arg(long, default_value_t = 20)]
    ticks: u64,
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
}

const ACTORS: u64 = 40;
const MOVIES: u64 = 25;

/// Deterministic feeds with some skew: a few actors appear far more often and
/// low-numbered movies are rated higher.
fn generate(tick: Tick) -> RawBatch {
    let appearances = (0..60u64).map(|i| {
        let actor = if i % 5 == 0 { i % 4 } else { (tick * 13 + i * 7) % ACTORS };
        let movie = (tick * 3 + i) % MOVIES;
        format!("Actor {actor}\tMovie {movie}\t{}", 1990 + movie)
    });
    let ratings = (0..30u64).map(|i| {
        let movie = (tick * 5 + i * 2) % MOVIES;
        let rate = 9.5 - (movie as f64) * 0.2 - ((i % 3) as f64) * 0.5;
        format!("{rate:.1}\tMovie {movie}\t{}", 1990 + movie)
    });
    RawBatch::new(appearances, ratings)
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    info!(?args, "synthetic_demo starting");

    let query = QueryConfig {
        min_votes: 20_000,
        min_movies: 10,
        top_k: 10,
    };
    let schedule = SchedulerConfig {
        tick_interval: Duration::from_millis(args.tick_ms),
        max_ticks: Some(args.ticks),
        ..SchedulerConfig::default()
    };
    let source = ScriptedSource::new((0..args.ticks).map(generate));
    let metrics = MetricsRegistry::default();

    let started = Instant::now();
    let (termination, sink) = run_dataflow(
        args.workers,
        query,
        schedule,
        source,
        VecSink::default(),
        ShutdownSignal::new(),
        metrics.clone(),
    )?;
    info!(?termination, "synthetic_demo finished");

    if let Some(last) = sink.reports.last() {
        for entry in &last.most_prolific.entries {
            info!(query = %last.most_prolific.query, actor = %entry.actor, movies = entry.movie_count);
        }
        for entry in &last.best_rated.entries {
            info!(query = %last.best_rated.query, actor = %entry.actor, votes = entry.real_votes, average = entry.average_rating);
        }
        for entry in &last.best_busy.entries {
            info!(query = %last.best_busy.query, actor = %entry.actor, average = entry.average_rating, movies = entry.movie_count);
        }
    }
    println!(
        "{}",
        metrics
            .snapshot()
            .to_json_line("synthetic_demo", Some(started.elapsed()))?
    );
    Ok(())
}
