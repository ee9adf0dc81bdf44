use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cf_runtime::metrics::MetricsRegistry;
use cf_runtime::{
    init_tracing, run_dataflow, DirectorySource, JsonLinesSink, ResultSink, Scheduler,
    SchedulerConfig, ShutdownSignal, TracingSink,
};
use cf_views::{ActorStats, QueryConfig};

/// Continuously rank actors from two directories of tab-separated batch files.
#[derive(Debug, Parser)]
#[command(name = "actor_stats")]
struct Args {
    /// Directory receiving `actor\tmovie\tyear` batch files.
    #[arg(long)]
    appearances: PathBuf,
    /// Directory receiving `rate\tmovie\tyear` batch files.
    #[arg(long)]
    ratings: PathBuf,
    /// Minimum real votes for the best-rated ranking (inclusive).
    #[arg(long, default_value_t = QueryConfig::default().min_votes)]
    min_votes: u64,
    /// Minimum movie count for the best-busy ranking (inclusive).
    #[arg(long, default_value_t = QueryConfig::default().min_movies)]
    min_movies: u64,
    #[arg(long, default_value_t = QueryConfig::default().top_k)]
    top_k: usize,
    /// Timely worker threads. One runs the aggregation in place.
    #[arg(long, default_value_t = 1)]
    workers: usize,
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Write reports to stdout as JSON lines instead of log events.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let query = QueryConfig {
        min_votes: args.min_votes,
        min_movies: args.min_movies,
        top_k: args.top_k,
    };
    let schedule = SchedulerConfig {
        tick_interval: Duration::from_millis(args.tick_ms),
        max_ticks: args.max_ticks,
        ..SchedulerConfig::default()
    };
    info!(
        query = %serde_json::to_string(&query)?,
        schedule = %serde_json::to_string(&schedule)?,
        workers = args.workers,
        "actor_stats starting"
    );

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_os_signals()?;
    let metrics = MetricsRegistry::default();
    let source = DirectorySource::new(&args.appearances, &args.ratings);
    let sink: Box<dyn ResultSink + Send> = if args.json {
        Box::new(JsonLinesSink::new(io::stdout()))
    } else {
        Box::new(TracingSink)
    };

    let started = Instant::now();
    let termination = if args.workers > 1 {
        let (termination, _sink) = run_dataflow(
            args.workers,
            query,
            schedule,
            source,
            sink,
            shutdown,
            metrics.clone(),
        )?;
        termination
    } else {
        Scheduler::new(schedule, source, sink, ActorStats::new(query))
            .with_shutdown(shutdown)
            .with_metrics(metrics.clone())
            .run()?
    };

    info!(?termination, "actor_stats stopped");
    eprintln!(
        "{}",
        metrics
            .snapshot()
            .to_json_line("actor_stats", Some(started.elapsed()))?
    );
    Ok(())
}
