//! Runtime for castflow: tick scheduling, batch sources, result sinks and the
//! timely dataflow engine.

use anyhow::{anyhow, Result};
use tracing::{info, Level};

pub mod dataflow;
pub mod engine;
pub mod metrics;
pub mod scheduler;
pub mod shutdown;
pub mod sink;
pub mod source;

pub use dataflow::{run_dataflow, DataflowEngine};
pub use engine::{TickEngine, TickOutcome};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState, Termination};
pub use shutdown::ShutdownSignal;
pub use sink::{JsonLinesSink, ResultSink, TracingSink, VecSink};
pub use source::{BatchSource, DirectorySource, ParsedBatch, RawBatch, ScriptedSource};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .try_init();
}

/// Start a single-process timely runtime and execute the provided closure once per worker.
/// Returns each worker's result in worker order.
pub fn start_runtime<T, F>(workers: usize, f: F) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: Fn(usize, &mut timely::worker::Worker<timely::communication::allocator::Generic>) -> T
        + Send
        + Sync
        + 'static,
{
    info!(%workers, "starting timely runtime");
    let guards = timely::execute(timely::Config::process(workers.max(1)), move |worker| {
        let index = worker.index();
        f(index, worker)
    })
    .map_err(|e| anyhow!("failed to start timely runtime: {e}"))?;

    guards
        .join()
        .into_iter()
        .map(|result| result.map_err(|e| anyhow!("timely worker failed: {e}")))
        .collect()
}
