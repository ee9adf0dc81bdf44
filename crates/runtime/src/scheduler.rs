//! The tick driver.
//!
//! A [`Scheduler`] is either `Running` or `Terminated`. While running, every
//! tick pulls one raw batch, previews it, parses it, hands it to the engine
//! and emits the engine's report. Once terminated no further tick executes.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use cf_core::{CoreError, Feed, Tick};

use crate::engine::TickEngine;
use crate::metrics::{MetricsRegistry, TickTimer};
use crate::shutdown::ShutdownSignal;
use crate::sink::ResultSink;
use crate::source::BatchSource;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// Raw lines per feed handed to the sink's preview.
    pub preview_lines: usize,
    pub max_ticks: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            preview_lines: 15,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Shutdown,
    TickLimit,
    Failed { tick: Tick, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Terminated(Termination),
}

pub struct Scheduler<S, K, E> {
    cfg: SchedulerConfig,
    source: S,
    sink: K,
    engine: E,
    shutdown: ShutdownSignal,
    metrics: MetricsRegistry,
    state: SchedulerState,
    next_tick: Tick,
}

impl<S, K, E> Scheduler<S, K, E>
where
    S: BatchSource,
    K: ResultSink,
    E: TickEngine,
{
    pub fn new(cfg: SchedulerConfig, source: S, sink: K, engine: E) -> Self {
        Self {
            cfg,
            source,
            sink,
            engine,
            shutdown: ShutdownSignal::new(),
            metrics: MetricsRegistry::default(),
            state: SchedulerState::Running,
            next_tick: 0,
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn next_tick(&self) -> Tick {
        self.next_tick
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn into_parts(self) -> (S, K, E) {
        (self.source, self.sink, self.engine)
    }

    /// Run one tick without waiting. Does nothing once terminated.
    ///
    /// A tick that fails to parse moves the scheduler to `Terminated` and
    /// returns the error; merges from earlier ticks are kept. Unreadable
    /// input and sink errors are logged and do not stop the scheduler.
    pub fn step(&mut self) -> Result<()> {
        if self.state != SchedulerState::Running {
            return Ok(());
        }
        if self.shutdown.is_triggered() {
            self.terminate(Termination::Shutdown);
            return Ok(());
        }
        if self.limit_reached() {
            self.terminate(Termination::TickLimit);
            return Ok(());
        }

        let tick = self.next_tick;
        if let Err(e) = self.execute_tick(tick) {
            if e.downcast_ref::<CoreError>().is_some() {
                self.metrics.inc_parse_failures(1);
            }
            error!(tick, error = %format!("{e:#}"), "tick failed");
            self.terminate(Termination::Failed {
                tick,
                reason: format!("{e:#}"),
            });
            return Err(e);
        }
        self.next_tick += 1;

        if self.limit_reached() {
            self.terminate(Termination::TickLimit);
        }
        Ok(())
    }

    /// Drive ticks at the configured cadence until terminated.
    pub fn run(&mut self) -> Result<Termination> {
        info!(cfg = ?self.cfg, "scheduler running");
        let mut deadline = Instant::now();
        loop {
            self.step()?;
            if let SchedulerState::Terminated(reason) = &self.state {
                return Ok(reason.clone());
            }

            deadline += self.cfg.tick_interval;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                warn!(
                    behind_ms = (now - deadline).as_millis() as u64,
                    "tick overran its interval"
                );
                deadline = now;
            }
        }
    }

    fn execute_tick(&mut self, tick: Tick) -> Result<()> {
        let timer = TickTimer::start();
        let raw = self.source.next_batch(tick)?;

        for feed in [Feed::Appearance, Feed::Rating] {
            let lines = raw.lines(feed);
            let shown = lines.len().min(self.cfg.preview_lines);
            self.sink.preview(tick, feed, &lines[..shown]);
        }

        let batch = raw.parse()?;
        let appearances = batch.appearances.len();
        let ratings = batch.ratings.len();

        let outcome = self.engine.run_tick(tick, batch)?;
        // A report the sink cannot take is dropped; the state it reflects is kept.
        if let Err(e) = self.sink.report(&outcome.report) {
            self.metrics.inc_sink_failures(1);
            warn!(tick, error = %format!("{e:#}"), "sink rejected report");
        }

        self.metrics.inc_ticks(1);
        self.metrics.inc_joined_pairs(outcome.joined_pairs);
        self.metrics.inc_appearance_records(appearances as u64);
        self.metrics.inc_rating_records(ratings as u64);
        if appearances == 0 && ratings == 0 {
            self.metrics.inc_empty_ticks(1);
        }
        self.metrics.record_tick_latency(timer.elapsed());
        info!(
            tick,
            appearances,
            ratings,
            joined = outcome.joined_pairs,
            elapsed_us = timer.elapsed().as_micros() as u64,
            "tick complete"
        );
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        self.cfg.max_ticks.map_or(false, |max| self.next_tick >= max)
    }

    fn terminate(&mut self, reason: Termination) {
        info!(?reason, next_tick = self.next_tick, "scheduler terminated");
        self.state = SchedulerState::Terminated(reason);
    }
}
