//! Result sinks: consumers of each tick's ranked lists.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info};

use cf_core::{Feed, Tick};
use cf_views::TickReport;

pub trait ResultSink {
    /// Diagnostic pass-through of a feed's raw lines, called before parsing.
    fn preview(&mut self, _tick: Tick, _feed: Feed, _lines: &[String]) {}

    fn report(&mut self, report: &TickReport) -> Result<()>;
}

impl<T: ResultSink + ?Sized> ResultSink for Box<T> {
    fn preview(&mut self, tick: Tick, feed: Feed, lines: &[String]) {
        (**self).preview(tick, feed, lines)
    }

    fn report(&mut self, report: &TickReport) -> Result<()> {
        (**self).report(report)
    }
}

/// Emits every ranked list as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn preview(&mut self, tick: Tick, feed: Feed, lines: &[String]) {
        debug!(tick, %feed, ?lines, "raw batch preview");
    }

    fn report(&mut self, report: &TickReport) -> Result<()> {
        let tick = report.tick;
        info!(tick, query = %report.most_prolific.query, entries = ?report.most_prolific.entries, "top-k");
        info!(tick, query = %report.best_rated.query, entries = ?report.best_rated.entries, "top-k");
        info!(tick, query = %report.best_busy.query, entries = ?report.best_busy.entries, "top-k");
        Ok(())
    }
}

/// Writes one JSON document per tick.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn report(&mut self, report: &TickReport) -> Result<()> {
        let line = report.to_json_line()?;
        writeln!(self.out, "{line}").context("failed to write report")?;
        self.out.flush().context("failed to flush report")?;
        Ok(())
    }
}

/// Keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    pub reports: Vec<TickReport>,
    pub previews: Vec<(Tick, Feed, Vec<String>)>,
}

impl ResultSink for VecSink {
    fn preview(&mut self, tick: Tick, feed: Feed, lines: &[String]) {
        self.previews.push((tick, feed, lines.to_vec()));
    }

    fn report(&mut self, report: &TickReport) -> Result<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_round_trip() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.report(&TickReport::empty(0)).unwrap();
        sink.report(&TickReport::empty(1)).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: TickReport = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second, TickReport::empty(1));
        assert!(lines[0].contains("\"query\":\"most_prolific\""));
    }
}
