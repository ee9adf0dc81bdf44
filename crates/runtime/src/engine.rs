use anyhow::Result;

use cf_core::Tick;
use cf_views::{ActorStats, TickReport};

use crate::source::ParsedBatch;

/// What an engine produced for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub report: TickReport,
    /// Actor/rating pairs the same-tick join produced.
    pub joined_pairs: u64,
}

/// Applies one tick of parsed input to the aggregate state and renders the
/// tick's views. Ticks are handed over strictly in increasing order.
pub trait TickEngine {
    fn run_tick(&mut self, tick: Tick, batch: ParsedBatch) -> Result<TickOutcome>;
}

/// Single-threaded engine: the aggregators are applied in place.
impl TickEngine for ActorStats {
    fn run_tick(&mut self, tick: Tick, batch: ParsedBatch) -> Result<TickOutcome> {
        let joined = self.apply(&batch.appearances, &batch.ratings);
        Ok(TickOutcome {
            report: self.report(tick),
            joined_pairs: joined as u64,
        })
    }
}
