use std::collections::BTreeMap;

use reelsignal_common::types::{SourceId, SourceOutcome, SourceStatus};

/// Counters from one pipeline run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub sources_succeeded: u32,
    pub sources_failed_soft: u32,
    pub sources_failed_hard: u32,
    pub sources_timed_out: u32,
    pub signals_registered: u32,
    pub signals_deduplicated: u32,
    pub comments_analyzed: u32,
    pub claims_attached: u32,
    pub regions_scored: u32,
    pub regions_excluded: u32,
    pub spikes_detected: u32,
}

impl RunStats {
    pub fn note_statuses(&mut self, statuses: &BTreeMap<SourceId, SourceStatus>) {
        for status in statuses.values() {
            match status.outcome {
                SourceOutcome::Succeeded => self.sources_succeeded += 1,
                SourceOutcome::FailedSoft => self.sources_failed_soft += 1,
                SourceOutcome::FailedHard => self.sources_failed_hard += 1,
                SourceOutcome::TimedOut => self.sources_timed_out += 1,
            }
        }
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Pipeline Run Complete ===")?;
        writeln!(f, "Sources succeeded:  {}", self.sources_succeeded)?;
        writeln!(f, "Sources soft-fail:  {}", self.sources_failed_soft)?;
        writeln!(f, "Sources hard-fail:  {}", self.sources_failed_hard)?;
        writeln!(f, "Sources timed out:  {}", self.sources_timed_out)?;
        writeln!(f, "Signals registered: {}", self.signals_registered)?;
        writeln!(f, "Signals deduped:    {}", self.signals_deduplicated)?;
        writeln!(f, "Comments analyzed:  {}", self.comments_analyzed)?;
        writeln!(f, "Claims attached:    {}", self.claims_attached)?;
        writeln!(f, "Regions scored:     {}", self.regions_scored)?;
        writeln!(f, "Regions excluded:   {}", self.regions_excluded)?;
        writeln!(f, "Interest spikes:    {}", self.spikes_detected)?;
        Ok(())
    }
}
