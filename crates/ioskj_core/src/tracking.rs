//! Per-quarter tracking of recruitment and spawning biomass.
//!
//! A model is built with a sink type; `NoTracking` compiles the tracking call
//! away entirely.

use crate::dimensions::REGIONS;
use serde::{Deserialize, Serialize};

/// Snapshot of the recruitment and spawning state after a quarter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub year: u32,
    pub quarter: usize,
    pub recruits_determ: f64,
    pub recruits_deviation: f64,
    pub recruits: f64,
    pub biomass_spawning_overall: f64,
    pub biomass_spawning: [f64; REGIONS],
}

/// Accepts a record for every simulated quarter.
pub trait TrackSink {
    fn record(&mut self, record: &TrackRecord);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoTracking;

impl TrackSink for NoTracking {
    #[inline]
    fn record(&mut self, _record: &TrackRecord) {}
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackLog {
    pub records: Vec<TrackRecord>,
}

impl TrackSink for TrackLog {
    fn record(&mut self, record: &TrackRecord) {
        self.records.push(*record);
    }
}

/// Emits each record as a `tracing` event at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceTracker;

impl TrackSink for TraceTracker {
    fn record(&mut self, record: &TrackRecord) {
        tracing::debug!(
            year = record.year,
            quarter = record.quarter,
            recruits_determ = record.recruits_determ,
            recruits_deviation = record.recruits_deviation,
            recruits = record.recruits,
            biomass_spawning_overall = record.biomass_spawning_overall,
            biomass_spawning_w = record.biomass_spawning[0],
            biomass_spawning_m = record.biomass_spawning[1],
            biomass_spawning_e = record.biomass_spawning[2],
            "quarter tracked"
        );
    }
}

impl<T: TrackSink + ?Sized> TrackSink for &mut T {
    fn record(&mut self, record: &TrackRecord) {
        (**self).record(record);
    }
}
