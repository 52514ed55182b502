use std::collections::HashMap;

use crate::models::EntityKind;

/// Highest fraction reported while a run is still RUNNING. Only a
/// successful finish reports 1.0.
pub const PROGRESS_CEILING: f32 = 0.99;

/// Imported-over-total progress across the kinds of one run.
///
/// Each kind starts with the number of changelog ids as its estimate and is
/// corrected once the resolver reports its total. The reported fraction
/// never decreases.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    totals: HashMap<EntityKind, u64>,
    imported: u64,
    reported: f32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate(&mut self, kind: EntityKind, total: u64) {
        self.totals.insert(kind, total);
    }

    /// Replaces the estimate for `kind` with an authoritative total.
    pub fn set_total(&mut self, kind: EntityKind, total: u64) {
        self.totals.insert(kind, total);
    }

    pub fn advance(&mut self, imported: usize) {
        self.imported += imported as u64;
    }

    pub fn imported(&self) -> u64 {
        self.imported
    }

    /// `imported` saturated into the record's count column.
    pub fn count(&self) -> i32 {
        i32::try_from(self.imported).unwrap_or(i32::MAX)
    }

    /// The denominator never drops below what has already been imported,
    /// so a resolver total smaller than the written count reads as the
    /// ceiling.
    pub fn fraction(&mut self) -> f32 {
        let total: u64 = self.totals.values().sum::<u64>().max(self.imported);
        let current = if total == 0 {
            0.0
        } else {
            ((self.imported as f64 / total as f64) as f32).min(PROGRESS_CEILING)
        };
        self.reported = self.reported.max(current);
        self.reported
    }
}
