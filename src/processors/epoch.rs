//! Time epoch reconciliation.
//!
//! Legacy capture logs record seconds of the UTC day; the trajectory is in
//! GPS week seconds. A relative capture time becomes absolute by adding the
//! seconds from week start to the trajectory's day and the GPS - UTC leap
//! seconds.

use crate::core::loaders::TrajectoryTable;

/// Converts relative capture times into absolute GPS week seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReconciler {
    day_of_week_offset: f64,
    leap_seconds: f64,
}

impl EpochReconciler {
    pub fn new(day_of_week_offset: f64, leap_seconds: f64) -> Self {
        Self {
            day_of_week_offset,
            leap_seconds,
        }
    }

    /// Reconciler for the day covered by `table`.
    pub fn for_trajectory(table: &TrajectoryTable, leap_seconds: f64) -> Self {
        Self::new(table.day_of_week_offset(), leap_seconds)
    }

    #[inline]
    pub fn day_of_week_offset(&self) -> f64 {
        self.day_of_week_offset
    }

    #[inline]
    pub fn leap_seconds(&self) -> f64 {
        self.leap_seconds
    }

    /// `day_of_week_offset + capture_time + leap_seconds`
    #[inline]
    pub fn to_absolute(&self, capture_time: f64) -> f64 {
        self.day_of_week_offset + capture_time + self.leap_seconds
    }
}
