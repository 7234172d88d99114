//! Nearest-time association of capture times with trajectory samples.
//!
//! For a target time the matcher selects the trajectory sample whose
//! `gps_time` is closest, considering only samples inside the inclusive
//! window `[target - window, target + window]`. Equidistant candidates
//! resolve to the lowest sample index. Finding nothing is a regular outcome
//! ([`MatchResult::NoMatch`]), not an error.
//!
//! Two search strategies return identical results:
//! - `BinarySearch` bounds the window with `partition_point` on the
//!   time-ordered table and scans only the samples inside it.
//! - `Linear` filters the whole table per target.
//!
//! Lookups are independent and read-only, so [`match_all`] runs them in
//! parallel with rayon.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::MatchingConfig;
use crate::core::loaders::{TrajectorySample, TrajectoryTable};

/// Search implementation used by the matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Binary search for the window bounds, then scan the window.
    #[default]
    BinarySearch,
    /// Filter every sample of the table.
    Linear,
}

/// Outcome of associating one target time with the trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult<'a> {
    Matched {
        /// Index of the sample in the table.
        index: usize,
        sample: &'a TrajectorySample,
        /// `target_time - sample.gps_time`
        time_offset: f64,
    },
    NoMatch {
        target_time: f64,
    },
}

impl<'a> MatchResult<'a> {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    pub fn sample(&self) -> Option<&'a TrajectorySample> {
        match self {
            MatchResult::Matched { sample, .. } => Some(*sample),
            MatchResult::NoMatch { .. } => None,
        }
    }

    pub fn time_offset(&self) -> Option<f64> {
        match self {
            MatchResult::Matched { time_offset, .. } => Some(*time_offset),
            MatchResult::NoMatch { .. } => None,
        }
    }
}

/// Pick the closest candidate; strict `<` keeps the earliest on ties.
fn closest<'a, I>(candidates: I, target: f64) -> Option<(usize, &'a TrajectorySample)>
where
    I: Iterator<Item = (usize, &'a TrajectorySample)>,
{
    let mut best: Option<(usize, &'a TrajectorySample, f64)> = None;
    for (index, sample) in candidates {
        let distance = (sample.gps_time - target).abs();
        match best {
            Some((_, _, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, sample, distance)),
        }
    }
    best.map(|(index, sample, _)| (index, sample))
}

fn search_linear(samples: &[TrajectorySample], target: f64, window: f64) -> Option<(usize, &TrajectorySample)> {
    let low = target - window;
    let high = target + window;
    let in_window = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.gps_time >= low && s.gps_time <= high);
    closest(in_window, target)
}

fn search_binary(samples: &[TrajectorySample], target: f64, window: f64) -> Option<(usize, &TrajectorySample)> {
    let low = target - window;
    let high = target + window;
    let start = samples.partition_point(|s| s.gps_time < low);
    let in_window = samples[start..]
        .iter()
        .enumerate()
        .map(|(offset, s)| (start + offset, s))
        .take_while(|(_, s)| s.gps_time <= high);
    closest(in_window, target)
}

/// Find the sample closest to `target_time` within the configured window.
///
/// # Example
///
/// ```
/// use georef_pipeline::core::loaders::{TrajectorySample, TrajectoryTable, TrajectoryUnits};
/// use georef_pipeline::processors::matching::find_nearest;
/// use georef_pipeline::MatchingConfig;
///
/// let sample = |gps_time, heading| TrajectorySample {
///     gps_time, x: 0.0, y: 0.0, z: 0.0, roll: 0.0, pitch: 0.0, heading,
/// };
/// let samples = vec![sample(399_999.9, 0.0), sample(400_000.05, -10.0), sample(400_000.3, 5.0)];
/// let table = TrajectoryTable::new(samples, TrajectoryUnits::default(), None).unwrap();
///
/// let config = MatchingConfig { window_s: 0.1, ..Default::default() };
/// let result = find_nearest(&table, 400_000.04, &config);
/// assert_eq!(result.sample().map(|s| s.heading), Some(-10.0));
/// ```
pub fn find_nearest<'a>(
    table: &'a TrajectoryTable,
    target_time: f64,
    config: &MatchingConfig,
) -> MatchResult<'a> {
    let window = config.window_s.abs();
    if !target_time.is_finite() || !window.is_finite() {
        return MatchResult::NoMatch { target_time };
    }

    let samples = table.samples();
    let found = match config.strategy {
        SearchStrategy::BinarySearch => search_binary(samples, target_time, window),
        SearchStrategy::Linear => search_linear(samples, target_time, window),
    };

    match found {
        Some((index, sample)) => MatchResult::Matched {
            index,
            sample,
            time_offset: target_time - sample.gps_time,
        },
        None => MatchResult::NoMatch { target_time },
    }
}

/// Match every target time, in parallel. Results keep the order of `targets`.
pub fn match_all<'a>(
    table: &'a TrajectoryTable,
    targets: &[f64],
    config: &MatchingConfig,
) -> Vec<MatchResult<'a>> {
    let results: Vec<MatchResult<'a>> = targets
        .par_iter()
        .map(|&target| find_nearest(table, target, config))
        .collect();

    let matched = results.iter().filter(|r| r.is_match()).count();
    log::info!(
        "Matched {} of {} capture times (window +/-{} s)",
        matched,
        targets.len(),
        config.window_s
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::TrajectoryUnits;

    fn sample(gps_time: f64, heading: f32) -> TrajectorySample {
        TrajectorySample {
            gps_time,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            roll: 0.0,
            pitch: 0.0,
            heading,
        }
    }

    fn table(times: &[f64]) -> TrajectoryTable {
        let samples = times.iter().map(|&t| sample(t, 0.0)).collect();
        TrajectoryTable::new(samples, TrajectoryUnits::default(), None).unwrap()
    }

    fn config(window_s: f64, strategy: SearchStrategy) -> MatchingConfig {
        MatchingConfig { window_s, strategy }
    }

    const STRATEGIES: [SearchStrategy; 2] = [SearchStrategy::BinarySearch, SearchStrategy::Linear];

    #[test]
    fn test_example_match_within_window() {
        let table = TrajectoryTable::new(
            vec![sample(399_999.9, 0.0), sample(400_000.05, -10.0), sample(400_000.3, 5.0)],
            TrajectoryUnits::default(),
            None,
        )
        .unwrap();

        for strategy in STRATEGIES {
            let result = find_nearest(&table, 400_000.04, &config(0.1, strategy));
            match result {
                MatchResult::Matched { index, sample, time_offset } => {
                    assert_eq!(index, 1);
                    assert_eq!(sample.heading, -10.0);
                    assert!((time_offset + 0.01).abs() < 1e-6);
                }
                other => panic!("Expected match, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_no_match_outside_window() {
        let table = table(&[100.0, 100.2, 100.4]);
        for strategy in STRATEGIES {
            let result = find_nearest(&table, 100.1, &config(0.05, strategy));
            assert_eq!(result, MatchResult::NoMatch { target_time: 100.1 });
            assert!(result.sample().is_none());
            assert!(result.time_offset().is_none());
        }
    }

    #[test]
    fn test_window_is_inclusive() {
        let table = table(&[10.0, 10.5]);
        for strategy in STRATEGIES {
            let result = find_nearest(&table, 10.25, &config(0.25, strategy));
            assert_eq!(result.sample().map(|s| s.gps_time), Some(10.0));
        }
    }

    #[test]
    fn test_tie_breaks_to_earlier_index() {
        let table = table(&[9.0, 10.0, 11.0, 12.0]);
        for strategy in STRATEGIES {
            let result = find_nearest(&table, 10.5, &config(1.0, strategy));
            match result {
                MatchResult::Matched { index, .. } => assert_eq!(index, 1),
                other => panic!("Expected match, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_target_outside_table() {
        let table = table(&[10.0, 11.0]);
        for strategy in STRATEGIES {
            assert!(!find_nearest(&table, 5.0, &config(0.5, strategy)).is_match());
            assert!(!find_nearest(&table, 20.0, &config(0.5, strategy)).is_match());
            assert!(find_nearest(&table, 11.4, &config(0.5, strategy)).is_match());
        }
    }

    #[test]
    fn test_non_finite_target() {
        let table = table(&[10.0, 11.0]);
        let result = find_nearest(&table, f64::NAN, &MatchingConfig::default());
        assert!(!result.is_match());
    }

    #[test]
    fn test_strategies_agree_and_results_are_minimal() {
        // 200 Hz trajectory with a gap, targets spread across and beyond it
        let mut times: Vec<f64> = (0..2000).map(|i| 345_600.0 + i as f64 * 0.005).collect();
        times.retain(|t| !(345_602.0..345_603.0).contains(t));
        let table = table(&times);

        // offset keeps every target well away from window edges and midpoints
        let targets: Vec<f64> = (0..700)
            .map(|i| 345_599.900_000_3 + i as f64 * 0.015_31)
            .collect();

        for window in [0.0025, 0.01, 0.05, 0.1] {
            let binary = match_all(&table, &targets, &config(window, SearchStrategy::BinarySearch));
            let linear = match_all(&table, &targets, &config(window, SearchStrategy::Linear));
            assert_eq!(binary, linear);

            for (target, result) in targets.iter().zip(&binary) {
                let best = times
                    .iter()
                    .map(|t| (t - target).abs())
                    .filter(|d| *d <= window)
                    .fold(f64::INFINITY, f64::min);

                match result {
                    MatchResult::Matched { sample, time_offset, .. } => {
                        assert!(time_offset.abs() <= window);
                        assert_eq!((sample.gps_time - target).abs(), best);
                    }
                    MatchResult::NoMatch { .. } => assert!(best.is_infinite()),
                }
            }
        }
    }

    #[test]
    fn test_match_all_preserves_order() {
        let table = table(&[1.0, 2.0, 3.0]);
        let targets = [3.01, 0.0, 1.02, 2.0];
        let results = match_all(&table, &targets, &config(0.05, SearchStrategy::BinarySearch));

        let indices: Vec<Option<usize>> = results
            .iter()
            .map(|r| match r {
                MatchResult::Matched { index, .. } => Some(*index),
                MatchResult::NoMatch { .. } => None,
            })
            .collect();
        assert_eq!(indices, vec![Some(2), None, Some(0), Some(1)]);
    }
}
