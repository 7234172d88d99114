//! Metadata table assembly.
//!
//! Turns capture records (with inline navigation or a trajectory match) into
//! [`OutputRow`]s, orders them by capture time and fills the time-of-day
//! column.

use chrono::NaiveTime;

use crate::core::capture::{CaptureRecord, InlineNavigation};
use crate::core::loaders::{TrajectoryUnits, SECONDS_PER_DAY};
use crate::core::transforms::{normalize_inline, normalize_sample, Attitude, Position, YawConvention};
use crate::core::writers::OutputRow;
use crate::processors::matching::MatchResult;

impl OutputRow {
    fn with_navigation(
        record: &CaptureRecord,
        position: Position,
        attitude: Attitude,
        time_diff: f64,
    ) -> Self {
        Self {
            file_name: record.file_name.clone(),
            x: Some(position.longitude),
            y: Some(position.latitude),
            z: Some(position.altitude),
            yaw: Some(attitude.yaw),
            pitch: Some(attitude.pitch),
            roll: Some(attitude.roll),
            time_diff: Some(time_diff),
            timestamp: record.capture_time,
            time_of_day: String::new(),
        }
    }

    /// Row for a record whose navigation was logged inline. Time Diff is 0.
    pub fn from_inline(
        record: &CaptureRecord,
        nav: &InlineNavigation,
        yaw_convention: YawConvention,
        swap_roll_pitch: bool,
    ) -> Self {
        let (position, attitude) = normalize_inline(nav, yaw_convention, swap_roll_pitch);
        Self::with_navigation(record, position, attitude, 0.0)
    }

    /// Row for a record looked up in the trajectory.
    ///
    /// A [`MatchResult::NoMatch`] produces a row with only the file name and
    /// timestamp filled in.
    pub fn from_match(
        record: &CaptureRecord,
        result: &MatchResult<'_>,
        units: TrajectoryUnits,
        heading_convention: YawConvention,
    ) -> Self {
        match result {
            MatchResult::Matched {
                sample, time_offset, ..
            } => {
                let (position, attitude) = normalize_sample(sample, units, heading_convention);
                Self::with_navigation(record, position, attitude, *time_offset)
            }
            MatchResult::NoMatch { .. } => Self::unmatched(record),
        }
    }

    /// Row with empty position, orientation and time difference.
    pub fn unmatched(record: &CaptureRecord) -> Self {
        Self {
            file_name: record.file_name.clone(),
            x: None,
            y: None,
            z: None,
            yaw: None,
            pitch: None,
            roll: None,
            time_diff: None,
            timestamp: record.capture_time,
            time_of_day: String::new(),
        }
    }
}

/// `HH:MM:SS` of `timestamp mod 86400`, fractional seconds truncated.
///
/// Non-finite timestamps give an empty string.
///
/// ```
/// use georef_pipeline::processors::assembler::time_of_day;
///
/// assert_eq!(time_of_day(64800.9), "18:00:00");
/// assert_eq!(time_of_day(345_600.0 + 3661.5), "01:01:01");
/// ```
pub fn time_of_day(timestamp: f64) -> String {
    if !timestamp.is_finite() {
        return String::new();
    }
    let seconds = (timestamp.rem_euclid(SECONDS_PER_DAY).floor() as u32) % 86_400;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Order rows by timestamp and fill in the time of day.
///
/// The sort is stable, so rows sharing a timestamp keep their encounter order.
pub fn assemble(mut rows: Vec<OutputRow>) -> Vec<OutputRow> {
    rows.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    for row in &mut rows {
        row.time_of_day = time_of_day(row.timestamp);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::{TrajectorySample, TrajectoryTable};
    use crate::core::transforms::AngleUnit;

    fn record(name: &str, capture_time: f64) -> CaptureRecord {
        CaptureRecord {
            file_name: name.to_string(),
            capture_time,
            navigation: None,
        }
    }

    fn sample(gps_time: f64, heading: f32) -> TrajectorySample {
        TrajectorySample {
            gps_time,
            x: -106.5,
            y: 39.25,
            z: 3500.0,
            roll: 0.5,
            pitch: -1.25,
            heading,
        }
    }

    #[test]
    fn test_from_match_normalizes_heading() {
        let table = TrajectoryTable::new(
            vec![sample(399_999.9, 0.0), sample(400_000.05, -10.0)],
            TrajectoryUnits::default(),
            None,
        )
        .unwrap();
        let result = MatchResult::Matched {
            index: 1,
            sample: &table.samples()[1],
            time_offset: -0.01,
        };

        let row = OutputRow::from_match(
            &record("IMG_0001.tif", 54_382.0),
            &result,
            table.units(),
            YawConvention::SignedHeading,
        );

        assert_eq!(row.yaw, Some(350.0));
        assert_eq!(row.x, Some(-106.5));
        assert_eq!(row.y, Some(39.25));
        assert_eq!(row.z, Some(3500.0));
        assert_eq!(row.roll, Some(0.5));
        assert_eq!(row.pitch, Some(-1.25));
        assert_eq!(row.time_diff, Some(-0.01));
        assert_eq!(row.timestamp, 54_382.0);
    }

    #[test]
    fn test_from_match_no_match_leaves_gaps() {
        let result = MatchResult::NoMatch {
            target_time: 400_000.0,
        };
        let row = OutputRow::from_match(
            &record("IMG_0002.tif", 54_400.0),
            &result,
            TrajectoryUnits::default(),
            YawConvention::SignedHeading,
        );

        assert_eq!(row.file_name, "IMG_0002.tif");
        assert!(!row.is_complete());
        assert!(row.time_diff.is_none());
        assert_eq!(row.timestamp, 54_400.0);
    }

    #[test]
    fn test_from_match_radians_table() {
        let table = TrajectoryTable::new(
            vec![TrajectorySample {
                gps_time: 10.0,
                x: 0.5,
                y: -0.25,
                z: 100.0,
                roll: 0.0,
                pitch: 0.0,
                heading: -0.5,
            }],
            TrajectoryUnits {
                position: AngleUnit::Radians,
                attitude: AngleUnit::Radians,
            },
            None,
        )
        .unwrap();
        let result = MatchResult::Matched {
            index: 0,
            sample: &table.samples()[0],
            time_offset: 0.0,
        };

        let row = OutputRow::from_match(&record("a.tif", 10.0), &result, table.units(), YawConvention::SignedHeading);
        assert!((row.x.unwrap() - 0.5f64.to_degrees()).abs() < 1e-9);
        assert!((row.y.unwrap() + 0.25f64.to_degrees()).abs() < 1e-9);
        let yaw = row.yaw.unwrap();
        assert!((0.0..360.0).contains(&yaw));
    }

    #[test]
    fn test_from_inline_time_diff_zero() {
        let nav = InlineNavigation {
            longitude: -106.1,
            latitude: 39.9,
            altitude: 3300.0,
            yaw: 90.0,
            pitch: 0.2,
            roll: -0.3,
        };
        let row = OutputRow::from_inline(&record("IMG_0003.tif", 400_100.5), &nav, YawConvention::Reversed, false);

        assert_eq!(row.time_diff, Some(0.0));
        assert_eq!(row.yaw, Some(270.0));
        assert_eq!(row.x, Some(-106.1));
        assert_eq!(row.roll, Some(-0.3));
        assert!(row.is_complete());
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(time_of_day(0.0), "00:00:00");
        assert_eq!(time_of_day(86_399.999), "23:59:59");
        assert_eq!(time_of_day(86_400.0), "00:00:00");
        assert_eq!(time_of_day(54_382.75), "15:06:22");
        assert_eq!(time_of_day(f64::NAN), "");
    }

    #[test]
    fn test_assemble_sorts_stably() {
        let rows = vec![
            OutputRow::unmatched(&record("c.tif", 30.0)),
            OutputRow::unmatched(&record("a1.tif", 10.0)),
            OutputRow::unmatched(&record("b.tif", 20.0)),
            OutputRow::unmatched(&record("a2.tif", 10.0)),
        ];

        let assembled = assemble(rows);
        let names: Vec<&str> = assembled.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a1.tif", "a2.tif", "b.tif", "c.tif"]);
        assert!(assembled.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(assembled[0].time_of_day, "00:00:10");
    }
}
