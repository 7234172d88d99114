//! Angle and unit normalization.
//!
//! Pure functions that bring navigation angles from their source conventions
//! into the reference convention of the metadata CSV: decimal degrees, yaw
//! measured clockwise from north in `[0, 360)`.
//!
//! Two yaw conventions are in circulation and they are NOT interchangeable:
//! the trajectory heading is a signed angle, while the extended capture log
//! reports a yaw whose positive direction is reversed. Each source selects its
//! convention through configuration.

use serde::{Deserialize, Serialize};

use super::capture::InlineNavigation;
use super::loaders::{TrajectorySample, TrajectoryUnits};

const FULL_TURN: f64 = 360.0;

/// Unit of an angular quantity as declared for a data source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngleUnit {
    /// Convert a value in this unit to degrees.
    #[inline]
    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            AngleUnit::Degrees => value,
            AngleUnit::Radians => radians_to_degrees(value),
        }
    }

    /// Express a value given in radians in this unit.
    #[inline]
    pub fn from_radians(self, value: f64) -> f64 {
        match self {
            AngleUnit::Degrees => radians_to_degrees(value),
            AngleUnit::Radians => value,
        }
    }
}

/// Yaw sign convention of a data source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YawConvention {
    /// Signed clockwise angle, e.g. `-10` means 350 degrees.
    #[default]
    SignedHeading,
    /// Angle in `[0, 360)` whose positive direction is counter-clockwise.
    Reversed,
}

impl YawConvention {
    /// Map a yaw in this convention to degrees clockwise from north in `[0, 360)`.
    #[inline]
    pub fn apply(self, yaw: f64) -> f64 {
        match self {
            YawConvention::SignedHeading => yaw_to_360(yaw),
            YawConvention::Reversed => reversed_yaw_to_360(yaw),
        }
    }
}

/// Wrap an angle into `[0, 360)`.
///
/// `rem_euclid` can round tiny negative inputs up to exactly 360, which is
/// folded back to 0 so the upper bound stays exclusive.
fn wrap_360(angle: f64) -> f64 {
    // `+ 0.0` turns -0.0 into 0.0
    let wrapped = angle.rem_euclid(FULL_TURN) + 0.0;
    if wrapped >= FULL_TURN {
        0.0
    } else {
        wrapped
    }
}

/// Map a signed yaw into `[0, 360)`.
///
/// Idempotent: values already in range are returned unchanged.
///
/// ```
/// use georef_pipeline::core::transforms::yaw_to_360;
///
/// assert_eq!(yaw_to_360(-10.0), 350.0);
/// assert_eq!(yaw_to_360(350.0), 350.0);
/// ```
pub fn yaw_to_360(yaw: f64) -> f64 {
    wrap_360(yaw)
}

/// Map a reversed-direction yaw into `[0, 360)` via `(360 - yaw) mod 360`.
pub fn reversed_yaw_to_360(yaw: f64) -> f64 {
    wrap_360(FULL_TURN - yaw)
}

/// Standard radians to degrees conversion.
#[inline]
pub fn radians_to_degrees(value: f64) -> f64 {
    value.to_degrees()
}

/// Wrap an angle into `[-180, 180)`.
fn wrap_180(angle: f64) -> f64 {
    wrap_360(angle + 180.0) - 180.0
}

/// Undo the roll/pitch axis swap of the affected extended log revision.
///
/// The logged roll is the canonical pitch offset by 180 degrees and the logged
/// pitch is the canonical roll. Returns `(roll, pitch)` in the canonical axes.
pub fn correct_roll_pitch_axes(logged_roll: f64, logged_pitch: f64) -> (f64, f64) {
    (logged_pitch, wrap_180(logged_roll + 180.0))
}

/// Orientation in the output convention (degrees, yaw clockwise from north).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Geographic position in decimal degrees and metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
}

/// Normalize navigation logged inline in an extended capture log.
///
/// Position is already in decimal degrees and metres. The yaw is mapped with
/// `yaw_convention`; roll and pitch go through [`correct_roll_pitch_axes`]
/// when `swap_roll_pitch` is set.
pub fn normalize_inline(
    nav: &InlineNavigation,
    yaw_convention: YawConvention,
    swap_roll_pitch: bool,
) -> (Position, Attitude) {
    let (roll, pitch) = if swap_roll_pitch {
        correct_roll_pitch_axes(nav.roll, nav.pitch)
    } else {
        (nav.roll, nav.pitch)
    };

    let position = Position {
        longitude: nav.longitude,
        latitude: nav.latitude,
        altitude: nav.altitude,
    };
    let attitude = Attitude {
        yaw: yaw_convention.apply(nav.yaw),
        pitch,
        roll,
    };
    (position, attitude)
}

/// Normalize a trajectory sample given the table's declared units.
pub fn normalize_sample(
    sample: &TrajectorySample,
    units: TrajectoryUnits,
    heading_convention: YawConvention,
) -> (Position, Attitude) {
    let position = Position {
        longitude: units.position.to_degrees(f64::from(sample.x)),
        latitude: units.position.to_degrees(f64::from(sample.y)),
        altitude: f64::from(sample.z),
    };
    let attitude = Attitude {
        yaw: heading_convention.apply(units.attitude.to_degrees(f64::from(sample.heading))),
        pitch: units.attitude.to_degrees(f64::from(sample.pitch)),
        roll: units.attitude.to_degrees(f64::from(sample.roll)),
    };
    (position, attitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_yaw_to_360_negative() {
        assert_eq!(yaw_to_360(-10.0), 350.0);
        assert_eq!(yaw_to_360(-360.0), 0.0);
        assert_eq!(yaw_to_360(-370.0), 350.0);
    }

    #[test]
    fn test_yaw_to_360_in_range_unchanged() {
        for yaw in [0.0, 0.5, 90.0, 180.0, 359.75] {
            assert_eq!(yaw_to_360(yaw), yaw);
        }
        assert_eq!(yaw_to_360(360.0), 0.0);
        assert_eq!(yaw_to_360(725.0), 5.0);
    }

    #[test]
    fn test_yaw_to_360_idempotent_and_bounded() {
        let inputs = [
            -1e-20, -1e-12, -0.0, 1e-300, -179.999, 359.9999999, 1e6, -1e6, 12345.678,
        ];
        for yaw in inputs {
            let once = yaw_to_360(yaw);
            assert!((0.0..360.0).contains(&once), "{} -> {}", yaw, once);
            assert_eq!(yaw_to_360(once), once);
        }
    }

    #[test]
    fn test_reversed_yaw() {
        assert_eq!(reversed_yaw_to_360(10.0), 350.0);
        assert_eq!(reversed_yaw_to_360(0.0), 0.0);
        assert_eq!(reversed_yaw_to_360(270.0), 90.0);
        assert_eq!(reversed_yaw_to_360(360.0), 0.0);
    }

    #[test]
    fn test_conventions_differ() {
        // Same logged value, different meaning per source.
        assert_eq!(YawConvention::SignedHeading.apply(10.0), 10.0);
        assert_eq!(YawConvention::Reversed.apply(10.0), 350.0);
    }

    #[test]
    fn test_angle_units() {
        assert_eq!(AngleUnit::Degrees.to_degrees(45.0), 45.0);
        assert!((AngleUnit::Radians.to_degrees(PI) - 180.0).abs() < 1e-12);
        assert!((radians_to_degrees(-PI / 2.0) + 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_inline() {
        let nav = InlineNavigation {
            longitude: -106.5,
            latitude: 39.25,
            altitude: 3400.0,
            yaw: 10.0,
            pitch: 1.5,
            roll: 178.0,
        };

        let (position, attitude) = normalize_inline(&nav, YawConvention::Reversed, false);
        assert_eq!(position.longitude, -106.5);
        assert_eq!(position.latitude, 39.25);
        assert_eq!(attitude.yaw, 350.0);
        assert_eq!(attitude.roll, 178.0);
        assert_eq!(attitude.pitch, 1.5);

        let (_, swapped) = normalize_inline(&nav, YawConvention::Reversed, true);
        assert_eq!(swapped.roll, 1.5);
        assert!((swapped.pitch + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_sample_radians() {
        let sample = TrajectorySample {
            gps_time: 400_000.0,
            x: -1.5,
            y: 0.75,
            z: 3500.0,
            roll: 0.0,
            pitch: 0.0,
            heading: -0.5,
        };
        let units = TrajectoryUnits {
            position: AngleUnit::Radians,
            attitude: AngleUnit::Radians,
        };

        let (position, attitude) = normalize_sample(&sample, units, YawConvention::SignedHeading);
        assert!((position.longitude - (-1.5f64).to_degrees()).abs() < 1e-9);
        assert!((position.latitude - 0.75f64.to_degrees()).abs() < 1e-9);
        assert_eq!(position.altitude, 3500.0);
        assert!((attitude.yaw - (360.0 - 0.5f64.to_degrees())).abs() < 1e-9);
    }

    #[test]
    fn test_correct_roll_pitch_axes() {
        let (roll, pitch) = correct_roll_pitch_axes(178.0, 1.5);
        assert_eq!(roll, 1.5);
        assert!((pitch - -2.0).abs() < 1e-9);

        let (roll, pitch) = correct_roll_pitch_axes(-175.0, -0.5);
        assert_eq!(roll, -0.5);
        assert!((pitch - 5.0).abs() < 1e-9);
    }
}
