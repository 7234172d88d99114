//! Core data types and I/O operations.

pub mod capture;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use capture::{CaptureError, CaptureFormat, CaptureRecord, InlineNavigation};
pub use loaders::{LoaderError, SbetRecord, TrajectorySample, TrajectoryTable, TrajectoryUnits};
pub use writers::{write_metadata_csv, write_trajectory_csv, OutputRow, WriteError};
