//! Image georeferencing pipeline for aerial survey flights.
//!
//! This crate provides tools for:
//! - Parsing camera trigger logs (legacy and extended EIF layouts)
//! - Loading SBET trajectories from CSV or the binary SBET format
//! - Matching capture times to trajectory samples (parallelized)
//! - Writing the per-image metadata CSV consumed by photogrammetry software
//! - Selecting the images inside a survey boundary
//!
//! # Example
//!
//! ```no_run
//! use georef_pipeline::{processors::pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let summary = pipeline::run(&config, Path::new("/data/basin")).unwrap();
//! println!("{} rows written to {}", summary.total, summary.output.display());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use crate::config::{
    CaptureConfig, ExtendedConfig, MatchingConfig, PathsConfig, PipelineConfig, TimeConfig,
    TrajectoryConfig,
};
pub use crate::core::capture::{CaptureFormat, CaptureRecord};
pub use crate::core::loaders::{TrajectorySample, TrajectoryTable};
pub use crate::core::writers::OutputRow;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
