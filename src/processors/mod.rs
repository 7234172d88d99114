//! Data processing modules.

pub mod assembler;
pub mod epoch;
pub mod filtering;
pub mod matching;
pub mod pipeline;

// Re-export key types for convenience
pub use assembler::{assemble, time_of_day};
pub use epoch::EpochReconciler;
pub use filtering::{filter_images, keep_images, select_rows, Boundary, FilterSummary, FilteringError};
pub use matching::{find_nearest, match_all, MatchResult, SearchStrategy};
pub use pipeline::{extract_sbet, run, PipelineError, RunSummary};
