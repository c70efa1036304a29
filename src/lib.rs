//! Glycemic Grade - glucose series backfill and sugar-control grading
//!
//! Turns periodic glucose telemetry into a single 1-10 "sugar control" grade
//! through a deterministic pipeline: lattice backfill → chronological query →
//! sub-scoring → weighted score → grading matrix lookup.
//!
//! ## Modules
//!
//! - **Normalization**: keep a user's 15-minute series dense, synthesizing
//!   plausible values for missing slots
//! - **Scoring**: time in range, variability, average level, and spikes,
//!   combined into a 0-100 score and graded

pub mod encoder;
pub mod error;
pub mod grading;
pub mod normalizer;
pub mod pipeline;
pub mod scorer;
pub mod settings;
pub mod slots;
pub mod store;
pub mod synth;
pub mod types;

pub use error::{GradeError, StoreError};
pub use grading::GradingTable;
pub use normalizer::TimeSeriesNormalizer;
pub use pipeline::{grade_user, SugarGrader};
pub use scorer::GlycemicScorer;
pub use store::{InMemoryStore, TimeSeriesStore};
pub use types::{GlucoseSample, GradingRule, ScoreResult};

/// Crate version embedded in all reports
pub const GRADE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "glycemic-grade";
