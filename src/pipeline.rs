//! Pipeline orchestration
//!
//! This module provides the public grading API. It ties the normalizer, the
//! store, and the scorer together:
//! 1. TimeSeriesNormalizer - backfill the window so the series is dense
//! 2. TimeSeriesStore - query the full window in chronological order
//! 3. GlycemicScorer - reduce the readings to a score and grade

use crate::error::GradeError;
use crate::grading::GradingTable;
use crate::normalizer::TimeSeriesNormalizer;
use crate::scorer::GlycemicScorer;
use crate::slots::SlotWindow;
use crate::store::TimeSeriesStore;
use crate::types::ScoreResult;
use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{info, warn};

/// Default lookback window in hours
pub const DEFAULT_WINDOW_HOURS: u32 = 48;

/// Grade a user's last `window_hours` hours in one call.
///
/// # Example
/// ```ignore
/// let mut store = InMemoryStore::new();
/// let result = grade_user(&mut store, "user-1", 48)?;
/// println!("grade {}/10: {}", result.grade, result.interpretation);
/// ```
pub fn grade_user<S: TimeSeriesStore>(
    store: &mut S,
    user_id: &str,
    window_hours: u32,
) -> Result<ScoreResult, GradeError> {
    let table = GradingTable::new(store.grading_rules()?)?;
    let mut normalizer = TimeSeriesNormalizer::new();
    grade_window(
        store,
        &mut normalizer,
        &table,
        user_id,
        window_hours,
        Local::now().naive_local(),
    )
    .map(|(result, _)| result)
}

/// Stateful grader owning its store, random source, and grading table.
///
/// The grading table is read from the store once at construction and kept
/// for the lifetime of the grader.
pub struct SugarGrader<S, R = StdRng> {
    store: S,
    normalizer: TimeSeriesNormalizer<R>,
    table: GradingTable,
    window_hours: u32,
}

impl<S: TimeSeriesStore> SugarGrader<S, StdRng> {
    /// Create a grader with an entropy-seeded normalizer
    pub fn new(store: S) -> Result<Self, GradeError> {
        Self::with_normalizer(store, TimeSeriesNormalizer::new())
    }
}

impl<S: TimeSeriesStore, R: Rng> SugarGrader<S, R> {
    /// Create a grader around a specific normalizer
    pub fn with_normalizer(store: S, normalizer: TimeSeriesNormalizer<R>) -> Result<Self, GradeError> {
        let table = GradingTable::new(store.grading_rules()?)?;
        Ok(Self {
            store,
            normalizer,
            table,
            window_hours: DEFAULT_WINDOW_HOURS,
        })
    }

    /// Override the grading table served by the store
    pub fn with_table(mut self, table: GradingTable) -> Self {
        self.table = table;
        self
    }

    /// Set the lookback window used by [`SugarGrader::grade_default`]
    pub fn with_window_hours(mut self, window_hours: u32) -> Self {
        self.window_hours = window_hours;
        self
    }

    pub fn window_hours(&self) -> u32 {
        self.window_hours
    }

    pub fn table(&self) -> &GradingTable {
        &self.table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn normalizer_mut(&mut self) -> &mut TimeSeriesNormalizer<R> {
        &mut self.normalizer
    }

    /// Give back the store, e.g. to persist backfilled samples
    pub fn into_store(self) -> S {
        self.store
    }

    /// Grade over the configured window, ending now
    pub fn grade_default(&mut self, user_id: &str) -> Result<ScoreResult, GradeError> {
        self.grade(user_id, self.window_hours)
    }

    /// Grade the last `window_hours` hours, ending now
    pub fn grade(&mut self, user_id: &str, window_hours: u32) -> Result<ScoreResult, GradeError> {
        self.grade_at(user_id, window_hours, Local::now().naive_local())
    }

    /// Grade the window ending at `now`
    pub fn grade_at(
        &mut self,
        user_id: &str,
        window_hours: u32,
        now: NaiveDateTime,
    ) -> Result<ScoreResult, GradeError> {
        self.grade_with_window(user_id, window_hours, now)
            .map(|(result, _)| result)
    }

    /// Grade the window ending at `now`, also returning the window and the
    /// number of samples scored
    pub fn grade_with_window(
        &mut self,
        user_id: &str,
        window_hours: u32,
        now: NaiveDateTime,
    ) -> Result<(ScoreResult, GradedWindow), GradeError> {
        grade_window(
            &mut self.store,
            &mut self.normalizer,
            &self.table,
            user_id,
            window_hours,
            now,
        )
    }
}

/// Window a grade was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedWindow {
    pub window: SlotWindow,
    pub hours: u32,
    pub sample_count: usize,
}

fn grade_window<S: TimeSeriesStore + ?Sized, R: Rng>(
    store: &mut S,
    normalizer: &mut TimeSeriesNormalizer<R>,
    table: &GradingTable,
    user_id: &str,
    window_hours: u32,
    now: NaiveDateTime,
) -> Result<(ScoreResult, GradedWindow), GradeError> {
    normalizer.ensure_dense_series_at(store, user_id, window_hours, now)?;

    let window = SlotWindow::ending_at(now, window_hours)?;
    let samples = store.query_range(user_id, window.start, window.end)?;
    if samples.len() != window.len() {
        warn!(
            user_id,
            expected = window.len(),
            found = samples.len(),
            "series is not dense after backfill"
        );
    }

    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let result = GlycemicScorer::score(&values, table)?;

    info!(
        user_id,
        final_score = result.final_score,
        grade = result.grade,
        samples = values.len(),
        "graded glucose window"
    );

    Ok((
        result,
        GradedWindow {
            window,
            hours: window_hours,
            sample_count: values.len(),
        },
    ))
}
