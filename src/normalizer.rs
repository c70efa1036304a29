//! Time-series normalization
//!
//! This module guarantees that a user's glucose series is dense over a
//! lookback window before it is graded:
//! - Every 15-minute slot in the window is checked against the store
//! - Missing slots are backfilled with synthetic values
//! - Existing samples are never touched, so passes can be repeated safely
//!
//! It also seeds whole demonstration histories from the meal-response model.

use crate::error::GradeError;
use crate::slots::SlotWindow;
use crate::store::TimeSeriesStore;
use crate::synth::{BackfillModel, HistoryModel, MealPeaks};
use crate::types::{BackfillReport, GlucoseSample};
use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Normalizer that fills gaps in a glucose series
pub struct TimeSeriesNormalizer<R = StdRng> {
    rng: R,
    backfill: BackfillModel,
    history: HistoryModel,
}

impl Default for TimeSeriesNormalizer<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSeriesNormalizer<StdRng> {
    /// Create a normalizer drawing from OS entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a normalizer with a fixed seed for reproducible output
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> TimeSeriesNormalizer<R> {
    /// Create a normalizer around any random source
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            backfill: BackfillModel::default(),
            history: HistoryModel::default(),
        }
    }

    /// Replace the gap-filling model
    pub fn with_backfill_model(mut self, model: BackfillModel) -> Self {
        self.backfill = model;
        self
    }

    /// Replace the demonstration-history model
    pub fn with_history_model(mut self, model: HistoryModel) -> Self {
        self.history = model;
        self
    }

    /// Ensure every slot of the last `window_hours` hours holds a sample,
    /// using the local wall clock as "now"
    pub fn ensure_dense_series<S: TimeSeriesStore + ?Sized>(
        &mut self,
        store: &mut S,
        user_id: &str,
        window_hours: u32,
    ) -> Result<BackfillReport, GradeError> {
        self.ensure_dense_series_at(store, user_id, window_hours, Local::now().naive_local())
    }

    /// Ensure every slot of the window ending at `now` holds a sample.
    ///
    /// `now` is floored to its 15-minute slot. Missing slots are filled from
    /// the backfill model; occupied slots are left as they are.
    pub fn ensure_dense_series_at<S: TimeSeriesStore + ?Sized>(
        &mut self,
        store: &mut S,
        user_id: &str,
        window_hours: u32,
        now: NaiveDateTime,
    ) -> Result<BackfillReport, GradeError> {
        let window = SlotWindow::ending_at(now, window_hours)?;
        debug!(user_id, start = %window.start, end = %window.end, "backfilling window");

        let mut report = BackfillReport::default();
        for slot in window.slots() {
            report.slots += 1;

            if store.get(user_id, slot.date(), slot.time())?.is_some() {
                report.existing += 1;
                continue;
            }

            let value = self.backfill.sample(&mut self.rng, slot);
            if store.put_if_absent(GlucoseSample::new(user_id, slot, value))? {
                report.inserted += 1;
            } else {
                // Another writer filled the slot between get and put
                report.existing += 1;
            }
        }

        info!(
            user_id,
            slots = report.slots,
            inserted = report.inserted,
            existing = report.existing,
            "backfill complete"
        );
        Ok(report)
    }

    /// Seed `days` days of demonstration history ending at `now`.
    ///
    /// Each slot gets a fasting baseline plus decaying post-meal spikes and
    /// jitter. Slots that already hold a sample keep it.
    pub fn synthesize_full_history<S: TimeSeriesStore + ?Sized>(
        &mut self,
        store: &mut S,
        user_id: &str,
        days: u32,
        now: NaiveDateTime,
    ) -> Result<BackfillReport, GradeError> {
        let window = SlotWindow::last_days(now, days)?;
        let mut peaks = MealPeaks::default();
        let mut report = BackfillReport::default();

        for slot in window.slots() {
            report.slots += 1;
            let value = self.history.sample(&mut self.rng, slot, &mut peaks);
            if store.put_if_absent(GlucoseSample::new(user_id, slot, value))? {
                report.inserted += 1;
            } else {
                report.existing += 1;
            }
        }

        info!(
            user_id,
            days,
            meals = peaks.len(),
            inserted = report.inserted,
            existing = report.existing,
            "seeded synthetic history"
        );
        Ok(report)
    }
}
