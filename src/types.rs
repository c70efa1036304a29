//! Core types for the grading pipeline
//!
//! This module defines the data structures that flow through each stage:
//! stored glucose samples, grading rules, and the score breakdown.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A single glucose reading stored in a 15-minute slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseSample {
    /// Owner of the reading
    pub user_id: String,
    /// Calendar date of the slot
    pub slot_date: NaiveDate,
    /// Time of day of the slot (15-minute granularity)
    pub slot_time: NaiveTime,
    /// Glucose concentration (mg/dL)
    pub value: f64,
}

impl GlucoseSample {
    pub fn new(user_id: impl Into<String>, at: NaiveDateTime, value: f64) -> Self {
        Self {
            user_id: user_id.into(),
            slot_date: at.date(),
            slot_time: at.time(),
            value,
        }
    }

    /// Slot timestamp combining date and time of day
    pub fn timestamp(&self) -> NaiveDateTime {
        self.slot_date.and_time(self.slot_time)
    }
}

/// One row of the grading matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingRule {
    /// Lowest final score covered (inclusive)
    pub score_min: u32,
    /// Highest final score covered (inclusive)
    pub score_max: u32,
    /// Grade on the 1-10 scale
    pub grade: u8,
    pub interpretation: String,
    pub suggested_actions: String,
}

impl GradingRule {
    pub fn new(
        score_min: u32,
        score_max: u32,
        grade: u8,
        interpretation: &str,
        suggested_actions: &str,
    ) -> Self {
        Self {
            score_min,
            score_max,
            grade,
            interpretation: interpretation.to_string(),
            suggested_actions: suggested_actions.to_string(),
        }
    }

    /// Whether the final score falls inside this rule's inclusive range
    pub fn covers(&self, score: u32) -> bool {
        self.score_min <= score && score <= self.score_max
    }
}

/// Sugar grade with its diagnostic breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Share of readings within 70-150 mg/dL (percent, 2 decimals)
    pub tir_percent: f64,
    pub tir_score: u32,
    /// Coefficient of variation (percent, 2 decimals)
    pub variability_percent: f64,
    pub variability_score: u32,
    /// Mean glucose rounded to the nearest integer
    pub avg_glucose: i64,
    pub avg_score: u32,
    /// Consecutive rises of more than 30 mg/dL
    pub spike_count: u32,
    pub spike_score: u32,
    /// Weighted score (0-100)
    pub final_score: u32,
    /// Grade (1-10)
    pub grade: u8,
    pub interpretation: String,
    pub suggested_actions: String,
}

/// Outcome of a backfill or seeding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Lattice points visited
    pub slots: usize,
    /// Samples written by this pass
    pub inserted: usize,
    /// Slots that already held a sample
    pub existing: usize,
}
