//! Grade report encoding
//!
//! This module wraps a score breakdown into a self-describing report with
//! producer and window metadata, ready to be written as JSON.

use crate::error::GradeError;
use crate::pipeline::GradedWindow;
use crate::types::ScoreResult;
use crate::{GRADE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Report producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Window the grade covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: String,
    pub end: String,
    pub hours: u32,
    pub sample_count: usize,
}

/// Complete grade report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub user_id: String,
    pub window: ReportWindow,
    pub computed_at_utc: String,
    pub result: ScoreResult,
}

/// Encoder for grade reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, user_id: &str, graded: &GradedWindow, result: ScoreResult) -> GradeReport {
        GradeReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: GRADE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            user_id: user_id.to_string(),
            window: ReportWindow {
                start: graded.window.start.format("%Y-%m-%d %H:%M").to_string(),
                end: graded.window.end.format("%Y-%m-%d %H:%M").to_string(),
                hours: graded.hours,
                sample_count: graded.sample_count,
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            result,
        }
    }

    /// Encode to pretty-printed JSON
    pub fn encode_to_json(
        &self,
        user_id: &str,
        graded: &GradedWindow,
        result: ScoreResult,
    ) -> Result<String, GradeError> {
        let report = self.encode(user_id, graded, result);
        serde_json::to_string_pretty(&report).map_err(GradeError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::GradingTable;
    use crate::scorer::GlycemicScorer;
    use crate::slots::SlotWindow;
    use chrono::NaiveDate;

    fn graded() -> GradedWindow {
        let now = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(10, 10, 0)
            .unwrap();
        GradedWindow {
            window: SlotWindow::ending_at(now, 48).unwrap(),
            hours: 48,
            sample_count: 193,
        }
    }

    #[test]
    fn test_report_fields() {
        let result = GlycemicScorer::score(&[70.0; 10], GradingTable::reference()).unwrap();
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());

        let json = encoder.encode_to_json("u1", &graded(), result).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["report_version"], "1.0.0");
        assert_eq!(payload["producer"]["name"], "glycemic-grade");
        assert_eq!(payload["producer"]["instance_id"], "test-instance");
        assert_eq!(payload["user_id"], "u1");
        assert_eq!(payload["window"]["start"], "2024-03-30 10:00");
        assert_eq!(payload["window"]["end"], "2024-04-01 10:00");
        assert_eq!(payload["window"]["sample_count"], 193);
        assert_eq!(payload["result"]["final_score"], 62);
        assert_eq!(payload["result"]["grade"], 7);
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = ReportEncoder::new();
        let b = ReportEncoder::new();
        assert_ne!(a.instance_id, b.instance_id);
    }
}
