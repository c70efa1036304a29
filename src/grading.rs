//! Grading matrix
//!
//! Maps a final score in [0, 100] to a grade, an interpretation, and
//! suggested actions. A [`GradingTable`] is validated once on construction:
//! rules must be contiguous, non-overlapping, and cover 0..=100 exactly, so
//! every integer score resolves to exactly one rule.

use crate::error::GradeError;
use crate::types::GradingRule;
use std::sync::OnceLock;

/// Lowest possible final score
pub const SCORE_MIN: u32 = 0;

/// Highest possible final score
pub const SCORE_MAX: u32 = 100;

/// Validated, immutable grading matrix ordered by ascending score
#[derive(Debug, Clone, PartialEq)]
pub struct GradingTable {
    rules: Vec<GradingRule>,
}

impl GradingTable {
    /// Build a table from rules in any order, checking full coverage
    pub fn new(mut rules: Vec<GradingRule>) -> Result<Self, GradeError> {
        if rules.is_empty() {
            return Err(GradeError::InvalidGradingTable("no rules".to_string()));
        }

        rules.sort_by_key(|r| r.score_min);

        for rule in &rules {
            if rule.score_min > rule.score_max {
                return Err(GradeError::InvalidGradingTable(format!(
                    "rule for grade {} has min {} above max {}",
                    rule.grade, rule.score_min, rule.score_max
                )));
            }
        }

        if rules[0].score_min != SCORE_MIN {
            return Err(GradeError::InvalidGradingTable(format!(
                "scores below {} are not covered",
                rules[0].score_min
            )));
        }

        for pair in rules.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.score_min <= lower.score_max {
                return Err(GradeError::InvalidGradingTable(format!(
                    "rules overlap at score {}",
                    upper.score_min
                )));
            }
            if upper.score_min != lower.score_max + 1 {
                return Err(GradeError::InvalidGradingTable(format!(
                    "scores {}..{} are not covered",
                    lower.score_max + 1,
                    upper.score_min - 1
                )));
            }
        }

        let last = &rules[rules.len() - 1];
        if last.score_max != SCORE_MAX {
            return Err(GradeError::InvalidGradingTable(format!(
                "rules end at {} instead of {}",
                last.score_max, SCORE_MAX
            )));
        }

        Ok(Self { rules })
    }

    /// Process-wide reference table, built on first use
    pub fn reference() -> &'static GradingTable {
        static REFERENCE: OnceLock<GradingTable> = OnceLock::new();
        REFERENCE.get_or_init(|| GradingTable {
            rules: reference_rules(),
        })
    }

    /// Parse and validate a JSON array of rules
    pub fn from_json(json: &str) -> Result<Self, GradeError> {
        let rules: Vec<GradingRule> = serde_json::from_str(json)?;
        Self::new(rules)
    }

    pub fn to_json(&self) -> Result<String, GradeError> {
        Ok(serde_json::to_string_pretty(&self.rules)?)
    }

    /// Rules ordered by ascending score
    pub fn rules(&self) -> &[GradingRule] {
        &self.rules
    }

    /// Find the rule covering a final score
    pub fn lookup(&self, final_score: u32) -> Result<&GradingRule, GradeError> {
        self.rules
            .iter()
            .find(|r| r.covers(final_score))
            .ok_or(GradeError::GradingTableGap(final_score))
    }
}

/// The standard 10-grade matrix, ascending
fn reference_rules() -> Vec<GradingRule> {
    vec![
        GradingRule::new(0, 4, 1, "Critical", "Significant intervention; low-carb focus, avoid all high-GI foods."),
        GradingRule::new(5, 14, 2, "Very Poor", "Major changes needed; focus on protein, fiber, and activity level."),
        GradingRule::new(15, 24, 3, "Poor", "Re-evaluate meal composition; replace carbs with high-quality proteins."),
        GradingRule::new(25, 34, 4, "Needs Improvement", "Reduce large spikes; add low-GI foods and consider exercise adjustments."),
        GradingRule::new(35, 44, 5, "Moderate", "Moderate improvements; reduce carbs at high-variance meals."),
        GradingRule::new(45, 54, 6, "Satisfactory", "Begin making meal adjustments to reduce variability and spikes."),
        GradingRule::new(55, 64, 7, "Fair", "Focus on stable meal timings, avoid high-GI foods."),
        GradingRule::new(65, 74, 8, "Good", "Small improvements, e.g., adding fiber and lean protein to meals."),
        GradingRule::new(75, 84, 9, "Very Good", "Minor adjustments; consider maintaining low-carb options."),
        GradingRule::new(85, 100, 10, "Excellent", "Maintain current habits, keep consistent."),
    ]
}
