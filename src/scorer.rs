//! Glycemic scoring
//!
//! Reduces an ordered glucose series to four sub-scores and a weighted final
//! score:
//! - Time in range (70-150 mg/dL), weight 0.35
//! - Variability (coefficient of variation), weight 0.25
//! - Average glucose, weight 0.25
//! - Spike count (consecutive rises above 30 mg/dL), weight 0.15
//!
//! The final score is mapped to a grade through a [`GradingTable`].

use crate::error::GradeError;
use crate::grading::GradingTable;
use crate::types::ScoreResult;

/// Inclusive target range for time-in-range (mg/dL)
pub const TARGET_RANGE: (f64, f64) = (70.0, 150.0);

/// Rise between consecutive readings that counts as a spike (mg/dL)
pub const SPIKE_THRESHOLD: f64 = 30.0;

/// Sub-score weights in percent: TIR, variability, average, spikes
const WEIGHTS: [u32; 4] = [35, 25, 25, 15];

/// Scorer for glucose series
pub struct GlycemicScorer;

impl GlycemicScorer {
    /// Score an ordered series and grade it against `table`.
    ///
    /// Fails with [`GradeError::EmptySeries`] when there is nothing to grade.
    pub fn score(values: &[f64], table: &GradingTable) -> Result<ScoreResult, GradeError> {
        if values.is_empty() {
            return Err(GradeError::EmptySeries);
        }

        let tir_percent = time_in_range_percent(values);
        let tir_score = tir_score(tir_percent);

        let cv = coefficient_of_variation(values);
        let variability_score = variability_score(cv);

        let avg_glucose = round_half_even(mean(values)) as i64;
        let avg_score = avg_score(avg_glucose);

        let spike_count = count_spikes(values);
        let spike_score = spike_score(spike_count);

        let final_score = final_score(tir_score, variability_score, avg_score, spike_score);
        let rule = table.lookup(final_score)?;

        Ok(ScoreResult {
            tir_percent: round2(tir_percent),
            tir_score,
            variability_percent: round2(cv),
            variability_score,
            avg_glucose,
            avg_score,
            spike_count,
            spike_score,
            final_score,
            grade: rule.grade,
            interpretation: rule.interpretation.clone(),
            suggested_actions: rule.suggested_actions.clone(),
        })
    }
}

/// Percentage of readings inside [`TARGET_RANGE`]
pub fn time_in_range_percent(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let (low, high) = TARGET_RANGE;
    let in_range = values.iter().filter(|&&v| low <= v && v <= high).count();
    in_range as f64 * 100.0 / values.len() as f64
}

/// Tiered TIR score; below 60% lose 10 points per full 10 points short
pub fn tir_score(tir_percent: f64) -> u32 {
    if tir_percent >= 90.0 {
        100
    } else if tir_percent >= 80.0 {
        90
    } else if tir_percent >= 70.0 {
        80
    } else if tir_percent >= 60.0 {
        70
    } else {
        let reduction = ((60.0 - tir_percent) / 10.0).floor() * 10.0;
        (70.0 - reduction).max(0.0) as u32
    }
}

/// Coefficient of variation in percent, using the sample standard deviation.
///
/// A single reading has zero deviation, and a zero mean yields 0.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let mean = mean(values);
    if mean == 0.0 {
        return 0.0;
    }
    sample_std_dev(values) / mean * 100.0
}

/// Tiered variability score.
///
/// Anything outside 10-50%, including very flat series below 10%, scores 20.
pub fn variability_score(cv: f64) -> u32 {
    if (10.0..=20.0).contains(&cv) {
        100
    } else if cv > 20.0 && cv <= 30.0 {
        80
    } else if cv > 30.0 && cv <= 40.0 {
        60
    } else if cv > 40.0 && cv <= 50.0 {
        40
    } else {
        20
    }
}

/// Tiered score for the rounded mean glucose
pub fn avg_score(avg_glucose: i64) -> u32 {
    match avg_glucose {
        90..=110 => 100,
        111..=130 => 90,
        131..=150 => 70,
        151..=170 => 50,
        _ => 30,
    }
}

/// Number of consecutive pairs where the reading rises by more than
/// [`SPIKE_THRESHOLD`]
pub fn count_spikes(values: &[f64]) -> u32 {
    values
        .windows(2)
        .filter(|pair| pair[1] - pair[0] > SPIKE_THRESHOLD)
        .count() as u32
}

/// Tiered score for the number of spikes in the window
pub fn spike_score(spike_count: u32) -> u32 {
    match spike_count {
        0 => 100,
        1 => 80,
        2 => 60,
        3 => 40,
        _ => 20,
    }
}

/// Weighted combination of the sub-scores, rounded half to even.
///
/// Sub-scores are integers, so the weighted sum is computed exactly in
/// hundredths before rounding (62.5 rounds to 62, 63.5 to 64).
pub fn final_score(tir: u32, variability: u32, avg: u32, spike: u32) -> u32 {
    let hundredths: u32 = [tir, variability, avg, spike]
        .iter()
        .zip(WEIGHTS)
        .map(|(score, weight)| score * weight)
        .sum();

    let whole = hundredths / 100;
    let rest = hundredths % 100;
    if rest > 50 || (rest == 50 && whole % 2 == 1) {
        whole + 1
    } else {
        whole
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn score(values: &[f64]) -> ScoreResult {
        GlycemicScorer::score(values, GradingTable::reference()).unwrap()
    }

    #[test]
    fn test_constant_in_range_series() {
        let result = score(&[70.0; 10]);

        assert_eq!(result.tir_percent, 100.0);
        assert_eq!(result.tir_score, 100);
        assert_eq!(result.variability_percent, 0.0);
        assert_eq!(result.variability_score, 20);
        assert_eq!(result.avg_glucose, 70);
        assert_eq!(result.avg_score, 30);
        assert_eq!(result.spike_count, 0);
        assert_eq!(result.spike_score, 100);
        // 35 + 5 + 7.5 + 15 = 62.5, ties go to even
        assert_eq!(result.final_score, 62);
        assert_eq!(result.grade, 7);
        assert_eq!(result.interpretation, "Fair");
    }

    #[test]
    fn test_empty_series_is_an_error() {
        let result = GlycemicScorer::score(&[], GradingTable::reference());
        assert!(matches!(result, Err(GradeError::EmptySeries)));
    }

    #[test]
    fn test_single_spike() {
        let result = score(&[100.0, 140.0, 100.0]);
        assert_eq!(result.spike_count, 1);
        assert_eq!(result.spike_score, 80);
    }

    #[test]
    fn test_spikes_count_only_consecutive_rises() {
        // Slow climb of 20 per step never counts
        assert_eq!(count_spikes(&[100.0, 120.0, 140.0, 160.0, 180.0]), 0);
        // Exactly 30 is not a spike
        assert_eq!(count_spikes(&[100.0, 130.0]), 0);
        assert_eq!(count_spikes(&[100.0, 131.0]), 1);
        // Drops never count
        assert_eq!(count_spikes(&[200.0, 100.0, 50.0]), 0);
        assert_eq!(count_spikes(&[90.0, 130.0, 90.0, 130.0, 90.0, 130.0, 90.0, 130.0]), 4);
        assert_eq!(count_spikes(&[100.0]), 0);
        assert_eq!(spike_score(4), 20);
        assert_eq!(spike_score(12), 20);
    }

    #[test]
    fn test_tir_tiers() {
        assert_eq!(tir_score(100.0), 100);
        assert_eq!(tir_score(90.0), 100);
        assert_eq!(tir_score(89.99), 90);
        assert_eq!(tir_score(80.0), 90);
        assert_eq!(tir_score(70.0), 80);
        assert_eq!(tir_score(60.0), 70);
        // Step-penalty branch: less than a full 10 points short costs nothing
        assert_eq!(tir_score(59.9), 70);
        assert_eq!(tir_score(50.0), 60);
        assert_eq!(tir_score(49.9), 60);
        assert_eq!(tir_score(40.0), 50);
        assert_eq!(tir_score(0.0), 10);
    }

    #[test]
    fn test_tir_exactly_ninety_percent() {
        let mut values = vec![100.0; 9];
        values.push(200.0);
        assert_eq!(time_in_range_percent(&values), 90.0);
        assert_eq!(score(&values).tir_score, 100);
    }

    #[test]
    fn test_tir_range_is_inclusive() {
        assert_eq!(time_in_range_percent(&[70.0, 150.0, 69.9, 150.1]), 50.0);
    }

    #[test]
    fn test_variability_tiers() {
        assert_eq!(variability_score(0.0), 20);
        assert_eq!(variability_score(9.99), 20);
        assert_eq!(variability_score(10.0), 100);
        assert_eq!(variability_score(20.0), 100);
        assert_eq!(variability_score(20.5), 80);
        assert_eq!(variability_score(30.0), 80);
        assert_eq!(variability_score(35.0), 60);
        assert_eq!(variability_score(50.0), 40);
        assert_eq!(variability_score(50.01), 20);
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[120.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);

        // mean 100, sample stdev sqrt(200) for [90, 100, 110]
        let cv = coefficient_of_variation(&[90.0, 100.0, 110.0]);
        assert!((cv - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_avg_tiers() {
        assert_eq!(avg_score(89), 30);
        assert_eq!(avg_score(90), 100);
        assert_eq!(avg_score(110), 100);
        assert_eq!(avg_score(111), 90);
        assert_eq!(avg_score(150), 70);
        assert_eq!(avg_score(170), 50);
        assert_eq!(avg_score(171), 30);
    }

    #[test]
    fn test_average_is_rounded_half_even() {
        // mean 110.5 rounds down to 110
        let result = score(&[110.0, 111.0]);
        assert_eq!(result.avg_glucose, 110);
        assert_eq!(result.avg_score, 100);

        // mean 111.5 rounds up to 112
        assert_eq!(score(&[111.0, 112.0]).avg_glucose, 112);
    }

    #[test]
    fn test_final_score_rounding() {
        assert_eq!(final_score(100, 20, 30, 100), 62);
        assert_eq!(final_score(100, 100, 100, 100), 100);
        assert_eq!(final_score(10, 20, 30, 20), 19);
        // 0.35*90 + 0.25*20 + 0.25*30 + 0.15*100 = 59
        assert_eq!(final_score(90, 20, 30, 100), 59);
        // 0.35*100 + 0.25*20 + 0.25*30 + 0.15*40 = 53.5 -> 54
        assert_eq!(final_score(100, 20, 30, 40), 54);
        // 0.35*70 + 0.25*60 + 0.25*90 + 0.15*80 = 74
        assert_eq!(final_score(70, 60, 90, 80), 74);
    }

    #[test]
    fn test_well_controlled_series_grades_excellent() {
        // Gentle oscillation around 100 with roughly 12% CV
        let values: Vec<f64> = (0..96)
            .map(|i| if i % 2 == 0 { 88.0 } else { 112.0 })
            .collect();
        let result = score(&values);

        assert_eq!(result.tir_score, 100);
        assert_eq!(result.variability_score, 100);
        assert_eq!(result.avg_score, 100);
        assert_eq!(result.spike_count, 0);
        assert_eq!(result.final_score, 100);
        assert_eq!(result.grade, 10);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let values = [95.0, 130.0, 180.0, 120.0, 90.0, 160.0, 100.0];
        assert_eq!(score(&values), score(&values));
    }

    #[test]
    fn test_out_of_range_score_is_reported() {
        let table = GradingTable::reference();
        assert!(matches!(table.lookup(250), Err(GradeError::GradingTableGap(250))));
    }
}
