//! Synthetic glucose generation
//!
//! Two generative models fill the lattice when real readings are missing:
//! - [`BackfillModel`]: flat baseline with jitter and a bump during meal hours,
//!   used to patch gaps before grading.
//! - [`HistoryModel`]: fasting baseline with a post-meal spike that decays
//!   linearly, used to seed a whole demonstration history.
//!
//! Both take the random source explicitly so callers can seed them.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Additive rise applied to backfilled slots within a range of hours
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealBump {
    /// First hour of day affected
    pub start_hour: u32,
    /// Last hour of day affected (inclusive)
    pub end_hour: u32,
    /// Smallest rise (mg/dL)
    pub min_rise: i32,
    /// Largest rise (mg/dL)
    pub max_rise: i32,
}

impl MealBump {
    fn applies_to(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour <= self.end_hour
    }
}

/// Gap-filling model used by the backfill pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillModel {
    pub baseline: i32,
    /// Uniform jitter amplitude (+/-)
    pub jitter: i32,
    /// Checked in order; the first matching bump wins
    pub meal_bumps: Vec<MealBump>,
}

impl Default for BackfillModel {
    fn default() -> Self {
        Self {
            baseline: 95,
            jitter: 5,
            meal_bumps: vec![
                // breakfast
                MealBump { start_hour: 8, end_hour: 9, min_rise: 20, max_rise: 35 },
                // lunch
                MealBump { start_hour: 13, end_hour: 14, min_rise: 20, max_rise: 40 },
                // dinner
                MealBump { start_hour: 19, end_hour: 20, min_rise: 25, max_rise: 45 },
            ],
        }
    }
}

impl BackfillModel {
    /// Synthesize a value for one missing slot
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, at: NaiveDateTime) -> f64 {
        let mut value = self.baseline.saturating_add(jitter(rng, self.jitter));

        if let Some(bump) = self.meal_bumps.iter().find(|b| b.applies_to(at.hour())) {
            value = value.saturating_add(uniform(rng, bump.min_rise, bump.max_rise));
        }

        f64::from(value)
    }
}

/// Demonstration-history model with decaying post-meal spikes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryModel {
    /// Fasting glucose level (mg/dL)
    pub fasting_baseline: i32,
    /// Meal onset hours (breakfast, lunch, dinner by default)
    pub meal_hours: Vec<u32>,
    pub min_peak: i32,
    pub max_peak: i32,
    /// Minutes for a spike to decay back to baseline
    pub decay_minutes: u32,
    /// Uniform jitter amplitude (+/-)
    pub jitter: i32,
}

impl Default for HistoryModel {
    fn default() -> Self {
        Self {
            fasting_baseline: 90,
            meal_hours: vec![8, 13, 19],
            min_peak: 25,
            max_peak: 40,
            decay_minutes: 120,
            jitter: 5,
        }
    }
}

/// Spike magnitudes drawn so far, one per (date, meal hour)
#[derive(Debug, Default)]
pub struct MealPeaks {
    drawn: HashMap<(NaiveDate, u32), i32>,
}

impl MealPeaks {
    pub fn len(&self) -> usize {
        self.drawn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawn.is_empty()
    }
}

impl HistoryModel {
    /// Synthesize the value of one slot of a seeded history.
    ///
    /// `peaks` must be shared across all slots of the same run so that every
    /// meal occurrence keeps a single magnitude while it decays.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        at: NaiveDateTime,
        peaks: &mut MealPeaks,
    ) -> f64 {
        let minute_of_day = i64::from(at.hour() * 60 + at.minute());
        let mut value = self.fasting_baseline;

        for &meal_hour in &self.meal_hours {
            let since_meal = minute_of_day - i64::from(meal_hour) * 60;
            if since_meal < 0 || since_meal >= i64::from(self.decay_minutes) {
                continue;
            }

            let peak = *peaks
                .drawn
                .entry((at.date(), meal_hour))
                .or_insert_with(|| uniform(rng, self.min_peak, self.max_peak));

            let peak = f64::from(peak);
            let decayed = peak - since_meal as f64 * peak / f64::from(self.decay_minutes);
            value = value.saturating_add(decayed.max(0.0).trunc() as i32);
        }

        value = value.saturating_add(jitter(rng, self.jitter));
        f64::from(value)
    }
}

/// Inclusive uniform draw that tolerates swapped bounds
fn uniform<R: Rng + ?Sized>(rng: &mut R, a: i32, b: i32) -> i32 {
    rng.gen_range(a.min(b)..=a.max(b))
}

/// Symmetric draw in `[-amplitude, amplitude]`
fn jitter<R: Rng + ?Sized>(rng: &mut R, amplitude: i32) -> i32 {
    uniform(rng, amplitude.saturating_neg(), amplitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_backfill_overnight_stays_near_baseline() {
        let model = BackfillModel::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let v = model.sample(&mut rng, at(3, 15));
            assert!((90.0..=100.0).contains(&v), "value {v}");
        }
    }

    #[test]
    fn test_backfill_meal_bumps() {
        let model = BackfillModel::default();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..200 {
            let breakfast = model.sample(&mut rng, at(9, 45));
            assert!((110.0..=135.0).contains(&breakfast), "breakfast {breakfast}");

            let lunch = model.sample(&mut rng, at(13, 0));
            assert!((110.0..=140.0).contains(&lunch), "lunch {lunch}");

            let dinner = model.sample(&mut rng, at(20, 30));
            assert!((115.0..=145.0).contains(&dinner), "dinner {dinner}");
        }

        // 10:00 is outside the breakfast window
        let after = model.sample(&mut rng, at(10, 0));
        assert!(after <= 100.0);
    }

    #[test]
    fn test_backfill_is_seed_deterministic() {
        let model = BackfillModel::default();
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);

        let xs: Vec<f64> = (0..24).map(|h| model.sample(&mut a, at(h, 0))).collect();
        let ys: Vec<f64> = (0..24).map(|h| model.sample(&mut b, at(h, 0))).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_history_fasting_range() {
        let model = HistoryModel::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut peaks = MealPeaks::default();

        for h in [0, 4, 6, 10, 12, 15, 18, 21, 23] {
            let v = model.sample(&mut rng, at(h, 30), &mut peaks);
            assert!((85.0..=95.0).contains(&v), "hour {h}: {v}");
        }
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_history_spike_decays_from_single_peak() {
        let model = HistoryModel {
            jitter: 0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut peaks = MealPeaks::default();

        let onset = model.sample(&mut rng, at(8, 0), &mut peaks);
        let peak = onset - 90.0;
        assert!((25.0..=40.0).contains(&peak));

        // One hour in, half of the same peak remains (truncated)
        let halfway = model.sample(&mut rng, at(9, 0), &mut peaks);
        assert_eq!(halfway, 90.0 + (peak / 2.0).trunc());

        // Spike is gone two hours after onset
        let later = model.sample(&mut rng, at(10, 0), &mut peaks);
        assert_eq!(later, 90.0);

        assert_eq!(peaks.len(), 1);
    }

    #[test]
    fn test_swapped_bounds_do_not_panic() {
        let model = BackfillModel {
            baseline: 100,
            jitter: -3,
            meal_bumps: vec![MealBump {
                start_hour: 0,
                end_hour: 23,
                min_rise: 10,
                max_rise: 5,
            }],
        };
        let mut rng = StdRng::seed_from_u64(1);
        let v = model.sample(&mut rng, at(12, 0));
        assert!((102.0..=113.0).contains(&v));
    }

    #[test]
    fn test_backfill_extreme_model_saturates() {
        let mut rng = StdRng::seed_from_u64(8);

        let high = BackfillModel {
            baseline: i32::MAX - 10,
            ..Default::default()
        };
        for h in [3, 8, 13, 19] {
            let v = high.sample(&mut rng, at(h, 0));
            assert!(v >= f64::from(i32::MAX - 15));
        }

        let wide = BackfillModel {
            jitter: i32::MIN,
            ..Default::default()
        };
        let v = wide.sample(&mut rng, at(9, 0));
        assert!(v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX));
    }

    #[test]
    fn test_history_extreme_model_saturates() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut peaks = MealPeaks::default();
        let model = HistoryModel {
            fasting_baseline: i32::MAX - 1,
            min_peak: i32::MAX,
            max_peak: i32::MAX,
            jitter: i32::MIN,
            ..Default::default()
        };

        for h in [3, 8, 9, 13, 19] {
            let v = model.sample(&mut rng, at(h, 15), &mut peaks);
            assert!(v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX));
        }
        assert_eq!(peaks.len(), 3);

        let flat = HistoryModel {
            fasting_baseline: i32::MIN + 1,
            jitter: i32::MAX,
            decay_minutes: 0,
            ..Default::default()
        };
        let v = flat.sample(&mut rng, at(8, 0), &mut peaks);
        assert!(v >= f64::from(i32::MIN));
    }
}
