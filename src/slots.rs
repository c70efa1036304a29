//! Time-slot lattice
//!
//! Glucose samples live on a fixed 15-minute lattice (:00, :15, :30, :45).
//! This module floors timestamps onto that lattice and enumerates the slots
//! of a lookback window.

use crate::error::GradeError;
use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Width of one lattice slot in minutes
pub const SLOT_MINUTES: u32 = 15;

/// Floor a timestamp to the start of its 15-minute slot (02:48 -> 02:45)
pub fn floor_to_slot(at: NaiveDateTime) -> NaiveDateTime {
    let offset = Duration::minutes(i64::from(at.minute() % SLOT_MINUTES))
        + Duration::seconds(i64::from(at.second()))
        + Duration::nanoseconds(i64::from(at.nanosecond()));
    at - offset
}

/// Whether a time of day sits exactly on a lattice boundary
pub fn is_slot_aligned(time: NaiveTime) -> bool {
    time.minute() % SLOT_MINUTES == 0 && time.second() == 0 && time.nanosecond() == 0
}

/// Inclusive range of lattice points `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SlotWindow {
    /// Window covering the last `hours` hours, ending at the slot containing `now`.
    ///
    /// Fails with [`GradeError::InvalidWindow`] when the start would fall
    /// before the earliest representable date.
    pub fn ending_at(now: NaiveDateTime, hours: u32) -> Result<Self, GradeError> {
        let end = floor_to_slot(now);
        let start = end
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .ok_or(GradeError::InvalidWindow(hours))?;
        Ok(Self { start, end })
    }

    /// Window covering the last `days` days, ending at the slot containing `now`
    pub fn last_days(now: NaiveDateTime, days: u32) -> Result<Self, GradeError> {
        Self::ending_at(now, days.saturating_mul(24))
    }

    /// Number of lattice points in the window
    pub fn len(&self) -> usize {
        if self.end < self.start {
            return 0;
        }
        let minutes = (self.end - self.start).num_minutes();
        (minutes / i64::from(SLOT_MINUTES)) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every lattice point from start to end, inclusive
    pub fn slots(&self) -> impl Iterator<Item = NaiveDateTime> {
        let end = self.end;
        let step = Duration::minutes(i64::from(SLOT_MINUTES));
        let first = (self.start <= end).then_some(self.start);
        std::iter::successors(first, move |t| {
            let next = *t + step;
            (next <= end).then_some(next)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_floor_not_round() {
        assert_eq!(floor_to_slot(at(2, 48, 59)), at(2, 45, 0));
        assert_eq!(floor_to_slot(at(2, 14, 0)), at(2, 0, 0));
        assert_eq!(floor_to_slot(at(23, 59, 59)), at(23, 45, 0));
        assert_eq!(floor_to_slot(at(7, 30, 0)), at(7, 30, 0));
    }

    #[test]
    fn test_alignment() {
        assert!(is_slot_aligned(NaiveTime::from_hms_opt(8, 15, 0).unwrap()));
        assert!(!is_slot_aligned(NaiveTime::from_hms_opt(8, 16, 0).unwrap()));
        assert!(!is_slot_aligned(NaiveTime::from_hms_opt(8, 15, 1).unwrap()));
    }

    #[test]
    fn test_window_length() {
        let window = SlotWindow::ending_at(at(12, 7, 0), 48).unwrap();
        assert_eq!(window.end, at(12, 0, 0));
        assert_eq!(window.len(), 48 * 4 + 1);
        assert_eq!(window.slots().count(), window.len());

        let zero = SlotWindow::ending_at(at(12, 7, 0), 0).unwrap();
        assert_eq!(zero.slots().collect::<Vec<_>>(), vec![at(12, 0, 0)]);
    }

    #[test]
    fn test_slots_cross_midnight() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_hms_opt(0, 20, 0)
            .unwrap();
        let slots: Vec<_> = SlotWindow::ending_at(now, 1).unwrap().slots().collect();

        assert_eq!(slots.len(), 5);
        assert_eq!(slots[0], at(23, 15, 0));
        assert_eq!(slots[4], now.date().and_hms_opt(0, 15, 0).unwrap());
        assert!(slots.windows(2).all(|w| (w[1] - w[0]).num_minutes() == 15));
    }

    #[test]
    fn test_last_days() {
        let window = SlotWindow::last_days(at(9, 0, 0), 2).unwrap();
        assert_eq!(window.len(), 2 * 24 * 4 + 1);
    }

    #[test]
    fn test_window_past_earliest_date_is_rejected() {
        assert!(matches!(
            SlotWindow::ending_at(at(12, 0, 0), u32::MAX),
            Err(GradeError::InvalidWindow(u32::MAX))
        ));
        assert!(matches!(
            SlotWindow::last_days(at(12, 0, 0), 300_000_000),
            Err(GradeError::InvalidWindow(_))
        ));

        // A century back is still fine
        let window = SlotWindow::last_days(at(12, 0, 0), 36_525).unwrap();
        assert_eq!(window.end, at(12, 0, 0));
    }
}
