//! Time-series store
//!
//! The grading core only needs a small key-value contract over glucose slots,
//! expressed by [`TimeSeriesStore`]. [`InMemoryStore`] implements it over
//! ordered maps and can be saved to and loaded from a JSON snapshot.

use crate::error::StoreError;
use crate::grading::GradingTable;
use crate::slots::is_slot_aligned;
use crate::types::{GlucoseSample, GradingRule};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Storage contract consumed by the normalizer and the grader
pub trait TimeSeriesStore {
    /// Fetch the sample stored at `(user_id, date, time)`, if any
    fn get(
        &self,
        user_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<GlucoseSample>, StoreError>;

    /// Insert a sample unless its slot is already occupied.
    ///
    /// Returns `true` when the sample was written; an occupied slot is a
    /// silent no-op that returns `false`.
    fn put_if_absent(&mut self, sample: GlucoseSample) -> Result<bool, StoreError>;

    /// All samples with `from <= timestamp <= to`, ascending by (date, time)
    fn query_range(
        &self,
        user_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<GlucoseSample>, StoreError>;

    /// Reference grading rules
    fn grading_rules(&self) -> Result<Vec<GradingRule>, StoreError>;
}

/// Ordered in-memory store keyed by user and slot timestamp
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    series: HashMap<String, BTreeMap<NaiveDateTime, f64>>,
    grading_rules: Vec<GradingRule>,
}

/// On-disk representation of an [`InMemoryStore`]
#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    samples: Vec<GlucoseSample>,
    #[serde(default)]
    grading_rules: Vec<GradingRule>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store serving the reference grading table
    pub fn new() -> Self {
        Self::with_grading_rules(GradingTable::reference().rules().to_vec())
    }

    /// Empty store serving a custom grading table
    pub fn with_grading_rules(grading_rules: Vec<GradingRule>) -> Self {
        Self {
            series: HashMap::new(),
            grading_rules,
        }
    }

    /// Total number of stored samples across users
    pub fn len(&self) -> usize {
        self.series.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Users with at least one sample, sorted
    pub fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .series
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(u, _)| u.clone())
            .collect();
        users.sort();
        users
    }

    /// Load a store from a JSON snapshot.
    ///
    /// Samples go through [`TimeSeriesStore::put_if_absent`], so misaligned
    /// slots are rejected and the first of any duplicate keys wins. A
    /// snapshot without grading rules gets the reference table.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: StoreSnapshot =
            serde_json::from_str(json).map_err(|e| StoreError::Snapshot(e.to_string()))?;

        let mut store = if snapshot.grading_rules.is_empty() {
            Self::new()
        } else {
            Self::with_grading_rules(snapshot.grading_rules)
        };

        let total = snapshot.samples.len();
        let mut inserted = 0;
        for sample in snapshot.samples {
            if store.put_if_absent(sample)? {
                inserted += 1;
            }
        }
        debug!(total, inserted, "loaded store snapshot");

        Ok(store)
    }

    /// Serialize the store to a JSON snapshot
    pub fn to_json(&self) -> Result<String, StoreError> {
        let mut samples = Vec::with_capacity(self.len());
        for user in self.users() {
            if let Some(series) = self.series.get(&user) {
                samples.extend(
                    series
                        .iter()
                        .map(|(at, value)| GlucoseSample::new(user.clone(), *at, *value)),
                );
            }
        }

        let snapshot = StoreSnapshot {
            samples,
            grading_rules: self.grading_rules.clone(),
        };
        serde_json::to_string_pretty(&snapshot).map_err(|e| StoreError::Snapshot(e.to_string()))
    }

    /// Read a snapshot file, or start empty when it does not exist yet
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "store file missing, starting empty");
            return Ok(Self::new());
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the snapshot to a file
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl TimeSeriesStore for InMemoryStore {
    fn get(
        &self,
        user_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<GlucoseSample>, StoreError> {
        let at = date.and_time(time);
        Ok(self
            .series
            .get(user_id)
            .and_then(|s| s.get(&at))
            .map(|value| GlucoseSample::new(user_id, at, *value)))
    }

    fn put_if_absent(&mut self, sample: GlucoseSample) -> Result<bool, StoreError> {
        if !is_slot_aligned(sample.slot_time) {
            return Err(StoreError::MisalignedSlot(sample.slot_time));
        }

        let at = sample.timestamp();
        let series = self.series.entry(sample.user_id).or_default();
        if series.contains_key(&at) {
            return Ok(false);
        }
        series.insert(at, sample.value);
        Ok(true)
    }

    fn query_range(
        &self,
        user_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<GlucoseSample>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .series
            .get(user_id)
            .map(|series| {
                series
                    .range(from..=to)
                    .map(|(at, value)| GlucoseSample::new(user_id, *at, *value))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn grading_rules(&self) -> Result<Vec<GradingRule>, StoreError> {
        Ok(self.grading_rules.clone())
    }
}
