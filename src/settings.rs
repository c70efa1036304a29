//! Runtime settings
//!
//! Settings are read from an optional JSON file, then overridden by
//! `GLYCO_*` environment variables (nested keys use `__`, for example
//! `GLYCO_BACKFILL__BASELINE=100`). A `.env` file in the working directory is
//! loaded first when present.

use crate::error::GradeError;
use crate::grading::GradingTable;
use crate::normalizer::TimeSeriesNormalizer;
use crate::pipeline::DEFAULT_WINDOW_HOURS;
use crate::synth::{BackfillModel, HistoryModel};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "GLYCO";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Lookback window for grading (hours)
    pub window_hours: u32,

    /// Seed for synthetic data; entropy when unset
    pub seed: Option<u64>,

    /// JSON grading table replacing the reference matrix
    pub grading_table: Option<PathBuf>,

    /// Gap-filling model
    pub backfill: BackfillModel,

    /// Demonstration-history model
    pub history: HistoryModel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_WINDOW_HOURS,
            seed: None,
            grading_table: None,
            backfill: BackfillModel::default(),
            history: HistoryModel::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, GradeError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(true),
            );
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        debug!(?settings, "loaded settings");
        Ok(settings)
    }

    /// Grading table to use: the configured file, or the reference matrix
    pub fn grading_table(&self) -> Result<GradingTable, GradeError> {
        match &self.grading_table {
            Some(path) => GradingTable::from_json(&fs::read_to_string(path)?),
            None => Ok(GradingTable::reference().clone()),
        }
    }

    /// Normalizer configured with these models, seeded when a seed is set
    pub fn normalizer(&self) -> TimeSeriesNormalizer<StdRng> {
        let normalizer = match self.seed {
            Some(seed) => TimeSeriesNormalizer::seeded(seed),
            None => TimeSeriesNormalizer::new(),
        };
        normalizer
            .with_backfill_model(self.backfill.clone())
            .with_history_model(self.history.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.window_hours, 48);
        assert!(settings.seed.is_none());
        assert_eq!(settings.backfill.baseline, 95);
        assert_eq!(settings.history.meal_hours, vec![8, 13, 19]);
        assert_eq!(&settings.grading_table().unwrap(), GradingTable::reference());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "window_hours": 24,
                "seed": 99,
                "history": {{ "meal_hours": [7, 12, 18] }}
            }}"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.window_hours, 24);
        assert_eq!(settings.seed, Some(99));
        assert_eq!(settings.history.meal_hours, vec![7, 12, 18]);
        // Unspecified fields keep their defaults
        assert_eq!(settings.history.fasting_baseline, 90);
        assert_eq!(settings.backfill, BackfillModel::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/glyco.json")));
        assert!(matches!(result, Err(GradeError::Config(_))));
    }

    #[test]
    fn test_custom_grading_table_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"score_min": 0, "score_max": 49, "grade": 1, "interpretation": "Low", "suggested_actions": "Act"}},
                {{"score_min": 50, "score_max": 100, "grade": 2, "interpretation": "High", "suggested_actions": "Keep"}}
            ]"#
        )
        .unwrap();

        let settings = Settings {
            grading_table: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let table = settings.grading_table().unwrap();
        assert_eq!(table.lookup(62).unwrap().interpretation, "High");
    }
}
