use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::partition::MonthPartition;
use crate::records::DatasetTable;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PARTITION_START: MonthPartition = MonthPartition::const_month(2015, 1);
pub const DEFAULT_PARTITION_END: MonthPartition = MonthPartition::const_month(2026, 1);
pub const DEFAULT_REPORT_CEILING: MonthPartition = MonthPartition::const_month(2025, 1);

const DB_FILE: &str = "football.sqlite";
const DEFAULT_LOGO_ID: &str = "default";

/// Where the source CSV tables come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetLocation {
    Directory(PathBuf),
    Url(String),
}

/// Every path and knob a stage needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub dataset: DatasetLocation,
    pub partition_start: MonthPartition,
    pub partition_end: MonthPartition,
    /// Report rows at or after this month are ignored.
    pub report_ceiling: MonthPartition,
    pub top_total_leagues: usize,
    pub top_peak_leagues: usize,
    pub top_players: usize,
    pub font_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Defaults rooted at `data_dir`; nothing is read from the environment.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            db_path: data_dir.join(DB_FILE),
            dataset: DatasetLocation::Directory(data_dir.join("source")),
            data_dir,
            partition_start: DEFAULT_PARTITION_START,
            partition_end: DEFAULT_PARTITION_END,
            report_ceiling: DEFAULT_REPORT_CEILING,
            top_total_leagues: 5,
            top_peak_leagues: 7,
            top_players: 100,
            font_path: None,
        }
    }

    /// Loads `.env.local` / `.env` and then reads `FOOTBALL_*` variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let data_dir = env_non_empty("FOOTBALL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let mut config = Self::with_data_dir(data_dir);

        if let Some(db) = env_non_empty("FOOTBALL_DB_PATH") {
            config.db_path = PathBuf::from(db);
        }
        if let Some(url) = env_non_empty("FOOTBALL_DATASET_URL") {
            config.dataset = DatasetLocation::Url(url);
        } else if let Some(dir) = env_non_empty("FOOTBALL_DATASET_DIR") {
            config.dataset = DatasetLocation::Directory(PathBuf::from(dir));
        }
        if let Some(raw) = env_non_empty("FOOTBALL_PARTITION_START") {
            config.partition_start = raw
                .parse()
                .context("invalid FOOTBALL_PARTITION_START")?;
        }
        if let Some(raw) = env_non_empty("FOOTBALL_PARTITION_END") {
            config.partition_end = raw.parse().context("invalid FOOTBALL_PARTITION_END")?;
        }
        if let Some(raw) = env_non_empty("FOOTBALL_REPORT_CEILING") {
            config.report_ceiling = raw.parse().context("invalid FOOTBALL_REPORT_CEILING")?;
        }
        config.font_path = env_non_empty("FOOTBALL_FONT_PATH").map(PathBuf::from);
        Ok(config)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn snapshot_path(&self, table: DatasetTable) -> PathBuf {
        self.raw_dir().join(format!("{}.parquet", table.name()))
    }

    pub fn valuation_slice_path(&self, partition: MonthPartition) -> PathBuf {
        self.raw_dir()
            .join("valuation_partitions")
            .join(format!("valuations_{partition}.parquet"))
    }

    pub fn appearance_slice_path(&self, partition: MonthPartition) -> PathBuf {
        self.raw_dir()
            .join("appearance_partitions")
            .join(format!("appearances_{partition}.parquet"))
    }

    pub fn league_logos_dir(&self) -> PathBuf {
        self.data_dir.join("logos").join("leagues")
    }

    pub fn league_logo_path(&self, competition_id: &str) -> PathBuf {
        self.league_logos_dir().join(format!("{competition_id}.png"))
    }

    pub fn default_league_logo_path(&self) -> PathBuf {
        self.league_logo_path(DEFAULT_LOGO_ID)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.data_dir.join("outputs")
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.outputs_dir().join(file_name)
    }

    /// Creates every directory the stages write into.
    pub fn ensure_dirs(&self) -> Result<()> {
        let dirs = [
            self.raw_dir(),
            self.raw_dir().join("valuation_partitions"),
            self.raw_dir().join("appearance_partitions"),
            self.league_logos_dir(),
            self.outputs_dir(),
        ];
        for dir in dirs {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create directory {}", dir.display()))?;
        }
        if let Some(parent) = self.db_path.parent() {
            ensure_parent(parent)?;
        }
        Ok(())
    }
}

fn ensure_parent(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_rooted_in_data_dir() {
        let config = PipelineConfig::with_data_dir("/tmp/fb");
        let jan = MonthPartition::new(2024, 1).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/fb/football.sqlite"));
        assert_eq!(
            config.valuation_slice_path(jan),
            PathBuf::from("/tmp/fb/raw/valuation_partitions/valuations_2024-01.parquet")
        );
        assert_eq!(
            config.snapshot_path(DatasetTable::Clubs),
            PathBuf::from("/tmp/fb/raw/clubs.parquet")
        );
        assert_eq!(
            config.default_league_logo_path(),
            PathBuf::from("/tmp/fb/logos/leagues/default.png")
        );
    }

    #[test]
    fn default_partition_window() {
        let config = PipelineConfig::with_data_dir("data");
        let partitions = MonthPartition::range(config.partition_start, config.partition_end);
        assert_eq!(partitions.first().map(|p| p.key()).as_deref(), Some("2015-01"));
        assert_eq!(partitions.last().map(|p| p.key()).as_deref(), Some("2025-12"));
        assert_eq!(partitions.len(), 11 * 12);
        assert_eq!(config.report_ceiling.key(), "2025-01");
    }
}
