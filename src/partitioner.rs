use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::PipelineConfig;
use crate::partition::MonthPartition;
use crate::records::{Appearance, DatasetTable, DatedRecord, PlayerValuation, TableRecord};
use crate::snapshot::{SnapshotRecord, read_snapshot, write_snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceSummary {
    pub table: DatasetTable,
    pub partition: MonthPartition,
    pub path: PathBuf,
    pub rows: usize,
}

/// Rows dated inside `[start, next month start)`. Undated rows never match.
pub fn select_partition<R: DatedRecord + Clone>(rows: &[R], partition: MonthPartition) -> Vec<R> {
    rows.iter()
        .filter(|r| r.event_date().is_some_and(|d| partition.contains(d)))
        .cloned()
        .collect()
}

pub fn slice_valuations(config: &PipelineConfig, partition: MonthPartition) -> Result<SliceSummary> {
    slice_table::<PlayerValuation>(
        &config.snapshot_path(DatasetTable::PlayerValuations),
        &config.valuation_slice_path(partition),
        partition,
    )
}

pub fn slice_appearances(config: &PipelineConfig, partition: MonthPartition) -> Result<SliceSummary> {
    slice_table::<Appearance>(
        &config.snapshot_path(DatasetTable::Appearances),
        &config.appearance_slice_path(partition),
        partition,
    )
}

/// Writes one slice file per partition from a single pass over the snapshot.
pub fn slice_many<R>(
    snapshot_path: &Path,
    partitions: &[MonthPartition],
    slice_path: impl Fn(MonthPartition) -> PathBuf,
) -> Result<Vec<SliceSummary>>
where
    R: TableRecord + SnapshotRecord + DatedRecord + Clone,
{
    let rows = read_snapshot::<R>(snapshot_path)
        .with_context(|| format!("load {} snapshot", R::TABLE.name()))?;
    let mut out = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let path = slice_path(*partition);
        out.push(write_slice(&rows, *partition, path)?);
    }
    Ok(out)
}

fn slice_table<R>(snapshot_path: &Path, slice_path: &Path, partition: MonthPartition) -> Result<SliceSummary>
where
    R: TableRecord + SnapshotRecord + DatedRecord + Clone,
{
    let rows = read_snapshot::<R>(snapshot_path)
        .with_context(|| format!("load {} snapshot", R::TABLE.name()))?;
    write_slice(&rows, partition, slice_path.to_path_buf())
}

fn write_slice<R>(rows: &[R], partition: MonthPartition, path: PathBuf) -> Result<SliceSummary>
where
    R: TableRecord + SnapshotRecord + DatedRecord + Clone,
{
    let selected = select_partition(rows, partition);
    write_snapshot(&path, &selected)?;
    info!(
        table = R::TABLE.name(),
        partition = %partition,
        rows = selected.len(),
        "partition slice written"
    );
    Ok(SliceSummary {
        table: R::TABLE,
        partition,
        path,
        rows: selected.len(),
    })
}
