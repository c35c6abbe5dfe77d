use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::{DatasetLocation, PipelineConfig};
use crate::http_client::{fetch_bytes, http_client};
use crate::records::{
    Appearance, Club, Competition, DatasetTable, Game, Player, PlayerValuation, TableRecord,
};
use crate::snapshot::{SnapshotRecord, write_snapshot};

/// Something that can hand out the CSV body of a source table.
pub trait DatasetSource {
    fn open_table(&self, table: DatasetTable) -> Result<Box<dyn Read>>;
}

/// `<dir>/<table>.csv` on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    pub dir: PathBuf,
}

impl DatasetSource for DirectorySource {
    fn open_table(&self, table: DatasetTable) -> Result<Box<dyn Read>> {
        let path = self.dir.join(table.source_file());
        let file = fs::File::open(&path)
            .with_context(|| format!("open source table {}", path.display()))?;
        Ok(Box::new(file))
    }
}

/// `<base_url>/<table>.csv` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    pub base_url: String,
}

impl DatasetSource for HttpSource {
    fn open_table(&self, table: DatasetTable) -> Result<Box<dyn Read>> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            table.source_file()
        );
        let client = http_client()?;
        let body = fetch_bytes(client, &url).context("fetch source table failed")?;
        Ok(Box::new(Cursor::new(body)))
    }
}

pub fn source_from_config(config: &PipelineConfig) -> Box<dyn DatasetSource> {
    match &config.dataset {
        DatasetLocation::Directory(dir) => Box::new(DirectorySource { dir: dir.clone() }),
        DatasetLocation::Url(url) => Box::new(HttpSource {
            base_url: url.clone(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIngestSummary {
    pub table: DatasetTable,
    pub path: PathBuf,
    pub rows_written: usize,
    pub rows_skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub tables: Vec<TableIngestSummary>,
}

impl IngestSummary {
    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(|t| t.rows_written).sum()
    }

    pub fn table(&self, table: DatasetTable) -> Option<&TableIngestSummary> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// Refreshes every raw snapshot in full.
pub fn ingest_all(source: &dyn DatasetSource, config: &PipelineConfig) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();
    for table in DatasetTable::ALL {
        let item = ingest_table(source, config, table)?;
        summary.tables.push(item);
    }
    Ok(summary)
}

pub fn ingest_table(
    source: &dyn DatasetSource,
    config: &PipelineConfig,
    table: DatasetTable,
) -> Result<TableIngestSummary> {
    match table {
        DatasetTable::Players => ingest_records::<Player>(source, config),
        DatasetTable::Clubs => ingest_records::<Club>(source, config),
        DatasetTable::Competitions => ingest_records::<Competition>(source, config),
        DatasetTable::Games => ingest_records::<Game>(source, config),
        DatasetTable::PlayerValuations => ingest_records::<PlayerValuation>(source, config),
        DatasetTable::Appearances => ingest_records::<Appearance>(source, config),
    }
}

fn ingest_records<R>(source: &dyn DatasetSource, config: &PipelineConfig) -> Result<TableIngestSummary>
where
    R: TableRecord + SnapshotRecord + DeserializeOwned,
{
    let table = R::TABLE;
    let reader = source.open_table(table)?;
    let (rows, rows_skipped) = parse_csv::<R>(reader)
        .with_context(|| format!("parse source table {}", table.name()))?;
    if rows_skipped > 0 {
        warn!(
            table = table.name(),
            rows_skipped, "dropped source rows that could not be normalized"
        );
    }

    let path = config.snapshot_path(table);
    write_snapshot(&path, &rows)?;
    info!(
        table = table.name(),
        rows = rows.len(),
        path = %path.display(),
        "raw snapshot written"
    );

    Ok(TableIngestSummary {
        table,
        path,
        rows_written: rows.len(),
        rows_skipped,
    })
}

/// Rows that fail to deserialize are counted, not fatal.
pub fn parse_csv<R: DeserializeOwned>(reader: impl Read) -> Result<(Vec<R>, usize)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(reader);
    csv_reader.headers().context("read csv header")?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (idx, record) in csv_reader.deserialize::<R>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(err) => {
                skipped += 1;
                debug!(line = idx + 2, error = %err, "skipping csv row");
            }
        }
    }
    Ok((rows, skipped))
}
