use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, Statement, params};
use tracing::debug;

use crate::partition::MonthPartition;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the file-backed analytical store.
///
/// No connection is held between stages: every read or write goes through
/// [`Store::session`], which opens a connection for the duration of the
/// closure and drops it on the way out, error or not.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let store = Self {
            path: path.to_path_buf(),
        };
        store.session(|conn| init_schema(conn))?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = Connection::open(&self.path)
            .with_context(|| format!("open sqlite db {}", self.path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("set sqlite busy timeout")?;
        f(&mut conn)
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;

        CREATE TABLE IF NOT EXISTS players (
            player_id INTEGER PRIMARY KEY,
            name TEXT NULL,
            position TEXT NULL,
            country_of_citizenship TEXT NULL,
            current_club_id INTEGER NULL,
            market_value_in_eur INTEGER NULL,
            highest_market_value_in_eur INTEGER NULL
        );

        CREATE TABLE IF NOT EXISTS clubs (
            club_id INTEGER PRIMARY KEY,
            club_code TEXT NULL,
            name TEXT NULL,
            domestic_competition_id TEXT NULL,
            total_market_value INTEGER NULL,
            squad_size INTEGER NULL,
            average_age REAL NULL,
            foreigners_percentage REAL NULL,
            stadium_name TEXT NULL,
            url TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS competitions (
            competition_id TEXT PRIMARY KEY,
            competition_code TEXT NULL,
            name TEXT NULL,
            sub_type TEXT NULL,
            type TEXT NULL,
            country_name TEXT NULL,
            domestic_league_code TEXT NULL,
            confederation TEXT NULL,
            url TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS games (
            game_id INTEGER PRIMARY KEY,
            competition_id TEXT NULL,
            season INTEGER NULL,
            round TEXT NULL,
            date TEXT NULL,
            home_club_id INTEGER NULL,
            away_club_id INTEGER NULL,
            home_club_goals INTEGER NULL,
            away_club_goals INTEGER NULL,
            home_club_name TEXT NULL,
            away_club_name TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS player_valuations (
            player_id INTEGER NOT NULL,
            date TEXT NULL,
            market_value INTEGER NULL,
            current_club_id INTEGER NULL,
            competition_id TEXT NULL,
            partition_date TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_valuations_partition ON player_valuations(partition_date);
        CREATE INDEX IF NOT EXISTS idx_valuations_date ON player_valuations(date);

        CREATE TABLE IF NOT EXISTS player_appearances (
            appearance_id TEXT NOT NULL,
            game_id INTEGER NULL,
            player_id INTEGER NOT NULL,
            player_club_id INTEGER NULL,
            player_current_club_id INTEGER NULL,
            date TEXT NULL,
            player_name TEXT NULL,
            competition_id TEXT NULL,
            yellow_cards INTEGER NULL,
            red_cards INTEGER NULL,
            goals INTEGER NULL,
            assists INTEGER NULL,
            minutes_played INTEGER NULL,
            partition_date TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_appearances_partition ON player_appearances(partition_date);

        CREATE TABLE IF NOT EXISTS club_valuation_evolution (
            club_id INTEGER NOT NULL,
            club_name TEXT NULL,
            total_valuation INTEGER NOT NULL,
            min_valuation INTEGER NOT NULL,
            max_valuation INTEGER NOT NULL,
            squad_size INTEGER NOT NULL,
            domestic_competition_id TEXT NULL,
            partition_date TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_club_evolution_partition ON club_valuation_evolution(partition_date);

        CREATE TABLE IF NOT EXISTS league_valuation_evolution (
            domestic_competition_id TEXT NOT NULL,
            total_valuation INTEGER NOT NULL,
            min_valuation INTEGER NOT NULL,
            max_valuation INTEGER NOT NULL,
            player_count INTEGER NOT NULL,
            partition_date TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_league_evolution_partition ON league_valuation_evolution(partition_date);

        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            stage TEXT NOT NULL,
            partition_date TEXT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            rows_written INTEGER NOT NULL,
            status TEXT NOT NULL,
            detail TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// A row of a table that is owned partition by partition.
pub trait PartitionedRow {
    const TABLE: &'static str;
    /// Insert statement whose last placeholder is the partition key.
    const INSERT_SQL: &'static str;

    fn insert(&self, stmt: &mut Statement<'_>, partition_key: &str) -> rusqlite::Result<usize>;
}

/// A row of a dimension table that is refreshed wholesale.
pub trait DimensionRow {
    const TABLE: &'static str;
    const INSERT_SQL: &'static str;

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub deleted: usize,
    pub inserted: usize,
}

/// Delete every row tagged with `partition`, then insert `rows` tagged with
/// it, as one transaction.
pub fn replace_partition<R: PartitionedRow>(
    conn: &mut Connection,
    partition: MonthPartition,
    rows: &[R],
) -> Result<ReplaceOutcome> {
    let key = partition.key();
    let tx = conn
        .transaction()
        .context("begin partition replace transaction")?;
    let deleted = tx
        .execute(
            &format!("DELETE FROM {} WHERE partition_date = ?1", R::TABLE),
            params![key],
        )
        .with_context(|| format!("delete {} partition {key}", R::TABLE))?;
    {
        let mut stmt = tx
            .prepare(R::INSERT_SQL)
            .with_context(|| format!("prepare insert into {}", R::TABLE))?;
        for row in rows {
            row.insert(&mut stmt, &key)
                .with_context(|| format!("insert into {} partition {key}", R::TABLE))?;
        }
    }
    tx.commit()
        .with_context(|| format!("commit {} partition {key}", R::TABLE))?;
    debug!(
        table = R::TABLE,
        partition = %key,
        deleted,
        inserted = rows.len(),
        "partition replaced"
    );
    Ok(ReplaceOutcome {
        deleted,
        inserted: rows.len(),
    })
}

pub fn replace_dimension<R: DimensionRow>(conn: &mut Connection, rows: &[R]) -> Result<ReplaceOutcome> {
    let tx = conn
        .transaction()
        .context("begin dimension replace transaction")?;
    let deleted = tx
        .execute(&format!("DELETE FROM {}", R::TABLE), [])
        .with_context(|| format!("clear {}", R::TABLE))?;
    {
        let mut stmt = tx
            .prepare(R::INSERT_SQL)
            .with_context(|| format!("prepare insert into {}", R::TABLE))?;
        for row in rows {
            row.insert(&mut stmt)
                .with_context(|| format!("insert into {}", R::TABLE))?;
        }
    }
    tx.commit()
        .with_context(|| format!("commit {}", R::TABLE))?;
    Ok(ReplaceOutcome {
        deleted,
        inserted: rows.len(),
    })
}

pub fn partition_row_count(conn: &Connection, table: &str, partition: MonthPartition) -> Result<i64> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE partition_date = ?1"),
        params![partition.key()],
        |row| row.get::<_, i64>(0),
    )
    .with_context(|| format!("count {table} partition {partition}"))
}

pub fn table_row_count(conn: &Connection, table: &str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get::<_, i64>(0)
    })
    .with_context(|| format!("count {table}"))
}

pub fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: i64,
    pub stage: String,
    pub partition_date: Option<String>,
    pub finished: bool,
    pub rows_written: i64,
    pub status: String,
    pub detail: String,
}

pub fn begin_run(conn: &Connection, stage: &str, partition: Option<MonthPartition>) -> Result<i64> {
    conn.execute(
        "INSERT INTO pipeline_runs(stage, partition_date, started_at, finished_at, rows_written, status, detail)
         VALUES (?1, ?2, ?3, NULL, 0, 'running', '{}')",
        params![stage, partition.map(|p| p.key()), Utc::now().to_rfc3339()],
    )
    .context("insert pipeline run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(
    conn: &Connection,
    run_id: i64,
    status: &str,
    rows_written: usize,
    detail: &serde_json::Value,
) -> Result<()> {
    let detail = serde_json::to_string(detail).unwrap_or_else(|_| "{}".to_string());
    conn.execute(
        "UPDATE pipeline_runs
         SET finished_at = ?1, rows_written = ?2, status = ?3, detail = ?4
         WHERE run_id = ?5",
        params![
            Utc::now().to_rfc3339(),
            rows_written as i64,
            status,
            detail,
            run_id
        ],
    )
    .context("update pipeline run")?;
    Ok(())
}

pub fn load_runs(conn: &Connection) -> Result<Vec<RunRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT run_id, stage, partition_date, finished_at, rows_written, status, detail
            FROM pipeline_runs
            ORDER BY run_id ASC
            "#,
        )
        .context("prepare load runs query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(RunRecord {
                run_id: row.get(0)?,
                stage: row.get(1)?,
                partition_date: row.get(2)?,
                finished: row.get::<_, Option<String>>(3)?.is_some(),
                rows_written: row.get(4)?,
                status: row.get(5)?,
                detail: row.get(6)?,
            })
        })
        .context("query pipeline runs")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode pipeline run row")?);
    }
    Ok(out)
}
