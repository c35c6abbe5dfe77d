use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::{Connection, Statement, params};
use tracing::info;

use crate::partition::MonthPartition;
use crate::store::{PartitionedRow, ReplaceOutcome, Store, replace_partition};

pub const CLUB_EVOLUTION_TABLE: &str = "club_valuation_evolution";
pub const LEAGUE_EVOLUTION_TABLE: &str = "league_valuation_evolution";

/// One valuation row joined to the club it was recorded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedValuation {
    pub club_id: i64,
    pub club_name: Option<String>,
    pub domestic_competition_id: Option<String>,
    pub market_value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuationStats {
    pub total: i64,
    pub min: i64,
    pub max: i64,
    pub count: i64,
}

impl ValuationStats {
    fn new(value: i64) -> Self {
        Self {
            total: value,
            min: value,
            max: value,
            count: 1,
        }
    }

    fn push(&mut self, value: i64) {
        self.total = self.total.saturating_add(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClubValuation {
    pub club_id: i64,
    pub club_name: Option<String>,
    pub domestic_competition_id: Option<String>,
    pub stats: ValuationStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueValuation {
    pub domestic_competition_id: String,
    pub stats: ValuationStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOutcome {
    /// No joined rows for the month; the table was not touched.
    Skipped,
    Written(ReplaceOutcome),
}

impl AggregateOutcome {
    pub fn rows_written(&self) -> usize {
        match self {
            AggregateOutcome::Skipped => 0,
            AggregateOutcome::Written(outcome) => outcome.inserted,
        }
    }
}

impl PartitionedRow for ClubValuation {
    const TABLE: &'static str = CLUB_EVOLUTION_TABLE;
    const INSERT_SQL: &'static str = "INSERT INTO club_valuation_evolution (
            club_id, club_name, total_valuation, min_valuation, max_valuation,
            squad_size, domestic_competition_id, partition_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

    fn insert(&self, stmt: &mut Statement<'_>, partition_key: &str) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.club_id,
            self.club_name,
            self.stats.total,
            self.stats.min,
            self.stats.max,
            self.stats.count,
            self.domestic_competition_id,
            partition_key,
        ])
    }
}

impl PartitionedRow for LeagueValuation {
    const TABLE: &'static str = LEAGUE_EVOLUTION_TABLE;
    const INSERT_SQL: &'static str = "INSERT INTO league_valuation_evolution (
            domestic_competition_id, total_valuation, min_valuation, max_valuation,
            player_count, partition_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    fn insert(&self, stmt: &mut Statement<'_>, partition_key: &str) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.domestic_competition_id,
            self.stats.total,
            self.stats.min,
            self.stats.max,
            self.stats.count,
            partition_key,
        ])
    }
}

/// Valuations dated inside the month, joined to their club. Rows without a
/// market value are excluded so that counts and sums agree.
pub fn load_joined_valuations(conn: &Connection, partition: MonthPartition) -> Result<Vec<JoinedValuation>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT c.club_id, c.name, c.domestic_competition_id, v.market_value
            FROM player_valuations AS v
            JOIN clubs AS c ON v.current_club_id = c.club_id
            WHERE v.date >= ?1
              AND v.date < ?2
              AND v.market_value IS NOT NULL
            ORDER BY c.club_id ASC, v.player_id ASC, v.date ASC
            "#,
        )
        .context("prepare joined valuations query")?;
    let start = partition.start().format("%Y-%m-%d").to_string();
    let end = partition.end_exclusive().format("%Y-%m-%d").to_string();
    let rows = stmt
        .query_map(params![start, end], |row| {
            Ok(JoinedValuation {
                club_id: row.get(0)?,
                club_name: row.get(1)?,
                domestic_competition_id: row.get(2)?,
                market_value: row.get(3)?,
            })
        })
        .context("query joined valuations")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode joined valuation row")?);
    }
    Ok(out)
}

pub fn summarize_clubs(rows: &[JoinedValuation]) -> Vec<ClubValuation> {
    let mut by_club: BTreeMap<i64, ClubValuation> = BTreeMap::new();
    for row in rows {
        by_club
            .entry(row.club_id)
            .and_modify(|club| club.stats.push(row.market_value))
            .or_insert_with(|| ClubValuation {
                club_id: row.club_id,
                club_name: row.club_name.clone(),
                domestic_competition_id: row.domestic_competition_id.clone(),
                stats: ValuationStats::new(row.market_value),
            });
    }
    by_club.into_values().collect()
}

/// Rows whose club has no domestic league do not count towards any league.
pub fn summarize_leagues(rows: &[JoinedValuation]) -> Vec<LeagueValuation> {
    let mut by_league: BTreeMap<&str, ValuationStats> = BTreeMap::new();
    for row in rows {
        let Some(league) = row.domestic_competition_id.as_deref() else {
            continue;
        };
        by_league
            .entry(league)
            .and_modify(|stats| stats.push(row.market_value))
            .or_insert_with(|| ValuationStats::new(row.market_value));
    }
    by_league
        .into_iter()
        .map(|(league, stats)| LeagueValuation {
            domestic_competition_id: league.to_string(),
            stats,
        })
        .collect()
}

pub fn aggregate_club_valuations(store: &Store, partition: MonthPartition) -> Result<AggregateOutcome> {
    let joined = store.session(|conn| load_joined_valuations(conn, partition))?;
    let clubs = summarize_clubs(&joined);
    write_aggregate(store, partition, &clubs)
}

pub fn aggregate_league_valuations(store: &Store, partition: MonthPartition) -> Result<AggregateOutcome> {
    let joined = store.session(|conn| load_joined_valuations(conn, partition))?;
    let leagues = summarize_leagues(&joined);
    write_aggregate(store, partition, &leagues)
}

fn write_aggregate<R: PartitionedRow>(
    store: &Store,
    partition: MonthPartition,
    rows: &[R],
) -> Result<AggregateOutcome> {
    if rows.is_empty() {
        info!(
            table = R::TABLE,
            partition = %partition,
            "no valuations for partition, aggregate left untouched"
        );
        return Ok(AggregateOutcome::Skipped);
    }
    let outcome = store.session(|conn| replace_partition(conn, partition, rows))?;
    info!(
        table = R::TABLE,
        partition = %partition,
        rows = outcome.inserted,
        "aggregate partition written"
    );
    Ok(AggregateOutcome::Written(outcome))
}

pub fn load_club_evolution(conn: &Connection, partition: MonthPartition) -> Result<Vec<ClubValuation>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT club_id, club_name, domestic_competition_id,
                   total_valuation, min_valuation, max_valuation, squad_size
            FROM club_valuation_evolution
            WHERE partition_date = ?1
            ORDER BY club_id ASC
            "#,
        )
        .context("prepare club evolution query")?;
    let rows = stmt
        .query_map(params![partition.key()], |row| {
            Ok(ClubValuation {
                club_id: row.get(0)?,
                club_name: row.get(1)?,
                domestic_competition_id: row.get(2)?,
                stats: ValuationStats {
                    total: row.get(3)?,
                    min: row.get(4)?,
                    max: row.get(5)?,
                    count: row.get(6)?,
                },
            })
        })
        .context("query club evolution")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode club evolution row")?);
    }
    Ok(out)
}

pub fn load_league_evolution(conn: &Connection, partition: MonthPartition) -> Result<Vec<LeagueValuation>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT domestic_competition_id, total_valuation, min_valuation, max_valuation, player_count
            FROM league_valuation_evolution
            WHERE partition_date = ?1
            ORDER BY domestic_competition_id ASC
            "#,
        )
        .context("prepare league evolution query")?;
    let rows = stmt
        .query_map(params![partition.key()], |row| {
            Ok(LeagueValuation {
                domestic_competition_id: row.get(0)?,
                stats: ValuationStats {
                    total: row.get(1)?,
                    min: row.get(2)?,
                    max: row.get(3)?,
                    count: row.get(4)?,
                },
            })
        })
        .context("query league evolution")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode league evolution row")?);
    }
    Ok(out)
}
