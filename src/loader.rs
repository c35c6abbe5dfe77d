use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Statement, params};
use tracing::info;

use crate::config::PipelineConfig;
use crate::partition::MonthPartition;
use crate::records::{
    Appearance, Club, Competition, DatasetTable, Game, Player, PlayerValuation, TableRecord,
};
use crate::snapshot::{SnapshotRecord, read_snapshot};
use crate::store::{
    DimensionRow, PartitionedRow, ReplaceOutcome, Store, date_text, replace_dimension,
    replace_partition,
};

pub const VALUATIONS_TABLE: &str = "player_valuations";
pub const APPEARANCES_TABLE: &str = "player_appearances";

impl PartitionedRow for PlayerValuation {
    const TABLE: &'static str = VALUATIONS_TABLE;
    const INSERT_SQL: &'static str = "INSERT INTO player_valuations (
            player_id, date, market_value, current_club_id, competition_id, partition_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    fn insert(&self, stmt: &mut Statement<'_>, partition_key: &str) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.player_id,
            date_text(self.date),
            self.market_value,
            self.current_club_id,
            self.competition_id,
            partition_key,
        ])
    }
}

impl PartitionedRow for Appearance {
    const TABLE: &'static str = APPEARANCES_TABLE;
    const INSERT_SQL: &'static str = "INSERT INTO player_appearances (
            appearance_id, game_id, player_id, player_club_id, player_current_club_id,
            date, player_name, competition_id, yellow_cards, red_cards,
            goals, assists, minutes_played, partition_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

    fn insert(&self, stmt: &mut Statement<'_>, partition_key: &str) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.appearance_id,
            self.game_id,
            self.player_id,
            self.player_club_id,
            self.player_current_club_id,
            date_text(self.date),
            self.player_name,
            self.competition_id,
            self.yellow_cards,
            self.red_cards,
            self.goals,
            self.assists,
            self.minutes_played,
            partition_key,
        ])
    }
}

impl DimensionRow for Player {
    const TABLE: &'static str = "players";
    const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO players (
            player_id, name, position, country_of_citizenship, current_club_id,
            market_value_in_eur, highest_market_value_in_eur
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.player_id,
            self.name,
            self.position,
            self.country_of_citizenship,
            self.current_club_id,
            self.market_value_in_eur,
            self.highest_market_value_in_eur,
        ])
    }
}

impl DimensionRow for Club {
    const TABLE: &'static str = "clubs";
    const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO clubs (
            club_id, club_code, name, domestic_competition_id, total_market_value,
            squad_size, average_age, foreigners_percentage, stadium_name, url
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.club_id,
            self.club_code,
            self.name,
            self.domestic_competition_id,
            self.total_market_value,
            self.squad_size,
            self.average_age,
            self.foreigners_percentage,
            self.stadium_name,
            self.url,
        ])
    }
}

impl DimensionRow for Competition {
    const TABLE: &'static str = "competitions";
    const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO competitions (
            competition_id, competition_code, name, sub_type, type,
            country_name, domestic_league_code, confederation, url
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.competition_id,
            self.competition_code,
            self.name,
            self.sub_type,
            self.kind,
            self.country_name,
            self.domestic_league_code,
            self.confederation,
            self.url,
        ])
    }
}

impl DimensionRow for Game {
    const TABLE: &'static str = "games";
    const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO games (
            game_id, competition_id, season, round, date, home_club_id, away_club_id,
            home_club_goals, away_club_goals, home_club_name, away_club_name
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.game_id,
            self.competition_id,
            self.season,
            self.round,
            date_text(self.date),
            self.home_club_id,
            self.away_club_id,
            self.home_club_goals,
            self.away_club_goals,
            self.home_club_name,
            self.away_club_name,
        ])
    }
}

pub fn load_valuations_partition(
    store: &Store,
    config: &PipelineConfig,
    partition: MonthPartition,
) -> Result<ReplaceOutcome> {
    load_partition_file::<PlayerValuation>(store, &config.valuation_slice_path(partition), partition)
}

pub fn load_appearances_partition(
    store: &Store,
    config: &PipelineConfig,
    partition: MonthPartition,
) -> Result<ReplaceOutcome> {
    load_partition_file::<Appearance>(store, &config.appearance_slice_path(partition), partition)
}

/// Replaces the partition's rows with exactly the contents of its slice file.
pub fn load_partition_file<R>(store: &Store, slice_path: &Path, partition: MonthPartition) -> Result<ReplaceOutcome>
where
    R: TableRecord + SnapshotRecord + PartitionedRow,
{
    let rows = read_snapshot::<R>(slice_path)
        .with_context(|| {
            format!(
                "read {} slice for {partition}",
                <R as TableRecord>::TABLE.name()
            )
        })?;
    let outcome = store.session(|conn| replace_partition(conn, partition, &rows))?;
    let table = <R as PartitionedRow>::TABLE;
    info!(
        table,
        partition = %partition,
        deleted = outcome.deleted,
        inserted = outcome.inserted,
        "partition loaded"
    );
    Ok(outcome)
}

/// Refreshes players, clubs, competitions and games from their snapshots.
pub fn load_dimensions(store: &Store, config: &PipelineConfig) -> Result<Vec<(DatasetTable, ReplaceOutcome)>> {
    Ok(vec![
        (DatasetTable::Players, load_dimension::<Player>(store, config)?),
        (DatasetTable::Clubs, load_dimension::<Club>(store, config)?),
        (
            DatasetTable::Competitions,
            load_dimension::<Competition>(store, config)?,
        ),
        (DatasetTable::Games, load_dimension::<Game>(store, config)?),
    ])
}

pub fn load_dimension<R>(store: &Store, config: &PipelineConfig) -> Result<ReplaceOutcome>
where
    R: TableRecord + SnapshotRecord + DimensionRow,
{
    let table = <R as TableRecord>::TABLE;
    let rows = read_snapshot::<R>(&config.snapshot_path(table))
        .with_context(|| format!("read {} snapshot", table.name()))?;
    let outcome = store.session(|conn| replace_dimension(conn, &rows))?;
    info!(
        table = table.name(),
        rows = outcome.inserted,
        "dimension table refreshed"
    );
    Ok(outcome)
}
