use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use arrow_array::{ArrayRef, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Field as ParquetField, Row, RowAccessor};

use crate::records::{Appearance, Club, Competition, Game, Player, PlayerValuation};

/// Columnar layout of a record type: how it becomes a batch and how a
/// parquet row turns back into it. Column order in `schema` and `from_row`
/// must agree.
pub trait SnapshotRecord: Sized {
    fn schema() -> SchemaRef;
    fn columns(rows: &[Self]) -> Vec<ArrayRef>;
    fn from_row(row: &Row) -> Result<Self>;
}

pub fn write_snapshot<R: SnapshotRecord>(path: &Path, rows: &[R]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let schema = R::schema();
    let tmp = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None)
        .with_context(|| format!("open parquet writer {}", tmp.display()))?;
    // Empty slices still get a file carrying the schema.
    if !rows.is_empty() {
        let batch = RecordBatch::try_new(schema, R::columns(rows))
            .with_context(|| format!("build record batch for {}", path.display()))?;
        writer
            .write(&batch)
            .with_context(|| format!("write parquet {}", tmp.display()))?;
    }
    writer
        .close()
        .with_context(|| format!("close parquet writer {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

pub fn read_snapshot<R: SnapshotRecord>(path: &Path) -> Result<Vec<R>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file)
        .with_context(|| format!("open parquet reader {}", path.display()))?;
    let expected = R::schema().fields().len();
    let actual = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .num_columns();
    if actual != expected {
        return Err(anyhow!(
            "{} has {actual} columns, expected {expected}",
            path.display()
        ));
    }

    let iter = reader
        .get_row_iter(None)
        .with_context(|| format!("iterate rows of {}", path.display()))?;
    let mut out = Vec::new();
    for row in iter {
        let row = row.with_context(|| format!("decode row of {}", path.display()))?;
        out.push(R::from_row(&row)?);
    }
    Ok(out)
}

impl SnapshotRecord for PlayerValuation {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("player_id", DataType::Int64, false),
            Field::new("date", DataType::Date32, true),
            Field::new("market_value_in_eur", DataType::Int64, true),
            Field::new("current_club_id", DataType::Int64, true),
            Field::new("player_club_domestic_competition_id", DataType::Utf8, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_column(rows, |r| Some(r.player_id)),
            date_column(rows, |r| r.date),
            int_column(rows, |r| r.market_value),
            int_column(rows, |r| r.current_club_id),
            str_column(rows, |r| r.competition_id.as_deref()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            player_id: row.get_long(0).context("player_valuations.player_id")?,
            date: opt_date(row, 1),
            market_value: row.get_long(2).ok(),
            current_club_id: row.get_long(3).ok(),
            competition_id: opt_string(row, 4),
        })
    }
}

impl SnapshotRecord for Appearance {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("appearance_id", DataType::Utf8, false),
            Field::new("game_id", DataType::Int64, true),
            Field::new("player_id", DataType::Int64, false),
            Field::new("player_club_id", DataType::Int64, true),
            Field::new("player_current_club_id", DataType::Int64, true),
            Field::new("date", DataType::Date32, true),
            Field::new("player_name", DataType::Utf8, true),
            Field::new("competition_id", DataType::Utf8, true),
            Field::new("yellow_cards", DataType::Int64, true),
            Field::new("red_cards", DataType::Int64, true),
            Field::new("goals", DataType::Int64, true),
            Field::new("assists", DataType::Int64, true),
            Field::new("minutes_played", DataType::Int64, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            str_column(rows, |r| Some(r.appearance_id.as_str())),
            int_column(rows, |r| r.game_id),
            int_column(rows, |r| Some(r.player_id)),
            int_column(rows, |r| r.player_club_id),
            int_column(rows, |r| r.player_current_club_id),
            date_column(rows, |r| r.date),
            str_column(rows, |r| r.player_name.as_deref()),
            str_column(rows, |r| r.competition_id.as_deref()),
            int_column(rows, |r| r.yellow_cards),
            int_column(rows, |r| r.red_cards),
            int_column(rows, |r| r.goals),
            int_column(rows, |r| r.assists),
            int_column(rows, |r| r.minutes_played),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            appearance_id: row
                .get_string(0)
                .context("appearances.appearance_id")?
                .clone(),
            game_id: row.get_long(1).ok(),
            player_id: row.get_long(2).context("appearances.player_id")?,
            player_club_id: row.get_long(3).ok(),
            player_current_club_id: row.get_long(4).ok(),
            date: opt_date(row, 5),
            player_name: opt_string(row, 6),
            competition_id: opt_string(row, 7),
            yellow_cards: row.get_long(8).ok(),
            red_cards: row.get_long(9).ok(),
            goals: row.get_long(10).ok(),
            assists: row.get_long(11).ok(),
            minutes_played: row.get_long(12).ok(),
        })
    }
}

impl SnapshotRecord for Player {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("player_id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("position", DataType::Utf8, true),
            Field::new("country_of_citizenship", DataType::Utf8, true),
            Field::new("current_club_id", DataType::Int64, true),
            Field::new("market_value_in_eur", DataType::Int64, true),
            Field::new("highest_market_value_in_eur", DataType::Int64, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_column(rows, |r| Some(r.player_id)),
            str_column(rows, |r| r.name.as_deref()),
            str_column(rows, |r| r.position.as_deref()),
            str_column(rows, |r| r.country_of_citizenship.as_deref()),
            int_column(rows, |r| r.current_club_id),
            int_column(rows, |r| r.market_value_in_eur),
            int_column(rows, |r| r.highest_market_value_in_eur),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            player_id: row.get_long(0).context("players.player_id")?,
            name: opt_string(row, 1),
            position: opt_string(row, 2),
            country_of_citizenship: opt_string(row, 3),
            current_club_id: row.get_long(4).ok(),
            market_value_in_eur: row.get_long(5).ok(),
            highest_market_value_in_eur: row.get_long(6).ok(),
        })
    }
}

impl SnapshotRecord for Club {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("club_id", DataType::Int64, false),
            Field::new("club_code", DataType::Utf8, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("domestic_competition_id", DataType::Utf8, true),
            Field::new("total_market_value", DataType::Int64, true),
            Field::new("squad_size", DataType::Int64, true),
            Field::new("average_age", DataType::Float64, true),
            Field::new("foreigners_percentage", DataType::Float64, true),
            Field::new("stadium_name", DataType::Utf8, true),
            Field::new("url", DataType::Utf8, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_column(rows, |r| Some(r.club_id)),
            str_column(rows, |r| r.club_code.as_deref()),
            str_column(rows, |r| r.name.as_deref()),
            str_column(rows, |r| r.domestic_competition_id.as_deref()),
            int_column(rows, |r| r.total_market_value),
            int_column(rows, |r| r.squad_size),
            float_column(rows, |r| r.average_age),
            float_column(rows, |r| r.foreigners_percentage),
            str_column(rows, |r| r.stadium_name.as_deref()),
            str_column(rows, |r| r.url.as_deref()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            club_id: row.get_long(0).context("clubs.club_id")?,
            club_code: opt_string(row, 1),
            name: opt_string(row, 2),
            domestic_competition_id: opt_string(row, 3),
            total_market_value: row.get_long(4).ok(),
            squad_size: row.get_long(5).ok(),
            average_age: row.get_double(6).ok(),
            foreigners_percentage: row.get_double(7).ok(),
            stadium_name: opt_string(row, 8),
            url: opt_string(row, 9),
        })
    }
}

impl SnapshotRecord for Competition {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("competition_id", DataType::Utf8, false),
            Field::new("competition_code", DataType::Utf8, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("sub_type", DataType::Utf8, true),
            Field::new("type", DataType::Utf8, true),
            Field::new("country_name", DataType::Utf8, true),
            Field::new("domestic_league_code", DataType::Utf8, true),
            Field::new("confederation", DataType::Utf8, true),
            Field::new("url", DataType::Utf8, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            str_column(rows, |r| Some(r.competition_id.as_str())),
            str_column(rows, |r| r.competition_code.as_deref()),
            str_column(rows, |r| r.name.as_deref()),
            str_column(rows, |r| r.sub_type.as_deref()),
            str_column(rows, |r| r.kind.as_deref()),
            str_column(rows, |r| r.country_name.as_deref()),
            str_column(rows, |r| r.domestic_league_code.as_deref()),
            str_column(rows, |r| r.confederation.as_deref()),
            str_column(rows, |r| r.url.as_deref()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            competition_id: row
                .get_string(0)
                .context("competitions.competition_id")?
                .clone(),
            competition_code: opt_string(row, 1),
            name: opt_string(row, 2),
            sub_type: opt_string(row, 3),
            kind: opt_string(row, 4),
            country_name: opt_string(row, 5),
            domestic_league_code: opt_string(row, 6),
            confederation: opt_string(row, 7),
            url: opt_string(row, 8),
        })
    }
}

impl SnapshotRecord for Game {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("game_id", DataType::Int64, false),
            Field::new("competition_id", DataType::Utf8, true),
            Field::new("season", DataType::Int64, true),
            Field::new("round", DataType::Utf8, true),
            Field::new("date", DataType::Date32, true),
            Field::new("home_club_id", DataType::Int64, true),
            Field::new("away_club_id", DataType::Int64, true),
            Field::new("home_club_goals", DataType::Int64, true),
            Field::new("away_club_goals", DataType::Int64, true),
            Field::new("home_club_name", DataType::Utf8, true),
            Field::new("away_club_name", DataType::Utf8, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int_column(rows, |r| Some(r.game_id)),
            str_column(rows, |r| r.competition_id.as_deref()),
            int_column(rows, |r| r.season),
            str_column(rows, |r| r.round.as_deref()),
            date_column(rows, |r| r.date),
            int_column(rows, |r| r.home_club_id),
            int_column(rows, |r| r.away_club_id),
            int_column(rows, |r| r.home_club_goals),
            int_column(rows, |r| r.away_club_goals),
            str_column(rows, |r| r.home_club_name.as_deref()),
            str_column(rows, |r| r.away_club_name.as_deref()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            game_id: row.get_long(0).context("games.game_id")?,
            competition_id: opt_string(row, 1),
            season: row.get_long(2).ok(),
            round: opt_string(row, 3),
            date: opt_date(row, 4),
            home_club_id: row.get_long(5).ok(),
            away_club_id: row.get_long(6).ok(),
            home_club_goals: row.get_long(7).ok(),
            away_club_goals: row.get_long(8).ok(),
            home_club_name: opt_string(row, 9),
            away_club_name: opt_string(row, 10),
        })
    }
}

fn int_column<R>(rows: &[R], f: impl Fn(&R) -> Option<i64>) -> ArrayRef {
    Arc::new(Int64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn float_column<R>(rows: &[R], f: impl Fn(&R) -> Option<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn str_column<'a, R: 'a>(rows: &'a [R], f: impl Fn(&'a R) -> Option<&'a str>) -> ArrayRef {
    Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn date_column<R>(rows: &[R], f: impl Fn(&R) -> Option<NaiveDate>) -> ArrayRef {
    Arc::new(Date32Array::from(
        rows.iter()
            .map(|r| f(r).map(date_to_days))
            .collect::<Vec<_>>(),
    ))
}

fn opt_string(row: &Row, idx: usize) -> Option<String> {
    row.get_string(idx).ok().cloned()
}

fn opt_date(row: &Row, idx: usize) -> Option<NaiveDate> {
    match row.get_column_iter().nth(idx) {
        Some((_, ParquetField::Date(days))) => days_to_date(*days),
        _ => None,
    }
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - chrono::DateTime::UNIX_EPOCH.date_naive()).num_days() as i32
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    chrono::DateTime::UNIX_EPOCH.date_naive().checked_add_signed(chrono::Duration::days(days as i64))
}
