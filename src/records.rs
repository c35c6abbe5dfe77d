use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

/// The source tables the pipeline pulls, by their published names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetTable {
    Players,
    Clubs,
    Competitions,
    Games,
    PlayerValuations,
    Appearances,
}

impl DatasetTable {
    pub const ALL: [DatasetTable; 6] = [
        DatasetTable::Players,
        DatasetTable::Clubs,
        DatasetTable::Competitions,
        DatasetTable::Games,
        DatasetTable::PlayerValuations,
        DatasetTable::Appearances,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DatasetTable::Players => "players",
            DatasetTable::Clubs => "clubs",
            DatasetTable::Competitions => "competitions",
            DatasetTable::Games => "games",
            DatasetTable::PlayerValuations => "player_valuations",
            DatasetTable::Appearances => "appearances",
        }
    }

    pub fn source_file(self) -> String {
        format!("{}.csv", self.name())
    }
}

/// A row type bound to one source table.
pub trait TableRecord {
    const TABLE: DatasetTable;
}

/// Rows that carry an event date and can therefore be sliced by month.
pub trait DatedRecord {
    fn event_date(&self) -> Option<NaiveDate>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerValuation {
    pub player_id: i64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "market_value_in_eur", default, deserialize_with = "lenient_i64")]
    pub market_value: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub current_club_id: Option<i64>,
    #[serde(rename = "player_club_domestic_competition_id", default)]
    pub competition_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Appearance {
    pub appearance_id: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub game_id: Option<i64>,
    pub player_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub player_club_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub player_current_club_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub competition_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub yellow_cards: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub red_cards: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub goals: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub assists: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub minutes_played: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Player {
    pub player_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub country_of_citizenship: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub current_club_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub market_value_in_eur: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub highest_market_value_in_eur: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Club {
    pub club_id: i64,
    #[serde(default)]
    pub club_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domestic_competition_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub total_market_value: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub squad_size: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_age: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub foreigners_percentage: Option<f64>,
    #[serde(default)]
    pub stadium_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Competition {
    pub competition_id: String,
    #[serde(default)]
    pub competition_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub domestic_league_code: Option<String>,
    #[serde(default)]
    pub confederation: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Game {
    pub game_id: i64,
    #[serde(default)]
    pub competition_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub season: Option<i64>,
    #[serde(default)]
    pub round: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub home_club_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub away_club_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub home_club_goals: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub away_club_goals: Option<i64>,
    #[serde(default)]
    pub home_club_name: Option<String>,
    #[serde(default)]
    pub away_club_name: Option<String>,
}

impl TableRecord for PlayerValuation {
    const TABLE: DatasetTable = DatasetTable::PlayerValuations;
}

impl TableRecord for Appearance {
    const TABLE: DatasetTable = DatasetTable::Appearances;
}

impl TableRecord for Player {
    const TABLE: DatasetTable = DatasetTable::Players;
}

impl TableRecord for Club {
    const TABLE: DatasetTable = DatasetTable::Clubs;
}

impl TableRecord for Competition {
    const TABLE: DatasetTable = DatasetTable::Competitions;
}

impl TableRecord for Game {
    const TABLE: DatasetTable = DatasetTable::Games;
}

impl DatedRecord for PlayerValuation {
    fn event_date(&self) -> Option<NaiveDate> {
        self.date
    }
}

impl DatedRecord for Appearance {
    fn event_date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// Accepts `YYYY-MM-DD` with an optional time suffix; anything else is null.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").ok()
}

/// Integer columns sometimes arrive as `1.5e6` or `2000000.0`.
pub fn parse_i64(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

pub fn parse_f64(raw: &str) -> Option<f64> {
    trimmed_non_empty(raw)?.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn trimmed_non_empty(raw: &str) -> Option<&str> {
    let t = raw.trim();
    if t.is_empty() { None } else { Some(t) }
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_i64))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_f64))
}
