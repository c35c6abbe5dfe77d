use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::chart::{self, LineChart, LineSeriesData, LogoResolver};
use crate::config::PipelineConfig;
use crate::partition::MonthPartition;
use crate::store::Store;

pub const TOTAL_CHART_FILE: &str = "first_league_valuation_evolution.png";
pub const PEAK_CHART_FILE: &str = "first_league_max_valuation_evolution.png";
pub const OTHER_ID: &str = "Other";

/// One month of a first-tier league's aggregate, with its display fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueMonth {
    pub competition_id: String,
    pub partition: MonthPartition,
    pub total_valuation: i64,
    pub max_valuation: i64,
    pub competition_name: Option<String>,
    pub country_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    /// Sum of all player valuations in the league.
    Total,
    /// Most valuable single player in the league.
    Peak,
}

impl Statistic {
    fn of(self, row: &LeagueMonth) -> i64 {
        match self {
            Statistic::Total => row.total_valuation,
            Statistic::Peak => row.max_valuation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSeries {
    pub id: String,
    pub label: String,
    /// `(year, value)` ascending by year.
    pub points: Vec<(i32, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    pub statistic: Statistic,
    pub latest_year: i32,
    /// The top N in rank order, followed by the Other bucket when non-empty.
    pub series: Vec<RankedSeries>,
    pub distinct_leagues: usize,
    pub other_count: usize,
}

impl Ranking {
    pub fn top_ids(&self) -> Vec<&str> {
        self.series
            .iter()
            .filter(|s| s.id != OTHER_ID)
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn other(&self) -> Option<&RankedSeries> {
        self.series.iter().find(|s| s.id == OTHER_ID)
    }
}

#[derive(Debug, Clone)]
pub struct LeagueReport {
    pub total_chart: PathBuf,
    pub peak_chart: PathBuf,
    /// Both charts as base64 markdown images, newline separated.
    pub preview: String,
    pub total: Ranking,
    pub peak: Ranking,
}

/// `premier-league` -> `Premier League`.
pub fn deslug(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn league_label(name: Option<&str>, country: Option<&str>, fallback_id: &str) -> String {
    let name = name.map(deslug).unwrap_or_else(|| fallback_id.to_string());
    match country {
        Some(country) if !country.is_empty() => format!("{name} ({country})"),
        _ => name,
    }
}

pub fn load_first_tier_months(conn: &Connection) -> Result<Vec<LeagueMonth>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT lve.domestic_competition_id, lve.partition_date,
                   lve.total_valuation, lve.max_valuation,
                   c.name, c.country_name
            FROM league_valuation_evolution AS lve
            JOIN competitions AS c
              ON lve.domestic_competition_id = c.competition_id
            WHERE c.sub_type = 'first_tier'
            ORDER BY lve.partition_date ASC, lve.domestic_competition_id ASC
            "#,
        )
        .context("prepare first tier league query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })
        .context("query first tier leagues")?;

    let mut out = Vec::new();
    for row in rows {
        let (competition_id, key, total, max, name, country) =
            row.context("decode first tier league row")?;
        let partition: MonthPartition = key
            .parse()
            .with_context(|| format!("bad partition_date {key:?} in league_valuation_evolution"))?;
        out.push(LeagueMonth {
            competition_id,
            partition,
            total_valuation: total,
            max_valuation: max,
            competition_name: name,
            country_name: country,
        });
    }
    Ok(out)
}

/// Ranks leagues on their best month of the latest year and folds the rest
/// into a single Other series holding the yearly max across them. `None`
/// when no month is below `ceiling`.
pub fn rank_leagues(
    rows: &[LeagueMonth],
    ceiling: MonthPartition,
    statistic: Statistic,
    top_n: usize,
) -> Option<Ranking> {
    let rows: Vec<&LeagueMonth> = rows.iter().filter(|r| r.partition < ceiling).collect();
    let latest_year = rows.iter().map(|r| r.partition.year()).max()?;

    // (league, year) -> best month value; first seen display fields per league.
    let mut yearly: BTreeMap<&str, BTreeMap<i32, i64>> = BTreeMap::new();
    let mut labels: BTreeMap<&str, String> = BTreeMap::new();
    for row in &rows {
        let id = row.competition_id.as_str();
        let value = statistic.of(row);
        yearly
            .entry(id)
            .or_default()
            .entry(row.partition.year())
            .and_modify(|v| *v = (*v).max(value))
            .or_insert(value);
        labels.entry(id).or_insert_with(|| {
            league_label(
                row.competition_name.as_deref(),
                row.country_name.as_deref(),
                id,
            )
        });
    }

    let mut latest: Vec<(&str, i64)> = yearly
        .iter()
        .filter_map(|(id, years)| years.get(&latest_year).map(|v| (*id, *v)))
        .collect();
    latest.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let selected: BTreeSet<&str> = latest.iter().take(top_n).map(|(id, _)| *id).collect();

    let mut series: Vec<RankedSeries> = latest
        .iter()
        .take(top_n)
        .map(|(id, _)| RankedSeries {
            id: id.to_string(),
            label: labels.get(id).cloned().unwrap_or_else(|| id.to_string()),
            points: yearly
                .get(id)
                .map(|years| years.iter().map(|(y, v)| (*y, *v)).collect())
                .unwrap_or_default(),
        })
        .collect();

    let mut other: BTreeMap<i32, i64> = BTreeMap::new();
    for (id, years) in &yearly {
        if selected.contains(id) {
            continue;
        }
        for (year, value) in years {
            other
                .entry(*year)
                .and_modify(|acc| *acc = (*acc).max(*value))
                .or_insert(*value);
        }
    }

    let distinct_leagues = yearly.len();
    let other_count = distinct_leagues - selected.len();
    if !other.is_empty() {
        series.push(RankedSeries {
            id: OTHER_ID.to_string(),
            label: format!("{OTHER_ID} ({other_count})"),
            points: other.into_iter().collect(),
        });
    }

    Some(Ranking {
        statistic,
        latest_year,
        series,
        distinct_leagues,
        other_count,
    })
}

fn to_chart_series(ranking: &Ranking) -> Vec<LineSeriesData> {
    ranking
        .series
        .iter()
        .map(|s| LineSeriesData {
            id: s.id.clone(),
            label: s.label.clone(),
            points: s.points.iter().map(|(y, v)| (*y, *v as f64)).collect(),
        })
        .collect()
}

/// Renders the total and peak valuation charts for first-tier leagues.
///
/// Returns `None`, writing nothing, when there is no league data below the
/// reporting ceiling.
pub fn render_league_report(store: &Store, config: &PipelineConfig) -> Result<Option<LeagueReport>> {
    let rows = store.session(|conn| load_first_tier_months(conn))?;
    let total = rank_leagues(
        &rows,
        config.report_ceiling,
        Statistic::Total,
        config.top_total_leagues,
    );
    let peak = rank_leagues(
        &rows,
        config.report_ceiling,
        Statistic::Peak,
        config.top_peak_leagues,
    );
    let (Some(total), Some(peak)) = (total, peak) else {
        info!(
            rows = rows.len(),
            ceiling = %config.report_ceiling,
            "no first tier league data, report skipped"
        );
        return Ok(None);
    };

    let out_dir = config.outputs_dir();
    fs::create_dir_all(&out_dir).with_context(|| format!("create directory {}", out_dir.display()))?;
    chart::init_rendering(config.font_path.as_deref());
    let logos = LogoResolver::from_config(config);

    let total_chart = config.output_path(TOTAL_CHART_FILE);
    chart::render_line_chart(
        &total_chart,
        &LineChart {
            title: "Market Value of All Players In The League",
            x_desc: "Year",
            y_desc: "Total Valuation (EUR)",
            step: 1_000_000_000.0,
        },
        &to_chart_series(&total),
        &logos,
    )
    .context("render total valuation chart")?;

    let peak_chart = config.output_path(PEAK_CHART_FILE);
    chart::render_line_chart(
        &peak_chart,
        &LineChart {
            title: "Maximum Market Value of The Players In The League",
            x_desc: "Year",
            y_desc: "Player Valuation (EUR)",
            step: 1_000_000.0,
        },
        &to_chart_series(&peak),
        &logos,
    )
    .context("render peak valuation chart")?;

    let preview = chart::markdown_preview(&[total_chart.clone(), peak_chart.clone()])?;
    info!(
        latest_year = total.latest_year,
        leagues = total.distinct_leagues,
        "league report rendered"
    );
    Ok(Some(LeagueReport {
        total_chart,
        peak_chart,
        preview,
        total,
        peak,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(id: &str, key: &str, total: i64, max: i64) -> LeagueMonth {
        LeagueMonth {
            competition_id: id.to_string(),
            partition: key.parse().unwrap(),
            total_valuation: total,
            max_valuation: max,
            competition_name: Some(format!("{}-league", id.to_lowercase())),
            country_name: Some("Nowhere".to_string()),
        }
    }

    #[test]
    fn deslug_capitalizes_each_word() {
        assert_eq!(deslug("premier-league"), "Premier League");
        assert_eq!(deslug("LALIGA"), "Laliga");
        assert_eq!(deslug("serie-a"), "Serie A");
        assert_eq!(deslug(""), "");
    }

    #[test]
    fn label_falls_back_to_id() {
        assert_eq!(league_label(None, None, "GB1"), "GB1");
        assert_eq!(
            league_label(Some("bundesliga"), Some("Germany"), "L1"),
            "Bundesliga (Germany)"
        );
    }

    #[test]
    fn yearly_value_is_the_best_month() {
        let rows = vec![
            month("A", "2023-01", 10, 1),
            month("A", "2023-06", 30, 2),
            month("A", "2024-03", 20, 3),
        ];
        let ranking = rank_leagues(
            &rows,
            MonthPartition::new(2025, 1).unwrap(),
            Statistic::Total,
            5,
        )
        .unwrap();
        assert_eq!(ranking.series.len(), 1);
        assert_eq!(ranking.series[0].points, vec![(2023, 30), (2024, 20)]);
        assert_eq!(ranking.series[0].label, "A League (Nowhere)");
        assert!(ranking.other().is_none());
        assert_eq!(ranking.other_count, 0);
    }

    #[test]
    fn peak_other_bucket_takes_the_max() {
        let rows = vec![
            month("A", "2024-01", 0, 90),
            month("B", "2024-01", 0, 40),
            month("C", "2024-01", 0, 70),
        ];
        let ranking = rank_leagues(
            &rows,
            MonthPartition::new(2025, 1).unwrap(),
            Statistic::Peak,
            1,
        )
        .unwrap();
        assert_eq!(ranking.top_ids(), vec!["A"]);
        let other = ranking.other().unwrap();
        assert_eq!(other.points, vec![(2024, 70)]);
        assert_eq!(other.label, "Other (2)");
    }

    #[test]
    fn total_other_bucket_takes_the_max_too() {
        let rows = vec![
            month("A", "2024-01", 1000, 0),
            month("B", "2024-01", 300, 0),
            month("C", "2024-01", 200, 0),
        ];
        let ranking = rank_leagues(
            &rows,
            MonthPartition::new(2025, 1).unwrap(),
            Statistic::Total,
            1,
        )
        .unwrap();
        assert_eq!(ranking.other().unwrap().points, vec![(2024, 300)]);
    }
}
