use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use tracing::info;

use crate::chart::{self, Bar, BarChart};
use crate::config::PipelineConfig;
use crate::store::Store;

pub const TOP_PLAYERS_FILE: &str = "top_100_player_valuations.png";

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerValuationSummary {
    pub player_id: i64,
    pub name: Option<String>,
    pub club_name: Option<String>,
    pub avg_valuation: f64,
    pub max_valuation: i64,
    pub min_valuation: i64,
}

#[derive(Debug, Clone)]
pub struct PlayersReport {
    pub chart: PathBuf,
    pub players: Vec<PlayerValuationSummary>,
}

/// Highest average valuations per (player, club) over every loaded month.
pub fn load_top_players(conn: &Connection, limit: usize) -> Result<Vec<PlayerValuationSummary>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT p.player_id, p.name, c.name,
                   AVG(v.market_value), MAX(v.market_value), MIN(v.market_value)
            FROM player_valuations AS v
            JOIN players AS p ON v.player_id = p.player_id
            JOIN clubs AS c ON v.current_club_id = c.club_id
            WHERE v.market_value IS NOT NULL
            GROUP BY p.player_id, p.name, c.name
            ORDER BY AVG(v.market_value) DESC, p.player_id ASC
            LIMIT ?1
            "#,
        )
        .context("prepare top players query")?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(PlayerValuationSummary {
                player_id: row.get(0)?,
                name: row.get(1)?,
                club_name: row.get(2)?,
                avg_valuation: row.get(3)?,
                max_valuation: row.get(4)?,
                min_valuation: row.get(5)?,
            })
        })
        .context("query top players")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode top player row")?);
    }
    Ok(out)
}

pub fn render_players_report(store: &Store, config: &PipelineConfig) -> Result<Option<PlayersReport>> {
    let players = store.session(|conn| load_top_players(conn, config.top_players))?;
    if players.is_empty() {
        info!("no player valuations loaded, players report skipped");
        return Ok(None);
    }

    let bars: Vec<Bar> = players
        .iter()
        .map(|p| Bar {
            label: p
                .name
                .clone()
                .unwrap_or_else(|| format!("#{}", p.player_id)),
            group: p.club_name.clone().unwrap_or_else(|| "Unknown".to_string()),
            value: p.avg_valuation,
        })
        .collect();

    let out_dir = config.outputs_dir();
    fs::create_dir_all(&out_dir).with_context(|| format!("create directory {}", out_dir.display()))?;
    chart::init_rendering(config.font_path.as_deref());

    let title = format!("Top {} Players by Average Valuation", config.top_players);
    let path = config.output_path(TOP_PLAYERS_FILE);
    chart::render_bar_chart(
        &path,
        &BarChart {
            title: &title,
            x_desc: "Average Valuation (EUR)",
            step: 1_000_000.0,
        },
        &bars,
    )
    .context("render top players chart")?;

    info!(players = players.len(), path = %path.display(), "players report rendered");
    Ok(Some(PlayersReport {
        chart: path,
        players,
    }))
}
