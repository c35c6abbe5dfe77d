use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::aggregation::{AggregateOutcome, aggregate_club_valuations, aggregate_league_valuations};
use crate::config::PipelineConfig;
use crate::ingest::{DatasetSource, IngestSummary, ingest_all};
use crate::loader::{load_appearances_partition, load_dimensions, load_valuations_partition};
use crate::logos::{LogoFetchSummary, PageFetcher, fetch_league_logos};
use crate::partition::MonthPartition;
use crate::partitioner::{SliceSummary, slice_appearances, slice_many, slice_valuations};
use crate::player_report::{PlayersReport, render_players_report};
use crate::records::{Appearance, DatasetTable, PlayerValuation};
use crate::report::{LeagueReport, render_league_report};
use crate::store::{ReplaceOutcome, Store, begin_run, finish_run};

pub const STAGE_INGEST: &str = "ingest";
pub const STAGE_SLICE: &str = "slice";
pub const STAGE_MATERIALIZE: &str = "materialize";
pub const STAGE_LOGOS: &str = "league_logos";
pub const STAGE_LEAGUE_REPORT: &str = "league_report";
pub const STAGE_PLAYERS_REPORT: &str = "players_report";

#[derive(Debug, Clone)]
pub struct IngestRun {
    pub snapshots: IngestSummary,
    pub dimensions: Vec<(DatasetTable, ReplaceOutcome)>,
}

/// Everything one month went through, slice to aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRun {
    pub partition: MonthPartition,
    pub valuations: ReplaceOutcome,
    pub appearances: ReplaceOutcome,
    pub clubs: AggregateOutcome,
    pub leagues: AggregateOutcome,
}

impl PartitionRun {
    pub fn rows_written(&self) -> usize {
        self.valuations.inserted
            + self.appearances.inserted
            + self.clubs.rows_written()
            + self.leagues.rows_written()
    }

    fn detail(&self) -> Value {
        json!({
            "valuations": { "deleted": self.valuations.deleted, "inserted": self.valuations.inserted },
            "appearances": { "deleted": self.appearances.deleted, "inserted": self.appearances.inserted },
            "clubs": aggregate_detail(self.clubs),
            "leagues": aggregate_detail(self.leagues),
        })
    }
}

fn aggregate_detail(outcome: AggregateOutcome) -> Value {
    match outcome {
        AggregateOutcome::Skipped => json!("skipped"),
        AggregateOutcome::Written(o) => json!({ "deleted": o.deleted, "inserted": o.inserted }),
    }
}

/// Runs `stage` under a `pipeline_runs` entry, marking it `ok` or `failed`.
fn recorded<T>(
    store: &Store,
    stage: &str,
    partition: Option<MonthPartition>,
    run: impl FnOnce() -> Result<T>,
    summarize: impl FnOnce(&T) -> (usize, Value),
) -> Result<T> {
    let run_id = store.session(|conn| begin_run(conn, stage, partition))?;
    match run() {
        Ok(out) => {
            let (rows, detail) = summarize(&out);
            store.session(|conn| finish_run(conn, run_id, "ok", rows, &detail))?;
            Ok(out)
        }
        Err(err) => {
            let detail = json!({ "error": format!("{err:#}") });
            if let Err(log_err) = store.session(|conn| finish_run(conn, run_id, "failed", 0, &detail)) {
                warn!(stage, error = %log_err, "could not record failed run");
            }
            Err(err)
        }
    }
}

/// Refreshes every raw snapshot and the dimension tables built from them.
pub fn run_ingest(store: &Store, config: &PipelineConfig, source: &dyn DatasetSource) -> Result<IngestRun> {
    config.ensure_dirs()?;
    recorded(
        store,
        STAGE_INGEST,
        None,
        || {
            let snapshots = ingest_all(source, config)?;
            let dimensions = load_dimensions(store, config)?;
            info!(
                rows = snapshots.rows_written(),
                "ingest finished"
            );
            Ok(IngestRun {
                snapshots,
                dimensions,
            })
        },
        |run| {
            let tables: Value = run
                .snapshots
                .tables
                .iter()
                .map(|t| {
                    (
                        t.table.name().to_string(),
                        json!({ "rows": t.rows_written, "skipped": t.rows_skipped }),
                    )
                })
                .collect::<serde_json::Map<_, _>>()
                .into();
            (run.snapshots.rows_written(), json!({ "tables": tables }))
        },
    )
}

/// Slices, loads and aggregates one month.
pub fn materialize_partition(
    store: &Store,
    config: &PipelineConfig,
    partition: MonthPartition,
) -> Result<PartitionRun> {
    config.ensure_dirs()?;
    recorded(
        store,
        STAGE_MATERIALIZE,
        Some(partition),
        || {
            slice_valuations(config, partition)?;
            slice_appearances(config, partition)?;
            load_and_aggregate(store, config, partition)
        },
        |run| (run.rows_written(), run.detail()),
    )
}

/// Materializes `[from, to)`, reading each raw snapshot once for all months.
pub fn backfill(
    store: &Store,
    config: &PipelineConfig,
    from: MonthPartition,
    to: MonthPartition,
) -> Result<Vec<PartitionRun>> {
    let partitions = MonthPartition::range(from, to);
    if partitions.is_empty() {
        return Err(anyhow!("empty backfill range {from}..{to}"));
    }
    config.ensure_dirs()?;

    let slices = recorded(
        store,
        STAGE_SLICE,
        None,
        || {
            let mut out = slice_many::<PlayerValuation>(
                &config.snapshot_path(DatasetTable::PlayerValuations),
                &partitions,
                |p| config.valuation_slice_path(p),
            )?;
            out.extend(slice_many::<Appearance>(
                &config.snapshot_path(DatasetTable::Appearances),
                &partitions,
                |p| config.appearance_slice_path(p),
            )?);
            Ok(out)
        },
        |slices: &Vec<SliceSummary>| {
            let rows = slices.iter().map(|s| s.rows).sum();
            (rows, json!({ "from": from.key(), "to": to.key(), "files": slices.len() }))
        },
    )?;
    info!(files = slices.len(), "backfill slices written");

    let mut runs = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let run = recorded(
            store,
            STAGE_MATERIALIZE,
            Some(partition),
            || load_and_aggregate(store, config, partition),
            |run| (run.rows_written(), run.detail()),
        )?;
        runs.push(run);
    }
    Ok(runs)
}

fn load_and_aggregate(store: &Store, config: &PipelineConfig, partition: MonthPartition) -> Result<PartitionRun> {
    let valuations = load_valuations_partition(store, config, partition)?;
    let appearances = load_appearances_partition(store, config, partition)?;
    let clubs = aggregate_club_valuations(store, partition)?;
    let leagues = aggregate_league_valuations(store, partition)?;
    Ok(PartitionRun {
        partition,
        valuations,
        appearances,
        clubs,
        leagues,
    })
}

pub fn run_logos(store: &Store, config: &PipelineConfig, fetcher: &dyn PageFetcher) -> Result<LogoFetchSummary> {
    recorded(
        store,
        STAGE_LOGOS,
        None,
        || fetch_league_logos(store, config, fetcher),
        |summary| {
            (
                summary.downloaded.len(),
                json!({
                    "downloaded": summary.downloaded,
                    "already_present": summary.already_present,
                    "without_url": summary.without_url,
                }),
            )
        },
    )
}

pub fn run_league_report(store: &Store, config: &PipelineConfig) -> Result<Option<LeagueReport>> {
    recorded(
        store,
        STAGE_LEAGUE_REPORT,
        None,
        || render_league_report(store, config),
        |report| match report {
            Some(r) => (
                2,
                json!({
                    "latest_year": r.total.latest_year,
                    "leagues": r.total.distinct_leagues,
                    "charts": [r.total_chart.display().to_string(), r.peak_chart.display().to_string()],
                }),
            ),
            None => (0, json!("no data")),
        },
    )
}

pub fn run_players_report(store: &Store, config: &PipelineConfig) -> Result<Option<PlayersReport>> {
    recorded(
        store,
        STAGE_PLAYERS_REPORT,
        None,
        || render_players_report(store, config),
        |report| match report {
            Some(r) => (
                1,
                json!({ "players": r.players.len(), "chart": r.chart.display().to_string() }),
            ),
            None => (0, json!("no data")),
        },
    )
}
