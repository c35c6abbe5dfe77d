mod common;

use football_valuations::aggregation::{AggregateOutcome, load_league_evolution};
use football_valuations::partition::MonthPartition;
use football_valuations::pipeline::{
    STAGE_INGEST, STAGE_MATERIALIZE, STAGE_SLICE, backfill, materialize_partition, run_ingest,
    run_players_report,
};
use football_valuations::player_report::{TOP_PLAYERS_FILE, load_top_players};
use football_valuations::store::{Store, load_runs};

use common::{fixture_config, fixture_source, month};

#[test]
fn ingest_then_materialize_records_runs() {
    let (_dir, config) = fixture_config();
    let store = Store::open(&config.db_path).unwrap();

    let ingest = run_ingest(&store, &config, &fixture_source()).unwrap();
    assert_eq!(ingest.dimensions.len(), 4);

    let run = materialize_partition(&store, &config, month("2024-01")).unwrap();
    assert_eq!(run.valuations.inserted, 6);
    assert_eq!(run.appearances.inserted, 2);
    assert!(matches!(run.clubs, AggregateOutcome::Written(o) if o.inserted == 4));
    assert!(matches!(run.leagues, AggregateOutcome::Written(o) if o.inserted == 3));

    let runs = store.session(|conn| load_runs(conn)).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].stage, STAGE_INGEST);
    assert_eq!(runs[1].stage, STAGE_MATERIALIZE);
    assert_eq!(runs[1].partition_date.as_deref(), Some("2024-01"));
    assert!(runs.iter().all(|r| r.finished && r.status == "ok"));
    assert_eq!(runs[1].rows_written, run.rows_written() as i64);
}

#[test]
fn empty_month_materializes_without_aggregates() {
    let (_dir, config) = fixture_config();
    let store = Store::open(&config.db_path).unwrap();
    run_ingest(&store, &config, &fixture_source()).unwrap();

    let run = materialize_partition(&store, &config, month("2019-07")).unwrap();
    assert_eq!(run.valuations.inserted, 0);
    assert_eq!(run.clubs, AggregateOutcome::Skipped);
    assert_eq!(run.leagues, AggregateOutcome::Skipped);
    assert_eq!(run.rows_written(), 0);
}

#[test]
fn failed_stage_is_logged_as_failed() {
    let (_dir, config) = fixture_config();
    let store = Store::open(&config.db_path).unwrap();

    // Nothing ingested yet, so there is no snapshot to slice.
    assert!(materialize_partition(&store, &config, month("2024-01")).is_err());

    let runs = store.session(|conn| load_runs(conn)).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "failed");
    assert!(runs[0].finished);
    assert!(runs[0].detail.contains("error"));
}

#[test]
fn backfill_matches_month_by_month_materialization() {
    let (_dir, config) = fixture_config();
    let store = Store::open(&config.db_path).unwrap();
    run_ingest(&store, &config, &fixture_source()).unwrap();

    let runs = backfill(&store, &config, month("2023-06"), month("2024-03")).unwrap();
    assert_eq!(runs.len(), 9);
    assert_eq!(runs.first().map(|r| r.partition), Some(month("2023-06")));
    assert_eq!(runs.last().map(|r| r.partition), Some(month("2024-02")));
    let written: Vec<MonthPartition> = runs
        .iter()
        .filter(|r| r.valuations.inserted > 0)
        .map(|r| r.partition)
        .collect();
    assert_eq!(
        written,
        vec![month("2023-06"), month("2024-01"), month("2024-02")]
    );

    let backfilled = store
        .session(|conn| load_league_evolution(conn, month("2024-01")))
        .unwrap();
    materialize_partition(&store, &config, month("2024-01")).unwrap();
    let single = store
        .session(|conn| load_league_evolution(conn, month("2024-01")))
        .unwrap();
    assert_eq!(backfilled, single);

    let runs = store.session(|conn| load_runs(conn)).unwrap();
    assert_eq!(runs.iter().filter(|r| r.stage == STAGE_SLICE).count(), 1);
    assert_eq!(
        runs.iter().filter(|r| r.stage == STAGE_MATERIALIZE).count(),
        10
    );
}

#[test]
fn empty_backfill_range_is_rejected() {
    let (_dir, config) = fixture_config();
    let store = Store::open(&config.db_path).unwrap();
    assert!(backfill(&store, &config, month("2024-03"), month("2024-03")).is_err());
}

#[test]
fn players_report_ranks_by_average_valuation() {
    let (_dir, config) = fixture_config();
    let store = Store::open(&config.db_path).unwrap();
    assert!(run_players_report(&store, &config).unwrap().is_none());

    run_ingest(&store, &config, &fixture_source()).unwrap();
    backfill(&store, &config, month("2023-06"), month("2024-03")).unwrap();

    let top = store.session(|conn| load_top_players(conn, 2)).unwrap();
    assert_eq!(top.len(), 2);
    // player 10: 15M, 10M, 30M at Club A
    assert_eq!(top[0].player_id, 11);
    assert_eq!(top[0].avg_valuation, 20_000_000.0);
    assert_eq!(top[1].player_id, 10);
    assert_eq!(top[1].max_valuation, 30_000_000);
    assert_eq!(top[1].min_valuation, 10_000_000);
    assert_eq!(top[1].club_name.as_deref(), Some("Club A"));

    let report = run_players_report(&store, &config).unwrap().unwrap();
    assert_eq!(report.chart, config.output_path(TOP_PLAYERS_FILE));
    assert!(report.chart.is_file());
    assert_eq!(report.players.len(), 5);
}
