mod common;

use chrono::NaiveDate;
use rusqlite::Connection;

use football_valuations::loader::{
    APPEARANCES_TABLE, VALUATIONS_TABLE, load_appearances_partition, load_partition_file,
    load_valuations_partition,
};
use football_valuations::partitioner::{slice_appearances, slice_valuations};
use football_valuations::records::PlayerValuation;
use football_valuations::snapshot::write_snapshot;
use football_valuations::store::partition_row_count;

use common::{ingested_store, month};

type ValuationRow = (i64, Option<String>, Option<i64>, Option<i64>, String);

fn valuation_rows(conn: &Connection) -> Vec<ValuationRow> {
    let mut stmt = conn
        .prepare(
            "SELECT player_id, date, market_value, current_club_id, partition_date
             FROM player_valuations
             ORDER BY partition_date, player_id, date",
        )
        .unwrap();
    stmt.query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    })
    .unwrap()
    .map(|r| r.unwrap())
    .collect()
}

#[test]
fn reloading_a_partition_is_idempotent() {
    let (_dir, config, store) = ingested_store();
    let jan = month("2024-01");
    slice_valuations(&config, jan).unwrap();

    let first = load_valuations_partition(&store, &config, jan).unwrap();
    let after_first = store.session(|conn| Ok(valuation_rows(conn))).unwrap();
    let second = load_valuations_partition(&store, &config, jan).unwrap();
    let after_second = store.session(|conn| Ok(valuation_rows(conn))).unwrap();

    assert_eq!(first.deleted, 0);
    assert_eq!(first.inserted, 6);
    assert_eq!(second.deleted, 6);
    assert_eq!(second.inserted, 6);
    assert_eq!(after_first, after_second);
    assert!(after_second.iter().all(|r| r.4 == "2024-01"));
}

#[test]
fn reload_replaces_rows_and_leaves_other_partitions_alone() {
    let (_dir, config, store) = ingested_store();
    let jan = month("2024-01");
    let feb = month("2024-02");
    slice_valuations(&config, jan).unwrap();
    slice_valuations(&config, feb).unwrap();
    load_valuations_partition(&store, &config, jan).unwrap();
    load_valuations_partition(&store, &config, feb).unwrap();

    // January's slice shrinks to a single corrected row.
    let corrected = vec![PlayerValuation {
        player_id: 10,
        date: NaiveDate::from_ymd_opt(2024, 1, 15),
        market_value: Some(11_000_000),
        current_club_id: Some(1),
        competition_id: Some("GB1".to_string()),
    }];
    let path = config.valuation_slice_path(jan);
    write_snapshot(&path, &corrected).unwrap();
    load_partition_file::<PlayerValuation>(&store, &path, jan).unwrap();

    let (jan_count, feb_count) = store
        .session(|conn| {
            Ok((
                partition_row_count(conn, VALUATIONS_TABLE, jan)?,
                partition_row_count(conn, VALUATIONS_TABLE, feb)?,
            ))
        })
        .unwrap();
    assert_eq!(jan_count, 1);
    assert_eq!(feb_count, 1);

    let rows = store.session(|conn| Ok(valuation_rows(conn))).unwrap();
    let jan_row = rows.iter().find(|r| r.4 == "2024-01").unwrap();
    assert_eq!(jan_row.2, Some(11_000_000));
}

#[test]
fn empty_slice_clears_the_partition() {
    let (_dir, config, store) = ingested_store();
    let jan = month("2024-01");
    slice_valuations(&config, jan).unwrap();
    load_valuations_partition(&store, &config, jan).unwrap();

    let path = config.valuation_slice_path(jan);
    write_snapshot::<PlayerValuation>(&path, &[]).unwrap();
    let outcome = load_partition_file::<PlayerValuation>(&store, &path, jan).unwrap();

    assert_eq!(outcome.deleted, 6);
    assert_eq!(outcome.inserted, 0);
    let count = store
        .session(|conn| partition_row_count(conn, VALUATIONS_TABLE, jan))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn appearances_load_under_their_month() {
    let (_dir, config, store) = ingested_store();
    let jan = month("2024-01");
    slice_appearances(&config, jan).unwrap();
    let outcome = load_appearances_partition(&store, &config, jan).unwrap();
    assert_eq!(outcome.inserted, 2);

    let count = store
        .session(|conn| partition_row_count(conn, APPEARANCES_TABLE, jan))
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn missing_slice_file_is_an_error() {
    let (_dir, config, store) = ingested_store();
    let err = load_valuations_partition(&store, &config, month("2030-01")).unwrap_err();
    assert!(format!("{err:#}").contains("player_valuations"));
}
