mod common;

use football_valuations::ingest::ingest_all;
use football_valuations::loader::load_dimensions;
use football_valuations::records::{Club, DatasetTable, PlayerValuation};
use football_valuations::snapshot::read_snapshot;
use football_valuations::store::{Store, table_row_count};

use common::{fixture_config, fixture_source};

#[test]
fn ingest_writes_every_snapshot_and_counts_dropped_rows() {
    let (_dir, config) = fixture_config();
    let summary = ingest_all(&fixture_source(), &config).unwrap();

    assert_eq!(summary.tables.len(), DatasetTable::ALL.len());
    for table in DatasetTable::ALL {
        assert!(config.snapshot_path(table).is_file(), "{} snapshot", table.name());
    }

    let valuations = summary.table(DatasetTable::PlayerValuations).unwrap();
    assert_eq!(valuations.rows_written, 10);
    assert_eq!(valuations.rows_skipped, 1);
    assert_eq!(summary.table(DatasetTable::Clubs).unwrap().rows_written, 4);
}

#[test]
fn unparsable_cells_become_null() {
    let (_dir, config) = fixture_config();
    ingest_all(&fixture_source(), &config).unwrap();

    let rows: Vec<PlayerValuation> =
        read_snapshot(&config.snapshot_path(DatasetTable::PlayerValuations)).unwrap();
    assert_eq!(rows.iter().filter(|r| r.date.is_none()).count(), 1);
    assert_eq!(rows.iter().filter(|r| r.market_value.is_none()).count(), 1);

    let clubs: Vec<Club> = read_snapshot(&config.snapshot_path(DatasetTable::Clubs)).unwrap();
    let club_d = clubs.iter().find(|c| c.club_id == 4).unwrap();
    assert_eq!(club_d.foreigners_percentage, None);
    assert_eq!(club_d.average_age, Some(24.0));
}

#[test]
fn dimension_reload_replaces_previous_rows() {
    let (_dir, config) = fixture_config();
    ingest_all(&fixture_source(), &config).unwrap();
    let store = Store::open(&config.db_path).unwrap();

    let first = load_dimensions(&store, &config).unwrap();
    let second = load_dimensions(&store, &config).unwrap();

    let clubs_second = second
        .iter()
        .find(|(t, _)| *t == DatasetTable::Clubs)
        .map(|(_, o)| *o)
        .unwrap();
    assert_eq!(first.len(), 4);
    assert_eq!(clubs_second.deleted, 4);
    assert_eq!(clubs_second.inserted, 4);
    let count = store.session(|conn| table_row_count(conn, "clubs")).unwrap();
    assert_eq!(count, 4);
    let competitions = store
        .session(|conn| table_row_count(conn, "competitions"))
        .unwrap();
    assert_eq!(competitions, 4);
}
