mod common;

use football_valuations::ingest::ingest_all;
use football_valuations::partition::MonthPartition;
use football_valuations::partitioner::{select_partition, slice_many, slice_valuations};
use football_valuations::records::{DatasetTable, PlayerValuation};
use football_valuations::snapshot::read_snapshot;

use chrono::NaiveDate;
use common::{fixture_config, fixture_source, month};

fn valuation(player_id: i64, date: Option<&str>) -> PlayerValuation {
    PlayerValuation {
        player_id,
        date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
        market_value: Some(1),
        current_club_id: Some(1),
        competition_id: Some("GB1".to_string()),
    }
}

#[test]
fn month_boundaries_are_half_open() {
    let rows = vec![
        valuation(1, Some("2023-12-31")),
        valuation(2, Some("2024-01-01")),
        valuation(3, Some("2024-01-31")),
        valuation(4, Some("2024-02-01")),
        valuation(5, None),
    ];
    let jan: Vec<i64> = select_partition(&rows, month("2024-01"))
        .iter()
        .map(|r| r.player_id)
        .collect();
    let feb: Vec<i64> = select_partition(&rows, month("2024-02"))
        .iter()
        .map(|r| r.player_id)
        .collect();
    assert_eq!(jan, vec![2, 3]);
    assert_eq!(feb, vec![4]);
}

#[test]
fn december_rolls_into_the_next_year() {
    let rows = vec![valuation(1, Some("2024-12-31")), valuation(2, Some("2025-01-01"))];
    let dec = select_partition(&rows, month("2024-12"));
    assert_eq!(dec.len(), 1);
    assert_eq!(dec[0].player_id, 1);
}

#[test]
fn slice_file_holds_only_the_month() {
    let (_dir, config) = fixture_config();
    ingest_all(&fixture_source(), &config).unwrap();

    let summary = slice_valuations(&config, month("2024-01")).unwrap();
    assert_eq!(summary.rows, 6);
    assert_eq!(summary.path, config.valuation_slice_path(month("2024-01")));

    let rows: Vec<PlayerValuation> = read_snapshot(&summary.path).unwrap();
    assert_eq!(rows.len(), 6);
    assert!(
        rows.iter()
            .all(|r| r.date.is_some_and(|d| month("2024-01").contains(d)))
    );
}

#[test]
fn month_without_rows_writes_an_empty_readable_file() {
    let (_dir, config) = fixture_config();
    ingest_all(&fixture_source(), &config).unwrap();

    let summary = slice_valuations(&config, month("2019-03")).unwrap();
    assert_eq!(summary.rows, 0);
    let rows: Vec<PlayerValuation> = read_snapshot(&summary.path).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn single_pass_slicing_matches_per_month_slicing() {
    let (_dir, config) = fixture_config();
    ingest_all(&fixture_source(), &config).unwrap();

    let partitions = MonthPartition::range(month("2023-06"), month("2024-03"));
    let many = slice_many::<PlayerValuation>(
        &config.snapshot_path(DatasetTable::PlayerValuations),
        &partitions,
        |p| config.valuation_slice_path(p),
    )
    .unwrap();
    assert_eq!(many.len(), partitions.len());

    for item in &many {
        let single = slice_valuations(&config, item.partition).unwrap();
        assert_eq!(single.rows, item.rows, "{}", item.partition);
    }
    let total: usize = many.iter().map(|s| s.rows).sum();
    // two in 2023-06, six in January, one in February; the undated row is in none
    assert_eq!(total, 9);
}
