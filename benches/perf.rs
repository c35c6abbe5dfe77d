use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::NaiveDate;

use football_valuations::aggregation::{JoinedValuation, summarize_clubs, summarize_leagues};
use football_valuations::ingest::parse_csv;
use football_valuations::partition::MonthPartition;
use football_valuations::partitioner::select_partition;
use football_valuations::records::PlayerValuation;
use football_valuations::report::{LeagueMonth, Statistic, rank_leagues};

const LEAGUES: [&str; 12] = [
    "GB1", "ES1", "IT1", "L1", "FR1", "NL1", "PO1", "BE1", "TR1", "RU1", "SC1", "GR1",
];

fn sample_csv(rows: usize) -> String {
    let mut out = String::from(
        "player_id,date,market_value_in_eur,current_club_id,player_club_domestic_competition_id\n",
    );
    for idx in 0..rows {
        let day = 1 + idx % 28;
        let month = 1 + (idx / 28) % 12;
        let year = 2015 + (idx / 336) % 10;
        out.push_str(&format!(
            "{},{year}-{month:02}-{day:02},{},{},{}\n",
            idx % 5_000,
            (idx % 90 + 1) * 100_000,
            idx % 400,
            LEAGUES[idx % LEAGUES.len()],
        ));
    }
    out
}

fn sample_joined(rows: usize) -> Vec<JoinedValuation> {
    (0..rows)
        .map(|idx| JoinedValuation {
            club_id: (idx % 400) as i64,
            club_name: Some(format!("Club {}", idx % 400)),
            domestic_competition_id: Some(LEAGUES[(idx % 400) % LEAGUES.len()].to_string()),
            market_value: ((idx % 90 + 1) * 100_000) as i64,
        })
        .collect()
}

fn sample_league_months() -> Vec<LeagueMonth> {
    let mut rows = Vec::new();
    for partition in MonthPartition::range(
        MonthPartition::const_month(2015, 1),
        MonthPartition::const_month(2025, 1),
    ) {
        for (idx, id) in LEAGUES.iter().enumerate() {
            let base = (idx as i64 + 1) * 500_000_000;
            rows.push(LeagueMonth {
                competition_id: id.to_string(),
                partition,
                total_valuation: base + i64::from(partition.month()) * 1_000_000,
                max_valuation: base / 20,
                competition_name: Some(format!("league-{idx}")),
                country_name: Some("Somewhere".to_string()),
            });
        }
    }
    rows
}

fn bench_valuations_csv_parse(c: &mut Criterion) {
    let raw = sample_csv(20_000);
    c.bench_function("valuations_csv_parse", |b| {
        b.iter(|| {
            let (rows, skipped) = parse_csv::<PlayerValuation>(black_box(raw.as_bytes())).unwrap();
            black_box((rows.len(), skipped));
        })
    });
}

fn bench_month_selection(c: &mut Criterion) {
    let (rows, _) = parse_csv::<PlayerValuation>(sample_csv(50_000).as_bytes()).unwrap();
    let partition = NaiveDate::from_ymd_opt(2019, 6, 1)
        .map(MonthPartition::containing)
        .unwrap();
    c.bench_function("month_selection", |b| {
        b.iter(|| {
            let slice = select_partition(black_box(&rows), black_box(partition));
            black_box(slice.len());
        })
    });
}

fn bench_club_rollup(c: &mut Criterion) {
    let joined = sample_joined(50_000);
    c.bench_function("club_rollup", |b| {
        b.iter(|| {
            let clubs = summarize_clubs(black_box(&joined));
            black_box(clubs.len());
        })
    });
}

fn bench_league_rollup(c: &mut Criterion) {
    let joined = sample_joined(50_000);
    c.bench_function("league_rollup", |b| {
        b.iter(|| {
            let leagues = summarize_leagues(black_box(&joined));
            black_box(leagues.len());
        })
    });
}

fn bench_league_ranking(c: &mut Criterion) {
    let rows = sample_league_months();
    let ceiling = MonthPartition::const_month(2025, 1);
    c.bench_function("league_ranking", |b| {
        b.iter(|| {
            let total = rank_leagues(black_box(&rows), ceiling, Statistic::Total, 5);
            let peak = rank_leagues(black_box(&rows), ceiling, Statistic::Peak, 7);
            black_box((total, peak));
        })
    });
}

criterion_group!(
    perf,
    bench_valuations_csv_parse,
    bench_month_selection,
    bench_club_rollup,
    bench_league_rollup,
    bench_league_ranking
);
criterion_main!(perf);
