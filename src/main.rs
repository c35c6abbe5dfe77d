use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use football_valuations::config::PipelineConfig;
use football_valuations::ingest::source_from_config;
use football_valuations::logging::init_tracing;
use football_valuations::logos::HttpPageFetcher;
use football_valuations::partition::MonthPartition;
use football_valuations::pipeline;
use football_valuations::store::Store;

const USAGE: &str = "usage: football-pipeline <command> [--db PATH]

commands:
  ingest                               refresh raw snapshots and dimension tables
  materialize --partition YYYY-MM      slice, load and aggregate one month
  backfill [--from YYYY-MM] [--to YYYY-MM]
                                       materialize every month in [from, to)
  logos                                download missing league logos
  report                               render the first tier league charts
  players-report                       render the top players chart";

fn main() -> Result<()> {
    init_tracing();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = parse_command(&args) else {
        eprintln!("{USAGE}");
        return Err(anyhow!("missing command"));
    };

    let mut config = PipelineConfig::from_env()?;
    if let Some(db) = parse_path_arg(&args, "--db") {
        config.db_path = db;
    }
    config.ensure_dirs()?;
    let store = Store::open(&config.db_path)?;

    match command.as_str() {
        "ingest" => {
            let source = source_from_config(&config);
            let run = pipeline::run_ingest(&store, &config, &*source)?;
            println!("Ingest complete");
            println!("DB: {}", store.path().display());
            for table in &run.snapshots.tables {
                println!(
                    "{}: rows={} skipped={}",
                    table.table.name(),
                    table.rows_written,
                    table.rows_skipped
                );
            }
        }
        "materialize" => {
            let partition = parse_partition_arg(&args, "--partition")?
                .context("materialize needs --partition YYYY-MM")?;
            let run = pipeline::materialize_partition(&store, &config, partition)?;
            print_partition_run(&run);
        }
        "backfill" => {
            let from = parse_partition_arg(&args, "--from")?.unwrap_or(config.partition_start);
            let to = parse_partition_arg(&args, "--to")?.unwrap_or(config.partition_end);
            let runs = pipeline::backfill(&store, &config, from, to)?;
            for run in &runs {
                print_partition_run(run);
            }
            println!("Backfilled {} partitions", runs.len());
        }
        "logos" => {
            let summary = pipeline::run_logos(&store, &config, &HttpPageFetcher)?;
            println!(
                "Logos: downloaded={} present={} without_url={}",
                summary.downloaded.len(),
                summary.already_present,
                summary.without_url
            );
        }
        "report" => match pipeline::run_league_report(&store, &config)? {
            Some(report) => {
                println!("{}", report.total_chart.display());
                println!("{}", report.peak_chart.display());
                println!("{}", report.preview);
            }
            None => println!("No first tier league data to report"),
        },
        "players-report" => match pipeline::run_players_report(&store, &config)? {
            Some(report) => println!("{}", report.chart.display()),
            None => println!("No player valuations to report"),
        },
        other => {
            eprintln!("{USAGE}");
            return Err(anyhow!("unknown command {other:?}"));
        }
    }
    Ok(())
}

fn print_partition_run(run: &pipeline::PartitionRun) {
    println!(
        "{}: valuations={} appearances={} clubs={} leagues={}",
        run.partition,
        run.valuations.inserted,
        run.appearances.inserted,
        run.clubs.rows_written(),
        run.leagues.rows_written()
    );
}

/// First positional argument; every `--flag` without `=` consumes the next one.
fn parse_command(args: &[String]) -> Option<String> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = !arg.contains('=');
            continue;
        }
        return Some(arg.clone());
    }
    None
}

fn parse_partition_arg(args: &[String], flag: &str) -> Result<Option<MonthPartition>> {
    let Some(raw) = parse_flag_value(args, flag) else {
        return Ok(None);
    };
    let partition = raw
        .parse::<MonthPartition>()
        .with_context(|| format!("invalid {flag}"))?;
    Ok(Some(partition))
}

fn parse_path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    parse_flag_value(args, flag).map(PathBuf::from)
}

/// Accepts both `--flag=value` and `--flag value`.
fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
