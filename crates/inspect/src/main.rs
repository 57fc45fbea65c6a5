//! rtable-inspect: operator tool for replicated-table configurations.
//!
//! Loads a YAML configuration, then either answers a routing question or
//! scans a JSON-lines dump of a replica the way a reader bound to the
//! table's view would see it.
//!
//! `partition` is always a value of the table's `partition_on_property`.
//! `scan` reads the rows whose property carries that value, whatever their
//! physical partition key.
//!
//! ```text
//! rtable-inspect <config.yaml> view <table> [partition]
//! rtable-inspect <config.yaml> referenced <view>
//! rtable-inspect <config.yaml> check
//! rtable-inspect <config.yaml> scan <table> <rows.jsonl> [partition] [--strict] [--shape <shape>]
//! ```

use rtable_config::ReplicatedTableConfig;
use rtable_scan::{ConsistentScan, ScanOptions, StaleViewCheck};
use rtable_storage::{dump, Memtable, RowShape};
use std::path::Path;
use std::process::ExitCode;

const USAGE: &str = "usage:
  rtable-inspect <config.yaml> view <table> [partition]
  rtable-inspect <config.yaml> referenced <view>
  rtable-inspect <config.yaml> check
  rtable-inspect <config.yaml> scan <table> <rows.jsonl> [partition] [--strict] [--shape replicated|dynamic|init-dynamic]";

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    rtable_metrics::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, command, rest) = match args.as_slice() {
        [config, command, rest @ ..] => (config, command.as_str(), rest),
        _ => {
            eprintln!("{}", USAGE);
            return Ok(ExitCode::from(2));
        }
    };

    let config = rtable_config::load_from_file(Path::new(config_path))?;
    tracing::info!(
        "loaded {} view(s) and {} table binding(s) from {}",
        config.views.len(),
        config.tables.len(),
        config_path
    );

    match (command, rest) {
        ("view", [table, partition @ ..]) => {
            let partition = partition.first().map(String::as_str).unwrap_or("");
            Ok(print_view(&config, table, partition))
        }
        ("referenced", [view]) => Ok(print_referencing(&config, view)),
        ("check", []) => Ok(check(&config)),
        ("scan", [table, rows, opts @ ..]) => scan(&config, table, Path::new(rows), opts),
        _ => {
            eprintln!("{}", USAGE);
            Ok(ExitCode::from(2))
        }
    }
}

fn print_view(config: &ReplicatedTableConfig, table: &str, partition: &str) -> ExitCode {
    let Some(binding) = config.get_table(table) else {
        eprintln!("no binding for table '{}' and no default binding", table);
        return ExitCode::FAILURE;
    };

    let view_name = binding.get_view_for_partition(partition);
    match config.get_view(view_name) {
        Some(view) => {
            println!(
                "{} (view_id {}, read tail {})",
                view.name,
                view.view_id,
                view.read_tail()
                    .map(|r| r.storage_account.as_str())
                    .unwrap_or("-")
            );
            ExitCode::SUCCESS
        }
        None => {
            eprintln!(
                "table '{}' partition '{}' routes to undefined view '{}'",
                binding.table_name, partition, view_name
            );
            ExitCode::FAILURE
        }
    }
}

fn print_referencing(config: &ReplicatedTableConfig, view: &str) -> ExitCode {
    let tables = config.tables_referencing(view);
    if tables.is_empty() {
        println!("view '{}' is not referenced and can be retired", view);
        return ExitCode::SUCCESS;
    }
    for table in tables {
        println!("{}", table.table_name);
    }
    ExitCode::FAILURE
}

fn check(config: &ReplicatedTableConfig) -> ExitCode {
    let incomplete = config.incomplete_tables();
    for table in &incomplete {
        println!("incomplete: {}", table.table_name);
    }
    if incomplete.is_empty() {
        println!("all {} table binding(s) are routable", config.tables.len());
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn scan(
    config: &ReplicatedTableConfig,
    table: &str,
    rows_path: &Path,
    opts: &[String],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut partition = "";
    let mut check = StaleViewCheck::Disabled;
    let mut shape = RowShape::Replicated;

    let mut opts = opts.iter();
    while let Some(opt) = opts.next() {
        match opt.as_str() {
            "--strict" => check = StaleViewCheck::Strict,
            "--shape" => {
                let name = opts.next().ok_or("--shape needs a value")?;
                shape = RowShape::parse(name).ok_or_else(|| format!("unknown row shape '{}'", name))?;
            }
            p if partition.is_empty() && !p.starts_with("--") => partition = p,
            other => return Err(format!("unexpected argument '{}'", other).into()),
        }
    }

    let binding = config
        .get_table(table)
        .ok_or_else(|| format!("no binding for table '{}'", table))?;
    if binding.is_any_view_null_or_empty() {
        tracing::warn!("table '{}' has an incomplete binding", binding.table_name);
    }
    let view = config
        .resolve_view(table, partition)
        .ok_or_else(|| format!("table '{}' partition '{}' has no routable view", table, partition))?;

    let mut replica = Memtable::new();
    for row in dump::read_rows_from_file(rows_path)? {
        replica.load(row);
    }
    // `partition` is the value of the binding's routing property, not a
    // physical partition key: pick the rows carrying that value.
    let cursor = match binding.partition_property() {
        Some(property) if !partition.is_empty() => replica.scan_by_property(property, partition),
        _ => {
            if !partition.is_empty() {
                tracing::info!(
                    "table '{}' is not partitioned; scanning every row under view '{}'",
                    binding.table_name,
                    view.name
                );
            }
            replica.scan()
        }
    };

    let options = ScanOptions::for_table(binding, view).with_stale_view_check(check);
    let mut scan = ConsistentScan::open(cursor, shape, options)?;
    for row in scan.by_ref() {
        println!("{}", serde_json::to_string(&row?)?);
    }

    let stats = scan.stats();
    tracing::info!(
        "scanned {} via view '{}': {} returned, {} tombstone(s) hidden",
        table,
        view.name,
        stats.rows_returned,
        stats.tombstones_skipped
    );
    Ok(ExitCode::SUCCESS)
}
