//! Classification and parse inspector for individual table files
//!
//! Shows what ingestion would make of each file: the kind it classifies
//! as, the episode id it extracts, and a per-column summary of the parsed
//! rows. Handy when a stats dump refuses to show up in a report.

use episcope::ingest::classify::{self, TableKind};
use episcope::ingest::parse;
use episcope::store::{Cell, Table};
use std::env;
use std::fs;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: table_detail <file1> [file2 ...]");
        std::process::exit(1);
    }

    for path in &args[1..] {
        println!("\n{}", "=".repeat(60));
        println!("FILE: {}", path);
        println!("{}", "=".repeat(60));
        inspect_file(path);
    }
}

fn inspect_file(path: &str) {
    let kind = match classify::classify(path) {
        Some(kind) => kind,
        None => {
            println!("Classification: unrecognized (ingestion would skip this file)");
            return;
        }
    };
    println!("Classification: {}", kind.label());

    if kind.requires_episode() {
        match classify::extract_episode_id(path) {
            Some(id) => println!("Episode id:     {}", id),
            None => println!("Episode id:     none found (ingestion would skip this file)"),
        }
    } else {
        println!("Episode id:     taken from the embedded episode column");
    }

    let text = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            println!("Read failed: {}", e);
            return;
        }
    };

    if kind == TableKind::BasicStats {
        match parse::parse_basic_stats(&text) {
            Ok(row) => {
                println!("\nScalar stats ({} keys):", row.len());
                for key in row.keys() {
                    println!("  {:<24} {}", key, row.label(key).unwrap_or_default());
                }
            }
            Err(e) => println!("Parse failed: {}", e),
        }
        return;
    }

    match parse::parse_csv(kind, &text) {
        Ok(table) => describe_table(&table),
        Err(e) => println!("Parse failed: {}", e),
    }
}

fn describe_table(table: &Table) {
    println!("\nRows: {}", table.rows.len());

    let columns = table.column_names();
    println!("\nColumns:");
    println!(
        "{:<20} {:>7} {:>7} {:>12} {:>12}",
        "name", "numeric", "text", "min", "max"
    );

    for column in &columns {
        let mut numeric = 0usize;
        let mut text = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for row in &table.rows {
            match row.get(column) {
                Some(Cell::Num(v)) => {
                    numeric += 1;
                    min = min.min(*v);
                    max = max.max(*v);
                }
                Some(Cell::Text(_)) => text += 1,
                None => {}
            }
        }

        let (min_s, max_s) = if numeric > 0 {
            (Cell::Num(min).label(), Cell::Num(max).label())
        } else {
            ("-".to_string(), "-".to_string())
        };
        println!(
            "{:<20} {:>7} {:>7} {:>12} {:>12}",
            column, numeric, text, min_s, max_s
        );
    }

    const PREVIEW: usize = 5;
    if !table.rows.is_empty() {
        println!("\nFirst rows:");
        for row in table.rows.iter().take(PREVIEW) {
            let cells: Vec<String> = columns
                .iter()
                .filter_map(|c| row.label(c).map(|v| format!("{}={}", c, v)))
                .collect();
            println!("  {}", cells.join("  "));
        }
        if table.rows.len() > PREVIEW {
            println!("  ... {} more", table.rows.len() - PREVIEW);
        }
    }

    if table.kind.vocabulary().is_some() {
        println!("\nDistribution entries:");
        for row in &table.rows {
            let label = row.label("label").unwrap_or_else(|| "(none)".to_string());
            println!("  {:<16} ratio {:<8} count {}", label,
                Cell::Num(row.num_or("ratio", 0.0)).label(),
                Cell::Num(row.num_or("count", 0.0)).label());
        }
    }

    if table.kind.is_curve() {
        let series = table.numeric_keys_except("minute");
        let minutes: Vec<f64> = table
            .rows
            .iter()
            .filter_map(|row| row.num("minute"))
            .collect();
        let lo = minutes.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = minutes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if minutes.is_empty() {
            println!("\nCurve: no minute column values");
        } else {
            println!(
                "\nCurve: minutes {}..{}, series: {}",
                Cell::Num(lo).label(),
                Cell::Num(hi).label(),
                series.join(", ")
            );
        }
    }
}
