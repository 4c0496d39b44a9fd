//! Pouch Quote
//!
//! Prices a request from a file or the fixture set and prints the result.
//!
//! Use `-s` to pick a sample request, or `-r` to read one from a file
//! Use `-q` to compare several quantities, or `--suggest` for an economic quantity
//! Use `--json` to print records instead of tables

use std::{
    io::{self, Write},
    time::Instant,
};

use anyhow::Result;
use clap::Parser;
use humanize_duration::{Truncate, prelude::DurationExt};
use tracing::info;

use pouch_quote::{
    advisor::suggest_economic_quantity,
    batch::calculate_batch,
    cli::{Cli, Mode},
    logging,
    quote::calculate_quote,
    report::{write_batch, write_quote, write_suggestion},
};

/// Pouch Quote entry point
pub fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.logging)?;

    let table = cli.load_table()?;
    let request = cli.load_request()?;

    info!(table_version = %table.version, "loaded pricing table");

    let start = Instant::now();

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match cli.mode() {
        Mode::Quote => {
            let quote = calculate_quote(&request, &table)?;

            if cli.json {
                serde_json::to_writer_pretty(&mut handle, &quote.to_record())?;
            } else {
                write_quote(&mut handle, &quote)?;
            }
        }
        Mode::Batch(candidates) => {
            let batch = calculate_batch(&request, &candidates, &table)?;

            if cli.json {
                let records: Vec<_> = batch.entries.iter().map(|entry| entry.to_record()).collect();

                serde_json::to_writer_pretty(
                    &mut handle,
                    &serde_json::json!({ "results": records, "comparison": batch.comparison }),
                )?;
            } else {
                write_batch(&mut handle, &batch)?;
            }
        }
        Mode::Suggest => {
            let suggestion = suggest_economic_quantity(&request, &table)?;

            if cli.json {
                serde_json::to_writer_pretty(&mut handle, &suggestion.to_record())?;
            } else {
                write_suggestion(&mut handle, &suggestion)?;
            }
        }
    }

    if cli.json {
        writeln!(handle)?;
    }

    info!(elapsed = %start.elapsed().human(Truncate::Nano), "done");

    Ok(())
}
