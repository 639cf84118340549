//! Optimize Example
//!
//! Picks a store for every item in a snapshot and prints the receipt.
//!
//! `cargo run --example optimize -- fixtures/deck.json --fees fixtures/websites.json`
//!
//! Use `-o` to write the snapshot annotated with each item's `optimal_listing`

use std::{io, io::Write, time::Instant};

use anyhow::Result;
use humanize_duration::{Truncate, prelude::DurationExt};
use tracing_subscriber::EnvFilter;

use cardcart::{
    config::OptimizerConfig, optimizer::optimize, receipt::FAILED_TOTAL, snapshot::Snapshot,
};

/// Optimize Example
pub fn main() -> Result<()> {
    let config = OptimizerConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let fees = config.fee_config()?;
    let currency = config.default_currency()?;
    let mut snapshot = Snapshot::load(&config.snapshot)?;

    let list = snapshot.to_shopping_list(&fees, currency)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let start = Instant::now();
    let result = optimize(&list);
    let elapsed = start.elapsed();

    snapshot.clear_optimal_listings();

    let total = match result {
        Ok(receipt) => {
            receipt.write_to(&mut handle)?;
            snapshot.apply_receipt(&receipt);

            receipt.grand_total()
        }
        Err(err) => {
            writeln!(handle, "\nNo optimal assignment: {err}")?;

            let unlisted: Vec<&str> = list.unlisted_items().collect();

            if !unlisted.is_empty() {
                writeln!(handle, "Not listed at any store: {}", unlisted.join(", "))?;
            }

            FAILED_TOTAL
        }
    };

    writeln!(
        handle,
        " Grand total: {total} ({})",
        elapsed.human(Truncate::Nano)
    )?;

    if let Some(out) = &config.out {
        snapshot.save(out)?;

        writeln!(handle, " Wrote {}", out.display())?;
    }

    Ok(())
}
