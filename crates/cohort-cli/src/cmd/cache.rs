//! `cohort cache` - inspect and maintain the cache file

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, Table as CliTable, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use cohort_cache::Table;
use cohort_core::fmt_num;

use super::open_cache;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Create the cache file and its tables
    Init,
    /// Show row counts per table
    Status,
    /// Delete cached rows
    Clear {
        /// Only this table (default: all)
        #[arg(long)]
        table: Option<Table>,

        /// Actually delete (otherwise dry-run)
        #[arg(long)]
        confirm: bool,
    },
}

pub fn run(args: CacheArgs, config: &Config) -> Result<()> {
    match args.action {
        CacheAction::Init => init(config),
        CacheAction::Status => status(config),
        CacheAction::Clear { table, confirm } => clear(config, table, confirm),
    }
}

fn init(config: &Config) -> Result<()> {
    open_cache(config)?;
    eprintln!("Cache ready at {}", config.cache.path.display());
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    let stats = cache.stats()?;

    let mut table = CliTable::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Table").fg(Color::Cyan),
            Cell::new("Rows").fg(Color::Cyan),
        ]);
    for s in &stats {
        table.add_row(vec![Cell::new(s.table), Cell::new(fmt_num(s.rows as usize))]);
    }

    eprintln!("\n{table}");
    eprintln!("Cache file: {}", config.cache.path.display());
    Ok(())
}

fn clear(config: &Config, table: Option<Table>, confirm: bool) -> Result<()> {
    let tables: Vec<Table> = match table {
        Some(t) => vec![t],
        None => Table::ALL.to_vec(),
    };
    let cache = open_cache(config)?;

    if !confirm {
        let stats = cache.stats()?;
        let rows: u64 = stats
            .iter()
            .filter(|s| tables.contains(&s.table))
            .map(|s| s.rows)
            .sum();
        let names: Vec<&str> = tables.iter().map(|t| t.name()).collect();
        eprintln!("Would delete {} rows from {}.", fmt_num(rows as usize), names.join(", "));
        eprintln!("Run with --confirm to actually delete.");
        return Ok(());
    }

    let mut deleted = 0;
    for t in tables {
        deleted += cache.clear(t)?;
    }
    eprintln!("Deleted {} rows.", fmt_num(deleted));
    Ok(())
}
