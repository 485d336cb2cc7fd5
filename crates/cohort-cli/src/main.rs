//! cohort - find comparable scientists
//!
//! Profiles a scientist as of a reference year and searches Scopus for
//! authors with a similar career: same field, similar start, output,
//! citations and collaboration.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Find comparable scientists in bibliometric data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./cohort.toml or ~/.config/cohort/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Find scientists comparable to the given one
    Find(cmd::find::FindArgs),
    /// Show a scientist's profile
    Profile(cmd::profile::ProfileArgs),
    /// Manage the cache file
    Cache(cmd::cache::CacheArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = cohort_core::ProgressContext::new();

    // TTY: log lines go through the progress bars
    let multi = progress.is_tty().then(|| progress.multi());
    cohort_core::init_logging(cli.quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Find(args) => cmd::find::run(args, &config, &progress),
        Command::Profile(args) => cmd::profile::run(args, &config, &progress),
        Command::Cache(args) => cmd::cache::run(args, &config),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            let path_or_unset = |p: &Option<std::path::PathBuf>| {
                p.as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not set".to_string())
            };
            let m = &config.matching;

            table.add_row(vec!["Cache file", &config.cache.path.display().to_string()]);
            table.add_row(vec!["API URL", &config.provider.api_url]);
            table.add_row(vec![
                "API key",
                if config.provider.api_key.is_some() {
                    "configured"
                } else {
                    "not set"
                },
            ]);
            table.add_row(vec![
                "Max results",
                &config.provider.max_result_size.to_string(),
            ]);
            table.add_row(vec![
                "Max query length",
                &config.provider.query_max_len.to_string(),
            ]);
            table.add_row(vec![
                "Retries",
                &format!(
                    "{} (backoff {}ms)",
                    config.provider.max_retries, config.provider.backoff_ms
                ),
            ]);
            table.add_row(vec!["Field sources", &path_or_unset(&config.fields.field_sources)]);
            table.add_row(vec!["Source info", &path_or_unset(&config.fields.source_info)]);
            table.add_row(vec![
                "Margins",
                &format!(
                    "first year ±{}, pubs {}, cits {}, coauthors {}",
                    m.first_year_margin, m.pub_margin, m.cits_margin, m.coauth_margin
                ),
            ]);
            table.add_row(vec![
                "Period",
                &m.period
                    .map(|p| format!("{p} years"))
                    .unwrap_or_else(|| "none".to_string()),
            ]);
            table.add_row(vec!["Search mode", &m.mode.to_string()]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
