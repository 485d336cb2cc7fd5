//! `cohort profile` - show a scientist's profile as of a year

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use cohort_core::ProgressContext;
use cohort_match::{ScientistProfile, Session};

use super::{SourceArgs, load_field_table, open_cache, open_provider};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// Author identifiers of the scientist
    #[arg(required = true)]
    pub ids: Vec<u64>,

    /// Reference year
    #[arg(short, long)]
    pub year: i32,

    /// Also summarize the last N years
    #[arg(long)]
    pub period: Option<u32>,

    /// Build the profile from these documents instead of the author's
    #[arg(long, value_delimiter = ',')]
    pub eids: Vec<String>,

    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn run(args: ProfileArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let table = load_field_table(config)?;
    let provider = open_provider(config, args.source.corpus.as_deref())?;
    let mut cache = open_cache(config)?;
    let mut session = Session::new(
        provider.as_ref(),
        &mut cache,
        config.provider.batch(),
        args.source.refresh,
        progress,
    );

    let profile = if args.eids.is_empty() {
        ScientistProfile::build(&mut session, &table, &args.ids, args.year, args.period)
    } else {
        ScientistProfile::build_from_eids(&mut session, &table, &args.ids, args.year, args.period, &args.eids)
    }
    .context("Failed to build profile")?;

    println!("{}", render(&profile));
    Ok(())
}

fn render(profile: &ScientistProfile) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Field").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let ids: Vec<String> = profile.identifier().iter().map(u64::to_string).collect();
    table.add_row(vec!["Author IDs".to_string(), ids.join(", ")]);
    table.add_row(vec!["Name".to_string(), profile.name().unwrap_or_default()]);
    table.add_row(vec![
        "Active".to_string(),
        format!("{}-{}", profile.first_year(), profile.last_year()),
    ]);
    table.add_row(vec![
        format!("Publications (to {})", profile.year()),
        profile.publications().len().to_string(),
    ]);
    table.add_row(vec!["Citations".to_string(), profile.citations().to_string()]);
    table.add_row(vec!["Coauthors".to_string(), profile.coauthors().len().to_string()]);
    table.add_row(vec![
        "Main field".to_string(),
        profile
            .main_field()
            .map(|f| format!("{} ({})", f.code, f.name))
            .unwrap_or_else(|| "unknown".to_string()),
    ]);
    table.add_row(vec!["Sources".to_string(), profile.sources().len().to_string()]);
    if let Some(aff) = profile.affiliation() {
        let name = aff.name.as_deref().unwrap_or("?");
        let country = aff.country.as_deref().unwrap_or("?");
        table.add_row(vec![
            "Affiliation".to_string(),
            format!("{name}, {country} ({})", aff.id),
        ]);
    }
    if !profile.subjects().is_empty() {
        table.add_row(vec!["Subjects".to_string(), profile.subjects().join(", ")]);
    }
    if let Some(period) = profile.period() {
        table.add_row(vec![
            format!("Since {}", period.from_year),
            format!(
                "{} publications, {} citations, {} coauthors",
                period.publications,
                period.citations,
                period.coauthors.len()
            ),
        ]);
    }
    table
}
