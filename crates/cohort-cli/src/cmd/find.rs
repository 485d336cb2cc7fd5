//! `cohort find` - find comparable scientists

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use cohort_core::ProgressContext;
use cohort_match::{InfoField, Margin, MatchInfo, MatchParams, MatchRun, SearchMode, Session};

use super::{SourceArgs, load_field_table, open_cache, open_provider};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Author identifiers of the scientist (several for split profiles)
    #[arg(required = true)]
    pub ids: Vec<u64>,

    /// Reference year
    #[arg(short, long)]
    pub year: i32,

    /// Allowed distance from the scientist's first publication year
    #[arg(long)]
    pub first_year_margin: Option<u32>,

    /// Publication margin: absolute ("3") or fraction ("0.2")
    #[arg(long)]
    pub pub_margin: Option<Margin>,

    /// Citation margin: absolute or fraction
    #[arg(long)]
    pub cits_margin: Option<Margin>,

    /// Coauthor margin: absolute or fraction
    #[arg(long)]
    pub coauth_margin: Option<Margin>,

    /// Also match on citations and coauthors of the last N years
    #[arg(long)]
    pub period: Option<u32>,

    /// Only keep matches from these affiliations (comma-separated ids)
    #[arg(long, value_delimiter = ',')]
    pub affiliations: Vec<u64>,

    /// Do not require activity around the scientist's first year
    #[arg(long)]
    pub ignore_first_id: bool,

    /// Search source selection: narrow or wide
    #[arg(long)]
    pub mode: Option<SearchMode>,

    /// Information to report per match (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "surname,first_name,first_year,num_publications,num_citations,num_coauthors")]
    pub info: Vec<InfoField>,

    #[command(flatten)]
    pub source: SourceArgs,
}

impl FindArgs {
    fn params(&self, config: &Config) -> Result<MatchParams> {
        let mut defaults = config.matching.clone();
        if let Some(m) = self.first_year_margin {
            defaults.first_year_margin = m;
        }
        if let Some(m) = self.pub_margin {
            defaults.pub_margin = m;
        }
        if let Some(m) = self.cits_margin {
            defaults.cits_margin = m;
        }
        if let Some(m) = self.coauth_margin {
            defaults.coauth_margin = m;
        }
        if self.period.is_some() {
            defaults.period = self.period;
        }
        if let Some(mode) = self.mode {
            defaults.mode = mode;
        }
        defaults.ignore_first_id |= self.ignore_first_id;
        Ok(MatchParams::new(self.year, &defaults, self.affiliations.clone())?)
    }
}

pub fn run(args: FindArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let params = args.params(config)?;
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

    let mut run = MatchRun::new(&mut session, &table, &args.ids, params)
        .context("Failed to build the scientist's profile")?;
    run.define_search_sources(&table)?;
    run.build_search_group(&mut session)?;
    let n_matches = run.find_matches(&mut session)?.len();
    if n_matches == 0 {
        progress.println("No matches found.");
        return Ok(());
    }

    let info = run.inform_matches(&mut session, &table, &args.info)?;
    println!("{}", render(&info, &args.info));
    progress.println(format!("{n_matches} matches"));
    Ok(())
}

fn render(info: &[MatchInfo], fields: &[InfoField]) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new("Author ID").fg(Color::Cyan)];
    header.extend(fields.iter().map(|f| Cell::new(f).fg(Color::Cyan)));
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);

    for m in info {
        let mut row = vec![Cell::new(m.id)];
        row.extend(
            fields
                .iter()
                .map(|f| Cell::new(m.get(*f).map(ToString::to_string).unwrap_or_default())),
        );
        table.add_row(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        find: FindArgs,
    }

    fn parse(args: &[&str]) -> FindArgs {
        Wrapper::parse_from(std::iter::once("find").chain(args.iter().copied())).find
    }

    #[test]
    fn flags_override_config() {
        let args = parse(&[
            "55208373700",
            "--year",
            "2017",
            "--pub-margin",
            "3",
            "--mode",
            "narrow",
            "--affiliations",
            "60028186,60010348",
        ]);
        let params = args.params(&Config::default()).unwrap();
        assert_eq!(params.year(), 2017);
        assert_eq!(params.pub_margin(), Margin::Absolute(3));
        assert_eq!(params.cits_margin(), Margin::Fraction(0.2));
        assert_eq!(params.mode(), SearchMode::Narrow);
        assert_eq!(params.affiliations(), &[60010348, 60028186]);
    }

    #[test]
    fn bad_year_is_rejected() {
        let args = parse(&["1", "--year", "17"]);
        assert!(args.params(&Config::default()).is_err());
    }

    #[test]
    fn default_info_fields() {
        let args = parse(&["1", "--year", "2017"]);
        assert_eq!(args.info.len(), 6);
        assert_eq!(args.info[0], InfoField::Surname);
    }
}
