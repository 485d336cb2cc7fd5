//! Matching run parameters.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{MatchError, Result};
use crate::margin::Margin;

/// How strictly comparable sources must share the scientist's fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Drop sources that also carry fields the scientist never published in.
    Narrow,
    #[default]
    Wide,
}

impl FromStr for SearchMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "narrow" => Ok(Self::Narrow),
            "wide" => Ok(Self::Wide),
            other => Err(MatchError::InvalidArgument(format!(
                "search mode must be 'narrow' or 'wide', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Narrow => f.write_str("narrow"),
            Self::Wide => f.write_str("wide"),
        }
    }
}

/// `[matching]` configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchDefaults {
    pub first_year_margin: u32,
    pub pub_margin: Margin,
    pub cits_margin: Margin,
    pub coauth_margin: Margin,
    /// Trailing window in years, ending at the reference year.
    pub period: Option<u32>,
    pub mode: SearchMode,
    /// Skip the first-year co-activity constraint.
    pub ignore_first_id: bool,
}

impl Default for MatchDefaults {
    fn default() -> Self {
        Self {
            first_year_margin: 2,
            pub_margin: Margin::Fraction(0.2),
            cits_margin: Margin::Fraction(0.2),
            coauth_margin: Margin::Fraction(0.2),
            period: None,
            mode: SearchMode::Wide,
            ignore_first_id: false,
        }
    }
}

/// Validated parameters of one matching run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchParams {
    year: i32,
    first_year_margin: u32,
    pub_margin: Margin,
    cits_margin: Margin,
    coauth_margin: Margin,
    period: Option<u32>,
    affiliations: Vec<u64>,
    ignore_first_id: bool,
    mode: SearchMode,
}

impl MatchParams {
    /// Validate `defaults` for a run at reference `year`, optionally
    /// restricted to candidates from `affiliations`.
    pub fn new(year: i32, defaults: &MatchDefaults, affiliations: Vec<u64>) -> Result<Self> {
        if !(1000..=9999).contains(&year) {
            return Err(MatchError::InvalidArgument(format!(
                "reference year must have four digits, got {year}"
            )));
        }
        for (name, margin) in [
            ("pub_margin", defaults.pub_margin),
            ("cits_margin", defaults.cits_margin),
            ("coauth_margin", defaults.coauth_margin),
        ] {
            if let Margin::Fraction(f) = margin {
                Margin::fraction(f).map_err(|e| {
                    MatchError::InvalidArgument(format!("{name}: {e}"))
                })?;
            }
        }
        if defaults.period == Some(0) {
            return Err(MatchError::InvalidArgument(
                "period must be at least one year".to_string(),
            ));
        }
        years_before("first_year_margin", defaults.first_year_margin, year)?;
        if let Some(p) = defaults.period {
            years_before("period", p, year)?;
        }
        if affiliations.contains(&0) {
            return Err(MatchError::InvalidArgument(
                "affiliation id 0 is reserved".to_string(),
            ));
        }
        let mut affiliations = affiliations;
        affiliations.sort_unstable();
        affiliations.dedup();

        Ok(Self {
            year,
            first_year_margin: defaults.first_year_margin,
            pub_margin: defaults.pub_margin,
            cits_margin: defaults.cits_margin,
            coauth_margin: defaults.coauth_margin,
            period: defaults.period,
            affiliations,
            ignore_first_id: defaults.ignore_first_id,
            mode: defaults.mode,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn first_year_margin(&self) -> u32 {
        self.first_year_margin
    }

    pub fn pub_margin(&self) -> Margin {
        self.pub_margin
    }

    pub fn cits_margin(&self) -> Margin {
        self.cits_margin
    }

    pub fn coauth_margin(&self) -> Margin {
        self.coauth_margin
    }

    pub fn period(&self) -> Option<u32> {
        self.period
    }

    /// First year of the trailing window, if one is configured.
    pub fn period_start(&self) -> Option<i32> {
        self.period.map(|p| self.year - p as i32 + 1)
    }

    /// Target affiliations, sorted. Empty means no restriction.
    pub fn affiliations(&self) -> &[u64] {
        &self.affiliations
    }

    pub fn ignore_first_id(&self) -> bool {
        self.ignore_first_id
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }
}

/// `years` as a year offset, which must stay below `year`.
pub(crate) fn years_before(name: &str, years: u32, year: i32) -> Result<i32> {
    i32::try_from(years)
        .ok()
        .filter(|&n| n < year)
        .ok_or_else(|| {
            MatchError::InvalidArgument(format!("{name} must be below {year}, got {years}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let p = MatchParams::new(2017, &MatchDefaults::default(), vec![]).unwrap();
        assert_eq!(p.year(), 2017);
        assert_eq!(p.first_year_margin(), 2);
        assert_eq!(p.period_start(), None);
        assert!(p.affiliations().is_empty());
    }

    #[test]
    fn rejects_invalid_values() {
        let d = MatchDefaults::default();
        assert!(MatchParams::new(17, &d, vec![]).is_err());

        let bad_period = MatchDefaults {
            period: Some(0),
            ..Default::default()
        };
        assert!(MatchParams::new(2017, &bad_period, vec![]).is_err());

        let bad_margin = MatchDefaults {
            cits_margin: Margin::Fraction(-0.5),
            ..Default::default()
        };
        let err = MatchParams::new(2017, &bad_margin, vec![]).unwrap_err();
        assert!(err.to_string().contains("cits_margin"));
    }

    #[test]
    fn rejects_year_offsets_beyond_year() {
        let huge_margin = MatchDefaults {
            first_year_margin: u32::MAX,
            ..Default::default()
        };
        let err = MatchParams::new(2017, &huge_margin, vec![]).unwrap_err();
        assert!(err.to_string().contains("first_year_margin"));

        let huge_period = MatchDefaults {
            period: Some(i32::MAX as u32 + 1),
            ..Default::default()
        };
        let err = MatchParams::new(2017, &huge_period, vec![]).unwrap_err();
        assert!(err.to_string().contains("period"));

        let longest = MatchDefaults {
            first_year_margin: 2016,
            period: Some(2016),
            ..Default::default()
        };
        let p = MatchParams::new(2017, &longest, vec![]).unwrap();
        assert_eq!(p.period_start(), Some(2));
    }

    #[test]
    fn period_window_ends_at_year() {
        let d = MatchDefaults {
            period: Some(3),
            ..Default::default()
        };
        let p = MatchParams::new(2017, &d, vec![60000002, 60000001, 60000002]).unwrap();
        assert_eq!(p.period_start(), Some(2015));
        assert_eq!(p.affiliations(), &[60000001, 60000002]);
    }

    #[test]
    fn parses_matching_section() {
        let d: MatchDefaults = toml::from_str(
            "first_year_margin = 1\npub_margin = 3\ncits_margin = 0.1\nmode = \"narrow\"",
        )
        .unwrap();
        assert_eq!(d.pub_margin, Margin::Absolute(3));
        assert_eq!(d.cits_margin, Margin::Fraction(0.1));
        assert_eq!(d.coauth_margin, Margin::Fraction(0.2));
        assert_eq!(d.mode, SearchMode::Narrow);

        assert!(toml::from_str::<MatchDefaults>("pub_margin = -2").is_err());
    }
}
