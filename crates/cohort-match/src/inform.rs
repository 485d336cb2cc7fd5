//! Per-match information fields.

use std::fmt;
use std::str::FromStr;

use crate::error::MatchError;
use crate::profile::ScientistProfile;

/// A piece of information reported for each match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoField {
    FirstName,
    Surname,
    FirstYear,
    LastYear,
    NumCoauthors,
    NumPublications,
    NumCitations,
    Subjects,
    AffiliationCountry,
    AffiliationId,
    AffiliationName,
    AffiliationType,
}

impl InfoField {
    pub const ALL: [InfoField; 12] = [
        Self::FirstName,
        Self::Surname,
        Self::FirstYear,
        Self::LastYear,
        Self::NumCoauthors,
        Self::NumPublications,
        Self::NumCitations,
        Self::Subjects,
        Self::AffiliationCountry,
        Self::AffiliationId,
        Self::AffiliationName,
        Self::AffiliationType,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::Surname => "surname",
            Self::FirstYear => "first_year",
            Self::LastYear => "last_year",
            Self::NumCoauthors => "num_coauthors",
            Self::NumPublications => "num_publications",
            Self::NumCitations => "num_citations",
            Self::Subjects => "subjects",
            Self::AffiliationCountry => "affiliation_country",
            Self::AffiliationId => "affiliation_id",
            Self::AffiliationName => "affiliation_name",
            Self::AffiliationType => "affiliation_type",
        }
    }

    pub fn value(self, profile: &ScientistProfile) -> InfoValue {
        let aff = profile.affiliation();
        match self {
            Self::FirstName => InfoValue::Text(profile.first_name().map(String::from)),
            Self::Surname => InfoValue::Text(profile.surname().map(String::from)),
            Self::FirstYear => InfoValue::Year(profile.first_year()),
            Self::LastYear => InfoValue::Year(profile.last_year()),
            Self::NumCoauthors => InfoValue::Count(profile.coauthors().len() as u64),
            Self::NumPublications => InfoValue::Count(profile.publications().len() as u64),
            Self::NumCitations => InfoValue::Count(profile.citations()),
            Self::Subjects => InfoValue::List(profile.subjects().to_vec()),
            Self::AffiliationCountry => InfoValue::Text(aff.and_then(|a| a.country.clone())),
            Self::AffiliationId => InfoValue::Id(aff.map(|a| a.id)),
            Self::AffiliationName => InfoValue::Text(aff.and_then(|a| a.name.clone())),
            Self::AffiliationType => InfoValue::Text(aff.and_then(|a| a.org_type.clone())),
        }
    }
}

impl FromStr for InfoField {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|f| f.name()).collect();
                MatchError::InvalidArgument(format!(
                    "unknown information field '{s}', expected one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

impl fmt::Display for InfoField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoValue {
    Text(Option<String>),
    Id(Option<u64>),
    Year(i32),
    Count(u64),
    List(Vec<String>),
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(Some(s)) => f.write_str(s),
            Self::Id(Some(id)) => write!(f, "{id}"),
            Self::Text(None) | Self::Id(None) => Ok(()),
            Self::Year(y) => write!(f, "{y}"),
            Self::Count(n) => write!(f, "{n}"),
            Self::List(items) => f.write_str(&items.join("; ")),
        }
    }
}

/// One match with the requested information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    pub id: u64,
    pub name: Option<String>,
    pub values: Vec<(InfoField, InfoValue)>,
}

impl MatchInfo {
    pub fn new(profile: &ScientistProfile, fields: &[InfoField]) -> Self {
        Self {
            id: profile.identifier().first().copied().unwrap_or_default(),
            name: profile.name(),
            values: fields.iter().map(|f| (*f, f.value(profile))).collect(),
        }
    }

    pub fn get(&self, field: InfoField) -> Option<&InfoValue> {
        self.values.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }
}
