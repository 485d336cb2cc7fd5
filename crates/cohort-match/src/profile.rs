//! Scientist profile as of a reference year.

use std::collections::{BTreeMap, BTreeSet};

use cohort_scopus::{Document, Query};

use crate::data::{Cited, Session};
use crate::error::{MatchError, Result};
use crate::extract;
use crate::fields::{FieldSourceTable, MainField, determine_main_field};
use crate::params::years_before;

/// Most frequent recent affiliation. Name, country and type are `None` when
/// the provider has no profile for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileAffiliation {
    pub id: u64,
    pub name: Option<String>,
    pub country: Option<String>,
    pub org_type: Option<String>,
}

/// Statistics restricted to the trailing window `[from_year, year]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodStats {
    pub from_year: i32,
    pub publications: u64,
    pub citations: u64,
    pub coauthors: BTreeSet<u64>,
}

/// Snapshot of one scientist (possibly several author identifiers) as of
/// `year`. Immutable once built; always has at least one publication.
#[derive(Debug, Clone)]
pub struct ScientistProfile {
    identifier: Vec<u64>,
    year: i32,
    publications: Vec<Document>,
    first_year: i32,
    last_year: i32,
    citations: u64,
    coauthors: BTreeSet<u64>,
    sources: BTreeMap<u64, String>,
    fields: Vec<u32>,
    main_field: Option<MainField>,
    affiliation: Option<ProfileAffiliation>,
    surname: Option<String>,
    first_name: Option<String>,
    subjects: Vec<String>,
    period: Option<PeriodStats>,
}

impl ScientistProfile {
    /// Profile of the author(s) `ids` from all their publications up to
    /// `year`.
    pub fn build(
        session: &mut Session<'_>,
        table: &FieldSourceTable,
        ids: &[u64],
        year: i32,
        period: Option<u32>,
    ) -> Result<Self> {
        Self::build_inner(session, table, ids, year, period, None)
    }

    /// Profile restricted to the documents `eids`, for authors whose
    /// identifier also covers someone else's work.
    pub fn build_from_eids(
        session: &mut Session<'_>,
        table: &FieldSourceTable,
        ids: &[u64],
        year: i32,
        period: Option<u32>,
        eids: &[String],
    ) -> Result<Self> {
        if eids.is_empty() {
            return Err(MatchError::InvalidArgument("empty document list".to_string()));
        }
        Self::build_inner(session, table, ids, year, period, Some(eids))
    }

    fn build_inner(
        session: &mut Session<'_>,
        table: &FieldSourceTable,
        ids: &[u64],
        year: i32,
        period: Option<u32>,
        eids: Option<&[String]>,
    ) -> Result<Self> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(MatchError::InvalidArgument("no author identifier given".to_string()));
        }
        if period == Some(0) {
            return Err(MatchError::InvalidArgument(
                "period must be at least one year".to_string(),
            ));
        }
        let period_years = period.map(|p| years_before("period", p, year)).transpose()?;

        let docs = match eids {
            Some(eids) => session.fetch_docs(&Query::Eid(eids.to_vec()))?,
            None => session.publications(&ids, year)?,
        };
        let mut publications: Vec<Document> = docs.into_iter().filter(|d| d.year <= year).collect();
        if publications.is_empty() {
            return Err(MatchError::NoPublications { ids, year });
        }
        publications.sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.eid.cmp(&b.eid)));
        let first_year = publications.first().map_or(year, |d| d.year);
        let last_year = publications.last().map_or(year, |d| d.year);

        let cited = match eids {
            Some(eids) => Cited::Documents(eids),
            None => Cited::Authors(&ids),
        };
        let citations = session.count_citations(cited, year + 1, &ids)?;
        let coauthors = extract::coauthors(&publications, &ids);

        let sources: BTreeMap<u64, String> = publications
            .iter()
            .filter_map(|d| {
                let id = d.source_id?;
                let title = table
                    .info(id)
                    .map(|i| i.title.clone())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| d.source_title.clone());
                Some((id, title))
            })
            .collect();
        let fields = table.fields_of_sources(sources.keys());
        let main_field = determine_main_field(&fields);
        if main_field.is_none() {
            log::warn!(
                "Not possible to determine research field of {}, search sources cannot be defined",
                join(&ids)
            );
        }

        let affiliation = extract::main_affiliation(&publications, &ids, year)
            .map(|afid| lookup_affiliation(session, afid));

        // Name and subjects from the profile with the most documents
        let info = session.author_info(&ids)?;
        let best = ids
            .iter()
            .filter_map(|id| info.get(id))
            .rev()
            .max_by_key(|i| i.documents);
        let (surname, first_name, subjects) = match best {
            Some(i) => (
                non_empty(&i.surname),
                non_empty(&i.givenname),
                i.areas
                    .split("; ")
                    .filter_map(|a| a.split(' ').next())
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            None => (None, None, Vec::new()),
        };

        let period = match period_years {
            Some(p) => {
                let from_year = year - p + 1;
                let window: Vec<&Document> = publications.iter().filter(|d| d.year >= from_year).collect();
                let window_eids: Vec<String> = window.iter().map(|d| d.eid.clone()).collect();
                let citations = if window_eids.is_empty() {
                    0
                } else {
                    session.count_citations(Cited::Documents(&window_eids), year + 1, &ids)?
                };
                Some(PeriodStats {
                    from_year,
                    publications: window.len() as u64,
                    citations,
                    coauthors: extract::coauthors(window, &ids),
                })
            }
            None => None,
        };

        log::debug!(
            "Profile {}: {} publications {first_year}-{last_year}, {citations} citations, {} coauthors",
            join(&ids),
            publications.len(),
            coauthors.len()
        );
        Ok(Self {
            identifier: ids,
            year,
            publications,
            first_year,
            last_year,
            citations,
            coauthors,
            sources,
            fields,
            main_field,
            affiliation,
            surname,
            first_name,
            subjects,
            period,
        })
    }

    pub fn identifier(&self) -> &[u64] {
        &self.identifier
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Research output up to `year`, oldest first.
    pub fn publications(&self) -> &[Document] {
        &self.publications
    }

    pub fn eids(&self) -> impl Iterator<Item = &str> {
        self.publications.iter().map(|d| d.eid.as_str())
    }

    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    pub fn last_year(&self) -> i32 {
        self.last_year
    }

    /// Non-self citations received up to `year`.
    pub fn citations(&self) -> u64 {
        self.citations
    }

    pub fn coauthors(&self) -> &BTreeSet<u64> {
        &self.coauthors
    }

    /// Sources published in, with their titles.
    pub fn sources(&self) -> &BTreeMap<u64, String> {
        &self.sources
    }

    /// 4-digit ASJC codes of the sources, one entry per source and code.
    pub fn fields(&self) -> &[u32] {
        &self.fields
    }

    pub fn main_field(&self) -> Option<MainField> {
        self.main_field
    }

    pub fn affiliation(&self) -> Option<&ProfileAffiliation> {
        self.affiliation.as_ref()
    }

    pub fn surname(&self) -> Option<&str> {
        self.surname.as_deref()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    /// "Surname, Given name".
    pub fn name(&self) -> Option<String> {
        match (&self.surname, &self.first_name) {
            (None, None) => None,
            (s, g) => Some(format!(
                "{}, {}",
                s.as_deref().unwrap_or_default(),
                g.as_deref().unwrap_or_default()
            )),
        }
    }

    /// Subject area abbreviations, most frequent first.
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn period(&self) -> Option<&PeriodStats> {
        self.period.as_ref()
    }

    /// Publications the publication band is centred on: the trailing window
    /// when one was requested, else the full record.
    pub fn matched_publications(&self) -> u64 {
        self.period
            .as_ref()
            .map_or(self.publications.len() as u64, |p| p.publications)
    }
}

fn lookup_affiliation(session: &Session<'_>, afid: u64) -> ProfileAffiliation {
    match session.provider().affiliation(afid, session.batch().refresh) {
        Ok(aff) => ProfileAffiliation {
            id: afid,
            name: non_empty(&aff.name),
            country: non_empty(&aff.country),
            org_type: non_empty(&aff.org_type),
        },
        Err(e) => {
            log::debug!("No profile for affiliation {afid}: {e}");
            ProfileAffiliation {
                id: afid,
                name: None,
                country: None,
                org_type: None,
            }
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn join(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join("-")
}
