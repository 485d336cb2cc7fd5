//! Multi-round candidate filter.
//!
//! Rounds run in a fixed order and each one only removes candidates:
//!
//! 1. main discipline and total document count
//! 2. no publications before the first-year band, publication count in band
//! 3. non-self citations in band
//! 4. coauthor count and first year in band
//! 5. trailing-period citations and coauthors in band (optional)
//! 6. main affiliation among the targets (optional)
//!
//! Values the provider could not deliver count as zero for the round that
//! needed them.

use std::collections::BTreeSet;

use cohort_scopus::{Document, Query, QueryTemplate, batched_query};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::data::{Cited, Session};
use crate::error::Result;
use crate::extract;
use crate::margin::{MarginBand, margin_band, year_band};
use crate::params::MatchParams;
use crate::profile::ScientistProfile;
use crate::search_group::SearchGroup;

/// Outcome of the publication-count round.
#[derive(Debug, Clone, Default)]
pub struct PubCounts {
    /// Publication count (within the period, if any) of every survivor.
    pub counts: FxHashMap<u64, u64>,
    /// Removed for publishing before the first-year band.
    pub older: BTreeSet<u64>,
}

/// Round 1: same main discipline and at least `band.lo` documents overall.
pub fn filter_field_and_size(
    session: &mut Session<'_>,
    group: &mut SearchGroup,
    profile: &ScientistProfile,
    band: MarginBand,
) -> Result<()> {
    let info = session.author_info(&group.to_vec())?;
    group.retain(|id| info.contains_key(id));

    match profile.main_field() {
        Some(main) => {
            group.retain(|id| info.get(id).is_some_and(|i| i.areas.starts_with(main.name)));
            log::info!(
                "... left with {} candidates with same main discipline ({})",
                group.len(),
                main.name
            );
        }
        None => log::warn!("Main field unknown, not filtering on discipline"),
    }

    group.retain(|id| info.get(id).is_some_and(|i| i.documents as i64 >= band.lo));
    log::info!(
        "... left with {} candidates with sufficient total publications ({})",
        group.len(),
        band.lo.max(0)
    );
    Ok(())
}

/// Round 2: remove authors with publications up to `ybefore`, then those
/// whose count up to `yupto` (minus the count up to `yfrom - 1` when
/// given) is outside `band`.
///
/// Cached counts are used first. Every count that has to be queried is
/// cached right away.
pub fn filter_pub_counts(
    session: &mut Session<'_>,
    group: &mut SearchGroup,
    ybefore: i32,
    yupto: i32,
    band: MarginBand,
    yfrom: Option<i32>,
) -> Result<PubCounts> {
    let ids = group.to_vec();
    let mut years = vec![ybefore, yupto];
    years.extend(yfrom.map(|y| y - 1));
    session.refresh_pub_counts(&ids, &years)?;

    let mut older = BTreeSet::new();

    // Eliminate on cached counts alone
    let before = session.cached_pub_counts(&ids, ybefore)?;
    let upto = session.cached_pub_counts(&ids, yupto)?;
    let from = match yfrom {
        Some(y) => session.cached_pub_counts(&ids, y - 1)?,
        None => FxHashMap::default(),
    };
    group.retain(|id| {
        if before.get(id).copied().flatten().is_some_and(|n| n > 0) {
            older.insert(*id);
            return false;
        }
        match upto.get(id).copied().flatten() {
            // Subtracting the pre-period count can only lower it
            Some(n) if (n as i64) < band.lo => false,
            Some(n) => match (yfrom, from.get(id).copied().flatten()) {
                (None, _) => band.contains_count(n),
                (Some(_), Some(b)) => band.contains_count(n.saturating_sub(b)),
                (Some(_), None) => true,
            },
            None => true,
        }
    });
    log::debug!("{} candidates left on cached publication counts", group.len());

    // Nothing up to ybefore
    let before = session.pub_counts(&group.to_vec(), ybefore)?;
    group.retain(|id| {
        let is_older = before.get(id).copied().flatten().unwrap_or(0) > 0;
        if is_older {
            older.insert(*id);
        }
        !is_older
    });

    // Count up to yupto in band
    let upto = session.pub_counts(&group.to_vec(), yupto)?;
    let mut counts: FxHashMap<u64, u64> = group
        .ids()
        .iter()
        .map(|id| (*id, upto.get(id).copied().flatten().unwrap_or(0)))
        .collect();
    if let Some(yfrom) = yfrom {
        let reaching: Vec<u64> = counts
            .iter()
            .filter(|(_, n)| **n as i64 >= band.lo)
            .map(|(id, _)| *id)
            .collect();
        let prior = session.pub_counts(&reaching, yfrom - 1)?;
        for (id, n) in counts.iter_mut() {
            let b = prior.get(id).copied().flatten().unwrap_or(0);
            *n = n.saturating_sub(b);
        }
    }
    group.retain(|id| counts.get(id).is_some_and(|n| band.contains_count(*n)));
    counts.retain(|id, _| group.contains(*id));

    log::info!(
        "... left with {} candidates with number of publications in {band} ({} started earlier)",
        group.len(),
        older.len()
    );
    Ok(PubCounts { counts, older })
}

/// Round 3: non-self citations up to `year` in `band`.
pub fn filter_citations(
    session: &mut Session<'_>,
    group: &mut SearchGroup,
    year: i32,
    band: MarginBand,
) -> Result<()> {
    let citations = session.citations(&group.to_vec(), year)?;
    group.retain(|id| band.contains_count(citations.get(id).copied().flatten().unwrap_or(0)));
    log::info!("... left with {} candidates with number of citations in {band}", group.len());
    Ok(())
}

/// Round 4: coauthor count in `coauth`, first year in `first_year` unless
/// `None`.
pub fn filter_author_year(
    session: &mut Session<'_>,
    group: &mut SearchGroup,
    year: i32,
    coauth: MarginBand,
    first_year: Option<MarginBand>,
) -> Result<()> {
    let data = session.author_years(&group.to_vec(), year)?;
    group.retain(|id| match data.get(id) {
        Some(d) => {
            coauth.contains_count(d.n_coauth)
                && first_year.map_or(true, |b| b.contains(i64::from(d.first_year)))
        }
        None => coauth.contains(0) && first_year.is_none(),
    });
    match first_year {
        Some(b) => log::info!(
            "... left with {} candidates with number of coauthors in {coauth} and first year in {b}",
            group.len()
        ),
        None => log::info!(
            "... left with {} candidates with number of coauthors in {coauth}",
            group.len()
        ),
    }
    Ok(())
}

/// Round 5: citations and coauthors within `[from_year, year]` in their
/// bands.
pub fn filter_period(
    session: &mut Session<'_>,
    group: &mut SearchGroup,
    year: i32,
    from_year: i32,
    cits: MarginBand,
    coauth: MarginBand,
) -> Result<()> {
    let ids = group.to_vec();
    let conjuncts = [Query::PubYearAfter(from_year - 1), Query::PubYearBefore(year + 1)];
    let docs = documents_by_author(session, &ids, &conjuncts, "period");
    let by_author = extract::by_author(&docs, &ids);

    let pb = session.progress().task_bar("period", ids.len());
    let mut keep = FxHashSet::default();
    for id in &ids {
        let window: &[&Document] = by_author.get(id).map(Vec::as_slice).unwrap_or(&[]);
        let n_coauth = extract::coauthors(window.iter().copied(), &[*id]).len() as u64;
        let n_cits = if window.is_empty() {
            0
        } else {
            let eids: Vec<String> = window.iter().map(|d| d.eid.clone()).collect();
            session
                .count_citations(Cited::Documents(&eids), year + 1, &[*id])
                .unwrap_or_else(|e| {
                    log::warn!("Period citations of {id} unknown: {e}");
                    0
                })
        };
        if coauth.contains_count(n_coauth) && cits.contains_count(n_cits) {
            keep.insert(*id);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    group.retain(|id| keep.contains(id));
    log::info!(
        "... left with {} candidates with period citations in {cits} and coauthors in {coauth}",
        group.len()
    );
    Ok(())
}

/// Round 6: main affiliation as of `year` among `afids`.
pub fn filter_affiliations(
    session: &mut Session<'_>,
    group: &mut SearchGroup,
    year: i32,
    afids: &[u64],
) -> Result<()> {
    let ids = group.to_vec();
    let docs = documents_by_author(session, &ids, &[Query::PubYearBefore(year + 1)], "affiliations");
    let by_author = extract::by_author(&docs, &ids);
    group.retain(|id| {
        by_author
            .get(id)
            .and_then(|own| extract::main_affiliation(own.iter().copied(), &[*id], year))
            .is_some_and(|a| afids.contains(&a))
    });
    log::info!("... left with {} candidates from the target affiliations", group.len());
    Ok(())
}

/// Uncached document search for a group of authors. Authors that could
/// not be queried have no documents.
fn documents_by_author(
    session: &Session<'_>,
    ids: &[u64],
    conjuncts: &[Query],
    label: &str,
) -> Vec<Document> {
    let template = conjuncts
        .iter()
        .cloned()
        .fold(QueryTemplate::authors(), QueryTemplate::with);
    let pb = session.progress().task_bar(label, ids.len());
    let batch = batched_query::<Document>(session.provider(), ids, &template, session.batch(), &pb);
    pb.finish_and_clear();
    batch.hits
}

/// Run every round on `group` and return the surviving identifiers.
pub fn find_matches(
    session: &mut Session<'_>,
    profile: &ScientistProfile,
    params: &MatchParams,
    group: &SearchGroup,
) -> Result<Vec<u64>> {
    let mut group = group.clone();
    if group.is_empty() {
        return Ok(Vec::new());
    }
    let year = params.year();
    log::info!("Filtering {} candidates...", group.len());

    let pubs_all = margin_band(profile.publications().len() as u64, params.pub_margin());
    filter_field_and_size(session, &mut group, profile, pubs_all)?;
    if group.is_empty() {
        return Ok(Vec::new());
    }

    let ybefore = profile.first_year() - params.first_year_margin() as i32 - 1;
    let pubs = margin_band(profile.matched_publications(), params.pub_margin());
    filter_pub_counts(session, &mut group, ybefore, year, pubs, params.period_start())?;
    if group.is_empty() {
        return Ok(Vec::new());
    }

    let cits = margin_band(profile.citations(), params.cits_margin());
    filter_citations(session, &mut group, year, cits)?;
    if group.is_empty() {
        return Ok(Vec::new());
    }

    let coauth = margin_band(profile.coauthors().len() as u64, params.coauth_margin());
    let first_year = (!params.ignore_first_id())
        .then(|| year_band(profile.first_year(), params.first_year_margin()));
    filter_author_year(session, &mut group, year, coauth, first_year)?;

    if let (Some(from_year), Some(period)) = (params.period_start(), profile.period()) {
        if !group.is_empty() {
            let cits = margin_band(period.citations, params.cits_margin());
            let coauth = margin_band(period.coauthors.len() as u64, params.coauth_margin());
            filter_period(session, &mut group, year, from_year, cits, coauth)?;
        }
    }

    if !params.affiliations().is_empty() && !group.is_empty() {
        filter_affiliations(session, &mut group, year, params.affiliations())?;
    }

    log::info!("Found {} matches", group.len());
    Ok(group.to_vec())
}
