//! Candidate group construction from comparable sources.

use std::collections::BTreeSet;

use crate::data::Session;
use crate::error::{MatchError, Result};
use crate::params::MatchParams;
use crate::profile::ScientistProfile;

/// Set of candidate author identifiers. Only ever shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchGroup {
    ids: BTreeSet<u64>,
}

impl SearchGroup {
    pub fn new(ids: BTreeSet<u64>) -> Self {
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &BTreeSet<u64> {
        &self.ids
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.ids.iter().copied().collect()
    }

    /// Keep only members for which `keep` holds; returns how many were
    /// removed.
    pub fn retain(&mut self, keep: impl FnMut(&u64) -> bool) -> usize {
        let before = self.ids.len();
        self.ids.retain(keep);
        before - self.ids.len()
    }

    pub fn remove_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a u64>) {
        for id in ids {
            self.ids.remove(id);
        }
    }
}

/// Author sets of the three activity windows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activity {
    /// Active in the reference year.
    pub today: BTreeSet<u64>,
    /// Active within the first-year band.
    pub then: BTreeSet<u64>,
    /// Active in the year just before the first-year band.
    pub before: BTreeSet<u64>,
}

/// `(today − before) ∩ then − exclude`, skipping the intersection when
/// `then` is not used.
pub fn combine(activity: &Activity, use_then: bool, exclude: &BTreeSet<u64>) -> SearchGroup {
    let ids = activity
        .today
        .iter()
        .filter(|id| !activity.before.contains(id))
        .filter(|id| !use_then || activity.then.contains(id))
        .filter(|id| !exclude.contains(id))
        .copied()
        .collect();
    SearchGroup::new(ids)
}

/// Authors active in `sources` in each window.
///
/// `today` is read from the affiliation-partitioned cache and keeps only
/// authors listed under a target affiliation when any are configured.
pub fn collect_activity(
    session: &mut Session<'_>,
    profile: &ScientistProfile,
    sources: &[u64],
    params: &MatchParams,
) -> Result<Activity> {
    let margin = params.first_year_margin() as i32;
    let min_year = profile.first_year() - margin;
    let max_year = profile.first_year() + margin;

    let stage = session.progress().stage_line("sources");
    stage.set_message(format!("{} sources in {}", sources.len(), params.year()));
    let today = session.source_affiliation_authors(sources, params.year(), params.affiliations())?;

    let then = if params.ignore_first_id() {
        BTreeSet::new()
    } else {
        let years: Vec<i32> = (min_year..=max_year).collect();
        stage.set_message(format!("{} sources in {min_year}-{max_year}", sources.len()));
        session.source_authors(sources, &years)?
    };
    stage.set_message(format!("{} sources in {}", sources.len(), min_year - 1));
    let before = session.source_authors(sources, &[min_year - 1])?;
    stage.finish_and_clear();

    log::debug!(
        "Active authors: {} in {}, {} in {min_year}-{max_year}, {} in {}",
        today.len(),
        params.year(),
        then.len(),
        before.len(),
        min_year - 1
    );
    Ok(Activity { today, then, before })
}

/// Candidates: active in the reference year, active around the scientist's
/// first year, not active before that, and neither the scientist nor a
/// coauthor.
pub fn build_search_group(
    session: &mut Session<'_>,
    profile: &ScientistProfile,
    sources: &[u64],
    params: &MatchParams,
) -> Result<SearchGroup> {
    if sources.is_empty() {
        return Err(MatchError::MissingPrecondition(
            "no search sources defined, define search sources first".to_string(),
        ));
    }
    log::info!("Searching authors in {} sources...", sources.len());
    let activity = collect_activity(session, profile, sources, params)?;

    let mut exclude: BTreeSet<u64> = profile.coauthors().clone();
    exclude.extend(profile.identifier());
    let group = combine(&activity, !params.ignore_first_id(), &exclude);
    log::info!("Found {} candidates", group.len());
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u64]) -> BTreeSet<u64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn before_always_excluded() {
        let activity = Activity {
            today: set(&[1, 2, 3, 4]),
            then: set(&[1, 2, 3, 4]),
            before: set(&[2]),
        };
        let group = combine(&activity, true, &set(&[4]));
        assert_eq!(group.ids(), &set(&[1, 3]));

        let relaxed = combine(&activity, false, &BTreeSet::new());
        assert!(!relaxed.contains(2));
    }

    #[test]
    fn then_restricts_unless_ignored() {
        let activity = Activity {
            today: set(&[1, 2, 3]),
            then: set(&[1]),
            before: BTreeSet::new(),
        };
        assert_eq!(combine(&activity, true, &BTreeSet::new()).len(), 1);
        assert_eq!(combine(&activity, false, &BTreeSet::new()).len(), 3);
    }

    #[test]
    fn group_only_shrinks() {
        let mut group = SearchGroup::new(set(&[1, 2, 3, 4]));
        assert_eq!(group.retain(|id| id % 2 == 0), 2);
        group.remove_all(&[4, 9]);
        assert_eq!(group.to_vec(), vec![2]);
    }
}
