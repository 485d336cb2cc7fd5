//! One matching run: profile, search sources, search group, matches.

use std::collections::BTreeMap;

use crate::data::Session;
use crate::error::{MatchError, Result};
use crate::fields::FieldSourceTable;
use crate::filter;
use crate::inform::{InfoField, MatchInfo};
use crate::params::MatchParams;
use crate::profile::ScientistProfile;
use crate::search_group::{self, SearchGroup};

/// State of a run. Each step needs the one before it.
#[derive(Debug)]
pub struct MatchRun {
    profile: ScientistProfile,
    params: MatchParams,
    search_sources: Option<BTreeMap<u64, String>>,
    search_group: Option<SearchGroup>,
    matches: Option<Vec<u64>>,
}

impl MatchRun {
    /// Build the profile of `ids` as of the reference year in `params`.
    pub fn new(
        session: &mut Session<'_>,
        table: &FieldSourceTable,
        ids: &[u64],
        params: MatchParams,
    ) -> Result<Self> {
        let profile = ScientistProfile::build(session, table, ids, params.year(), params.period())?;
        Self::from_profile(profile, params)
    }

    pub fn from_profile(profile: ScientistProfile, params: MatchParams) -> Result<Self> {
        if profile.year() != params.year() {
            return Err(MatchError::InvalidArgument(format!(
                "profile is as of {}, run is for {}",
                profile.year(),
                params.year()
            )));
        }
        if params.period().is_some() && profile.period().is_none() {
            return Err(MatchError::InvalidArgument(
                "run uses a period but the profile was built without one".to_string(),
            ));
        }
        Ok(Self {
            profile,
            params,
            search_sources: None,
            search_group: None,
            matches: None,
        })
    }

    pub fn profile(&self) -> &ScientistProfile {
        &self.profile
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    pub fn search_sources(&self) -> Option<&BTreeMap<u64, String>> {
        self.search_sources.as_ref()
    }

    pub fn search_group(&self) -> Option<&SearchGroup> {
        self.search_group.as_ref()
    }

    pub fn matches(&self) -> Option<&[u64]> {
        self.matches.as_deref()
    }

    /// Select comparable sources from `table`. Resets later steps.
    pub fn define_search_sources(&mut self, table: &FieldSourceTable) -> Result<&BTreeMap<u64, String>> {
        let sources = table.define_search_sources(&self.profile, self.params.mode())?;
        self.search_group = None;
        self.matches = None;
        Ok(self.search_sources.insert(sources))
    }

    /// Use these sources instead. Resets later steps.
    pub fn set_search_sources(&mut self, sources: BTreeMap<u64, String>) -> Result<()> {
        if sources.is_empty() {
            return Err(MatchError::InvalidArgument("empty list of search sources".to_string()));
        }
        self.search_sources = Some(sources);
        self.search_group = None;
        self.matches = None;
        Ok(())
    }

    pub fn build_search_group(&mut self, session: &mut Session<'_>) -> Result<&SearchGroup> {
        let sources: Vec<u64> = match &self.search_sources {
            Some(s) => s.keys().copied().collect(),
            None => {
                return Err(MatchError::MissingPrecondition(
                    "no search sources defined, define search sources first".to_string(),
                ));
            }
        };
        let group = search_group::build_search_group(session, &self.profile, &sources, &self.params)?;
        self.matches = None;
        Ok(self.search_group.insert(group))
    }

    /// Use this candidate set instead. Resets the matches.
    pub fn set_search_group(&mut self, group: SearchGroup) {
        self.search_group = Some(group);
        self.matches = None;
    }

    pub fn find_matches(&mut self, session: &mut Session<'_>) -> Result<&[u64]> {
        let Some(group) = &self.search_group else {
            return Err(MatchError::MissingPrecondition(
                "no search group defined, build the search group first".to_string(),
            ));
        };
        let matches = filter::find_matches(session, &self.profile, &self.params, group)?;
        Ok(self.matches.insert(matches))
    }

    /// Profile every match and report `fields` for it. Matches whose
    /// profile cannot be built are skipped with a warning.
    pub fn inform_matches(
        &self,
        session: &mut Session<'_>,
        table: &FieldSourceTable,
        fields: &[InfoField],
    ) -> Result<Vec<MatchInfo>> {
        let Some(matches) = &self.matches else {
            return Err(MatchError::MissingPrecondition(
                "no matches found yet, run find_matches first".to_string(),
            ));
        };
        let pb = session.progress().task_bar("inform", matches.len());
        let mut info = Vec::with_capacity(matches.len());
        for &id in matches {
            match ScientistProfile::build(session, table, &[id], self.params.year(), self.params.period()) {
                Ok(profile) => info.push(MatchInfo::new(&profile, fields)),
                Err(e @ MatchError::Cache(_)) => return Err(e),
                Err(e) => log::warn!("Skipping match {id}: {e}"),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(info)
    }
}
