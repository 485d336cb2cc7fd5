//! Cache-mediated access to author and source-year facts.
//!
//! Every lookup goes to the cache first and only queries the provider for
//! the missing keys, inserting what comes back. Units the provider gave up
//! on are never cached.

use std::collections::{BTreeMap, BTreeSet};

use cohort_cache::{
    AuthorCitations, AuthorInfo, AuthorKey, AuthorPubs, AuthorYear, AuthorYearKey, Cache,
    SourceAffiliationAuthors, SourceAuthors, SourceYearKey,
};
use cohort_core::{ProgressContext, Refresh};
use cohort_scopus::{
    AuthorRecord, BatchOptions, Document, Hit, IdField, Provider, ProviderError, Query,
    QueryTemplate, SearchKind, batched_query, counted_query,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;
use crate::extract;

/// What a citation count is about.
#[derive(Debug, Clone, Copy)]
pub enum Cited<'a> {
    /// Any document by these authors.
    Authors(&'a [u64]),
    /// These documents.
    Documents(&'a [String]),
}

/// Everything a matching run talks to: provider, cache, batching options,
/// refresh policy and progress display.
pub struct Session<'a> {
    provider: &'a dyn Provider,
    cache: &'a mut Cache,
    batch: BatchOptions,
    refresh: Refresh,
    progress: &'a ProgressContext,
}

impl<'a> Session<'a> {
    /// Any active refresh policy also asks the provider to refresh.
    pub fn new(
        provider: &'a dyn Provider,
        cache: &'a mut Cache,
        mut batch: BatchOptions,
        refresh: Refresh,
        progress: &'a ProgressContext,
    ) -> Self {
        batch.refresh = batch.refresh || refresh.is_active();
        Self {
            provider,
            cache,
            batch,
            refresh,
            progress,
        }
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider
    }

    pub fn batch(&self) -> &BatchOptions {
        &self.batch
    }

    pub fn progress(&self) -> &ProgressContext {
        self.progress
    }

    pub fn cache(&mut self) -> &mut Cache {
        self.cache
    }

    /// Documents up to and including `year` by any of `ids`, research
    /// output only, fetched directly with the retry policy.
    pub fn publications(&self, ids: &[u64], year: i32) -> std::result::Result<Vec<Document>, ProviderError> {
        let query = Query::AuthorId(ids.to_vec()).and(Query::PubYearBefore(year + 1));
        self.fetch_docs(&query)
    }

    /// Documents matching `query`, retried and bounded like a singleton
    /// batch unit.
    pub fn fetch_docs(&self, query: &Query) -> std::result::Result<Vec<Document>, ProviderError> {
        let label = format!("docs '{query}'");
        let docs = self.batch.retry.run(&label, |attempt| {
            let refresh = self.batch.refresh || attempt > 0;
            let n = self.provider.count(SearchKind::Docs, query, refresh)?;
            if n > self.batch.max_result_size {
                return Err(ProviderError::TooLarge { count: Some(n) });
            }
            if n == 0 {
                return Ok(Vec::new());
            }
            Document::fetch(self.provider, query, refresh)
        });
        let mut docs = match docs {
            Err(ProviderError::NotFound) => Vec::new(),
            other => other?,
        };
        let mut seen = FxHashSet::default();
        docs.retain(|d| seen.insert(d.eid.clone()));
        Ok(docs)
    }

    /// Author profiles, cached in `author_info`. Authors the provider has no
    /// profile for are absent from the result.
    pub fn author_info(&mut self, ids: &[u64]) -> Result<FxHashMap<u64, AuthorInfo>> {
        let keys: Vec<AuthorKey> = ids.iter().map(|&id| AuthorKey(id)).collect();
        self.cache.apply_refresh::<AuthorInfo>(&keys, self.refresh)?;
        let lookup = self.cache.retrieve::<AuthorInfo>(&keys)?;
        let mut info: FxHashMap<u64, AuthorInfo> =
            lookup.found.into_iter().map(|r| (r.auth_id, r)).collect();
        if lookup.missing.is_empty() {
            return Ok(info);
        }

        let missing: Vec<u64> = lookup.missing.iter().map(|k| k.0).collect();
        let wanted: FxHashSet<u64> = missing.iter().copied().collect();
        let pb = self.progress.task_bar("author info", missing.len());
        let batch = batched_query::<AuthorRecord>(
            self.provider,
            &missing,
            &QueryTemplate::authors(),
            &self.batch,
            &pb,
        );
        pb.finish_and_clear();

        let rows: Vec<AuthorInfo> = batch
            .hits
            .into_iter()
            .filter(|r| wanted.contains(&r.auth_id))
            .map(info_row)
            .collect();
        self.cache.insert(&rows)?;
        info.extend(rows.into_iter().map(|r| (r.auth_id, r)));
        Ok(info)
    }

    /// Career snapshots as of `year`, cached in `author_year`. Authors
    /// without publications up to `year` are absent.
    pub fn author_years(&mut self, ids: &[u64], year: i32) -> Result<FxHashMap<u64, AuthorYear>> {
        let keys: Vec<AuthorYearKey> = ids
            .iter()
            .map(|&auth_id| AuthorYearKey { auth_id, year })
            .collect();
        self.cache.apply_refresh::<AuthorYear>(&keys, self.refresh)?;
        let lookup = self.cache.retrieve::<AuthorYear>(&keys)?;
        let mut data: FxHashMap<u64, AuthorYear> =
            lookup.found.into_iter().map(|r| (r.auth_id, r)).collect();
        if lookup.missing.is_empty() {
            return Ok(data);
        }

        let missing: Vec<u64> = lookup.missing.iter().map(|k| k.auth_id).collect();
        let template = QueryTemplate::authors().with(Query::PubYearBefore(year + 1));
        let pb = self.progress.task_bar("author year", missing.len());
        let batch = batched_query::<Document>(self.provider, &missing, &template, &self.batch, &pb);
        pb.finish_and_clear();

        let grouped = extract::by_author(&batch.hits, &missing);
        let rows: Vec<AuthorYear> = missing
            .iter()
            .filter_map(|id| extract::author_year(*id, grouped.get(id)?, year))
            .collect();
        self.cache.insert(&rows)?;
        data.extend(rows.into_iter().map(|r| (r.auth_id, r)));
        Ok(data)
    }

    /// Publications up to and including `year` per author, cached in
    /// `author_pubs`. Each missing count is queried on its own and inserted
    /// right away; `None` means the count is unknown. Refreshing is left to
    /// [`Session::refresh_pub_counts`].
    pub fn pub_counts(&mut self, ids: &[u64], year: i32) -> Result<FxHashMap<u64, Option<u64>>> {
        let mut counts = self.cached_pub_counts(ids, year)?;
        let missing: Vec<u64> = ids.iter().copied().filter(|id| !counts.contains_key(id)).collect();
        if missing.is_empty() {
            return Ok(counts);
        }
        let pb = self.progress.task_bar("pub counts", missing.len());
        for id in missing {
            let query = Query::AuthorId(vec![id]).and(Query::PubYearBefore(year + 1));
            let n = counted_query(self.provider, SearchKind::Docs, &query, &self.batch);
            if let Some(n_pubs) = n {
                self.cache.insert(&[AuthorPubs {
                    auth_id: id,
                    year,
                    n_pubs,
                }])?;
            }
            counts.insert(id, n);
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(counts)
    }

    /// Drop stale publication counts of `ids` for each of `years`.
    ///
    /// Kept apart from the lookups so a round can consult the same counts
    /// several times without refreshing them again.
    pub fn refresh_pub_counts(&mut self, ids: &[u64], years: &[i32]) -> Result<()> {
        let keys: Vec<AuthorYearKey> = years
            .iter()
            .flat_map(|&year| ids.iter().map(move |&auth_id| AuthorYearKey { auth_id, year }))
            .collect();
        self.cache.apply_refresh::<AuthorPubs>(&keys, self.refresh)?;
        Ok(())
    }

    /// Cached publication counts only; authors without a row are absent.
    pub fn cached_pub_counts(&mut self, ids: &[u64], year: i32) -> Result<FxHashMap<u64, Option<u64>>> {
        let keys: Vec<AuthorYearKey> = ids
            .iter()
            .map(|&auth_id| AuthorYearKey { auth_id, year })
            .collect();
        let lookup = self.cache.retrieve::<AuthorPubs>(&keys)?;
        Ok(lookup
            .found
            .into_iter()
            .map(|r| (r.auth_id, Some(r.n_pubs)))
            .collect())
    }

    /// Non-self citations received up to `year` per author, cached in
    /// `author_ncits`. `None` means unknown and is not cached.
    pub fn citations(&mut self, ids: &[u64], year: i32) -> Result<FxHashMap<u64, Option<u64>>> {
        let keys: Vec<AuthorYearKey> = ids
            .iter()
            .map(|&auth_id| AuthorYearKey { auth_id, year })
            .collect();
        self.cache.apply_refresh::<AuthorCitations>(&keys, self.refresh)?;
        let lookup = self.cache.retrieve::<AuthorCitations>(&keys)?;
        let mut counts: FxHashMap<u64, Option<u64>> = lookup
            .found
            .into_iter()
            .map(|r| (r.auth_id, Some(r.n_cits)))
            .collect();
        if lookup.missing.is_empty() {
            return Ok(counts);
        }

        let pb = self.progress.task_bar("citations", lookup.missing.len());
        for key in &lookup.missing {
            let own = [key.auth_id];
            match self.count_citations(Cited::Authors(&own), year + 1, &own) {
                Ok(n_cits) => {
                    self.cache.insert(&[AuthorCitations {
                        auth_id: key.auth_id,
                        year,
                        n_cits,
                    }])?;
                    counts.insert(key.auth_id, Some(n_cits));
                }
                Err(e) => {
                    log::warn!("Citations of {} unknown: {e}", key.auth_id);
                    counts.insert(key.auth_id, None);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(counts)
    }

    /// Documents published before `pubyear` that cite `cited`, excluding
    /// documents by any of `exclude`.
    ///
    /// When the query renders too long it is split and the distinct
    /// citing documents are counted instead.
    pub fn count_citations(
        &self,
        cited: Cited<'_>,
        pubyear: i32,
        exclude: &[u64],
    ) -> std::result::Result<u64, ProviderError> {
        let head = match cited {
            Cited::Authors(ids) => Query::CitesAuthor(ids.to_vec()),
            Cited::Documents(eids) => Query::CitesDocument(eids.to_vec()),
        };
        let query = with_citation_filters(head, pubyear, exclude);
        if query.rendered_len() <= self.batch.max_query_len {
            let label = format!("citations '{query}'");
            return self
                .batch
                .retry
                .run(&label, |attempt| {
                    self.provider
                        .count(SearchKind::Docs, &query, self.batch.refresh || attempt > 0)
                })
                .or_else(|e| match e {
                    ProviderError::NotFound => Ok(0),
                    e => Err(e),
                });
        }

        log::debug!("Citation query too long ({} chars), downloading", query.rendered_len());
        let citing: BTreeSet<String> = match cited {
            Cited::Authors(ids) => {
                let mut template = QueryTemplate::new(IdField::CitesAuthor).with(Query::PubYearBefore(pubyear));
                if !exclude.is_empty() {
                    template = template.with(Query::Not(Box::new(Query::AuthorId(exclude.to_vec()))));
                }
                let pb = self.progress.task_bar("citing docs", ids.len());
                let batch = batched_query::<Document>(self.provider, ids, &template, &self.batch, &pb);
                pb.finish_and_clear();
                if !batch.degraded.is_empty() {
                    return Err(ProviderError::Transient(format!(
                        "{} cited authors could not be queried",
                        batch.degraded.len()
                    )));
                }
                batch.hits.into_iter().map(|d| d.eid).collect()
            }
            Cited::Documents(eids) => self.citing_documents(eids, pubyear, exclude)?,
        };
        Ok(citing.len() as u64)
    }

    /// EIDs of documents citing any of `eids`, halving the list until each
    /// query fits.
    fn citing_documents(
        &self,
        eids: &[String],
        pubyear: i32,
        exclude: &[u64],
    ) -> std::result::Result<BTreeSet<String>, ProviderError> {
        let query = with_citation_filters(Query::CitesDocument(eids.to_vec()), pubyear, exclude);
        if eids.len() > 1 && query.rendered_len() > self.batch.max_query_len {
            let (left, right) = eids.split_at(eids.len().div_ceil(2));
            let mut citing = self.citing_documents(left, pubyear, exclude)?;
            citing.extend(self.citing_documents(right, pubyear, exclude)?);
            return Ok(citing);
        }
        Ok(self.fetch_docs(&query)?.into_iter().map(|d| d.eid).collect())
    }

    /// Authors publishing in `sources` during each of `years`, cached in
    /// `sources` with empty markers for source-years without documents.
    pub fn source_authors(&mut self, sources: &[u64], years: &[i32]) -> Result<BTreeSet<u64>> {
        let keys = source_year_keys(sources, years);
        self.cache.apply_refresh::<SourceAuthors>(&keys, self.refresh)?;
        let lookup = self.cache.retrieve::<SourceAuthors>(&keys)?;
        let mut authors: BTreeSet<u64> = lookup.found.iter().flat_map(|r| r.auids.iter().copied()).collect();

        for (year, missing) in missing_by_year(&lookup.missing) {
            let (docs, done) = self.source_year_docs(&missing, year);
            let mut rows: FxHashMap<u64, SourceAuthors> = done
                .iter()
                .map(|&source_id| {
                    let row = SourceAuthors {
                        source_id,
                        year,
                        auids: BTreeSet::new(),
                    };
                    (source_id, row)
                })
                .collect();
            for doc in &docs {
                let Some(source_id) = doc.source_id else {
                    continue;
                };
                if let Some(row) = rows.get_mut(&source_id) {
                    row.auids.extend(doc.author_ids());
                }
            }
            let rows: Vec<SourceAuthors> = rows.into_values().collect();
            self.cache.insert(&rows)?;
            authors.extend(rows.iter().flat_map(|r| r.auids.iter().copied()));
        }
        Ok(authors)
    }

    /// Authors publishing in `sources` during `year` under any of `afids`
    /// (any affiliation when empty), cached per affiliation in
    /// `sources_afids`.
    pub fn source_affiliation_authors(
        &mut self,
        sources: &[u64],
        year: i32,
        afids: &[u64],
    ) -> Result<BTreeSet<u64>> {
        let keys = source_year_keys(sources, &[year]);
        self.cache.apply_refresh::<SourceAffiliationAuthors>(&keys, self.refresh)?;
        let lookup = self.cache.retrieve::<SourceAffiliationAuthors>(&keys)?;
        let mut rows = lookup.found;

        if !lookup.missing.is_empty() {
            let missing: Vec<u64> = lookup.missing.iter().map(|k| k.source_id).collect();
            let (docs, done) = self.source_year_docs(&missing, year);
            let mut partition: FxHashMap<(u64, u64), BTreeSet<u64>> = FxHashMap::default();
            for doc in &docs {
                let Some(source_id) = doc.source_id.filter(|s| done.contains(s)) else {
                    continue;
                };
                for author in &doc.authors {
                    if author.afids.is_empty() {
                        partition.entry((source_id, 0)).or_default().insert(author.id);
                    }
                    for &afid in &author.afids {
                        partition.entry((source_id, afid)).or_default().insert(author.id);
                    }
                }
            }
            let mut fresh: Vec<SourceAffiliationAuthors> = partition
                .into_iter()
                .map(|((source_id, afid), auids)| SourceAffiliationAuthors {
                    source_id,
                    year,
                    afid,
                    auids,
                })
                .collect();
            let with_rows: FxHashSet<u64> = fresh.iter().map(|r| r.source_id).collect();
            fresh.extend(
                done.iter()
                    .filter(|s| !with_rows.contains(*s))
                    .map(|&s| SourceAffiliationAuthors::empty_marker(s, year)),
            );
            self.cache.insert(&fresh)?;
            rows.extend(fresh);
        }

        Ok(rows
            .iter()
            .filter(|r| afids.is_empty() || afids.contains(&r.afid))
            .flat_map(|r| r.auids.iter().copied())
            .collect())
    }

    /// Documents of `sources` in `year` plus the sources that were queried
    /// successfully.
    fn source_year_docs(&self, sources: &[u64], year: i32) -> (Vec<Document>, FxHashSet<u64>) {
        let template = QueryTemplate::sources().with(Query::PubYearIs(year));
        let pb = self.progress.task_bar(&format!("sources {year}"), sources.len());
        let batch = batched_query::<Document>(self.provider, sources, &template, &self.batch, &pb);
        pb.finish_and_clear();
        let degraded: FxHashSet<u64> = batch.degraded.iter().copied().collect();
        let done = sources.iter().copied().filter(|s| !degraded.contains(s)).collect();
        (batch.hits, done)
    }
}

fn with_citation_filters(head: Query, pubyear: i32, exclude: &[u64]) -> Query {
    let query = head.and(Query::PubYearBefore(pubyear));
    if exclude.is_empty() {
        query
    } else {
        query.and_not(Query::AuthorId(exclude.to_vec()))
    }
}

fn source_year_keys(sources: &[u64], years: &[i32]) -> Vec<SourceYearKey> {
    years
        .iter()
        .flat_map(|&year| sources.iter().map(move |&source_id| SourceYearKey { source_id, year }))
        .collect()
}

/// Missing source-year keys grouped by year, years ascending.
fn missing_by_year(keys: &[SourceYearKey]) -> Vec<(i32, Vec<u64>)> {
    let mut grouped: BTreeMap<i32, Vec<u64>> = BTreeMap::new();
    for key in keys {
        grouped.entry(key.year).or_default().push(key.source_id);
    }
    grouped.into_iter().collect()
}

fn info_row(r: AuthorRecord) -> AuthorInfo {
    AuthorInfo {
        auth_id: r.auth_id,
        eid: r.eid,
        surname: r.surname,
        initials: r.initials,
        givenname: r.givenname,
        affiliation: r.affiliation,
        documents: r.documents,
        affiliation_id: r.affiliation_id,
        city: r.city,
        country: r.country,
        areas: r.areas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::RetryPolicy;
    use cohort_scopus::{Authorship, Corpus, MemoryProvider};

    fn doc(eid: &str, year: i32, source: u64, authors: &[(u64, &[u64])]) -> Document {
        Document {
            eid: eid.into(),
            year,
            source_id: Some(source),
            source_title: format!("Source {source}"),
            subtype: Some("ar".into()),
            authors: authors
                .iter()
                .map(|(id, afids)| Authorship {
                    id: *id,
                    afids: afids.to_vec(),
                })
                .collect(),
            ref_authors: Vec::new(),
            ref_eids: Vec::new(),
        }
    }

    fn options() -> BatchOptions {
        BatchOptions {
            retry: RetryPolicy::immediate(1),
            ..Default::default()
        }
    }

    #[test]
    fn source_years_are_cached_with_empty_markers() {
        let provider = MemoryProvider::new(Corpus {
            documents: vec![
                doc("e1", 2017, 1, &[(10, &[]), (11, &[])]),
                doc("e2", 2016, 1, &[(12, &[])]),
            ],
            ..Default::default()
        });
        let mut cache = Cache::open_in_memory().unwrap();
        let progress = ProgressContext::hidden();
        let mut session = Session::new(&provider, &mut cache, options(), Refresh::Never, &progress);

        let authors = session.source_authors(&[1, 2], &[2016, 2017]).unwrap();
        assert_eq!(authors, BTreeSet::from([10, 11, 12]));
        let calls = provider.calls();

        // second lookup is served from the cache, empty source 2 included
        let again = session.source_authors(&[1, 2], &[2016, 2017]).unwrap();
        assert_eq!(again, authors);
        assert_eq!(provider.calls(), calls);
    }

    #[test]
    fn affiliation_partition_filters_today() {
        let provider = MemoryProvider::new(Corpus {
            documents: vec![doc("e1", 2017, 1, &[(10, &[100]), (11, &[200]), (12, &[])])],
            ..Default::default()
        });
        let mut cache = Cache::open_in_memory().unwrap();
        let progress = ProgressContext::hidden();
        let mut session = Session::new(&provider, &mut cache, options(), Refresh::Never, &progress);

        let all = session.source_affiliation_authors(&[1], 2017, &[]).unwrap();
        assert_eq!(all, BTreeSet::from([10, 11, 12]));
        let targeted = session.source_affiliation_authors(&[1], 2017, &[200]).unwrap();
        assert_eq!(targeted, BTreeSet::from([11]));
    }

    #[test]
    fn citation_count_excludes_self() {
        let mut citing_self = doc("c1", 2015, 1, &[(1, &[])]);
        citing_self.ref_authors = vec![1];
        let mut citing_other = doc("c2", 2015, 1, &[(2, &[])]);
        citing_other.ref_authors = vec![1];
        let mut too_late = doc("c3", 2019, 1, &[(3, &[])]);
        too_late.ref_authors = vec![1];
        let provider = MemoryProvider::new(Corpus {
            documents: vec![citing_self, citing_other, too_late],
            ..Default::default()
        });
        let mut cache = Cache::open_in_memory().unwrap();
        let progress = ProgressContext::hidden();
        let session = Session::new(&provider, &mut cache, options(), Refresh::Never, &progress);

        assert_eq!(session.count_citations(Cited::Authors(&[1]), 2018, &[1]).unwrap(), 1);

        // long-query fallback counts distinct citing documents
        let mut short = options();
        short.max_query_len = 10;
        let mut cache = Cache::open_in_memory().unwrap();
        let session = Session::new(&provider, &mut cache, short, Refresh::Never, &progress);
        assert_eq!(session.count_citations(Cited::Authors(&[1]), 2018, &[1]).unwrap(), 1);
    }

    #[test]
    fn unknown_citations_are_not_cached() {
        let provider = MemoryProvider::new(Corpus::default());
        let query = with_citation_filters(Query::CitesAuthor(vec![5]), 2018, &[5]);
        provider.fail_transiently(&query, 10);
        let mut cache = Cache::open_in_memory().unwrap();
        let progress = ProgressContext::hidden();
        let mut session = Session::new(&provider, &mut cache, options(), Refresh::Never, &progress);

        let counts = session.citations(&[5], 2017).unwrap();
        assert_eq!(counts[&5], None);
        let lookup = session
            .cache()
            .retrieve::<AuthorCitations>(&[AuthorYearKey { auth_id: 5, year: 2017 }])
            .unwrap();
        assert!(lookup.found.is_empty());
    }
}
