//! In-memory provider over a fixed corpus.
//!
//! Evaluates [`Query`] trees directly against the corpus. Used for tests and
//! for replaying a recorded corpus from the command line.

use std::cell::{Cell, RefCell};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::document::{Affiliation, AuthorRecord, Document};
use crate::error::ProviderError;
use crate::provider::{Provider, SearchKind};
use crate::query::Query;

/// Documents, author profiles and affiliations served by [`MemoryProvider`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    pub authors: Vec<AuthorRecord>,
    pub affiliations: Vec<Affiliation>,
}

pub struct MemoryProvider {
    corpus: Corpus,
    max_results: Option<u64>,
    /// Rendered query → remaining transient failures.
    failures: RefCell<FxHashMap<String, u32>>,
    calls: Cell<usize>,
}

impl MemoryProvider {
    pub fn new(corpus: Corpus) -> Self {
        Self {
            corpus,
            max_results: None,
            failures: RefCell::new(FxHashMap::default()),
            calls: Cell::new(0),
        }
    }

    /// Reject downloads of more than `max` results with `TooLarge`.
    pub fn with_max_results(mut self, max: u64) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Fail the next `times` calls for exactly this query with `Transient`.
    pub fn fail_transiently(&self, query: &Query, times: u32) {
        self.failures.borrow_mut().insert(query.to_string(), times);
    }

    /// Number of calls served so far, failures included.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    fn enter(&self, query: &Query) -> Result<(), ProviderError> {
        self.calls.set(self.calls.get() + 1);
        let mut failures = self.failures.borrow_mut();
        if let Some(left) = failures.get_mut(&query.to_string()) {
            if *left > 0 {
                *left -= 1;
                return Err(ProviderError::Transient(format!("scripted failure for '{query}'")));
            }
        }
        Ok(())
    }

    fn matching_docs<'a>(&'a self, query: &'a Query) -> impl Iterator<Item = &'a Document> + 'a {
        self.corpus.documents.iter().filter(move |d| doc_matches(query, d))
    }

    fn matching_authors<'a>(&'a self, query: &'a Query) -> impl Iterator<Item = &'a AuthorRecord> + 'a {
        self.corpus.authors.iter().filter(move |a| author_matches(query, a))
    }

    fn check_size(&self, n: usize) -> Result<(), ProviderError> {
        match self.max_results {
            Some(max) if n as u64 > max => Err(ProviderError::TooLarge {
                count: Some(n as u64),
            }),
            _ => Ok(()),
        }
    }
}

impl Provider for MemoryProvider {
    fn count(&self, kind: SearchKind, query: &Query, _refresh: bool) -> Result<u64, ProviderError> {
        self.enter(query)?;
        let n = match kind {
            SearchKind::Docs => self.matching_docs(query).count(),
            SearchKind::Authors => self.matching_authors(query).count(),
        };
        Ok(n as u64)
    }

    fn documents(&self, query: &Query, _refresh: bool) -> Result<Vec<Document>, ProviderError> {
        self.enter(query)?;
        let docs: Vec<Document> = self.matching_docs(query).cloned().collect();
        self.check_size(docs.len())?;
        Ok(docs)
    }

    fn authors(&self, query: &Query, _refresh: bool) -> Result<Vec<AuthorRecord>, ProviderError> {
        self.enter(query)?;
        let authors: Vec<AuthorRecord> = self.matching_authors(query).cloned().collect();
        self.check_size(authors.len())?;
        Ok(authors)
    }

    fn affiliation(&self, afid: u64, _refresh: bool) -> Result<Affiliation, ProviderError> {
        self.corpus
            .affiliations
            .iter()
            .find(|a| a.id == afid)
            .cloned()
            .ok_or(ProviderError::NotFound)
    }
}

fn doc_matches(query: &Query, doc: &Document) -> bool {
    match query {
        Query::AuthorId(ids) => doc.author_ids().any(|a| ids.contains(&a)),
        Query::SourceId(ids) => doc.source_id.is_some_and(|s| ids.contains(&s)),
        Query::Eid(eids) => eids.contains(&doc.eid),
        Query::CitesAuthor(ids) => doc.ref_authors.iter().any(|a| ids.contains(a)),
        Query::CitesDocument(eids) => doc.ref_eids.iter().any(|e| eids.contains(e)),
        Query::PubYearBefore(y) => doc.year < *y,
        Query::PubYearAfter(y) => doc.year > *y,
        Query::PubYearIs(y) => doc.year == *y,
        Query::And(parts) => parts.iter().all(|q| doc_matches(q, doc)),
        Query::Or(parts) => parts.iter().any(|q| doc_matches(q, doc)),
        Query::Not(inner) => !doc_matches(inner, doc),
    }
}

/// Author search only understands identifier predicates.
fn author_matches(query: &Query, author: &AuthorRecord) -> bool {
    match query {
        Query::AuthorId(ids) => ids.contains(&author.auth_id),
        Query::And(parts) => parts.iter().all(|q| author_matches(q, author)),
        Query::Or(parts) => parts.iter().any(|q| author_matches(q, author)),
        Query::Not(inner) => !author_matches(inner, author),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Authorship;

    fn doc(eid: &str, year: i32, source: u64, authors: &[u64]) -> Document {
        Document {
            eid: eid.into(),
            year,
            source_id: Some(source),
            source_title: format!("Source {source}"),
            subtype: Some("ar".into()),
            authors: authors.iter().map(|&id| Authorship { id, afids: vec![] }).collect(),
            ref_authors: Vec::new(),
            ref_eids: Vec::new(),
        }
    }

    fn provider() -> MemoryProvider {
        MemoryProvider::new(Corpus {
            documents: vec![
                doc("e1", 2010, 100, &[1, 2]),
                doc("e2", 2015, 100, &[2]),
                doc("e3", 2015, 200, &[3]),
            ],
            ..Default::default()
        })
    }

    #[test]
    fn evaluates_predicates() {
        let p = provider();
        let q = Query::SourceId(vec![100]).and(Query::PubYearIs(2015));
        let docs = p.documents(&q, false).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].eid, "e2");

        let q = Query::AuthorId(vec![2]).and_not(Query::PubYearAfter(2012));
        assert_eq!(p.count(SearchKind::Docs, &q, false).unwrap(), 1);
    }

    #[test]
    fn scripted_failures_then_success() {
        let p = provider();
        let q = Query::AuthorId(vec![3]);
        p.fail_transiently(&q, 2);
        assert!(matches!(p.count(SearchKind::Docs, &q, false), Err(ProviderError::Transient(_))));
        assert!(p.count(SearchKind::Docs, &q, true).is_err());
        assert_eq!(p.count(SearchKind::Docs, &q, true).unwrap(), 1);
        assert_eq!(p.calls(), 3);
    }

    #[test]
    fn download_limit() {
        let p = provider().with_max_results(1);
        let q = Query::SourceId(vec![100]);
        assert_eq!(p.count(SearchKind::Docs, &q, false).unwrap(), 2);
        assert!(matches!(p.documents(&q, false), Err(ProviderError::TooLarge { .. })));
    }
}
