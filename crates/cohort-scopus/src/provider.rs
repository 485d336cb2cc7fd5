//! The provider boundary.

use crate::document::{Affiliation, AuthorRecord, Document};
use crate::error::ProviderError;
use crate::query::Query;

/// Which search index a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Docs,
    Authors,
}

impl std::fmt::Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docs => f.write_str("docs"),
            Self::Authors => f.write_str("authors"),
        }
    }
}

/// A paginated bibliographic search service.
///
/// `refresh` asks the provider to bypass whatever staleness it keeps on its
/// side of the boundary.
pub trait Provider {
    /// Number of results `query` has, without downloading them.
    fn count(&self, kind: SearchKind, query: &Query, refresh: bool) -> Result<u64, ProviderError>;

    /// All documents matching `query`.
    fn documents(&self, query: &Query, refresh: bool) -> Result<Vec<Document>, ProviderError>;

    /// All author profiles matching `query`.
    fn authors(&self, query: &Query, refresh: bool) -> Result<Vec<AuthorRecord>, ProviderError>;

    fn affiliation(&self, afid: u64, refresh: bool) -> Result<Affiliation, ProviderError> {
        let _ = (afid, refresh);
        Err(ProviderError::NotFound)
    }
}

/// A result type that can be fetched through a [`Provider`].
pub trait Hit: Sized {
    const KIND: SearchKind;

    fn fetch(provider: &dyn Provider, query: &Query, refresh: bool) -> Result<Vec<Self>, ProviderError>;
}

impl Hit for Document {
    const KIND: SearchKind = SearchKind::Docs;

    /// Only research output counts as a publication.
    fn fetch(provider: &dyn Provider, query: &Query, refresh: bool) -> Result<Vec<Self>, ProviderError> {
        let docs = provider.documents(query, refresh)?;
        Ok(docs.into_iter().filter(Document::is_research).collect())
    }
}

impl Hit for AuthorRecord {
    const KIND: SearchKind = SearchKind::Authors;

    fn fetch(provider: &dyn Provider, query: &Query, refresh: bool) -> Result<Vec<Self>, ProviderError> {
        provider.authors(query, refresh)
    }
}
