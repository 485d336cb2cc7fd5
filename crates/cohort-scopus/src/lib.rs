//! cohort-scopus: bibliographic provider boundary
//!
//! Search predicates, the `Provider` trait with its typed errors, the
//! bisecting batch query layer, and two providers: the Scopus HTTP API and an
//! in-memory corpus.

pub mod batch;
mod document;
mod error;
mod memory;
mod provider;
pub mod query;
mod scopus;

pub use batch::{Batch, BatchOptions, batched_query, counted_query};
pub use document::{Affiliation, AuthorRecord, Authorship, Document, RESEARCH_TYPES};
pub use error::ProviderError;
pub use memory::{Corpus, MemoryProvider};
pub use provider::{Hit, Provider, SearchKind};
pub use query::{IdField, Query, QueryTemplate};
pub use scopus::{ScopusConfig, ScopusProvider};
