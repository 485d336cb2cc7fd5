//! cohort-cache: durable cache of bibliometric facts
//!
//! One DuckDB file holds author and source-year facts keyed by composite
//! primary keys. Lookups are batch set-differences against a staged key
//! table; writes are insert-if-absent, refreshes are explicit drops.

mod error;
mod record;
mod sql;
mod store;
mod table;

pub use error::{CacheError, Result};
pub use record::{
    AuthorCitations, AuthorInfo, AuthorKey, AuthorPubs, AuthorYear, AuthorYearKey, CacheKey,
    Record, SourceAffiliationAuthors, SourceAuthors, SourceYearKey, join_ids,
};
pub use store::{Cache, CacheConfig, Lookup, TableStats};
pub use table::Table;
