//! Cache table catalogue.

use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

/// Column name and DuckDB type.
pub type Column = (&'static str, &'static str);

/// The logical tables of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    AuthorInfo,
    AuthorPubs,
    AuthorNcits,
    AuthorYear,
    Sources,
    SourcesAfids,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::AuthorInfo,
        Table::AuthorPubs,
        Table::AuthorNcits,
        Table::AuthorYear,
        Table::Sources,
        Table::SourcesAfids,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::AuthorInfo => "author_info",
            Self::AuthorPubs => "author_pubs",
            Self::AuthorNcits => "author_ncits",
            Self::AuthorYear => "author_year",
            Self::Sources => "sources",
            Self::SourcesAfids => "sources_afids",
        }
    }

    /// Resolve a table by name. `author_size` is accepted for `author_pubs`.
    pub fn from_name(name: &str) -> Result<Self, CacheError> {
        match name {
            "author_info" => Ok(Self::AuthorInfo),
            "author_pubs" | "author_size" => Ok(Self::AuthorPubs),
            "author_ncits" => Ok(Self::AuthorNcits),
            "author_year" => Ok(Self::AuthorYear),
            "sources" => Ok(Self::Sources),
            "sources_afids" => Ok(Self::SourcesAfids),
            other => Err(CacheError::InvalidArgument(format!(
                "unknown table '{other}', expected one of: {}",
                Self::ALL.map(Table::name).join(", ")
            ))),
        }
    }

    /// Data columns in storage order (the `cached_at` column is implicit).
    pub fn columns(self) -> &'static [Column] {
        match self {
            Self::AuthorInfo => &[
                ("auth_id", "UBIGINT"),
                ("eid", "VARCHAR"),
                ("surname", "VARCHAR"),
                ("initials", "VARCHAR"),
                ("givenname", "VARCHAR"),
                ("affiliation", "VARCHAR"),
                ("documents", "UBIGINT"),
                ("affiliation_id", "VARCHAR"),
                ("city", "VARCHAR"),
                ("country", "VARCHAR"),
                ("areas", "VARCHAR"),
            ],
            Self::AuthorPubs => &[
                ("auth_id", "UBIGINT"),
                ("year", "INTEGER"),
                ("n_pubs", "UBIGINT"),
            ],
            Self::AuthorNcits => &[
                ("auth_id", "UBIGINT"),
                ("year", "INTEGER"),
                ("n_cits", "UBIGINT"),
            ],
            Self::AuthorYear => &[
                ("auth_id", "UBIGINT"),
                ("year", "INTEGER"),
                ("first_year", "INTEGER"),
                ("n_pubs", "UBIGINT"),
                ("n_coauth", "UBIGINT"),
            ],
            Self::Sources => &[
                ("source_id", "UBIGINT"),
                ("year", "INTEGER"),
                ("auids", "VARCHAR"),
            ],
            Self::SourcesAfids => &[
                ("source_id", "UBIGINT"),
                ("year", "INTEGER"),
                ("afid", "UBIGINT"),
                ("auids", "VARCHAR"),
            ],
        }
    }

    pub fn primary_key(self) -> &'static [&'static str] {
        match self {
            Self::AuthorInfo => &["auth_id"],
            Self::AuthorPubs | Self::AuthorNcits | Self::AuthorYear => &["auth_id", "year"],
            Self::Sources => &["source_id", "year"],
            Self::SourcesAfids => &["source_id", "year", "afid"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}
