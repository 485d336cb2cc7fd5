//! Typed rows and lookup keys for each cache table.

use std::collections::BTreeSet;
use std::hash::Hash;

use duckdb::Row;
use duckdb::types::{Type, Value};

use crate::table::{Column, Table};

/// Lookup key: a prefix of a table's primary key.
pub trait CacheKey: Clone + Eq + Hash + Ord + std::fmt::Debug {
    /// Key columns in primary key order.
    const COLUMNS: &'static [Column];

    fn values(&self) -> Vec<Value>;

    /// Read the key from the leading columns of `row`.
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self>;
}

/// A persisted fact.
pub trait Record: Clone + std::fmt::Debug {
    const TABLE: Table;
    type Key: CacheKey;

    fn key(&self) -> Self::Key;

    /// Values in `TABLE.columns()` order.
    fn values(&self) -> Vec<Value>;

    /// Read a row selected in `TABLE.columns()` order.
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorKey(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorYearKey {
    pub auth_id: u64,
    pub year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceYearKey {
    pub source_id: u64,
    pub year: i32,
}

impl CacheKey for AuthorKey {
    const COLUMNS: &'static [Column] = &[("auth_id", "UBIGINT")];

    fn values(&self) -> Vec<Value> {
        vec![Value::UBigInt(self.0)]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self(row.get(0)?))
    }
}

impl CacheKey for AuthorYearKey {
    const COLUMNS: &'static [Column] = &[("auth_id", "UBIGINT"), ("year", "INTEGER")];

    fn values(&self) -> Vec<Value> {
        vec![Value::UBigInt(self.auth_id), Value::Int(self.year)]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            auth_id: row.get(0)?,
            year: row.get(1)?,
        })
    }
}

impl CacheKey for SourceYearKey {
    const COLUMNS: &'static [Column] = &[("source_id", "UBIGINT"), ("year", "INTEGER")];

    fn values(&self) -> Vec<Value> {
        vec![Value::UBigInt(self.source_id), Value::Int(self.year)]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            source_id: row.get(0)?,
            year: row.get(1)?,
        })
    }
}

/// Author profile as returned by an author search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorInfo {
    pub auth_id: u64,
    pub eid: String,
    pub surname: String,
    pub initials: String,
    pub givenname: String,
    pub affiliation: String,
    pub documents: u64,
    pub affiliation_id: String,
    pub city: String,
    pub country: String,
    /// Subject areas, most frequent first: `"MEDI (12); BIOC (3)"`.
    pub areas: String,
}

/// Publications up to and including `year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorPubs {
    pub auth_id: u64,
    pub year: i32,
    pub n_pubs: u64,
}

/// Non-self citations received by documents published before `year + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorCitations {
    pub auth_id: u64,
    pub year: i32,
    pub n_cits: u64,
}

/// Career snapshot as of `year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorYear {
    pub auth_id: u64,
    pub year: i32,
    pub first_year: i32,
    pub n_pubs: u64,
    pub n_coauth: u64,
}

/// Authors publishing in a source during a year. An empty set marks a
/// source-year the provider had nothing for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAuthors {
    pub source_id: u64,
    pub year: i32,
    pub auids: BTreeSet<u64>,
}

/// Authors publishing in a source during a year under one affiliation.
/// `afid == 0` with no authors marks an empty source-year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAffiliationAuthors {
    pub source_id: u64,
    pub year: i32,
    pub afid: u64,
    pub auids: BTreeSet<u64>,
}

impl SourceAffiliationAuthors {
    pub fn empty_marker(source_id: u64, year: i32) -> Self {
        Self {
            source_id,
            year,
            afid: 0,
            auids: BTreeSet::new(),
        }
    }
}

fn text(row: &Row<'_>, idx: usize) -> duckdb::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

/// Comma-joined identifier list.
pub fn join_ids(ids: &BTreeSet<u64>) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
}

fn split_ids(row: &Row<'_>, idx: usize) -> duckdb::Result<BTreeSet<u64>> {
    let raw = text(row, idx)?;
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .collect()
}

impl Record for AuthorInfo {
    const TABLE: Table = Table::AuthorInfo;
    type Key = AuthorKey;

    fn key(&self) -> AuthorKey {
        AuthorKey(self.auth_id)
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::UBigInt(self.auth_id),
            Value::Text(self.eid.clone()),
            Value::Text(self.surname.clone()),
            Value::Text(self.initials.clone()),
            Value::Text(self.givenname.clone()),
            Value::Text(self.affiliation.clone()),
            Value::UBigInt(self.documents),
            Value::Text(self.affiliation_id.clone()),
            Value::Text(self.city.clone()),
            Value::Text(self.country.clone()),
            Value::Text(self.areas.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            auth_id: row.get(0)?,
            eid: text(row, 1)?,
            surname: text(row, 2)?,
            initials: text(row, 3)?,
            givenname: text(row, 4)?,
            affiliation: text(row, 5)?,
            documents: row.get::<_, Option<u64>>(6)?.unwrap_or(0),
            affiliation_id: text(row, 7)?,
            city: text(row, 8)?,
            country: text(row, 9)?,
            areas: text(row, 10)?,
        })
    }
}

impl Record for AuthorPubs {
    const TABLE: Table = Table::AuthorPubs;
    type Key = AuthorYearKey;

    fn key(&self) -> AuthorYearKey {
        AuthorYearKey {
            auth_id: self.auth_id,
            year: self.year,
        }
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::UBigInt(self.auth_id),
            Value::Int(self.year),
            Value::UBigInt(self.n_pubs),
        ]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            auth_id: row.get(0)?,
            year: row.get(1)?,
            n_pubs: row.get(2)?,
        })
    }
}

impl Record for AuthorCitations {
    const TABLE: Table = Table::AuthorNcits;
    type Key = AuthorYearKey;

    fn key(&self) -> AuthorYearKey {
        AuthorYearKey {
            auth_id: self.auth_id,
            year: self.year,
        }
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::UBigInt(self.auth_id),
            Value::Int(self.year),
            Value::UBigInt(self.n_cits),
        ]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            auth_id: row.get(0)?,
            year: row.get(1)?,
            n_cits: row.get(2)?,
        })
    }
}

impl Record for AuthorYear {
    const TABLE: Table = Table::AuthorYear;
    type Key = AuthorYearKey;

    fn key(&self) -> AuthorYearKey {
        AuthorYearKey {
            auth_id: self.auth_id,
            year: self.year,
        }
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::UBigInt(self.auth_id),
            Value::Int(self.year),
            Value::Int(self.first_year),
            Value::UBigInt(self.n_pubs),
            Value::UBigInt(self.n_coauth),
        ]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            auth_id: row.get(0)?,
            year: row.get(1)?,
            first_year: row.get(2)?,
            n_pubs: row.get(3)?,
            n_coauth: row.get(4)?,
        })
    }
}

impl Record for SourceAuthors {
    const TABLE: Table = Table::Sources;
    type Key = SourceYearKey;

    fn key(&self) -> SourceYearKey {
        SourceYearKey {
            source_id: self.source_id,
            year: self.year,
        }
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::UBigInt(self.source_id),
            Value::Int(self.year),
            Value::Text(join_ids(&self.auids)),
        ]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            source_id: row.get(0)?,
            year: row.get(1)?,
            auids: split_ids(row, 2)?,
        })
    }
}

impl Record for SourceAffiliationAuthors {
    const TABLE: Table = Table::SourcesAfids;
    type Key = SourceYearKey;

    fn key(&self) -> SourceYearKey {
        SourceYearKey {
            source_id: self.source_id,
            year: self.year,
        }
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::UBigInt(self.source_id),
            Value::Int(self.year),
            Value::UBigInt(self.afid),
            Value::Text(join_ids(&self.auids)),
        ]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            source_id: row.get(0)?,
            year: row.get(1)?,
            afid: row.get(2)?,
            auids: split_ids(row, 3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_values_match_table_columns() {
        fn check<R: Record>(r: &R) {
            assert_eq!(r.values().len(), R::TABLE.columns().len(), "{}", R::TABLE);
        }
        check(&AuthorInfo::default());
        check(&AuthorPubs { auth_id: 1, year: 2020, n_pubs: 3 });
        check(&AuthorCitations { auth_id: 1, year: 2020, n_cits: 3 });
        check(&AuthorYear { auth_id: 1, year: 2020, first_year: 2010, n_pubs: 3, n_coauth: 4 });
        check(&SourceAuthors { source_id: 1, year: 2020, auids: BTreeSet::new() });
        check(&SourceAffiliationAuthors::empty_marker(1, 2020));
    }

    #[test]
    fn join_ids_sorted_comma_separated() {
        let ids: BTreeSet<u64> = [30, 10, 20].into_iter().collect();
        assert_eq!(join_ids(&ids), "10,20,30");
        assert_eq!(join_ids(&BTreeSet::new()), "");
    }
}
