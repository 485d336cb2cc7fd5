//! DuckDB-backed cache store.

use std::path::{Path, PathBuf};

use cohort_core::Refresh;
use duckdb::{Connection, params_from_iter};
use duckdb::types::Value;
use serde::Deserialize;

use crate::error::{CacheError, Result};
use crate::record::{CacheKey, Record};
use crate::sql;
use crate::table::Table;

/// Where the cache lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let path = directories::ProjectDirs::from("", "", "cohort")
            .map(|d| d.cache_dir().join("main.duckdb"))
            .unwrap_or_else(|| PathBuf::from("cohort-cache.duckdb"));
        Self { path }
    }
}

/// Result of a batch lookup: rows already cached and the keys without any.
#[derive(Debug)]
pub struct Lookup<R: Record> {
    pub found: Vec<R>,
    pub missing: Vec<R::Key>,
}

impl<R: Record> Lookup<R> {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Row counts per table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub table: Table,
    pub rows: u64,
}

/// The cache handle. One per run; the connection closes on drop.
pub struct Cache {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Cache {
    /// Open (or create) the cache file, creating missing tables.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&config.path)?;
        log::debug!("Opened cache {}", config.path.display());
        let cache = Self {
            conn,
            path: Some(config.path.clone()),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Throwaway cache for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let cache = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        for table in Table::ALL {
            self.conn.execute_batch(&sql::create_table(table))?;
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Batch set-difference lookup: rows stored for `keys` and the keys with
    /// no stored row. Duplicate keys are looked up once.
    pub fn retrieve<R: Record>(&mut self, keys: &[R::Key]) -> Result<Lookup<R>> {
        check_key::<R>()?;
        if keys.is_empty() {
            return Ok(Lookup {
                found: Vec::new(),
                missing: Vec::new(),
            });
        }
        self.stage_keys(keys)?;
        let key_cols = <R::Key as CacheKey>::COLUMNS;

        let found = {
            let mut stmt = self.conn.prepare(&sql::select_found(R::TABLE, key_cols))?;
            let rows = stmt.query_map([], |row| R::from_row(row))?;
            rows.collect::<duckdb::Result<Vec<_>>>()?
        };
        let missing = {
            let mut stmt = self.conn.prepare(&sql::select_missing(R::TABLE, key_cols))?;
            let rows = stmt.query_map([], |row| <R::Key as CacheKey>::from_row(row))?;
            rows.collect::<duckdb::Result<Vec<_>>>()?
        };
        self.conn.execute_batch(&sql::drop_lookup())?;

        log::debug!(
            "{}: {} found, {} missing of {} keys",
            R::TABLE,
            found.len(),
            missing.len(),
            keys.len()
        );
        Ok(Lookup { found, missing })
    }

    /// Insert-if-absent. Existing rows are never overwritten; returns the
    /// number of rows actually written.
    pub fn insert<R: Record>(&mut self, rows: &[R]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql::insert_or_ignore(R::TABLE))?;
            for row in rows {
                let mut values = row.values();
                values.push(Value::BigInt(now));
                written += stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Delete every row matching one of `keys`.
    pub fn drop_keys<R: Record>(&mut self, keys: &[R::Key]) -> Result<usize> {
        check_key::<R>()?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.stage_keys(keys)?;
        let deleted = self
            .conn
            .execute(&sql::delete_staged(R::TABLE, <R::Key as CacheKey>::COLUMNS), [])?;
        self.conn.execute_batch(&sql::drop_lookup())?;
        Ok(deleted)
    }

    /// Delete rows matching one of `keys` cached more than `max_age_secs` ago.
    pub fn drop_older<R: Record>(&mut self, keys: &[R::Key], max_age_secs: i64) -> Result<usize> {
        check_key::<R>()?;
        if keys.is_empty() {
            return Ok(0);
        }
        let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
        self.stage_keys(keys)?;
        let deleted = self.conn.execute(
            &sql::delete_staged_older(R::TABLE, <R::Key as CacheKey>::COLUMNS),
            [cutoff],
        )?;
        self.conn.execute_batch(&sql::drop_lookup())?;
        Ok(deleted)
    }

    /// Drop what `refresh` says is stale among `keys`.
    pub fn apply_refresh<R: Record>(&mut self, keys: &[R::Key], refresh: Refresh) -> Result<usize> {
        let dropped = match refresh.max_age_secs() {
            None => 0,
            Some(0) => self.drop_keys::<R>(keys)?,
            Some(age) => self.drop_older::<R>(keys, age)?,
        };
        if dropped > 0 {
            log::debug!("{}: refreshed {dropped} rows ({refresh})", R::TABLE);
        }
        Ok(dropped)
    }

    pub fn stats(&self) -> Result<Vec<TableStats>> {
        Table::ALL
            .into_iter()
            .map(|table| {
                let rows: i64 = self
                    .conn
                    .query_row(&sql::count_rows(table), [], |row| row.get(0))?;
                Ok(TableStats {
                    table,
                    rows: rows.max(0) as u64,
                })
            })
            .collect()
    }

    /// Delete every row of `table`.
    pub fn clear(&self, table: Table) -> Result<usize> {
        let deleted = self.conn.execute(&sql::clear_table(table), [])?;
        log::info!("Cleared {deleted} rows from {table}");
        Ok(deleted)
    }

    /// Replace the staging table with `keys`.
    fn stage_keys<K: CacheKey>(&mut self, keys: &[K]) -> Result<()> {
        self.conn.execute_batch(&sql::drop_lookup())?;
        self.conn.execute_batch(&sql::create_lookup(K::COLUMNS))?;
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql::insert_lookup(K::COLUMNS))?;
            for key in keys {
                stmt.execute(params_from_iter(key.values()))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// The key type must name a leading part of the table's primary key.
fn check_key<R: Record>() -> Result<()> {
    let pk = R::TABLE.primary_key();
    let key_cols = <R::Key as CacheKey>::COLUMNS;
    let table_cols = R::TABLE.columns();
    let fits = key_cols.len() <= pk.len()
        && key_cols.iter().zip(pk).all(|((name, ty), pk_name)| {
            name == pk_name && table_cols.iter().any(|(n, t)| n == name && t == ty)
        });
    if fits {
        Ok(())
    } else {
        Err(CacheError::InvalidArgument(format!(
            "key ({}) does not fit primary key ({}) of {}",
            key_cols.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", "),
            pk.join(", "),
            R::TABLE
        )))
    }
}
