//! SQL generation for the cache store.
//!
//! Batch lookups stage the requested keys in a temporary `lookup_keys` table
//! and join it against the target table, one statement for the rows found and
//! one for the keys missing.

use crate::table::{Column, Table};

/// Staging table for batch key lookups.
const LOOKUP: &str = "lookup_keys";

fn column_list(cols: &[Column]) -> String {
    cols.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", ")
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// `t.a = k.a AND t.b = k.b`
fn join_condition(key_cols: &[Column]) -> String {
    key_cols
        .iter()
        .map(|(n, _)| format!("t.{n} = k.{n}"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub fn create_table(table: Table) -> String {
    let cols = table
        .columns()
        .iter()
        .map(|(n, ty)| format!("{n} {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {table} ({cols}, cached_at BIGINT NOT NULL, PRIMARY KEY ({pk}))",
        pk = table.primary_key().join(", ")
    )
}

pub fn drop_lookup() -> String {
    format!("DROP TABLE IF EXISTS {LOOKUP}")
}

pub fn create_lookup(key_cols: &[Column]) -> String {
    let cols = key_cols
        .iter()
        .map(|(n, ty)| format!("{n} {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TEMP TABLE {LOOKUP} ({cols}, PRIMARY KEY ({}))",
        column_list(key_cols)
    )
}

pub fn insert_lookup(key_cols: &[Column]) -> String {
    format!(
        "INSERT OR IGNORE INTO {LOOKUP} ({}) VALUES ({})",
        column_list(key_cols),
        placeholders(key_cols.len())
    )
}

/// Rows of `table` whose key prefix was staged.
pub fn select_found(table: Table, key_cols: &[Column]) -> String {
    let cols = table
        .columns()
        .iter()
        .map(|(n, _)| format!("t.{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let order = table
        .primary_key()
        .iter()
        .map(|n| format!("t.{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {cols} FROM {table} AS t INNER JOIN {LOOKUP} AS k ON {} ORDER BY {order}",
        join_condition(key_cols)
    )
}

/// Staged keys with no row in `table`.
pub fn select_missing(table: Table, key_cols: &[Column]) -> String {
    let cols = key_cols
        .iter()
        .map(|(n, _)| format!("k.{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {cols} FROM {LOOKUP} AS k WHERE NOT EXISTS \
         (SELECT 1 FROM {table} AS t WHERE {}) ORDER BY {cols}",
        join_condition(key_cols)
    )
}

pub fn insert_or_ignore(table: Table) -> String {
    let cols = table.columns();
    format!(
        "INSERT OR IGNORE INTO {table} ({}, cached_at) VALUES ({})",
        column_list(cols),
        placeholders(cols.len() + 1)
    )
}

/// Delete rows matching a staged key.
pub fn delete_staged(table: Table, key_cols: &[Column]) -> String {
    format!(
        "DELETE FROM {table} AS t WHERE EXISTS \
         (SELECT 1 FROM {LOOKUP} AS k WHERE {})",
        join_condition(key_cols)
    )
}

/// Delete rows matching a staged key that were cached before `?`.
pub fn delete_staged_older(table: Table, key_cols: &[Column]) -> String {
    format!("{} AND t.cached_at < ?", delete_staged(table, key_cols))
}

pub fn count_rows(table: Table) -> String {
    format!("SELECT count(*) FROM {table}")
}

pub fn clear_table(table: Table) -> String {
    format!("DELETE FROM {table}")
}
