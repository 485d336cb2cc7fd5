//! Field/source lookup table and comparable-source selection.
//!
//! Sources carry one or more 4-digit ASJC codes and a type (journal, book
//! series, conference proceeding, ...). The table is loaded once per run from
//! two CSV files through DuckDB's CSV reader.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use duckdb::Connection;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{MatchError, Result};
use crate::params::SearchMode;
use crate::profile::ScientistProfile;

/// Multidisciplinary, ignored when determining the main field.
const MULTIDISCIPLINARY: u32 = 1000;

/// 2-digit ASJC discipline → abbreviation used in author subject areas.
pub const ASJC_2D: [(u32, &str); 27] = [
    (10, "MULT"),
    (11, "AGRI"),
    (12, "ARTS"),
    (13, "BIOC"),
    (14, "BUSI"),
    (15, "CENG"),
    (16, "CHEM"),
    (17, "COMP"),
    (18, "DECI"),
    (19, "EART"),
    (20, "ECON"),
    (21, "ENER"),
    (22, "ENGI"),
    (23, "ENVI"),
    (24, "IMMU"),
    (25, "MATE"),
    (26, "MATH"),
    (27, "MEDI"),
    (28, "NEUR"),
    (29, "NURS"),
    (30, "PHAR"),
    (31, "PHYS"),
    (32, "PSYC"),
    (33, "SOCI"),
    (34, "VETE"),
    (35, "DENT"),
    (36, "HEAL"),
];

pub fn discipline_name(code_2d: u32) -> Option<&'static str> {
    ASJC_2D
        .iter()
        .find(|(code, _)| *code == code_2d)
        .map(|(_, name)| *name)
}

/// Most common 4-digit field and the abbreviation of the most common
/// discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainField {
    pub code: u32,
    pub name: &'static str,
}

/// Main field of a list of 4-digit ASJC codes, one entry per source.
///
/// Multidisciplinary is ignored. Ties on the 4-digit code prefer specific
/// codes (`code % 100 != 0`) over general ones, then the first in order.
pub fn determine_main_field(fields: &[u32]) -> Option<MainField> {
    let fields: Vec<u32> = fields
        .iter()
        .copied()
        .filter(|&f| f != MULTIDISCIPLINARY)
        .collect();

    let code = most_common(&fields, |&f| f % 100 != 0)?;
    let prefixes: Vec<u32> = fields.iter().map(|f| f / 100).collect();
    let prefix = most_common(&prefixes, |_| false)?;
    Some(MainField {
        code,
        name: discipline_name(prefix)?,
    })
}

/// Most frequent value; among tied values the first preferred one, else the
/// first one, in order of first appearance.
fn most_common(values: &[u32], preferred: impl Fn(&u32) -> bool) -> Option<u32> {
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for &v in values {
        match counts.iter_mut().find(|(c, _)| *c == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    let max = counts.iter().map(|(_, n)| *n).max()?;
    let top: Vec<u32> = counts
        .iter()
        .filter(|(_, n)| *n == max)
        .map(|(v, _)| *v)
        .collect();
    top.iter().copied().find(|v| preferred(v)).or(top.first().copied())
}

/// Type and title of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub source_type: String,
    pub title: String,
}

/// Static source → fields and source → (type, title) lookups.
#[derive(Debug, Clone, Default)]
pub struct FieldSourceTable {
    fields: FxHashMap<u64, Vec<u32>>,
    info: FxHashMap<u64, SourceInfo>,
}

impl FieldSourceTable {
    pub fn new(
        field_sources: impl IntoIterator<Item = (u64, u32)>,
        source_info: impl IntoIterator<Item = (u64, SourceInfo)>,
    ) -> Self {
        let mut fields: FxHashMap<u64, Vec<u32>> = FxHashMap::default();
        for (source_id, asjc) in field_sources {
            let codes = fields.entry(source_id).or_default();
            if !codes.contains(&asjc) {
                codes.push(asjc);
            }
        }
        Self {
            fields,
            info: source_info.into_iter().collect(),
        }
    }

    /// Load `source_id,asjc` and `source_id,type,title` CSV files (with
    /// headers).
    pub fn from_csv(field_sources: &Path, source_info: &Path) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(MatchError::FieldTable)?;

        let pairs = {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT source_id, asjc FROM read_csv('{}', header = true, \
                     columns = {{'source_id': 'UBIGINT', 'asjc': 'UINTEGER'}}) \
                     WHERE source_id IS NOT NULL AND asjc IS NOT NULL",
                    sql_path(field_sources)
                ))
                .map_err(MatchError::FieldTable)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u32>(1)?)))
                .map_err(MatchError::FieldTable)?;
            rows.collect::<duckdb::Result<Vec<_>>>()
                .map_err(MatchError::FieldTable)?
        };

        let info = {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT source_id, type, title FROM read_csv('{}', header = true, \
                     columns = {{'source_id': 'UBIGINT', 'type': 'VARCHAR', 'title': 'VARCHAR'}}) \
                     WHERE source_id IS NOT NULL",
                    sql_path(source_info)
                ))
                .map_err(MatchError::FieldTable)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        SourceInfo {
                            source_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                            title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        },
                    ))
                })
                .map_err(MatchError::FieldTable)?;
            rows.collect::<duckdb::Result<Vec<_>>>()
                .map_err(MatchError::FieldTable)?
        };

        let table = Self::new(pairs, info);
        log::info!(
            "Loaded fields of {} sources, info on {}",
            table.fields.len(),
            table.info.len()
        );
        Ok(table)
    }

    /// 4-digit ASJC codes of a source.
    pub fn fields_of(&self, source_id: u64) -> &[u32] {
        self.fields.get(&source_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn info(&self, source_id: u64) -> Option<&SourceInfo> {
        self.info.get(&source_id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// ASJC codes of every source in `sources`, one entry per (source, code).
    pub fn fields_of_sources<'a>(&'a self, sources: impl IntoIterator<Item = &'a u64>) -> Vec<u32> {
        sources
            .into_iter()
            .flat_map(|s| self.fields_of(*s).iter().copied())
            .collect()
    }

    /// Sources comparable to the scientist's: in the main field, of a type
    /// the scientist publishes in, plus the scientist's own sources.
    ///
    /// In narrow mode sources that also carry a field the scientist never
    /// published in are left out.
    pub fn define_search_sources(
        &self,
        profile: &ScientistProfile,
        mode: SearchMode,
    ) -> Result<BTreeMap<u64, String>> {
        let main = profile.main_field().ok_or_else(|| MatchError::UnknownField {
            ids: profile.identifier().to_vec(),
        })?;

        let own_types: FxHashSet<&str> = profile
            .sources()
            .keys()
            .filter_map(|s| self.info(*s))
            .map(|i| i.source_type.as_str())
            .collect();
        let own_fields: BTreeSet<u32> = profile.fields().iter().copied().collect();

        let mut selected: BTreeMap<u64, String> = self
            .fields
            .iter()
            .filter(|(_, codes)| codes.contains(&main.code))
            .filter(|(_, codes)| {
                mode == SearchMode::Wide || codes.iter().all(|c| own_fields.contains(c))
            })
            .filter_map(|(id, _)| {
                let info = self.info(*id)?;
                own_types
                    .contains(info.source_type.as_str())
                    .then(|| (*id, info.title.clone()))
            })
            .collect();
        for (id, title) in profile.sources() {
            selected.entry(*id).or_insert_with(|| title.clone());
        }

        if selected.is_empty() {
            return Err(MatchError::NoSearchSources {
                ids: profile.identifier().to_vec(),
            });
        }
        let mut types: Vec<&str> = own_types.into_iter().collect();
        types.sort_unstable();
        log::info!(
            "Found {} sources of type {} matching main field {} {mode}ly",
            selected.len(),
            types.join(", "),
            main.code
        );
        Ok(selected)
    }
}

/// Path as a single-quoted SQL literal body.
fn sql_path(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_field_skips_multidisciplinary() {
        let main = determine_main_field(&[1000, 1000, 1000, 2002, 2002, 1405]).unwrap();
        assert_eq!(main, MainField { code: 2002, name: "ECON" });
        assert_eq!(determine_main_field(&[1000]), None);
        assert_eq!(determine_main_field(&[]), None);
    }

    #[test]
    fn tie_prefers_specific_field() {
        // 2000 and 2002 tie; the general code loses
        let main = determine_main_field(&[2000, 2002, 1405]).unwrap();
        assert_eq!(main.code, 2002);
        // two specific codes tie: first in order wins
        assert_eq!(determine_main_field(&[1405, 2002]).unwrap().code, 1405);
    }

    #[test]
    fn discipline_is_most_common_prefix() {
        // 2002 is the top code but BUSI (14xx) is the top discipline
        let main = determine_main_field(&[2002, 2002, 1405, 1406, 1407]).unwrap();
        assert_eq!(main.code, 2002);
        assert_eq!(main.name, "BUSI");
    }

    #[test]
    fn loads_csv_through_duckdb() {
        let dir = tempfile::tempdir().unwrap();
        let fs = dir.path().join("field_sources.csv");
        let si = dir.path().join("source_info.csv");
        std::fs::write(&fs, "source_id,asjc\n22900,2002\n22900,1405\n23000,2002\n").unwrap();
        std::fs::write(&si, "source_id,type,title\n22900,journal,Research Policy\n23000,journal,\"Econ, Letters\"\n")
            .unwrap();

        let table = FieldSourceTable::from_csv(&fs, &si).unwrap();
        assert_eq!(table.len(), 2);
        let mut codes = table.fields_of(22900).to_vec();
        codes.sort_unstable();
        assert_eq!(codes, vec![1405, 2002]);
        assert_eq!(table.info(23000).unwrap().title, "Econ, Letters");
        assert!(table.fields_of(1).is_empty());
    }
}
