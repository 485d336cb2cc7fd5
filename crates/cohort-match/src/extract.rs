//! Pure derivations over publication lists.

use std::collections::{BTreeMap, BTreeSet};

use cohort_cache::AuthorYear;
use cohort_scopus::Document;
use rustc_hash::FxHashMap;

/// Distinct coauthors of `ids` on `docs`.
pub fn coauthors<'a>(docs: impl IntoIterator<Item = &'a Document>, ids: &[u64]) -> BTreeSet<u64> {
    docs.into_iter()
        .flat_map(Document::author_ids)
        .filter(|a| !ids.contains(a))
        .collect()
}

/// Career snapshot of `auth_id` as of `year` from its publications.
///
/// Documents after `year` are ignored. `None` without any publication up to
/// `year`.
pub fn author_year(auth_id: u64, docs: &[&Document], year: i32) -> Option<AuthorYear> {
    let upto: Vec<&Document> = docs.iter().copied().filter(|d| d.year <= year).collect();
    let first_year = upto.iter().map(|d| d.year).min()?;
    let eids: BTreeSet<&str> = upto.iter().map(|d| d.eid.as_str()).collect();
    Some(AuthorYear {
        auth_id,
        year,
        first_year,
        n_pubs: eids.len() as u64,
        n_coauth: coauthors(upto, &[auth_id]).len() as u64,
    })
}

/// Group documents by each of `ids` appearing on them.
///
/// A document by two requested authors is listed under both.
pub fn by_author<'a>(docs: &'a [Document], ids: &[u64]) -> FxHashMap<u64, Vec<&'a Document>> {
    let mut grouped: FxHashMap<u64, Vec<&Document>> = FxHashMap::default();
    for doc in docs {
        for id in doc.author_ids().filter(|a| ids.contains(a)) {
            let entry = grouped.entry(id).or_default();
            if !entry.iter().any(|d| d.eid == doc.eid) {
                entry.push(doc);
            }
        }
    }
    grouped
}

/// Most frequent affiliation of `ids` in the most recent year up to `year`
/// that lists any affiliation for them.
pub fn main_affiliation<'a>(
    docs: impl IntoIterator<Item = &'a Document>,
    ids: &[u64],
    year: i32,
) -> Option<u64> {
    let mut per_year: BTreeMap<i32, Vec<u64>> = BTreeMap::new();
    for doc in docs.into_iter().filter(|d| d.year <= year) {
        let afids: Vec<u64> = doc.afids_of(ids).filter(|&a| a != 0).collect();
        if !afids.is_empty() {
            per_year.entry(doc.year).or_default().extend(afids);
        }
    }
    let (_, afids) = per_year.into_iter().next_back()?;

    let mut counts: Vec<(u64, usize)> = Vec::new();
    for afid in afids {
        match counts.iter_mut().find(|(a, _)| *a == afid) {
            Some((_, n)) => *n += 1,
            None => counts.push((afid, 1)),
        }
    }
    // max_by_key keeps the last maximum; scan reversed to keep the first
    counts.into_iter().rev().max_by_key(|(_, n)| *n).map(|(a, _)| a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_scopus::Authorship;

    fn doc(eid: &str, year: i32, authors: &[(u64, &[u64])]) -> Document {
        Document {
            eid: eid.into(),
            year,
            source_id: Some(1),
            source_title: String::new(),
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

    #[test]
    fn snapshot_counts_up_to_year() {
        let docs = [
            doc("e1", 2010, &[(1, &[]), (2, &[])]),
            doc("e2", 2012, &[(1, &[]), (3, &[]), (2, &[])]),
            doc("e3", 2015, &[(1, &[]), (4, &[])]),
        ];
        let refs: Vec<&Document> = docs.iter().collect();

        let snap = author_year(1, &refs, 2012).unwrap();
        assert_eq!((snap.first_year, snap.n_pubs, snap.n_coauth), (2010, 2, 2));
        let snap = author_year(1, &refs, 2020).unwrap();
        assert_eq!((snap.n_pubs, snap.n_coauth), (3, 3));
        assert!(author_year(1, &refs, 2009).is_none());
    }

    #[test]
    fn groups_by_requested_authors() {
        let docs = vec![
            doc("e1", 2010, &[(1, &[]), (2, &[])]),
            doc("e2", 2011, &[(2, &[]), (9, &[])]),
        ];
        let grouped = by_author(&docs, &[1, 2]);
        assert_eq!(grouped[&1].len(), 1);
        assert_eq!(grouped[&2].len(), 2);
        assert!(!grouped.contains_key(&9));
    }

    #[test]
    fn main_affiliation_uses_latest_year() {
        let docs = vec![
            doc("e1", 2015, &[(1, &[10]), (2, &[99])]),
            doc("e2", 2016, &[(1, &[20, 30])]),
            doc("e3", 2016, &[(1, &[30])]),
            doc("e4", 2018, &[(1, &[40])]),
        ];
        assert_eq!(main_affiliation(&docs, &[1], 2017), Some(30));
        assert_eq!(main_affiliation(&docs, &[1], 2015), Some(10));
        assert_eq!(main_affiliation(&docs, &[1], 2014), None);
    }

    #[test]
    fn main_affiliation_tie_keeps_first() {
        let docs = vec![doc("e1", 2016, &[(1, &[20, 30])])];
        assert_eq!(main_affiliation(&docs, &[1], 2016), Some(20));
    }

    #[test]
    fn coauthors_exclude_own_ids() {
        let docs = [doc("e1", 2010, &[(1, &[]), (2, &[]), (5, &[])])];
        assert_eq!(coauthors(&docs, &[1, 5]), BTreeSet::from([2]));
    }
}
