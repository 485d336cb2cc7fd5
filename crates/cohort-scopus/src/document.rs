//! Search result records.

use serde::{Deserialize, Serialize};

/// Document subtypes counted as research output.
pub const RESEARCH_TYPES: [&str; 8] = ["ar", "bk", "ch", "cp", "cr", "no", "re", "sh"];

/// One author on a document with the affiliations listed for them there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorship {
    pub id: u64,
    #[serde(default)]
    pub afids: Vec<u64>,
}

/// A document from a document search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub eid: String,
    pub year: i32,
    #[serde(default)]
    pub source_id: Option<u64>,
    #[serde(default)]
    pub source_title: String,
    /// Two-letter subtype code (`ar`, `re`, ...).
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub authors: Vec<Authorship>,
    /// Authors of the documents this one references.
    #[serde(default)]
    pub ref_authors: Vec<u64>,
    /// Documents this one references.
    #[serde(default)]
    pub ref_eids: Vec<String>,
}

impl Document {
    /// Research output: a research subtype, or no subtype at all.
    pub fn is_research(&self) -> bool {
        match self.subtype.as_deref() {
            None | Some("") => true,
            Some(s) => RESEARCH_TYPES.contains(&s),
        }
    }

    pub fn author_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.authors.iter().map(|a| a.id)
    }

    pub fn has_author(&self, id: u64) -> bool {
        self.authors.iter().any(|a| a.id == id)
    }

    /// Affiliations listed for any of `ids` on this document.
    pub fn afids_of<'a>(&'a self, ids: &'a [u64]) -> impl Iterator<Item = u64> + 'a {
        self.authors
            .iter()
            .filter(|a| ids.contains(&a.id))
            .flat_map(|a| a.afids.iter().copied())
    }
}

/// An author profile from an author search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorRecord {
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

/// Affiliation profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Affiliation {
    pub id: u64,
    pub name: String,
    pub country: String,
    pub org_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(subtype: Option<&str>) -> Document {
        Document {
            eid: "2-s2.0-1".into(),
            year: 2017,
            source_id: Some(1),
            source_title: String::new(),
            subtype: subtype.map(String::from),
            authors: vec![
                Authorship { id: 1, afids: vec![10, 11] },
                Authorship { id: 2, afids: vec![12] },
            ],
            ref_authors: Vec::new(),
            ref_eids: Vec::new(),
        }
    }

    #[test]
    fn research_subtypes() {
        assert!(doc(Some("ar")).is_research());
        assert!(doc(None).is_research());
        assert!(!doc(Some("er")).is_research());
        assert!(!doc(Some("ed")).is_research());
    }

    #[test]
    fn afids_of_selected_authors() {
        let d = doc(None);
        assert_eq!(d.afids_of(&[1]).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(d.afids_of(&[3]).count(), 0);
    }

    #[test]
    fn corpus_document_defaults() {
        let d: Document = serde_json::from_str(r#"{"eid":"2-s2.0-9","year":2015}"#).unwrap();
        assert!(d.authors.is_empty());
        assert!(d.is_research());
    }
}
