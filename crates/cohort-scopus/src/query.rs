//! Boolean search predicates and their Scopus advanced-search rendering.

use std::fmt;

/// A search predicate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Authored by any of these identifiers.
    AuthorId(Vec<u64>),
    /// Published in any of these sources.
    SourceId(Vec<u64>),
    /// Any of these documents.
    Eid(Vec<String>),
    /// Referencing documents authored by any of these identifiers.
    CitesAuthor(Vec<u64>),
    /// Referencing any of these documents.
    CitesDocument(Vec<String>),
    PubYearBefore(i32),
    PubYearAfter(i32),
    PubYearIs(i32),
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
}

impl Query {
    pub fn and(self, other: Query) -> Query {
        match self {
            Query::And(mut parts) => {
                parts.push(other);
                Query::And(parts)
            }
            q => Query::And(vec![q, other]),
        }
    }

    pub fn and_not(self, other: Query) -> Query {
        self.and(Query::Not(Box::new(other)))
    }

    /// Rendered length, the unit the provider limits queries by.
    pub fn rendered_len(&self) -> usize {
        self.to_string().len()
    }

    /// Whether the rendering is a bare operator chain that must be
    /// parenthesized when nested.
    fn is_compound(&self) -> bool {
        match self {
            Query::AuthorId(ids) => ids.len() > 1,
            Query::And(parts) | Query::Or(parts) => parts.len() > 1,
            _ => false,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_compound() {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items.iter().map(T::to_string).collect::<Vec<_>>().join(sep)
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // AU-ID does not accept OR inside the parentheses
            Query::AuthorId(ids) => {
                let parts: Vec<String> = ids.iter().map(|id| format!("AU-ID({id})")).collect();
                f.write_str(&parts.join(" OR "))
            }
            Query::SourceId(ids) => write!(f, "SOURCE-ID({})", join(ids, " OR ")),
            Query::Eid(eids) => write!(f, "EID({})", join(eids, " OR ")),
            Query::CitesAuthor(ids) => write!(f, "REFAUID({})", join(ids, " OR ")),
            Query::CitesDocument(eids) => write!(f, "REFEID({})", join(eids, " OR ")),
            Query::PubYearBefore(y) => write!(f, "PUBYEAR BEF {y}"),
            Query::PubYearAfter(y) => write!(f, "PUBYEAR AFT {y}"),
            Query::PubYearIs(y) => write!(f, "PUBYEAR IS {y}"),
            Query::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    match (i, part) {
                        (0, Query::Not(inner)) => {
                            f.write_str("NOT ")?;
                            inner.fmt_nested(f)?;
                        }
                        (0, q) => q.fmt_nested(f)?,
                        (_, Query::Not(inner)) => {
                            f.write_str(" AND NOT ")?;
                            inner.fmt_nested(f)?;
                        }
                        (_, q) => {
                            f.write_str(" AND ")?;
                            q.fmt_nested(f)?;
                        }
                    }
                }
                Ok(())
            }
            Query::Or(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" OR ")?;
                    }
                    part.fmt_nested(f)?;
                }
                Ok(())
            }
            Query::Not(inner) => {
                f.write_str("NOT ")?;
                inner.fmt_nested(f)
            }
        }
    }
}

/// Which identifier predicate a template is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdField {
    Author,
    Source,
    CitesAuthor,
}

/// An identifier predicate plus fixed conjuncts, e.g.
/// `SOURCE-ID($fill) AND PUBYEAR IS 2017`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    field: IdField,
    conjuncts: Vec<Query>,
}

impl QueryTemplate {
    pub fn new(field: IdField) -> Self {
        Self {
            field,
            conjuncts: Vec::new(),
        }
    }

    pub fn authors() -> Self {
        Self::new(IdField::Author)
    }

    pub fn sources() -> Self {
        Self::new(IdField::Source)
    }

    pub fn with(mut self, conjunct: Query) -> Self {
        self.conjuncts.push(conjunct);
        self
    }

    pub fn field(&self) -> IdField {
        self.field
    }

    /// Build the query for a group of identifiers.
    pub fn fill(&self, ids: &[u64]) -> Query {
        let ids = ids.to_vec();
        let head = match self.field {
            IdField::Author => Query::AuthorId(ids),
            IdField::Source => Query::SourceId(ids),
            IdField::CitesAuthor => Query::CitesAuthor(ids),
        };
        if self.conjuncts.is_empty() {
            return head;
        }
        let mut parts = Vec::with_capacity(self.conjuncts.len() + 1);
        parts.push(head);
        parts.extend(self.conjuncts.iter().cloned());
        Query::And(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_ids_join_as_separate_predicates() {
        let q = Query::AuthorId(vec![1, 2]);
        assert_eq!(q.to_string(), "AU-ID(1) OR AU-ID(2)");
    }

    #[test]
    fn source_year_template() {
        let t = QueryTemplate::sources().with(Query::PubYearIs(2017));
        assert_eq!(
            t.fill(&[22900, 23000]).to_string(),
            "SOURCE-ID(22900 OR 23000) AND PUBYEAR IS 2017"
        );
    }

    #[test]
    fn nested_author_group_is_parenthesized() {
        let t = QueryTemplate::authors().with(Query::PubYearBefore(2018));
        assert_eq!(
            t.fill(&[1, 2]).to_string(),
            "(AU-ID(1) OR AU-ID(2)) AND PUBYEAR BEF 2018"
        );
        assert_eq!(t.fill(&[1]).to_string(), "AU-ID(1) AND PUBYEAR BEF 2018");
    }

    #[test]
    fn citation_query_excludes_self() {
        let q = Query::CitesAuthor(vec![7, 8])
            .and(Query::PubYearBefore(2018))
            .and_not(Query::AuthorId(vec![7, 8]));
        assert_eq!(
            q.to_string(),
            "REFAUID(7 OR 8) AND PUBYEAR BEF 2018 AND NOT (AU-ID(7) OR AU-ID(8))"
        );
    }

    #[test]
    fn rendered_len_counts_characters() {
        assert_eq!(Query::PubYearIs(2017).rendered_len(), "PUBYEAR IS 2017".len());
    }
}
