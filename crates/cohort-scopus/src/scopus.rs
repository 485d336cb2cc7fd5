//! Scopus Search API adapter.
//!
//! Blocking calls over the shared runtime. Results are paged with
//! `start`/`count`; the JSON is read leniently since Scopus omits empty fields
//! and switches between objects and one-element arrays.

use cohort_core::{SHARED_RUNTIME, http_client};
use serde::Deserialize;
use serde_json::Value;

use crate::document::{Affiliation, AuthorRecord, Authorship, Document};
use crate::error::ProviderError;
use crate::provider::{Provider, SearchKind};
use crate::query::Query;

/// Scopus serves at most this many results per query.
const SERVICE_RESULT_LIMIT: u64 = 5000;

/// Connection settings for the Scopus APIs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScopusConfig {
    pub api_url: String,
    pub api_key: String,
    /// Optional institutional token (`X-ELS-Insttoken`).
    pub inst_token: Option<String>,
    pub page_size: u32,
}

impl Default for ScopusConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.elsevier.com/content".to_string(),
            api_key: String::new(),
            inst_token: None,
            page_size: 25,
        }
    }
}

pub struct ScopusProvider {
    config: ScopusConfig,
}

impl ScopusProvider {
    pub fn new(config: ScopusConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// GET returning parsed JSON, with status codes mapped to provider errors.
    fn get_json(&self, url: &str, params: &[(&str, String)], refresh: bool) -> Result<Value, ProviderError> {
        let result: Result<(u16, String), reqwest::Error> = SHARED_RUNTIME.handle().block_on(async {
            let mut req = http_client()
                .get(url)
                .query(params)
                .header("X-ELS-APIKey", &self.config.api_key)
                .header("Accept", "application/json");
            if let Some(token) = &self.config.inst_token {
                req = req.header("X-ELS-Insttoken", token);
            }
            if refresh {
                req = req.header("Cache-Control", "no-cache");
            }
            let resp = req.send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok((status, body))
        });

        let (status, body) = result.map_err(|e| ProviderError::from_reqwest(&e))?;
        if !(200..300).contains(&status) {
            return Err(ProviderError::from_status(status, &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Transient(format!("invalid JSON from Scopus: {e}")))
    }

    fn search_path(kind: SearchKind) -> &'static str {
        match kind {
            SearchKind::Docs => "search/scopus",
            SearchKind::Authors => "search/author",
        }
    }

    /// Download every page of a search.
    fn search_all(&self, kind: SearchKind, query: &Query, refresh: bool) -> Result<Vec<Value>, ProviderError> {
        let url = self.endpoint(Self::search_path(kind));
        let q = query.to_string();
        let page = self.config.page_size.max(1);
        let mut entries = Vec::new();
        let mut start = 0u64;
        loop {
            let mut params = vec![
                ("query", q.clone()),
                ("start", start.to_string()),
                ("count", page.to_string()),
            ];
            if kind == SearchKind::Docs {
                params.push(("view", "COMPLETE".to_string()));
            }
            let json = self.get_json(&url, &params, refresh)?;
            let total = total_results(&json);
            if total > SERVICE_RESULT_LIMIT {
                return Err(ProviderError::TooLarge { count: Some(total) });
            }
            let page_entries = as_list(&json["search-results"]["entry"]);
            // An empty result comes back as a single entry carrying only "error"
            let page_entries: Vec<Value> = page_entries
                .into_iter()
                .filter(|e| e.get("error").is_none())
                .collect();
            let got = page_entries.len() as u64;
            entries.extend(page_entries);
            start += u64::from(page);
            if got == 0 || start >= total {
                break;
            }
        }
        log::debug!("{kind}: {} results for '{q}'", entries.len());
        Ok(entries)
    }
}

impl Provider for ScopusProvider {
    fn count(&self, kind: SearchKind, query: &Query, refresh: bool) -> Result<u64, ProviderError> {
        let url = self.endpoint(Self::search_path(kind));
        let params = [("query", query.to_string()), ("count", "1".to_string())];
        let json = self.get_json(&url, &params, refresh)?;
        Ok(total_results(&json))
    }

    fn documents(&self, query: &Query, refresh: bool) -> Result<Vec<Document>, ProviderError> {
        let entries = self.search_all(SearchKind::Docs, query, refresh)?;
        Ok(entries.iter().filter_map(parse_document).collect())
    }

    fn authors(&self, query: &Query, refresh: bool) -> Result<Vec<AuthorRecord>, ProviderError> {
        let entries = self.search_all(SearchKind::Authors, query, refresh)?;
        Ok(entries.iter().filter_map(parse_author).collect())
    }

    fn affiliation(&self, afid: u64, refresh: bool) -> Result<Affiliation, ProviderError> {
        let url = self.endpoint(&format!("affiliation/affiliation_id/{afid}"));
        let json = self.get_json(&url, &[], refresh)?;
        let root = &json["affiliation-retrieval-response"];
        if root.is_null() {
            return Err(ProviderError::NotFound);
        }
        Ok(Affiliation {
            id: afid,
            name: text(&root["affiliation-name"]),
            country: text(&root["country"]),
            org_type: text(&root["institution-profile"]["org-type"]),
        })
    }
}

/// `opensearch:totalResults` arrives as a string.
fn total_results(json: &Value) -> u64 {
    let v = &json["search-results"]["opensearch:totalResults"];
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0)
}

/// A JSON value that may be a single object or an array of them.
fn as_list(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// String value, `{"$": ...}` wrapper, or number, as text.
fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map.get("$").map(text).unwrap_or_default(),
        _ => String::new(),
    }
}

fn id_value(v: &Value) -> Option<u64> {
    text(v).trim().parse().ok()
}

fn parse_document(entry: &Value) -> Option<Document> {
    let eid = text(&entry["eid"]);
    if eid.is_empty() {
        return None;
    }
    // prism:coverDate = "2017-05-01"
    let year = text(&entry["prism:coverDate"]).get(..4)?.parse().ok()?;
    let authors = as_list(&entry["author"])
        .iter()
        .filter_map(|a| {
            let id = id_value(&a["authid"])?;
            let afids = as_list(&a["afid"]).iter().filter_map(id_value).collect();
            Some(Authorship { id, afids })
        })
        .collect();
    let subtype = text(&entry["subtype"]);
    Some(Document {
        eid,
        year,
        source_id: id_value(&entry["source-id"]),
        source_title: text(&entry["prism:publicationName"]),
        subtype: (!subtype.is_empty()).then_some(subtype),
        authors,
        ref_authors: Vec::new(),
        ref_eids: Vec::new(),
    })
}

fn parse_author(entry: &Value) -> Option<AuthorRecord> {
    // dc:identifier = "AUTHOR_ID:55208373700"
    let ident = text(&entry["dc:identifier"]);
    let auth_id = ident.rsplit(':').next()?.parse().ok()?;
    let name = &entry["preferred-name"];
    let aff = &entry["affiliation-current"];
    let areas = as_list(&entry["subject-area"])
        .iter()
        .map(|s| format!("{} ({})", text(&s["@abbrev"]), text(&s["@frequency"])))
        .collect::<Vec<_>>()
        .join("; ");
    Some(AuthorRecord {
        auth_id,
        eid: text(&entry["eid"]),
        surname: text(&name["surname"]),
        initials: text(&name["initials"]),
        givenname: text(&name["given-name"]),
        affiliation: text(&aff["affiliation-name"]),
        documents: id_value(&entry["document-count"]).unwrap_or(0),
        affiliation_id: text(&aff["affiliation-id"]),
        city: text(&aff["affiliation-city"]),
        country: text(&aff["affiliation-country"]),
        areas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_entry() {
        let entry: Value = serde_json::from_str(
            r#"{
                "eid": "2-s2.0-85019",
                "prism:coverDate": "2017-05-01",
                "prism:publicationName": "Research Policy",
                "source-id": "22900",
                "subtype": "ar",
                "author": [
                    {"authid": "55208373700", "afid": [{"$": "60028186"}]},
                    {"authid": "6701809842", "afid": {"$": "60000001"}}
                ]
            }"#,
        )
        .unwrap();
        let doc = parse_document(&entry).unwrap();
        assert_eq!(doc.year, 2017);
        assert_eq!(doc.source_id, Some(22900));
        assert_eq!(doc.authors.len(), 2);
        assert_eq!(doc.authors[0].afids, vec![60028186]);
        assert_eq!(doc.authors[1].afids, vec![60000001]);
    }

    #[test]
    fn parses_author_entry() {
        let entry: Value = serde_json::from_str(
            r#"{
                "dc:identifier": "AUTHOR_ID:55208373700",
                "eid": "9-s2.0-55208373700",
                "preferred-name": {"surname": "Doe", "given-name": "Jane", "initials": "J."},
                "document-count": "12",
                "affiliation-current": {"affiliation-id": "60028186", "affiliation-country": "Germany"},
                "subject-area": [
                    {"@abbrev": "ECON", "@frequency": "10", "$": "Economics"},
                    {"@abbrev": "BUSI", "@frequency": "2", "$": "Business"}
                ]
            }"#,
        )
        .unwrap();
        let author = parse_author(&entry).unwrap();
        assert_eq!(author.auth_id, 55208373700);
        assert_eq!(author.documents, 12);
        assert_eq!(author.areas, "ECON (10); BUSI (2)");
        assert_eq!(author.country, "Germany");
    }

    #[test]
    fn total_results_from_string() {
        let json: Value =
            serde_json::from_str(r#"{"search-results": {"opensearch:totalResults": "42"}}"#).unwrap();
        assert_eq!(total_results(&json), 42);
        assert_eq!(total_results(&Value::Null), 0);
    }
}
