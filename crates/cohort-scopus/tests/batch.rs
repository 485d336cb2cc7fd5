use std::collections::BTreeSet;

use cohort_core::RetryPolicy;
use cohort_scopus::{
    Authorship, BatchOptions, Corpus, Document, MemoryProvider, Query, QueryTemplate,
    SearchKind, batched_query, counted_query,
};
use indicatif::ProgressBar;

/// `n_sources` sources, each with `per_source` documents in 2017.
fn corpus(n_sources: u64, per_source: u64) -> Corpus {
    let mut documents = Vec::new();
    for s in 1..=n_sources {
        for i in 0..per_source {
            documents.push(Document {
                eid: format!("2-s2.0-{s}-{i}"),
                year: 2017,
                source_id: Some(s),
                source_title: format!("Source {s}"),
                subtype: Some("ar".into()),
                authors: vec![Authorship {
                    id: s * 1000 + i,
                    afids: vec![],
                }],
                ref_authors: vec![],
                ref_eids: vec![],
            });
        }
    }
    Corpus {
        documents,
        ..Default::default()
    }
}

fn opts(max_result_size: u64) -> BatchOptions {
    BatchOptions {
        max_result_size,
        max_query_len: 2000,
        retry: RetryPolicy::immediate(2),
        refresh: false,
    }
}

fn eids(docs: &[Document]) -> BTreeSet<String> {
    docs.iter().map(|d| d.eid.clone()).collect()
}

#[test]
fn small_group_runs_as_one_query() {
    let provider = MemoryProvider::new(corpus(4, 2));
    let template = QueryTemplate::sources().with(Query::PubYearIs(2017));
    let pb = ProgressBar::hidden();

    let batch = batched_query::<Document>(&provider, &[1, 2, 3, 4], &template, &opts(100), &pb);
    assert_eq!(batch.hits.len(), 8);
    assert_eq!(batch.processed, 4);
    assert!(batch.degraded.is_empty());
    // one count + one download
    assert_eq!(provider.calls(), 2);
    assert_eq!(pb.position(), 4);
}

#[test]
fn bisection_matches_unbounded_query() {
    let ids: Vec<u64> = (1..=13).collect();
    let template = QueryTemplate::sources().with(Query::PubYearIs(2017));

    let unbounded = MemoryProvider::new(corpus(13, 3));
    let expected = batched_query::<Document>(
        &unbounded,
        &ids,
        &template,
        &opts(u64::MAX),
        &ProgressBar::hidden(),
    );

    for bound in [3, 5, 7, 20] {
        let provider = MemoryProvider::new(corpus(13, 3));
        let batch =
            batched_query::<Document>(&provider, &ids, &template, &opts(bound), &ProgressBar::hidden());
        assert_eq!(eids(&batch.hits), eids(&expected.hits), "bound {bound}");
        assert_eq!(batch.processed, ids.len());
        assert!(batch.degraded.is_empty());
    }
}

#[test]
fn oversized_singleton_degrades_to_empty() {
    // Source 2 alone has 10 documents, above the bound of 5.
    let mut c = corpus(1, 2);
    c.documents.extend(corpus(2, 10).documents.into_iter().filter(|d| d.source_id == Some(2)));
    let provider = MemoryProvider::new(c);
    let template = QueryTemplate::sources();

    let batch = batched_query::<Document>(&provider, &[1, 2], &template, &opts(5), &ProgressBar::hidden());
    assert_eq!(batch.hits.len(), 2);
    assert_eq!(batch.processed, 1);
    assert_eq!(batch.degraded, vec![2]);
}

#[test]
fn transient_failure_on_group_recovers_by_splitting() {
    let provider = MemoryProvider::new(corpus(2, 1));
    let template = QueryTemplate::sources();
    provider.fail_transiently(&template.fill(&[1, 2]), 1);

    let batch = batched_query::<Document>(&provider, &[1, 2], &template, &opts(100), &ProgressBar::hidden());
    assert_eq!(batch.hits.len(), 2);
    assert!(batch.degraded.is_empty());
}

#[test]
fn singleton_retries_then_succeeds() {
    let provider = MemoryProvider::new(corpus(1, 3));
    let template = QueryTemplate::sources();
    provider.fail_transiently(&template.fill(&[1]), 2);

    let batch = batched_query::<Document>(&provider, &[1], &template, &opts(100), &ProgressBar::hidden());
    assert_eq!(batch.hits.len(), 3);
    assert_eq!(batch.processed, 1);
}

#[test]
fn singleton_exhausting_budget_is_degraded() {
    let provider = MemoryProvider::new(corpus(1, 3));
    let template = QueryTemplate::sources();
    provider.fail_transiently(&template.fill(&[1]), 10);

    let batch = batched_query::<Document>(&provider, &[1], &template, &opts(100), &ProgressBar::hidden());
    assert!(batch.hits.is_empty());
    assert_eq!(batch.degraded, vec![1]);
    // first attempt plus two retries
    assert_eq!(provider.calls(), 3);
}

#[test]
fn long_queries_split_before_sending() {
    let provider = MemoryProvider::new(corpus(6, 1));
    let template = QueryTemplate::authors();
    let ids: Vec<u64> = (1..=6).map(|s| s * 1000).collect();
    let mut o = opts(100);
    // "AU-ID(1000) OR AU-ID(2000)" is 26 characters
    o.max_query_len = 30;

    let batch = batched_query::<Document>(&provider, &ids, &template, &o, &ProgressBar::hidden());
    assert_eq!(batch.hits.len(), 6);
    assert_eq!(batch.processed, 6);
}

#[test]
fn research_types_only() {
    let mut c = corpus(1, 2);
    c.documents[1].subtype = Some("er".into());
    let provider = MemoryProvider::new(c);

    let batch = batched_query::<Document>(
        &provider,
        &[1],
        &QueryTemplate::sources(),
        &opts(100),
        &ProgressBar::hidden(),
    );
    assert_eq!(batch.hits.len(), 1);
}

#[test]
fn counted_query_soft_fails() {
    let provider = MemoryProvider::new(corpus(1, 4));
    let q = Query::SourceId(vec![1]);
    assert_eq!(counted_query(&provider, SearchKind::Docs, &q, &opts(100)), Some(4));

    provider.fail_transiently(&q, 10);
    assert_eq!(counted_query(&provider, SearchKind::Docs, &q, &opts(100)), None);
    // budget spent: first attempt plus two retries
    assert_eq!(provider.calls(), 4);
}
