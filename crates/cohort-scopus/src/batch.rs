//! Batched identifier queries with adaptive bisection.
//!
//! A group of identifiers is rendered into one query. Groups whose result
//! count exceeds the bound, whose rendering is too long, or that the provider
//! rejects are split into halves of ⌈n/2⌉ and ⌊n/2⌋ and each half is run on
//! its own. A single identifier that still fails is retried with `refresh`
//! set, and dropped as degraded once the retry budget is spent.

use cohort_core::RetryPolicy;
use indicatif::ProgressBar;

use crate::error::ProviderError;
use crate::provider::{Hit, Provider, SearchKind};
use crate::query::{Query, QueryTemplate};

/// Default result bound per query.
pub const MAX_RESULT_SIZE: u64 = 5000;

/// Default bound on the rendered query length.
pub const QUERY_MAX_LEN: usize = 2000;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_result_size: u64,
    /// Groups rendering longer than this are split before being sent.
    pub max_query_len: usize,
    pub retry: RetryPolicy,
    /// Ask the provider to refresh on every call, not only on retries.
    pub refresh: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_result_size: MAX_RESULT_SIZE,
            max_query_len: QUERY_MAX_LEN,
            retry: RetryPolicy::default(),
            refresh: false,
        }
    }
}

/// Outcome of one batched query.
#[derive(Debug)]
pub struct Batch<T> {
    pub hits: Vec<T>,
    /// Identifiers whose sub-query succeeded.
    pub processed: usize,
    /// Identifiers given up on after the retry budget; their absence in
    /// `hits` means unknown, not negative.
    pub degraded: Vec<u64>,
}

impl<T> Batch<T> {
    fn empty() -> Self {
        Self {
            hits: Vec::new(),
            processed: 0,
            degraded: Vec::new(),
        }
    }

    fn done(hits: Vec<T>, processed: usize) -> Self {
        Self {
            hits,
            processed,
            degraded: Vec::new(),
        }
    }

    fn merge(mut self, other: Batch<T>) -> Self {
        self.hits.extend(other.hits);
        self.processed += other.processed;
        self.degraded.extend(other.degraded);
        self
    }
}

/// Query `ids` through `template`, splitting as needed.
///
/// Never fails: units that exhaust the retry budget come back in
/// `degraded`. `pb` advances by the identifiers of every successful
/// sub-query.
pub fn batched_query<T: Hit>(
    provider: &dyn Provider,
    ids: &[u64],
    template: &QueryTemplate,
    opts: &BatchOptions,
    pb: &ProgressBar,
) -> Batch<T> {
    let batch = run_group::<T>(provider, ids, template, opts, pb, 0);
    if !batch.degraded.is_empty() {
        log::warn!(
            "{} of {} identifiers could not be queried ({})",
            batch.degraded.len(),
            ids.len(),
            T::KIND
        );
    }
    batch
}

fn run_group<T: Hit>(
    provider: &dyn Provider,
    ids: &[u64],
    template: &QueryTemplate,
    opts: &BatchOptions,
    pb: &ProgressBar,
    depth: u32,
) -> Batch<T> {
    match ids.len() {
        0 => return Batch::empty(),
        1 => return run_single::<T>(provider, ids[0], template, opts, pb),
        _ => {}
    }

    let query = template.fill(ids);
    if query.rendered_len() > opts.max_query_len {
        log::debug!("Query for {} ids too long, splitting (depth {depth})", ids.len());
        return bisect::<T>(provider, ids, template, opts, pb, depth);
    }

    let outcome = provider
        .count(T::KIND, &query, opts.refresh)
        .and_then(|n| fetch_bounded::<T>(provider, &query, n, opts.max_result_size, opts.refresh));
    match outcome {
        Ok(hits) => {
            pb.inc(ids.len() as u64);
            Batch::done(hits, ids.len())
        }
        Err(ProviderError::NotFound) => {
            pb.inc(ids.len() as u64);
            Batch::done(Vec::new(), ids.len())
        }
        Err(e) => {
            log::debug!("{} ids: {e}, splitting (depth {depth})", ids.len());
            bisect::<T>(provider, ids, template, opts, pb, depth)
        }
    }
}

fn bisect<T: Hit>(
    provider: &dyn Provider,
    ids: &[u64],
    template: &QueryTemplate,
    opts: &BatchOptions,
    pb: &ProgressBar,
    depth: u32,
) -> Batch<T> {
    let (left, right) = ids.split_at(ids.len().div_ceil(2));
    let first = run_group::<T>(provider, left, template, opts, pb, depth + 1);
    first.merge(run_group::<T>(provider, right, template, opts, pb, depth + 1))
}

fn run_single<T: Hit>(
    provider: &dyn Provider,
    id: u64,
    template: &QueryTemplate,
    opts: &BatchOptions,
    pb: &ProgressBar,
) -> Batch<T> {
    let query = template.fill(&[id]);
    let label = format!("{} {id}", T::KIND);
    let outcome = opts.retry.run(&label, |attempt| {
        let refresh = opts.refresh || attempt > 0;
        let n = provider.count(T::KIND, &query, refresh)?;
        fetch_bounded::<T>(provider, &query, n, opts.max_result_size, refresh)
    });
    match outcome {
        Ok(hits) => {
            pb.inc(1);
            Batch::done(hits, 1)
        }
        Err(ProviderError::NotFound) => {
            pb.inc(1);
            Batch::done(Vec::new(), 1)
        }
        Err(e) => {
            log::debug!("Giving up on {label}: {e}");
            Batch {
                hits: Vec::new(),
                processed: 0,
                degraded: vec![id],
            }
        }
    }
}

/// Download results when `count` is within the bound.
fn fetch_bounded<T: Hit>(
    provider: &dyn Provider,
    query: &Query,
    count: u64,
    max: u64,
    refresh: bool,
) -> Result<Vec<T>, ProviderError> {
    if count > max {
        return Err(ProviderError::TooLarge { count: Some(count) });
    }
    if count == 0 {
        return Ok(Vec::new());
    }
    T::fetch(provider, query, refresh)
}

/// Count-only query with the single-identifier retry policy.
///
/// `None` when the retry budget is spent or the query is rejected, which
/// callers treat as unknown.
pub fn counted_query(
    provider: &dyn Provider,
    kind: SearchKind,
    query: &Query,
    opts: &BatchOptions,
) -> Option<u64> {
    let label = format!("count {kind}");
    match opts
        .retry
        .run(&label, |attempt| provider.count(kind, query, opts.refresh || attempt > 0))
    {
        Ok(n) => Some(n),
        Err(ProviderError::NotFound) => Some(0),
        Err(e) => {
            log::warn!("Count failed for '{query}': {e}");
            None
        }
    }
}
