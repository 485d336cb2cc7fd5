pub mod cache;
pub mod find;
pub mod profile;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use cohort_cache::Cache;
use cohort_core::Refresh;
use cohort_match::FieldSourceTable;
use cohort_scopus::{Corpus, MemoryProvider, Provider, ScopusProvider};

use crate::config::Config;

/// Data source options shared by the commands that query the provider.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Replay a recorded corpus (JSON) instead of querying Scopus
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Cache refresh policy: never, always, or a number of days
    #[arg(long, default_value = "never")]
    pub refresh: Refresh,
}

/// Provider named by `--corpus`, else the Scopus API.
pub fn open_provider(config: &Config, corpus: Option<&Path>) -> Result<Box<dyn Provider>> {
    if let Some(path) = corpus {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus: {}", path.display()))?;
        let corpus: Corpus = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse corpus: {}", path.display()))?;
        log::info!(
            "Replaying corpus {} ({} documents, {} authors)",
            path.display(),
            corpus.documents.len(),
            corpus.authors.len()
        );
        return Ok(Box::new(MemoryProvider::new(corpus)));
    }
    if config.provider.api_key.is_none() {
        bail!("No Scopus API key: set [provider] api_key or SCOPUS_API_KEY, or pass --corpus");
    }
    Ok(Box::new(ScopusProvider::new(config.provider.scopus())))
}

pub fn open_cache(config: &Config) -> Result<Cache> {
    Cache::open(&config.cache)
        .with_context(|| format!("Failed to open cache: {}", config.cache.path.display()))
}

pub fn load_field_table(config: &Config) -> Result<FieldSourceTable> {
    let (Some(field_sources), Some(source_info)) =
        (&config.fields.field_sources, &config.fields.source_info)
    else {
        bail!("Field/source table not configured: set [fields] field_sources and source_info");
    };
    FieldSourceTable::from_csv(field_sources, source_info).with_context(|| {
        format!(
            "Failed to load field/source table from {} and {}",
            field_sources.display(),
            source_info.display()
        )
    })
}
