//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cohort_cache::CacheConfig;
use cohort_core::RetryPolicy;
use cohort_match::MatchDefaults;
use cohort_scopus::{BatchOptions, ScopusConfig};
use serde::Deserialize;

/// Global configuration for cohort
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub fields: FieldsConfig,
    pub matching: MatchDefaults,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub inst_token: Option<String>,
    pub max_result_size: u64,
    pub query_max_len: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub page_size: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let scopus = ScopusConfig::default();
        let batch = BatchOptions::default();
        Self {
            api_url: scopus.api_url,
            api_key: std::env::var("SCOPUS_API_KEY").ok(),
            inst_token: None,
            max_result_size: batch.max_result_size,
            query_max_len: batch.max_query_len,
            max_retries: batch.retry.max_retries,
            backoff_ms: batch.retry.base_delay.as_millis() as u64,
            page_size: scopus.page_size,
        }
    }
}

impl ProviderConfig {
    pub fn scopus(&self) -> ScopusConfig {
        ScopusConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone().unwrap_or_default(),
            inst_token: self.inst_token.clone(),
            page_size: self.page_size,
        }
    }

    pub fn batch(&self) -> BatchOptions {
        BatchOptions {
            max_result_size: self.max_result_size,
            max_query_len: self.query_max_len,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.backoff_ms),
            },
            refresh: false,
        }
    }
}

/// CSV files of the field/source lookup table.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FieldsConfig {
    /// `source_id,asjc`
    pub field_sources: Option<PathBuf>,
    /// `source_id,type,title`
    pub source_info: Option<PathBuf>,
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./cohort.toml (current directory)
    /// 2. the platform config directory (`~/.config/cohort/config.toml` on Linux)
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("cohort.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "cohort") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_match::{Margin, SearchMode};

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.provider.max_result_size, 5000);
        assert_eq!(config.provider.query_max_len, 2000);
        assert_eq!(config.provider.max_retries, 3);
        assert_eq!(config.provider.backoff_ms, 2500);
        assert_eq!(config.matching.first_year_margin, 2);
        assert!(config.fields.field_sources.is_none());
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("COHORT_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${COHORT_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("COHORT_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[cache]
path = "/tmp/cohort/main.duckdb"

[provider]
api_key = "secret"
max_retries = 5
backoff_ms = 100

[fields]
field_sources = "data/field_sources.csv"
source_info = "data/source_info.csv"

[matching]
first_year_margin = 1
pub_margin = 3
cits_margin = 0.1
mode = "narrow"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.path, PathBuf::from("/tmp/cohort/main.duckdb"));
        assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
        assert_eq!(config.provider.batch().retry.max_retries, 5);
        assert_eq!(
            config.provider.batch().retry.base_delay,
            Duration::from_millis(100)
        );
        assert_eq!(
            config.fields.source_info,
            Some(PathBuf::from("data/source_info.csv"))
        );
        assert_eq!(config.matching.first_year_margin, 1);
        assert_eq!(config.matching.pub_margin, Margin::Absolute(3));
        assert_eq!(config.matching.cits_margin, Margin::Fraction(0.1));
        assert_eq!(config.matching.mode, SearchMode::Narrow);
    }

    #[test]
    fn scopus_settings_follow_provider_section() {
        let config: Config = toml::from_str("[provider]\npage_size = 200\n").unwrap();
        let scopus = config.provider.scopus();
        assert_eq!(scopus.page_size, 200);
        assert_eq!(scopus.api_url, ScopusConfig::default().api_url);
    }
}
