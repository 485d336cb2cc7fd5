//! Matching error type

use cohort_cache::CacheError;
use cohort_scopus::ProviderError;

fn id_list(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join("-")
}

/// Error from profile construction or a matching run.
///
/// Provider errors only surface from profile construction; inside the
/// search group and filter rounds they degrade to unknown values.
#[derive(Debug)]
pub enum MatchError {
    InvalidArgument(String),
    /// A step was called before the one it depends on.
    MissingPrecondition(String),
    NoPublications { ids: Vec<u64>, year: i32 },
    NoSearchSources { ids: Vec<u64> },
    UnknownField { ids: Vec<u64> },
    FieldTable(duckdb::Error),
    Cache(CacheError),
    Provider(ProviderError),
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::MissingPrecondition(msg) => write!(f, "missing precondition: {msg}"),
            Self::NoPublications { ids, year } => {
                write!(f, "no publications found for author {} until {year}", id_list(ids))
            }
            Self::NoSearchSources { ids } => {
                write!(f, "no comparable sources found for author {}", id_list(ids))
            }
            Self::UnknownField { ids } => write!(
                f,
                "not possible to determine the research field of author {}",
                id_list(ids)
            ),
            Self::FieldTable(e) => write!(f, "field/source table: {e}"),
            Self::Cache(e) => write!(f, "{e}"),
            Self::Provider(e) => write!(f, "provider: {e}"),
        }
    }
}

impl std::error::Error for MatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FieldTable(e) => Some(e),
            Self::Cache(e) => Some(e),
            Self::Provider(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CacheError> for MatchError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e)
    }
}

impl From<ProviderError> for MatchError {
    fn from(e: ProviderError) -> Self {
        Self::Provider(e)
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
