//! Cache error type

/// Error from the cache store.
///
/// `InvalidArgument` is a caller bug (unknown table, key shape that does not
/// fit the table). Database errors are passed through untouched.
#[derive(Debug)]
pub enum CacheError {
    InvalidArgument(String),
    Db(duckdb::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid cache argument: {msg}"),
            Self::Db(e) => write!(f, "cache database error: {e}"),
            Self::Io(e) => write!(f, "cache IO error: {e}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidArgument(_) => None,
            Self::Db(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<duckdb::Error> for CacheError {
    fn from(e: duckdb::Error) -> Self {
        Self::Db(e)
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
