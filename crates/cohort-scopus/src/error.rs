//! Provider boundary error

use cohort_core::Retryable;

/// Error signaled by a bibliographic provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Query rejected as malformed or too long.
    Malformed(String),
    /// Result set larger than the provider serves (count when known).
    TooLarge { count: Option<u64> },
    /// Rate limit, service fault or network failure.
    Transient(String),
    NotFound,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed query: {msg}"),
            Self::TooLarge { count: Some(n) } => write!(f, "result set too large ({n} results)"),
            Self::TooLarge { count: None } => write!(f, "result set too large"),
            Self::Transient(msg) => write!(f, "transient provider error: {msg}"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::TooLarge { .. } | Self::Transient(_))
    }
}

impl ProviderError {
    /// Map an HTTP error status and response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            400 if body.contains("Exceeds the maximum number") => Self::TooLarge { count: None },
            400 | 413 | 414 => Self::Malformed(status_message(status, body)),
            404 => Self::NotFound,
            _ => Self::Transient(status_message(status, body)),
        }
    }

    /// Map a request failure with no usable response.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::from_status(status.as_u16(), ""),
            None => Self::Transient(describe(e)),
        }
    }
}

/// Describe a failed request without its URL.
fn describe(e: &reqwest::Error) -> String {
    let mut msg = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        "request failed".to_string()
    };
    if let Some(source) = std::error::Error::source(e) {
        msg.push_str(&format!(": {source}"));
    }
    msg
}

fn status_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        let snippet: String = body.chars().take(200).collect();
        format!("HTTP {status}: {snippet}")
    }
}
