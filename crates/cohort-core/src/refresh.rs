//! Cache refresh policy

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How cached facts are treated during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Refresh {
    /// Trust everything in the cache.
    #[default]
    Never,
    /// Drop and re-fetch every requested fact.
    Always,
    /// Re-fetch facts cached more than this many days ago.
    OlderThan(u32),
}

impl Refresh {
    /// Whether the provider should bypass its own staleness.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Never)
    }

    /// Maximum row age in seconds, `None` when rows never expire.
    /// `Always` means every row is stale.
    pub fn max_age_secs(self) -> Option<i64> {
        match self {
            Self::Never => None,
            Self::Always => Some(0),
            Self::OlderThan(days) => Some(i64::from(days) * 86_400),
        }
    }
}

impl FromStr for Refresh {
    type Err = String;

    /// `never` / `false`, `always` / `true`, or a number of days.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" | "false" | "no" => Ok(Self::Never),
            "always" | "true" | "yes" => Ok(Self::Always),
            other => other
                .parse::<u32>()
                .map(Self::OlderThan)
                .map_err(|_| format!("invalid refresh policy '{s}' (never, always or days)")),
        }
    }
}

impl TryFrom<String> for Refresh {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Refresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::Always => f.write_str("always"),
            Self::OlderThan(days) => write!(f, "older than {days} days"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keywords() {
        assert_eq!("never".parse::<Refresh>(), Ok(Refresh::Never));
        assert_eq!("TRUE".parse::<Refresh>(), Ok(Refresh::Always));
        assert_eq!("30".parse::<Refresh>(), Ok(Refresh::OlderThan(30)));
        assert!("soon".parse::<Refresh>().is_err());
    }

    #[test]
    fn max_age() {
        assert_eq!(Refresh::Never.max_age_secs(), None);
        assert_eq!(Refresh::Always.max_age_secs(), Some(0));
        assert_eq!(Refresh::OlderThan(2).max_age_secs(), Some(172_800));
    }

    #[test]
    fn activity() {
        assert!(!Refresh::Never.is_active());
        assert!(Refresh::OlderThan(1).is_active());
    }
}
