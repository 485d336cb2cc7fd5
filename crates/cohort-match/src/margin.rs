//! Tolerance bands around a scientist's own statistics.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::MatchError;

/// Half-width of a band: a fixed count, or a fraction of the base value
/// rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawMargin")]
pub enum Margin {
    Absolute(u32),
    Fraction(f64),
}

/// TOML integers are absolute margins, floats are fractions.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMargin {
    Int(i64),
    Float(f64),
}

impl TryFrom<RawMargin> for Margin {
    type Error = MatchError;

    fn try_from(raw: RawMargin) -> Result<Self, Self::Error> {
        match raw {
            RawMargin::Int(n) => u32::try_from(n)
                .map(Margin::Absolute)
                .map_err(|_| MatchError::InvalidArgument(format!("margin must be >= 0, got {n}"))),
            RawMargin::Float(f) => Margin::fraction(f),
        }
    }
}

impl Margin {
    pub fn fraction(f: f64) -> Result<Self, MatchError> {
        if f.is_finite() && f >= 0.0 {
            Ok(Margin::Fraction(f))
        } else {
            Err(MatchError::InvalidArgument(format!(
                "fractional margin must be a finite value >= 0, got {f}"
            )))
        }
    }

    /// Integer half-width for `base`.
    pub fn resolve(self, base: u64) -> u64 {
        match self {
            Margin::Absolute(n) => u64::from(n),
            Margin::Fraction(f) => {
                // Round away float noise first so 0.3 * 10 is 3, not 4
                let scaled = (f * base as f64 * 1e9).round() / 1e9;
                scaled.ceil() as u64
            }
        }
    }
}

impl FromStr for Margin {
    type Err = MatchError;

    /// `"3"` is absolute, `"0.2"` is a fraction.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u32>() {
            return Ok(Margin::Absolute(n));
        }
        match s.parse::<f64>() {
            Ok(f) => Margin::fraction(f),
            Err(_) => Err(MatchError::InvalidArgument(format!("invalid margin '{s}'"))),
        }
    }
}

impl fmt::Display for Margin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Margin::Absolute(n) => write!(f, "±{n}"),
            Margin::Fraction(x) => write!(f, "±{:.0}%", x * 100.0),
        }
    }
}

/// Inclusive range `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginBand {
    pub lo: i64,
    pub hi: i64,
}

impl MarginBand {
    pub fn contains(&self, value: i64) -> bool {
        self.lo <= value && value <= self.hi
    }

    pub fn contains_count(&self, value: u64) -> bool {
        i64::try_from(value).is_ok_and(|v| self.contains(v))
    }

    pub fn width(&self) -> i64 {
        self.hi.saturating_sub(self.lo).saturating_add(1)
    }
}

impl fmt::Display for MarginBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

/// Band `[base - m, base + m]` with `m` resolved against `base`. Ends
/// saturate, so the band always contains `base`.
pub fn margin_band(base: u64, margin: Margin) -> MarginBand {
    let m = i64::try_from(margin.resolve(base)).unwrap_or(i64::MAX);
    let base = i64::try_from(base).unwrap_or(i64::MAX);
    MarginBand {
        lo: base.saturating_sub(m),
        hi: base.saturating_add(m),
    }
}

/// Band around a year.
pub fn year_band(year: i32, margin: u32) -> MarginBand {
    let (year, m) = (i64::from(year), i64::from(margin));
    MarginBand {
        lo: year - m,
        hi: year + m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_band_contains_base() {
        for base in [0u64, 1, 7, 250] {
            for m in [0u32, 1, 5] {
                let band = margin_band(base, Margin::Absolute(m));
                assert!(band.contains_count(base));
                assert_eq!(band.width(), 2 * i64::from(m) + 1);
                assert_eq!(base as i64 - band.lo, band.hi - base as i64);
            }
        }
    }

    #[test]
    fn fraction_rounds_up() {
        assert_eq!(margin_band(10, Margin::Fraction(0.09)), MarginBand { lo: 9, hi: 11 });
        assert_eq!(margin_band(10, Margin::Fraction(0.3)), MarginBand { lo: 7, hi: 13 });
        assert_eq!(margin_band(7, Margin::Fraction(0.2)), MarginBand { lo: 5, hi: 9 });
        assert_eq!(margin_band(0, Margin::Fraction(0.5)).width(), 1);
    }

    #[test]
    fn huge_fraction_saturates() {
        let band = margin_band(5, Margin::Fraction(1e30));
        assert!(band.lo <= band.hi);
        assert!(band.contains_count(5));
        assert!(band.contains_count(0));
        assert_eq!(band.hi, i64::MAX);
        assert_eq!(band.width(), i64::MAX);

        let band = margin_band(u64::MAX, Margin::Absolute(u32::MAX));
        assert!(band.contains_count(i64::MAX as u64));
    }

    #[test]
    fn parse_margins() {
        assert_eq!("3".parse::<Margin>().unwrap(), Margin::Absolute(3));
        assert_eq!("0.2".parse::<Margin>().unwrap(), Margin::Fraction(0.2));
        assert!("-1".parse::<Margin>().is_err());
        assert!("wide".parse::<Margin>().is_err());
        assert!(Margin::fraction(f64::NAN).is_err());
    }

    #[test]
    fn year_band_inclusive() {
        let band = year_band(2012, 1);
        assert!(band.contains(2011) && band.contains(2013));
        assert!(!band.contains(2010));
    }
}
