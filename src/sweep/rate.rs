//! Request rates and the prompt counts derived from them.

use serde::{Serialize, Serializer};

use crate::error::{Result, SweepError};

/// One target request rate in a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatePoint {
    /// Issue requests as fast as possible, bounded by the max-prompts ceiling
    Unbounded,
    /// Requests per second
    PerSecond(f64),
}

impl RatePoint {
    /// Number of prompts the client should send for this rate.
    ///
    /// Finite rates truncate `rate * duration`, so a run never asks for more
    /// prompts than fit in the configured duration.
    pub fn prompt_count(&self, duration_secs: u64, max_prompts: u64) -> u64 {
        match self {
            RatePoint::Unbounded => max_prompts,
            RatePoint::PerSecond(rate) => (rate * duration_secs as f64).floor() as u64,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, RatePoint::Unbounded)
    }
}

impl std::fmt::Display for RatePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatePoint::Unbounded => write!(f, "inf"),
            RatePoint::PerSecond(rate) => write!(f, "{}", rate),
        }
    }
}

impl std::str::FromStr for RatePoint {
    type Err = SweepError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value = s.trim();
        let invalid = |reason: &str| SweepError::InvalidRate {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match value.to_lowercase().as_str() {
            "" => return Err(invalid("empty value")),
            "inf" | "infinity" | "max" => return Ok(RatePoint::Unbounded),
            _ => {}
        }

        let rate: f64 = value.parse().map_err(|_| invalid("not a number"))?;
        if !rate.is_finite() {
            return Err(invalid("not a finite number"));
        }
        if rate < 0.0 {
            return Err(invalid("must not be negative"));
        }
        // Zero is the historical spelling of the unbounded rate
        if rate == 0.0 {
            return Ok(RatePoint::Unbounded);
        }

        Ok(RatePoint::PerSecond(rate))
    }
}

impl Serialize for RatePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a comma-separated rate list, keeping input order.
///
/// Blank entries (`"1,,2"`, trailing commas) are skipped; an empty list is an error.
pub fn parse_rate_list(input: &str) -> Result<Vec<RatePoint>> {
    let rates = input
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<RatePoint>>>()?;

    if rates.is_empty() {
        return Err(SweepError::Config(
            "REQUEST_RATES must contain at least one rate".to_string(),
        ));
    }

    Ok(rates)
}
