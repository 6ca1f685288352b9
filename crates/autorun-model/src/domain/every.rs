use std::{fmt, str::FromStr};

use crate::TriggerParseError;

/// Recurrence unit of an `every` trigger.
///
/// Months are a fixed approximation (`2_628_000` seconds, ~30.4 days), not calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Min,
    Hour,
    Day,
    Week,
    Month,
}

impl Unit {
    /// Length of one unit in seconds.
    pub fn seconds(&self) -> u64 {
        match self {
            Unit::Min => 60,
            Unit::Hour => 3_600,
            Unit::Day => 86_400,
            Unit::Week => 604_800,
            Unit::Month => 2_628_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Min => "min",
            Unit::Hour => "hour",
            Unit::Day => "day",
            Unit::Week => "week",
            Unit::Month => "month",
        }
    }
}

impl FromStr for Unit {
    type Err = TriggerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        let singular = norm.strip_suffix('s').unwrap_or(&norm);
        match singular {
            "min" => Ok(Unit::Min),
            "hour" => Ok(Unit::Hour),
            "day" => Ok(Unit::Day),
            "week" => Ok(Unit::Week),
            "month" => Ok(Unit::Month),
            _ => Err(TriggerParseError::UnknownUnit(s.to_string())),
        }
    }
}

/// Parsed `"<number> <unit>"` trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Every {
    pub magnitude: f64,
    pub unit: Unit,
}

impl Every {
    /// Period in whole seconds: `round(magnitude * unit_seconds)`.
    ///
    /// Zero, negative and non-finite periods are rejected.
    pub fn period_secs(&self) -> Result<u64, TriggerParseError> {
        let period = (self.magnitude * self.unit.seconds() as f64).round();
        if !period.is_finite() || period < 1.0 {
            return Err(TriggerParseError::NonPositive(period));
        }
        Ok(period as u64)
    }
}

impl FromStr for Every {
    type Err = TriggerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(magnitude), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TriggerParseError::Malformed(s.to_string()));
        };

        let magnitude = magnitude
            .parse::<f64>()
            .ok()
            .filter(|m| m.is_finite())
            .ok_or_else(|| TriggerParseError::Magnitude(magnitude.to_string()))?;
        let unit = unit.parse()?;

        Ok(Self { magnitude, unit })
    }
}

impl fmt::Display for Every {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit.as_str())
    }
}
