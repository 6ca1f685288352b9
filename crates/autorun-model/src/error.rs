use thiserror::Error;

/// Reasons an `every` trigger string cannot be turned into a period.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriggerParseError {
    #[error("task has no `every` trigger")]
    Missing,
    #[error("expected `<number> <unit>`, got {0:?}")]
    Malformed(String),
    #[error("magnitude is not a number: {0:?}")]
    Magnitude(String),
    #[error("unknown unit: {0:?} (expected: min|hour|day|week|month)")]
    UnknownUnit(String),
    #[error("period must be a positive number of seconds, got {0}")]
    NonPositive(f64),
}
