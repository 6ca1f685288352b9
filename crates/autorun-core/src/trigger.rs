//! Quantized trigger test.
//!
//! A task is due when the current epoch second is a multiple of its period. The test is stateless:
//! it never looks at the last run, so a skipped tick misses the slot and two evaluations within the
//! same second both fire.
use autorun_model::{TaskConfig, TriggerParseError};

/// Period of the task's `every` trigger, in seconds.
pub fn period_of(config: &TaskConfig) -> Result<u64, TriggerParseError> {
    config.every()?.period_secs()
}

/// Returns `true` if `now_epoch_seconds` falls exactly on the task's period.
///
/// Missing or malformed triggers are never due.
pub fn is_due(config: &TaskConfig, now_epoch_seconds: i64) -> bool {
    match period_of(config) {
        Ok(period) => is_due_every(period, now_epoch_seconds),
        Err(_) => false,
    }
}

/// `now mod period == 0`, using floor modulus so pre-epoch instants stay aligned.
pub fn is_due_every(period: u64, now_epoch_seconds: i64) -> bool {
    match i64::try_from(period) {
        Ok(p) if p > 0 => now_epoch_seconds.rem_euclid(p) == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every(s: &str) -> TaskConfig {
        TaskConfig::new().with("every", s)
    }

    #[test]
    fn due_exactly_on_multiples() {
        let cfg = every("1 min");
        assert!(is_due(&cfg, 0));
        assert!(is_due(&cfg, 60));
        assert!(is_due(&cfg, 1_700_000_040));
        assert!(!is_due(&cfg, 1_700_000_041));
        assert!(!is_due(&cfg, 59));
    }

    #[test]
    fn modulus_holds_for_many_periods() {
        for period in [1u64, 7, 60, 3_600, 129_600] {
            for now in [0i64, 1, 59, 60, 3_599, 3_600, 129_600, 259_201, 1_700_000_000] {
                assert_eq!(is_due_every(period, now), now % period as i64 == 0, "{period} {now}");
            }
        }
    }

    #[test]
    fn fractional_day_period() {
        let cfg = every("1.5 day");
        assert_eq!(period_of(&cfg), Ok(129_600));
        assert!(is_due(&cfg, 129_600 * 3));
        assert!(!is_due(&cfg, 86_400));
    }

    #[test]
    fn invalid_triggers_are_never_due() {
        for raw in ["", "soon", "1 fortnight", "x min", "0 min", "-1 hour", "1 min extra"] {
            let cfg = every(raw);
            assert!(!is_due(&cfg, 0), "{raw:?}");
            assert!(!is_due(&cfg, 3_600), "{raw:?}");
        }
        assert!(!is_due(&TaskConfig::new(), 0));
    }

    #[test]
    fn zero_period_is_never_due() {
        assert!(!is_due_every(0, 0));
        assert!(!is_due_every(0, 60));
    }

    #[test]
    fn negative_instants_use_floor_modulus() {
        assert!(is_due_every(60, -120));
        assert!(!is_due_every(60, -1));
    }
}
