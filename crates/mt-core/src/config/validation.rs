//! Semantic validation for analysis configuration.
//!
//! Values can parse fine and still be meaningless (a probability threshold
//! of 1.5, zero workers, a negative or multi-day gap step).

use thiserror::Error;

use super::AnalysisConfig;
use crate::impute::{ImputeConfig, MAX_STEP_MINUTES};

/// Errors that can occur during semantic validation.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("probability_threshold must be in [0, 1) (got {value})")]
    ProbabilityThresholdRange { value: f64 },

    #[error("workers must be at least 1")]
    WorkersZero,

    #[error("impute.{field} must be a positive number of minutes (got {value})")]
    GapMinutesNonPositive { field: String, value: i64 },

    #[error("impute.{field} must be at most {max} minutes (got {value})")]
    GapMinutesTooLarge { field: String, value: i64, max: i64 },

    #[error("impute.{field} must name at least one location")]
    EmptyLocationList { field: String },

    #[error("impute.{field} must not be empty")]
    EmptyLabel { field: String },
}

/// Validate analysis configuration semantically.
pub fn validate_config(config: &AnalysisConfig) -> Result<(), ValidationError> {
    let t = config.probability_threshold;
    if !(0.0..1.0).contains(&t) {
        return Err(ValidationError::ProbabilityThresholdRange { value: t });
    }

    if config.workers == Some(0) {
        return Err(ValidationError::WorkersZero);
    }

    if let Some(impute) = &config.impute {
        validate_impute(impute)?;
    }

    Ok(())
}

fn validate_impute(impute: &ImputeConfig) -> Result<(), ValidationError> {
    for (field, value) in [
        ("outside_step_minutes", impute.outside_step_minutes),
        ("night_step_minutes", impute.night_step_minutes),
        ("short_gap_step_minutes", impute.short_gap_step_minutes),
    ] {
        if value <= 0 {
            return Err(ValidationError::GapMinutesNonPositive {
                field: field.to_string(),
                value,
            });
        }
        if value > MAX_STEP_MINUTES {
            return Err(ValidationError::GapMinutesTooLarge {
                field: field.to_string(),
                value,
                max: MAX_STEP_MINUTES,
            });
        }
    }

    if impute.door_locations.is_empty() {
        return Err(ValidationError::EmptyLocationList {
            field: "door_locations".to_string(),
        });
    }
    if impute.backward_fill_locations.is_empty() {
        return Err(ValidationError::EmptyLocationList {
            field: "backward_fill_locations".to_string(),
        });
    }

    for (field, label) in [
        ("outside_label", &impute.outside_label),
        ("night_label", &impute.night_label),
    ] {
        if label.trim().is_empty() {
            return Err(ValidationError::EmptyLabel {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AnalysisConfig::default()).is_ok());
    }

    #[test]
    fn test_probability_threshold_range() {
        let config = AnalysisConfig {
            probability_threshold: 1.0,
            ..Default::default()
        };
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::ProbabilityThresholdRange { value: 1.0 })
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = AnalysisConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert_eq!(validate_config(&config), Err(ValidationError::WorkersZero));
    }

    #[test]
    fn test_impute_gap_must_be_positive() {
        let config = AnalysisConfig {
            impute: Some(ImputeConfig {
                night_step_minutes: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::GapMinutesNonPositive { ref field, .. }) if field == "night_step_minutes"
        ));
    }

    #[test]
    fn test_impute_gap_upper_bound() {
        let at_max = AnalysisConfig {
            impute: Some(ImputeConfig {
                outside_step_minutes: 24 * 60,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(validate_config(&at_max).is_ok());

        let huge = AnalysisConfig {
            impute: Some(ImputeConfig {
                night_step_minutes: i64::MAX,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            validate_config(&huge),
            Err(ValidationError::GapMinutesTooLarge {
                field: "night_step_minutes".to_string(),
                value: i64::MAX,
                max: 24 * 60,
            })
        );
    }

    #[test]
    fn test_impute_door_list_required() {
        let config = AnalysisConfig {
            impute: Some(ImputeConfig {
                door_locations: Vec::new(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::EmptyLocationList { .. })
        ));
    }
}
