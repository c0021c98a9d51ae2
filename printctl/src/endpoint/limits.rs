//! Input limits declared by descriptor leaves.

use serde_json::Value;

use crate::error::{ControlError, ControlResult, ValidationError};

/// Allowed values for a writable endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitSpec {
    /// Inclusive numeric range.
    Range { min: f64, max: f64 },
    /// Enumerated set of accepted values.
    Choices(Vec<Value>),
}

impl LimitSpec {
    /// Interprets a raw `inputlim` value.
    ///
    /// A two-element numeric array is a range; any other non-empty array is a
    /// choice set. `location` is only used in the error.
    pub fn from_value(raw: &Value, location: &str) -> ControlResult<Self> {
        let items = raw
            .as_array()
            .ok_or_else(|| ControlError::malformed(location, "inputlim must be an array"))?;

        if let [min, max] = items.as_slice() {
            if let (Some(min), Some(max)) = (min.as_f64(), max.as_f64()) {
                if min > max {
                    return Err(ControlError::malformed(
                        location,
                        format!("inputlim range is inverted: [{}, {}]", min, max),
                    ));
                }
                return Ok(LimitSpec::Range { min, max });
            }
        }

        if items.is_empty() {
            return Err(ControlError::malformed(location, "inputlim is empty"));
        }
        Ok(LimitSpec::Choices(items.clone()))
    }

    /// Checks `value` against this limit.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        match self {
            LimitSpec::Range { min, max } => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| ValidationError::NotANumber {
                        value: value.clone(),
                    })?;
                if number < *min || number > *max {
                    return Err(ValidationError::OutOfRange {
                        value: number,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(())
            }
            LimitSpec::Choices(choices) => {
                if choices.contains(value) {
                    Ok(())
                } else {
                    Err(ValidationError::NotAChoice {
                        value: value.clone(),
                        choices: choices.clone(),
                    })
                }
            }
        }
    }

    pub fn as_range(&self) -> Option<(f64, f64)> {
        match self {
            LimitSpec::Range { min, max } => Some((*min, *max)),
            LimitSpec::Choices(_) => None,
        }
    }
}
