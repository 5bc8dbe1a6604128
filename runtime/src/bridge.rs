//! Conversions between host numbers (JavaScript doubles) and native widths.

use std::any::type_name;

use thiserror::Error;

/// Largest integer a double represents exactly.
pub const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConversionError {
    #[error("{field}: {value} is not an integer")]
    NotAnInteger { field: String, value: f64 },

    #[error("{field}: {value} does not fit in {target}")]
    OutOfRange { field: String, value: String, target: &'static str },

    #[error("{field}: {value} is beyond the safe integer range")]
    Unsafe { field: String, value: f64 },
}

/// Narrow a host number to an integer type, refusing to truncate.
pub fn narrow<T: TryFrom<i64>>(value: f64, field: &str) -> Result<T, ConversionError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(ConversionError::NotAnInteger { field: field.to_owned(), value });
    }
    if value.abs() > MAX_SAFE_INTEGER {
        return Err(ConversionError::Unsafe { field: field.to_owned(), value });
    }
    T::try_from(value as i64).map_err(|_| ConversionError::OutOfRange {
        field:  field.to_owned(),
        value:  value.to_string(),
        target: type_name::<T>(),
    })
}

/// Narrow a host number to a single precision float. Values that lose
/// precision are refused.
pub fn narrow_f32(value: f64, field: &str) -> Result<f32, ConversionError> {
    let narrow = value as f32;
    if narrow as f64 == value || value.is_nan() {
        Ok(narrow)
    } else {
        Err(ConversionError::OutOfRange { field: field.to_owned(), value: value.to_string(), target: "f32" })
    }
}
