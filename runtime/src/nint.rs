use std::fmt;

use crate::{
    error::{DecodeError, DecodeErrorKind},
    reader::decode_nint,
    traits::{FromCbor, ToCbor},
    value::Value,
};

/// A CBOR negative integer (major type 1) that fits in an `i64`. Only values
/// below zero can be built, so a `Nint` always decodes back to itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nint(i64);

impl Nint {
    pub fn new(value: i64) -> Result<Nint, DecodeError> {
        if value < 0 {
            Ok(Nint(value))
        } else {
            Err(DecodeError::new(DecodeErrorKind::OutOfRange {
                value: value.to_string(),
                range: "nint (below zero)".to_owned(),
            }))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Nint {
    type Error = DecodeError;

    fn try_from(value: i64) -> Result<Nint, DecodeError> {
        Nint::new(value)
    }
}

impl From<Nint> for i64 {
    fn from(value: Nint) -> i64 {
        value.0
    }
}

impl From<Nint> for i128 {
    fn from(value: Nint) -> i128 {
        value.0 as i128
    }
}

impl fmt::Display for Nint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToCbor for Nint {
    fn to_cbor(&self) -> Value {
        // -1 - n never overflows for n < 0.
        Value::Nint((-1 - self.0) as u64)
    }
}

impl FromCbor for Nint {
    fn from_cbor(value: &Value) -> Result<Nint, DecodeError> {
        decode_nint(value).map(Nint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_negative_values() {
        assert_eq!(Nint::new(-1).map(Nint::get), Ok(-1));
        assert_eq!(Nint::try_from(i64::MIN).map(i64::from), Ok(i64::MIN));
        assert!(matches!(
            Nint::new(0).map_err(|e| e.kind),
            Err(DecodeErrorKind::OutOfRange { .. })
        ));
        assert!(Nint::new(5).is_err());
    }

    #[test]
    fn test_round_trip() {
        for n in [-1, -2, -24, -25, -1000, i64::MIN] {
            let nint = Nint::new(n).unwrap();
            let bytes = nint.to_cbor_bytes();
            assert_eq!(Nint::from_cbor_bytes(&bytes), Ok(nint));
        }
        assert_eq!(Nint::new(-1).unwrap().to_cbor(), Value::Nint(0));
        assert_eq!(Nint::new(-2).unwrap().to_cbor_bytes(), vec![0x21]);
        assert!(Nint::from_cbor(&Value::Uint(0)).is_err());
    }
}
