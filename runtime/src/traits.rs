use crate::{
    error::{DecodeError, DecodeErrorKind},
    value::Value,
};

/// Conversion of a generated (or primitive) type into a CBOR data item.
pub trait ToCbor {
    fn to_cbor(&self) -> Value;

    fn to_cbor_bytes(&self) -> Vec<u8> {
        self.to_cbor().encode()
    }
}

/// Checked conversion of a CBOR data item into a generated (or primitive) type.
pub trait FromCbor: Sized {
    fn from_cbor(value: &Value) -> Result<Self, DecodeError>;

    fn from_cbor_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::from_cbor(&Value::decode(bytes)?)
    }
}

impl ToCbor for Value {
    fn to_cbor(&self) -> Value {
        self.clone()
    }
}

impl FromCbor for Value {
    fn from_cbor(value: &Value) -> Result<Self, DecodeError> {
        Ok(value.clone())
    }
}

impl ToCbor for bool {
    fn to_cbor(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromCbor for bool {
    fn from_cbor(value: &Value) -> Result<Self, DecodeError> {
        value.as_bool()
    }
}

impl ToCbor for String {
    fn to_cbor(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromCbor for String {
    fn from_cbor(value: &Value) -> Result<Self, DecodeError> {
        value.as_text().map(str::to_owned)
    }
}

impl ToCbor for f64 {
    fn to_cbor(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromCbor for f64 {
    fn from_cbor(value: &Value) -> Result<Self, DecodeError> {
        value.as_float()
    }
}

impl ToCbor for f32 {
    fn to_cbor(&self) -> Value {
        Value::Float(*self as f64)
    }
}

impl FromCbor for f32 {
    fn from_cbor(value: &Value) -> Result<Self, DecodeError> {
        let wide = value.as_float()?;
        let narrow = wide as f32;
        if narrow as f64 == wide || wide.is_nan() {
            Ok(narrow)
        } else {
            Err(DecodeError::new(DecodeErrorKind::OutOfRange {
                value: wide.to_string(),
                range: "float32".to_owned(),
            }))
        }
    }
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {$(
        impl ToCbor for $ty {
            fn to_cbor(&self) -> Value {
                Value::Uint(*self as u64)
            }
        }

        impl FromCbor for $ty {
            fn from_cbor(value: &Value) -> Result<Self, DecodeError> {
                let wide = value.as_uint()?;
                <$ty>::try_from(wide).map_err(|_| {
                    DecodeError::new(DecodeErrorKind::OutOfRange {
                        value: wide.to_string(),
                        range: stringify!($ty).to_owned(),
                    })
                })
            }
        }
    )*};
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {$(
        impl ToCbor for $ty {
            fn to_cbor(&self) -> Value {
                Value::from(*self as i64)
            }
        }

        impl FromCbor for $ty {
            fn from_cbor(value: &Value) -> Result<Self, DecodeError> {
                let wide = value.as_int()?;
                <$ty>::try_from(wide).map_err(|_| {
                    DecodeError::new(DecodeErrorKind::OutOfRange {
                        value: wide.to_string(),
                        range: stringify!($ty).to_owned(),
                    })
                })
            }
        }
    )*};
}

impl_unsigned!(u8, u16, u32, u64);
impl_signed!(i8, i16, i32, i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_round_trip() {
        assert_eq!(u8::from_cbor_bytes(&200u8.to_cbor_bytes()), Ok(200));
        assert_eq!(i64::from_cbor_bytes(&i64::MIN.to_cbor_bytes()), Ok(i64::MIN));
        assert_eq!(String::from_cbor_bytes(&"hi".to_owned().to_cbor_bytes()), Ok("hi".to_owned()));
        assert_eq!(f32::from_cbor(&1.5f32.to_cbor()), Ok(1.5));
        assert_eq!(bool::from_cbor(&true.to_cbor()), Ok(true));
    }

    #[test]
    fn integer_width_is_checked() {
        assert!(u8::from_cbor(&Value::Uint(256)).is_err());
        assert!(u64::from_cbor(&Value::Nint(0)).is_err());
        assert!(i8::from_cbor(&Value::Nint(128)).is_err());
        assert_eq!(i8::from_cbor(&Value::Nint(127)), Ok(-128));
        assert!(i64::from_cbor(&Value::Uint(u64::MAX)).is_err());
        assert!(f32::from_cbor(&Value::Float(1.1)).is_err());
    }
}
