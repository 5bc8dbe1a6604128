use crate::{
    bb::{
        f16_to_f64, malformed, to_len, Argument, ByteBuffer, ByteBufferMut, MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP,
        MAJOR_NINT, MAJOR_SIMPLE, MAJOR_TAG, MAJOR_TEXT, MAJOR_UINT,
    },
    error::{DecodeError, DecodeErrorKind},
};

use std::fmt;

/// Maximum container nesting accepted by [Value::decode].
pub const MAX_DEPTH: usize = 256;

/// This type holds one dynamic CBOR data item.
///
/// Generated types convert to and from a Value, and the Value handles the
/// actual byte layout. Indefinite-length strings and containers are flattened
/// on decode, so [IndefiniteArray](#variant.IndefiniteArray) only ever appears
/// on the encode side.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Uint(u64),
    /// The negative integer `-1 - n`.
    Nint(u64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    IndefiniteArray(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tag(u64, Box<Value>),
    Bool(bool),
    Null,
    Undefined,
    Float(f64),
}

impl Value {
    /// Short name of the data model type, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Uint(_) => "uint",
            Value::Nint(_) => "nint",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Array(_) | Value::IndefiniteArray(_) => "array",
            Value::Map(_) => "map",
            Value::Tag(..) => "tag",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Float(_) => "float",
        }
    }

    /// Build an integer value from anything in the combined uint/nint range.
    /// Returns `None` outside of `-2^64..2^64`.
    pub fn from_i128(value: i128) -> Option<Value> {
        if value >= 0 {
            u64::try_from(value).ok().map(Value::Uint)
        } else {
            u64::try_from(-1 - value).ok().map(Value::Nint)
        }
    }

    fn mismatch(&self, expected: &str) -> DecodeError {
        DecodeError::unexpected_type(expected, self.kind())
    }

    pub fn as_uint(&self) -> Result<u64, DecodeError> {
        match *self {
            Value::Uint(value) => Ok(value),
            _ => Err(self.mismatch("uint")),
        }
    }

    /// Either integer major type, widened so that every encodable integer fits.
    pub fn as_int(&self) -> Result<i128, DecodeError> {
        match *self {
            Value::Uint(value) => Ok(value as i128),
            Value::Nint(n) => Ok(-1 - n as i128),
            _ => Err(self.mismatch("int")),
        }
    }

    pub fn as_float(&self) -> Result<f64, DecodeError> {
        match *self {
            Value::Float(value) => Ok(value),
            _ => Err(self.mismatch("float")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        match *self {
            Value::Bool(value) => Ok(value),
            _ => Err(self.mismatch("bool")),
        }
    }

    pub fn as_text(&self) -> Result<&str, DecodeError> {
        match self {
            Value::Text(value) => Ok(value.as_str()),
            _ => Err(self.mismatch("text")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], DecodeError> {
        match self {
            Value::Bytes(value) => Ok(value.as_slice()),
            _ => Err(self.mismatch("bytes")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], DecodeError> {
        match self {
            Value::Array(values) | Value::IndefiniteArray(values) => Ok(values.as_slice()),
            _ => Err(self.mismatch("array")),
        }
    }

    pub fn as_map(&self) -> Result<&[(Value, Value)], DecodeError> {
        match self {
            Value::Map(entries) => Ok(entries.as_slice()),
            _ => Err(self.mismatch("map")),
        }
    }

    pub fn as_tag(&self) -> Result<(u64, &Value), DecodeError> {
        match self {
            Value::Tag(tag, inner) => Ok((*tag, inner)),
            _ => Err(self.mismatch("tag")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decodes exactly one data item from `bytes`. Anything left over after the
    /// item is an error.
    pub fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
        let mut bb = ByteBuffer::new(bytes);
        let value = Value::decode_bb(&mut bb, 0)?;
        match bb.remaining() {
            0 => Ok(value),
            extra => Err(DecodeError::new(DecodeErrorKind::TrailingBytes(extra))),
        }
    }

    /// Encodes this value into an array of bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut bb = ByteBufferMut::new();
        self.encode_bb(&mut bb);
        bb.data()
    }

    /// Decodes one data item from `bb` starting at the current index. After
    /// this function returns, the current index will be advanced past the item.
    /// This is mainly useful as a helper routine for [decode](#method.decode),
    /// which you probably want to use instead.
    pub fn decode_bb(bb: &mut ByteBuffer, depth: usize) -> Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::new(DecodeErrorKind::TooDeep(MAX_DEPTH)));
        }

        let offset = bb.index();
        let head = bb.read_head()?;

        match (head.major, head.argument) {
            (MAJOR_UINT, Argument::Value(value)) => Ok(Value::Uint(value)),
            (MAJOR_NINT, Argument::Value(value)) => Ok(Value::Nint(value)),

            (MAJOR_BYTES, Argument::Value(len)) => Ok(Value::Bytes(bb.read_bytes(to_len(len, offset)?)?.to_vec())),
            (MAJOR_BYTES, Argument::Indefinite) => Ok(Value::Bytes(read_chunks(bb, MAJOR_BYTES)?)),

            (MAJOR_TEXT, Argument::Value(len)) => {
                let bytes = bb.read_bytes(to_len(len, offset)?)?;
                Ok(Value::Text(utf8(bytes.to_vec(), offset)?))
            }
            (MAJOR_TEXT, Argument::Indefinite) => Ok(Value::Text(utf8(read_chunks(bb, MAJOR_TEXT)?, offset)?)),

            (MAJOR_ARRAY, Argument::Value(len)) => {
                let len = to_len(len, offset)?;
                let mut values = Vec::with_capacity(len.min(bb.remaining()));
                for _ in 0..len {
                    values.push(Value::decode_bb(bb, depth + 1)?);
                }
                Ok(Value::Array(values))
            }
            (MAJOR_ARRAY, Argument::Indefinite) => {
                let mut values = vec![];
                while !bb.read_break()? {
                    values.push(Value::decode_bb(bb, depth + 1)?);
                }
                Ok(Value::Array(values))
            }

            (MAJOR_MAP, Argument::Value(len)) => {
                let len = to_len(len, offset)?;
                let mut entries = Vec::with_capacity(len.min(bb.remaining() / 2));
                for _ in 0..len {
                    let key = Value::decode_bb(bb, depth + 1)?;
                    let value = Value::decode_bb(bb, depth + 1)?;
                    entries.push((key, value));
                }
                Ok(Value::Map(entries))
            }
            (MAJOR_MAP, Argument::Indefinite) => {
                let mut entries = vec![];
                while !bb.read_break()? {
                    let key = Value::decode_bb(bb, depth + 1)?;
                    let value = Value::decode_bb(bb, depth + 1)?;
                    entries.push((key, value));
                }
                Ok(Value::Map(entries))
            }

            (MAJOR_TAG, Argument::Value(tag)) => Ok(Value::Tag(tag, Box::new(Value::decode_bb(bb, depth + 1)?))),

            (MAJOR_SIMPLE, Argument::Value(value)) => match head.info {
                20 => Ok(Value::Bool(false)),
                21 => Ok(Value::Bool(true)),
                22 => Ok(Value::Null),
                23 => Ok(Value::Undefined),
                25 => Ok(Value::Float(f16_to_f64(value as u16))),
                26 => Ok(Value::Float(f32::from_bits(value as u32) as f64)),
                27 => Ok(Value::Float(f64::from_bits(value))),
                _ => Err(malformed(offset, format!("unsupported simple value {}", value))),
            },
            (MAJOR_SIMPLE, Argument::Indefinite) => Err(malformed(offset, "unexpected break".to_owned())),

            (major, _) => Err(malformed(offset, format!("invalid head for major type {}", major))),
        }
    }

    /// Encodes the current value to the end of `bb`. This is mainly useful as
    /// a helper routine for [encode](#method.encode), which you probably want
    /// to use instead.
    pub fn encode_bb(&self, bb: &mut ByteBufferMut) {
        match self {
            Value::Uint(value) => bb.write_uint(*value),
            Value::Nint(n) => bb.write_nint(*n),
            Value::Bytes(value) => bb.write_bytes(value),
            Value::Text(value) => bb.write_text(value),
            Value::Array(values) => {
                bb.write_array_header(values.len());
                for value in values {
                    value.encode_bb(bb);
                }
            }
            Value::IndefiniteArray(values) => {
                bb.write_indefinite(MAJOR_ARRAY);
                for value in values {
                    value.encode_bb(bb);
                }
                bb.write_break();
            }
            Value::Map(entries) => {
                bb.write_map_header(entries.len());
                for (key, value) in entries {
                    key.encode_bb(bb);
                    value.encode_bb(bb);
                }
            }
            Value::Tag(tag, inner) => {
                bb.write_tag(*tag);
                inner.encode_bb(bb);
            }
            Value::Bool(value) => bb.write_bool(*value),
            Value::Null => bb.write_null(),
            Value::Undefined => bb.write_undefined(),
            Value::Float(value) => bb.write_float(*value),
        }
    }
}

fn read_chunks(bb: &mut ByteBuffer, major: u8) -> Result<Vec<u8>, DecodeError> {
    let mut out = vec![];
    while !bb.read_break()? {
        let offset = bb.index();
        let head = bb.read_head()?;
        match (head.major, head.argument) {
            (chunk_major, Argument::Value(len)) if chunk_major == major => {
                out.extend_from_slice(bb.read_bytes(to_len(len, offset)?)?);
            }
            _ => return Err(malformed(offset, "invalid chunk in indefinite-length string".to_owned())),
        }
    }
    Ok(out)
}

fn utf8(bytes: Vec<u8>, offset: usize) -> Result<String, DecodeError> {
    String::from_utf8(bytes).map_err(|_| malformed(offset, "invalid UTF-8 in text string".to_owned()))
}

impl From<u64> for Value {
    fn from(value: u64) -> Value {
        Value::Uint(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Value {
        if value >= 0 {
            Value::Uint(value as u64)
        } else {
            Value::Nint(!value as u64)
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Text(value)
    }
}

/// Renders CBOR diagnostic notation.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Value::Uint(value) => write!(f, "{}", value),
            Value::Nint(n) => write!(f, "{}", -1 - *n as i128),
            Value::Bytes(value) => {
                write!(f, "h'")?;
                for byte in value {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, "'")
            }
            Value::Text(value) => write!(f, "{:?}", value),
            Value::Array(values) => write_items(f, "[", values, "]"),
            Value::IndefiniteArray(values) => write_items(f, "[_ ", values, "]"),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Tag(tag, inner) => write!(f, "{}({})", tag, inner),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Null => write!(f, "null"),
            Value::Undefined => write!(f, "undefined"),
            Value::Float(value) if value.is_nan() => write!(f, "NaN"),
            Value::Float(value) if value.is_infinite() => {
                write!(f, "{}", if *value > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Float(value) if value.fract() == 0.0 => write!(f, "{:.1}", value),
            Value::Float(value) => write!(f, "{}", value),
        }
    }
}

fn write_items(f: &mut fmt::Formatter, open: &str, values: &[Value], close: &str) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", value)?;
    }
    write!(f, "{}", close)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Value {
        Value::Text(value.to_owned())
    }

    #[test]
    fn value_basic() {
        assert_eq!(Value::Uint(7).as_uint(), Ok(7));
        assert_eq!(Value::Nint(0).as_int(), Ok(-1));
        assert_eq!(Value::Nint(u64::MAX).as_int(), Ok(-18446744073709551616));
        assert_eq!(text("a").as_text(), Ok("a"));
        assert!(text("a").as_uint().is_err());
        assert_eq!(Value::from(-500i64), Value::Nint(499));
        assert_eq!(Value::from_i128(-1), Some(Value::Nint(0)));
        assert_eq!(Value::from_i128(1 << 64), None);
        assert_eq!(Value::IndefiniteArray(vec![Value::Null]).as_array().map(|v| v.len()), Ok(1));
    }

    #[test]
    fn value_encode_and_decode() {
        let value = Value::Map(vec![
            (text("x"), Value::Uint(1)),
            (text("y"), Value::Nint(1)),
            (Value::Uint(3), Value::Array(vec![Value::Bool(true), Value::Null, Value::Float(1.5)])),
            (Value::Uint(4), Value::Tag(24, Box::new(Value::Bytes(vec![0xa0])))),
        ]);
        let bytes = value.encode();
        assert_eq!(&bytes[..7], &[0xa4, 0x61, 0x78, 0x01, 0x61, 0x79, 0x21]);
        assert_eq!(Value::decode(&bytes), Ok(value));
    }

    #[test]
    fn value_decode_indefinite() {
        // [_ 1, 2] and (_ "ab", "c")
        assert_eq!(
            Value::decode(&[0x9f, 0x01, 0x02, 0xff]),
            Ok(Value::Array(vec![Value::Uint(1), Value::Uint(2)]))
        );
        assert_eq!(Value::decode(&[0x7f, 0x62, 0x61, 0x62, 0x61, 0x63, 0xff]), Ok(text("abc")));
        assert_eq!(
            Value::decode(&[0xbf, 0x61, 0x61, 0x01, 0xff]),
            Ok(Value::Map(vec![(text("a"), Value::Uint(1))]))
        );
        assert!(Value::decode(&[0x7f, 0x41, 0x61, 0xff]).is_err());

        let encoded = Value::IndefiniteArray(vec![Value::Uint(1)]).encode();
        assert_eq!(encoded, [0x9f, 0x01, 0xff]);
    }

    #[test]
    fn value_decode_floats() {
        assert_eq!(Value::decode(&[0xf9, 0x3c, 0x00]), Ok(Value::Float(1.0)));
        assert_eq!(Value::decode(&[0xfa, 0x47, 0xc3, 0x50, 0x00]), Ok(Value::Float(100000.0)));
        assert_eq!(
            Value::decode(&[0xfb, 0x3f, 0xf1, 0x99, 0x99, 0x99, 0x99, 0x99, 0x9a]),
            Ok(Value::Float(1.1))
        );
    }

    #[test]
    fn value_decode_errors() {
        assert_eq!(
            Value::decode(&[0x01, 0x02]),
            Err(DecodeError::new(DecodeErrorKind::TrailingBytes(1)))
        );
        assert!(matches!(Value::decode(&[0x82, 0x01]), Err(DecodeError { kind: DecodeErrorKind::UnexpectedEnd(_), .. })));
        assert!(Value::decode(&[0xff]).is_err());
        assert!(Value::decode(&[0xf8, 0x20]).is_err());
        assert!(Value::decode(&[0x62, 0xff, 0xfe]).is_err());

        // A huge declared length must fail cleanly rather than allocate.
        assert!(Value::decode(&[0x9b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).is_err());

        let deep = vec![0x81; MAX_DEPTH + 2];
        assert_eq!(
            Value::decode(&deep).map_err(|e| e.kind),
            Err(DecodeErrorKind::TooDeep(MAX_DEPTH))
        );
    }

    #[test]
    fn value_display() {
        let value = Value::Array(vec![
            Value::Uint(1),
            Value::Nint(9),
            Value::Bytes(vec![0x01, 0xff]),
            text("hi"),
            Value::Tag(1, Box::new(Value::Float(2.0))),
            Value::Map(vec![(Value::Uint(1), Value::Null)]),
            Value::IndefiniteArray(vec![Value::Bool(false)]),
        ]);
        assert_eq!(
            value.to_string(),
            "[1, -10, h'01ff', \"hi\", 1(2.0), {1: null}, [_ false]]"
        );
    }
}
