//! Helpers that generated `FromCbor` impls are written against. Each helper
//! attaches the field name or index to errors coming out of nested decoders,
//! so a failure deep in a payload reports its full path.

use crate::{
    error::{DecodeError, DecodeErrorKind},
    value::Value,
};

use std::collections::BTreeMap;

/// Pulls keyed entries out of a CBOR map. Every entry has to be consumed
/// before [finish](#method.finish) succeeds.
pub struct MapReader<'a> {
    entries: &'a [(Value, Value)],
    used:    Vec<bool>,
}

impl<'a> MapReader<'a> {
    pub fn new(value: &'a Value) -> Result<MapReader<'a>, DecodeError> {
        let entries = value.as_map()?;
        for (i, (key, _)) in entries.iter().enumerate() {
            if entries[..i].iter().any(|(other, _)| other == key) {
                return Err(DecodeError::new(DecodeErrorKind::DuplicateKey(key.to_string())));
            }
        }
        Ok(MapReader { entries, used: vec![false; entries.len()] })
    }

    fn take(&mut self, key: &Value) -> Option<&'a Value> {
        let index = self.entries.iter().position(|(other, _)| other == key)?;
        self.used[index] = true;
        Some(&self.entries[index].1)
    }

    pub fn required<T>(
        &mut self,
        key: &Value,
        name: &str,
        decode: impl FnOnce(&Value) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        match self.take(key) {
            Some(value) => decode(value).map_err(|e| e.in_field(name)),
            None => Err(DecodeError::new(DecodeErrorKind::MissingField).in_field(name)),
        }
    }

    /// An absent entry is `None`, never an error.
    pub fn optional<T>(
        &mut self,
        key: &Value,
        name: &str,
        decode: impl FnOnce(&Value) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DecodeError> {
        match self.take(key) {
            Some(value) => decode(value).map(Some).map_err(|e| e.in_field(name)),
            None => Ok(None),
        }
    }

    pub fn fixed(&mut self, key: &Value, name: &str, expected: &Value) -> Result<(), DecodeError> {
        self.required(key, name, |value| expect_value(value, expected))
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        match self.used.iter().position(|used| !used) {
            Some(index) => Err(DecodeError::new(DecodeErrorKind::UnknownKey(self.entries[index].0.to_string()))),
            None => Ok(()),
        }
    }
}

/// Pulls positional items out of a CBOR array, front to back.
pub struct ArrayReader<'a> {
    items: &'a [Value],
    pos:   usize,
}

impl<'a> ArrayReader<'a> {
    pub fn new(value: &'a Value, min: usize, max: Option<usize>) -> Result<ArrayReader<'a>, DecodeError> {
        let items = value.as_array()?;
        check_length(items.len(), min, max)?;
        Ok(ArrayReader { items, pos: 0 })
    }

    fn next(&mut self) -> Option<&'a Value> {
        let item = self.items.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    pub fn required<T>(
        &mut self,
        name: &str,
        decode: impl FnOnce(&Value) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        match self.next() {
            Some(value) => decode(value).map_err(|e| e.in_field(name)),
            None => Err(DecodeError::new(DecodeErrorKind::MissingField).in_field(name)),
        }
    }

    pub fn optional<T>(
        &mut self,
        name: &str,
        decode: impl FnOnce(&Value) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DecodeError> {
        match self.next() {
            Some(value) => decode(value).map(Some).map_err(|e| e.in_field(name)),
            None => Ok(None),
        }
    }

    pub fn fixed(&mut self, name: &str, expected: &Value) -> Result<(), DecodeError> {
        self.required(name, |value| expect_value(value, expected))
    }

    /// Consumes every remaining item as one repeated field.
    pub fn rest<T>(
        &mut self,
        name: &str,
        min: usize,
        max: Option<usize>,
        mut decode: impl FnMut(&Value) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let items = &self.items[self.pos..];
        self.pos = self.items.len();
        check_length(items.len(), min, max).map_err(|e| e.in_field(name))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| decode(item).map_err(|e| e.at_index(i).in_field(name)))
            .collect()
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        if self.pos < self.items.len() {
            return Err(DecodeError::new(DecodeErrorKind::LengthOutOfRange {
                len:   self.items.len(),
                range: format!("at most {} items", self.pos),
            }));
        }
        Ok(())
    }
}

/// Decode a homogeneous array.
pub fn decode_array<T>(
    value: &Value,
    min: usize,
    max: Option<usize>,
    mut decode: impl FnMut(&Value) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let items = value.as_array()?;
    check_length(items.len(), min, max)?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| decode(item).map_err(|e| e.at_index(i)))
        .collect()
}

/// Decode a map with variable keys.
pub fn decode_table<K: Ord, V>(
    value: &Value,
    mut decode_key: impl FnMut(&Value) -> Result<K, DecodeError>,
    mut decode_value: impl FnMut(&Value) -> Result<V, DecodeError>,
) -> Result<BTreeMap<K, V>, DecodeError> {
    let mut table = BTreeMap::new();
    for (i, (key, value)) in value.as_map()?.iter().enumerate() {
        let decoded = decode_key(key).map_err(|e| e.at_index(i))?;
        let item = decode_value(value).map_err(|e| e.in_field(&key.to_string()))?;
        if table.insert(decoded, item).is_some() {
            return Err(DecodeError::new(DecodeErrorKind::DuplicateKey(key.to_string())));
        }
    }
    Ok(table)
}

/// Unwrap tag `tag` and return the tagged item.
pub fn expect_tag(value: &Value, tag: u64) -> Result<&Value, DecodeError> {
    match value {
        Value::Tag(found, inner) if *found == tag => Ok(inner),
        Value::Tag(found, _) => Err(DecodeError::new(DecodeErrorKind::TagMismatch { expected: tag, found: found.to_string() })),
        other => Err(DecodeError::new(DecodeErrorKind::TagMismatch { expected: tag, found: other.kind().to_owned() })),
    }
}

pub fn expect_value(value: &Value, expected: &Value) -> Result<(), DecodeError> {
    if value == expected {
        Ok(())
    } else {
        Err(DecodeError::new(DecodeErrorKind::FixedMismatch {
            expected: expected.to_string(),
            found:    value.to_string(),
        }))
    }
}

/// Decode a byte string that carries a nested CBOR item.
pub fn decode_embedded<T>(
    value: &Value,
    decode: impl FnOnce(&Value) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    decode(&Value::decode(value.as_bytes()?)?)
}

pub fn decode_nint(value: &Value) -> Result<i64, DecodeError> {
    match *value {
        Value::Nint(n) => i64::try_from(n).map(|n| -1 - n).map_err(|_| {
            DecodeError::new(DecodeErrorKind::OutOfRange { value: value.to_string(), range: "i64".to_owned() })
        }),
        _ => Err(DecodeError::unexpected_type("nint", value.kind())),
    }
}

pub fn check_range(value: i128, min: Option<i128>, max: Option<i128>) -> Result<(), DecodeError> {
    if min.map_or(false, |min| value < min) || max.map_or(false, |max| value > max) {
        return Err(DecodeError::new(DecodeErrorKind::OutOfRange {
            value: value.to_string(),
            range: describe_bounds(min, max),
        }));
    }
    Ok(())
}

pub fn check_length(len: usize, min: usize, max: Option<usize>) -> Result<(), DecodeError> {
    if len < min || max.map_or(false, |max| len > max) {
        return Err(DecodeError::new(DecodeErrorKind::LengthOutOfRange {
            len,
            range: describe_bounds(Some(min), max),
        }));
    }
    Ok(())
}

fn describe_bounds<T: ToString>(min: Option<T>, max: Option<T>) -> String {
    let min = min.map(|v| v.to_string()).unwrap_or_default();
    let max = max.map(|v| v.to_string()).unwrap_or_default();
    format!("{}..={}", min, max)
}

/// Try each decoder in order and return the first success. Failure of every
/// alternative is reported as a single `NoMatchingAlternative`.
pub fn first_match<T>(
    type_name: &str,
    value: &Value,
    attempts: &[fn(&Value) -> Result<T, DecodeError>],
) -> Result<T, DecodeError> {
    attempts
        .iter()
        .find_map(|attempt| attempt(value).ok())
        .ok_or_else(|| DecodeError::new(DecodeErrorKind::NoMatchingAlternative(type_name.to_owned())))
}

pub fn tag_number(value: &Value) -> Option<u64> {
    match value {
        Value::Tag(tag, _) => Some(*tag),
        _ => None,
    }
}

pub fn leading_item(value: &Value) -> Option<&Value> {
    value.as_array().ok()?.first()
}

pub fn map_lookup<'a>(value: &'a Value, key: &Value) -> Option<&'a Value> {
    value.as_map().ok()?.iter().find(|(other, _)| other == key).map(|(_, item)| item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::PathSegment, traits::FromCbor};

    fn text(value: &str) -> Value {
        Value::Text(value.to_owned())
    }

    #[test]
    fn map_reader_fields() {
        let value = Value::Map(vec![(text("x"), Value::Uint(1)), (Value::Uint(0), Value::Uint(9))]);
        let mut reader = MapReader::new(&value).unwrap();
        assert_eq!(reader.required(&text("x"), "x", i64::from_cbor), Ok(1));
        assert_eq!(reader.optional(&text("y"), "y", i64::from_cbor), Ok(None));
        assert_eq!(reader.fixed(&Value::Uint(0), "kind", &Value::Uint(9)), Ok(()));
        assert_eq!(reader.finish(), Ok(()));
    }

    #[test]
    fn map_reader_errors() {
        let value = Value::Map(vec![(text("x"), text("no")), (text("z"), Value::Null)]);
        let mut reader = MapReader::new(&value).unwrap();
        let err = reader.required(&text("x"), "x", i64::from_cbor).unwrap_err();
        assert_eq!(err.path.segments(), &[PathSegment::Field("x".to_owned())]);
        let err = reader.required(&text("y"), "y", i64::from_cbor).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::MissingField);
        assert_eq!(reader.finish().unwrap_err().kind, DecodeErrorKind::UnknownKey("\"z\"".to_owned()));

        let duplicated = Value::Map(vec![(text("x"), Value::Null), (text("x"), Value::Null)]);
        assert!(MapReader::new(&duplicated).is_err());
    }

    #[test]
    fn array_reader_slots() {
        let value = Value::Array(vec![Value::Uint(0), text("a"), Value::Uint(1), Value::Uint(2)]);
        let mut reader = ArrayReader::new(&value, 2, None).unwrap();
        reader.fixed("kind", &Value::Uint(0)).unwrap();
        assert_eq!(reader.required("name", String::from_cbor), Ok("a".to_owned()));
        assert_eq!(reader.rest("items", 0, None, u8::from_cbor), Ok(vec![1, 2]));
        assert_eq!(reader.finish(), Ok(()));

        let short = Value::Array(vec![Value::Uint(0)]);
        assert!(ArrayReader::new(&short, 2, Some(2)).is_err());

        let long = Value::Array(vec![Value::Uint(0), Value::Uint(1)]);
        let mut reader = ArrayReader::new(&long, 1, None).unwrap();
        assert_eq!(reader.optional("a", u8::from_cbor), Ok(Some(0)));
        assert!(reader.finish().is_err());
    }

    #[test]
    fn nested_paths() {
        let value = Value::Array(vec![Value::Uint(1), text("x")]);
        let err = decode_array(&value, 0, None, u8::from_cbor).unwrap_err();
        assert_eq!(err.path.to_string(), "$[1]");
    }

    #[test]
    fn tables() {
        let value = Value::Map(vec![(text("b"), Value::Uint(2)), (text("a"), Value::Uint(1))]);
        let table = decode_table(&value, String::from_cbor, u8::from_cbor).unwrap();
        assert_eq!(table.into_iter().collect::<Vec<_>>(), vec![("a".to_owned(), 1), ("b".to_owned(), 2)]);
    }

    #[test]
    fn first_match_is_ordered() {
        let attempts: [fn(&Value) -> Result<&'static str, DecodeError>; 3] = [
            |v| v.as_text().map(|_| "text"),
            |v| v.as_uint().map(|_| "first uint"),
            |v| v.as_uint().map(|_| "second uint"),
        ];
        assert_eq!(first_match("T", &Value::Uint(3), &attempts), Ok("first uint"));
        assert_eq!(
            first_match("T", &Value::Null, &attempts).unwrap_err().kind,
            DecodeErrorKind::NoMatchingAlternative("T".to_owned())
        );
    }

    #[test]
    fn checks_and_discriminant_lookups() {
        assert!(check_range(5, Some(0), Some(10)).is_ok());
        assert!(check_range(-1, Some(0), None).is_err());
        assert!(check_length(3, 0, Some(2)).is_err());
        assert_eq!(decode_nint(&Value::Nint(4)), Ok(-5));
        assert!(decode_nint(&Value::Uint(4)).is_err());

        let tagged = Value::Tag(30, Box::new(Value::Array(vec![Value::Uint(1)])));
        assert_eq!(tag_number(&tagged), Some(30));
        assert!(expect_tag(&tagged, 31).is_err());
        assert_eq!(leading_item(expect_tag(&tagged, 30).unwrap()), Some(&Value::Uint(1)));

        let map = Value::Map(vec![(Value::Uint(0), text("k"))]);
        assert_eq!(map_lookup(&map, &Value::Uint(0)), Some(&text("k")));

        let embedded = Value::Bytes(vec![0x18, 0x2a]);
        assert_eq!(decode_embedded(&embedded, u8::from_cbor), Ok(42));
    }
}
