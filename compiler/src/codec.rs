//! Reference codec: encodes JSON instances to CBOR and back by walking the
//! type graph and its plans, with the same layout the native backend emits.
//!
//! Instances map to JSON as follows. Records are objects keyed by field name,
//! with `null` for an absent optional field. Choices are `{"Variant": payload}`,
//! or the bare variant name for literal variants. Tables are `[[key, value], ...]`
//! and byte strings are arrays of numbers. Wrappers and aliases use the
//! instance of the type they wrap.

use std::cmp::Ordering;

use brine_cddl_runtime::{
    check_length, check_range, decode_array, decode_embedded, decode_nint, expect_tag, expect_value,
    leading_item, map_lookup, tag_number, ArrayReader, DecodeError, DecodeErrorKind, MapReader, Value,
};
use serde_json::{json, Map as JsonMap, Number, Value as Json};

use crate::{
    error::CddlError,
    plan::{ArrayLength, Discriminant, EncodingPlan, Layout, Plans},
    types::{Bounds, Field, FixedValue, Primitive, Record, ResolvedType, Shape, TypeGraph, TypeRef, Variant},
};

pub struct Codec<'a> {
    graph: &'a TypeGraph,
    plans: &'a Plans,
}

impl<'a> Codec<'a> {
    pub fn new(graph: &'a TypeGraph, plans: &'a Plans) -> Codec<'a> {
        Codec { graph, plans }
    }

    fn node(&self, name: &str) -> Result<(&'a ResolvedType, &'a EncodingPlan), CddlError> {
        match (self.graph.get(name), self.plans.get(name)) {
            (Some(ty), Some(plan)) => Ok((ty, plan)),
            _ => Err(CddlError::UnresolvedReference { name: name.to_owned(), rule: "<codec>".to_owned() }),
        }
    }

    /// Encode `instance` as the type named `root`.
    pub fn encode(&self, root: &str, instance: &Json) -> Result<Vec<u8>, CddlError> {
        Ok(self.encode_value(root, instance)?.encode())
    }

    pub fn encode_value(&self, root: &str, instance: &Json) -> Result<Value, CddlError> {
        self.node(root)?;
        self.encode_ref(&TypeRef::named(root), instance, "$")
    }

    /// Decode `bytes` as the type named `root`.
    pub fn decode(&self, root: &str, bytes: &[u8]) -> Result<Json, CddlError> {
        self.node(root)?;
        let value = Value::decode(bytes)?;
        Ok(self.decode_ref(&TypeRef::named(root), &value)?)
    }

    pub fn decode_value(&self, root: &str, value: &Value) -> Result<Json, CddlError> {
        self.node(root)?;
        Ok(self.decode_ref(&TypeRef::named(root), value)?)
    }

    fn encode_ref(&self, ty: &TypeRef, instance: &Json, path: &str) -> Result<Value, CddlError> {
        match ty {
            TypeRef::Primitive(p) => encode_primitive(*p, instance, path),
            TypeRef::Fixed(value) => fixed_value(value, path),
            TypeRef::Named(name) => self.encode_node(name, instance, path),
            TypeRef::Optional(inner) => match instance {
                Json::Null => Ok(Value::Null),
                _ => self.encode_ref(inner, instance, path),
            },
            TypeRef::Array { element, occurrence } => {
                let items = instance.as_array().ok_or_else(|| invalid(path, "expected an array"))?;
                check_occurrence(items.len(), occurrence.min, occurrence.max, path)?;
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.encode_ref(element, item, &format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match self.plans.policy.array_length {
                    ArrayLength::Definite => Value::Array(items),
                    ArrayLength::Indefinite => Value::IndefiniteArray(items),
                })
            }
            TypeRef::Map { key, value } => self.encode_table(key, value, instance, path),
            TypeRef::Tagged { tag, inner } => Ok(Value::Tag(*tag, Box::new(self.encode_ref(inner, instance, path)?))),
            TypeRef::CborBytes(inner) => Ok(Value::Bytes(self.encode_ref(inner, instance, path)?.encode())),
        }
    }

    fn encode_node(&self, name: &str, instance: &Json, path: &str) -> Result<Value, CddlError> {
        let (ty, plan) = self.node(name)?;
        let value = match (&ty.shape, &plan.layout) {
            (Shape::Record(record) | Shape::MapFixedKeys(record), Layout::Map { slots, .. }) => {
                let object = instance.as_object().ok_or_else(|| invalid(path, "expected an object"))?;
                check_known_fields(record, object, path)?;
                let mut entries = Vec::with_capacity(slots.len());
                for &slot in slots {
                    let field = &record.fields[slot];
                    let key = field_key(field, path)?;
                    if let Some(value) = self.encode_field(field, object, path)? {
                        entries.push((key, value));
                    }
                }
                Value::Map(entries)
            }
            (Shape::Array(record), Layout::Array { slots, .. }) => {
                let object = instance.as_object().ok_or_else(|| invalid(path, "expected an object"))?;
                check_known_fields(record, object, path)?;
                let mut items = Vec::with_capacity(slots.len());
                for &slot in slots {
                    let field = &record.fields[slot];
                    if field.is_repeated() {
                        let field_path = format!("{}.{}", path, field.name);
                        let values = object
                            .get(&field.name)
                            .and_then(Json::as_array)
                            .ok_or_else(|| invalid(&field_path, "expected an array"))?;
                        check_occurrence(values.len(), field.occurrence.min, field.occurrence.max, &field_path)?;
                        for (i, item) in values.iter().enumerate() {
                            items.push(self.encode_ref(&field.ty, item, &format!("{}[{}]", field_path, i))?);
                        }
                    } else if let Some(value) = self.encode_field(field, object, path)? {
                        items.push(value);
                    }
                }
                Value::Array(items)
            }
            (Shape::Choice { variants }, Layout::Choice { .. }) => self.encode_choice(ty, variants, instance, path)?,
            (Shape::Wrapper { inner, bounds }, _) => {
                let value = self.encode_ref(inner, instance, path)?;
                check_bounds(self.graph, inner, bounds, &value).map_err(|e| invalid(path, &e.kind.to_string()))?;
                value
            }
            (Shape::MapVariableKeys { key, value }, _) => self.encode_table(key, value, instance, path)?,
            (Shape::Alias(inner), _) => self.encode_ref(inner, instance, path)?,
            _ => return Err(invalid(path, &format!("{} has no usable plan", ty.name))),
        };
        Ok(match plan.tag {
            Some(tag) => Value::Tag(tag, Box::new(value)),
            None => value,
        })
    }

    /// `None` when an optional field is absent.
    fn encode_field(&self, field: &Field, object: &JsonMap<String, Json>, path: &str) -> Result<Option<Value>, CddlError> {
        let field_path = format!("{}.{}", path, field.name);
        if let Some(value) = field.fixed_value() {
            return fixed_value(value, &field_path).map(Some);
        }
        match object.get(&field.name) {
            None | Some(Json::Null) if field.is_optional() => Ok(None),
            None => Err(invalid(&field_path, "missing field")),
            Some(item) => self.encode_ref(&field.ty, item, &field_path).map(Some),
        }
    }

    fn encode_choice(&self, ty: &ResolvedType, variants: &[Variant], instance: &Json, path: &str) -> Result<Value, CddlError> {
        let (name, payload) = match instance {
            Json::String(name) => (name.as_str(), &Json::Null),
            Json::Object(object) if object.len() == 1 => match object.iter().next() {
                Some((name, payload)) => (name.as_str(), payload),
                None => return Err(invalid(path, "expected a variant")),
            },
            _ => return Err(invalid(path, &format!("expected a variant of {}", ty.ident))),
        };
        let variant = variants
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| invalid(path, &format!("{} has no variant {}", ty.ident, name)))?;
        self.encode_ref(&variant.ty, payload, &format!("{}.{}", path, name))
    }

    fn encode_table(&self, key: &TypeRef, value: &TypeRef, instance: &Json, path: &str) -> Result<Value, CddlError> {
        let pairs = instance.as_array().ok_or_else(|| invalid(path, "expected an array of [key, value] pairs"))?;
        let mut entries = Vec::with_capacity(pairs.len());
        for (i, pair) in pairs.iter().enumerate() {
            let entry_path = format!("{}[{}]", path, i);
            match pair.as_array().map(Vec::as_slice) {
                Some([k, v]) => {
                    entries.push((self.encode_ref(key, k, &entry_path)?, self.encode_ref(value, v, &entry_path)?))
                }
                _ => return Err(invalid(&entry_path, "expected a [key, value] pair")),
            }
        }
        entries.sort_by(|a, b| table_order(&a.0, &b.0));
        if entries.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(invalid(path, "duplicate table key"));
        }
        Ok(Value::Map(entries))
    }

    fn decode_ref(&self, ty: &TypeRef, value: &Value) -> Result<Json, DecodeError> {
        match ty {
            TypeRef::Primitive(p) => decode_primitive(*p, value),
            TypeRef::Fixed(fixed) => {
                expect_value(value, &fixed_to_value(fixed)?)?;
                Ok(Json::Null)
            }
            TypeRef::Named(name) => self.decode_node(name, value),
            TypeRef::Optional(inner) => {
                if value.is_null() {
                    Ok(Json::Null)
                } else {
                    self.decode_ref(inner, value)
                }
            }
            TypeRef::Array { element, occurrence } => {
                let max = occurrence.max.map(|m| m as usize);
                Ok(Json::Array(decode_array(value, occurrence.min as usize, max, |item| self.decode_ref(element, item))?))
            }
            TypeRef::Map { key, value: item } => self.decode_table(key, item, value),
            TypeRef::Tagged { tag, inner } => self.decode_ref(inner, expect_tag(value, *tag)?),
            TypeRef::CborBytes(inner) => decode_embedded(value, |embedded| self.decode_ref(inner, embedded)),
        }
    }

    fn decode_node(&self, name: &str, value: &Value) -> Result<Json, DecodeError> {
        let (ty, plan) = match (self.graph.get(name), self.plans.get(name)) {
            (Some(ty), Some(plan)) => (ty, plan),
            _ => return Err(DecodeError::unexpected_type(name, "unknown type")),
        };
        let value = match plan.tag {
            Some(tag) => expect_tag(value, tag)?,
            None => value,
        };
        match (&ty.shape, &plan.layout) {
            (Shape::Record(record) | Shape::MapFixedKeys(record), _) => {
                let mut map = MapReader::new(value)?;
                let mut object = JsonMap::new();
                for field in &record.fields {
                    let key = field.key.as_ref().map(fixed_to_value).transpose()?.unwrap_or(Value::Null);
                    if let Some(fixed) = field.fixed_value() {
                        map.fixed(&key, &field.name, &fixed_to_value(fixed)?)?;
                    } else if field.is_optional() {
                        let item = map.optional(&key, &field.name, |item| self.decode_ref(&field.ty, item))?;
                        object.insert(field.name.clone(), item.unwrap_or(Json::Null));
                    } else {
                        let item = map.required(&key, &field.name, |item| self.decode_ref(&field.ty, item))?;
                        object.insert(field.name.clone(), item);
                    }
                }
                map.finish()?;
                Ok(Json::Object(object))
            }
            (Shape::Array(record), Layout::Array { min_len, max_len, .. }) => {
                let mut array = ArrayReader::new(value, *min_len, *max_len)?;
                let mut object = JsonMap::new();
                for field in &record.fields {
                    if let Some(fixed) = field.fixed_value() {
                        array.fixed(&field.name, &fixed_to_value(fixed)?)?;
                    } else if field.is_repeated() {
                        let max = field.occurrence.max.map(|m| m as usize);
                        let items = array.rest(&field.name, field.occurrence.min as usize, max, |item| {
                            self.decode_ref(&field.ty, item)
                        })?;
                        object.insert(field.name.clone(), Json::Array(items));
                    } else if field.is_optional() {
                        let item = array.optional(&field.name, |item| self.decode_ref(&field.ty, item))?;
                        object.insert(field.name.clone(), item.unwrap_or(Json::Null));
                    } else {
                        let item = array.required(&field.name, |item| self.decode_ref(&field.ty, item))?;
                        object.insert(field.name.clone(), item);
                    }
                }
                array.finish()?;
                Ok(Json::Object(object))
            }
            (Shape::Choice { variants }, Layout::Choice { discriminant }) => {
                self.decode_choice(ty, variants, discriminant, value)
            }
            (Shape::Wrapper { inner, bounds }, _) => {
                let decoded = self.decode_ref(inner, value)?;
                check_bounds(self.graph, inner, bounds, value)?;
                Ok(decoded)
            }
            (Shape::MapVariableKeys { key, value: item }, _) => self.decode_table(key, item, value),
            (Shape::Alias(inner), _) => self.decode_ref(inner, value),
            _ => Err(DecodeError::unexpected_type(ty.shape.kind(), value.kind())),
        }
    }

    fn decode_variant(&self, variant: &Variant, value: &Value) -> Result<Json, DecodeError> {
        let payload = self.decode_ref(&variant.ty, value)?;
        Ok(match self.graph.unalias(&variant.ty) {
            TypeRef::Fixed(_) => Json::String(variant.name.clone()),
            _ => {
                let mut object = JsonMap::new();
                object.insert(variant.name.clone(), payload);
                Json::Object(object)
            }
        })
    }

    fn decode_choice(
        &self,
        ty: &ResolvedType,
        variants: &[Variant],
        discriminant: &Discriminant,
        value: &Value,
    ) -> Result<Json, DecodeError> {
        let no_match = || DecodeError::new(DecodeErrorKind::NoMatchingAlternative(ty.ident.clone()));
        let selected = match discriminant {
            Discriminant::CborTag { tags } => tag_number(value).and_then(|tag| tags.iter().position(|t| *t == tag)),
            Discriminant::LeadingValue { values } => leading_item(value).and_then(|item| self.position(values, item)),
            Discriminant::KeyValue { key, values } => {
                map_lookup(value, &fixed_to_value(key)?).and_then(|item| self.position(values, item))
            }
            Discriminant::Literal | Discriminant::TryInOrder => {
                // Attempt every alternative in declaration order.
                return variants
                    .iter()
                    .find_map(|variant| self.decode_variant(variant, value).ok())
                    .ok_or_else(no_match);
            }
        };
        match selected.and_then(|i| variants.get(i)) {
            Some(variant) => self.decode_variant(variant, value),
            None => Err(no_match()),
        }
    }

    fn position(&self, values: &[FixedValue], item: &Value) -> Option<usize> {
        values.iter().position(|fixed| fixed.to_value().as_ref() == Some(item))
    }

    fn decode_table(&self, key: &TypeRef, item: &TypeRef, value: &Value) -> Result<Json, DecodeError> {
        let mut entries: Vec<(&Value, Json)> = Vec::new();
        for (i, (k, v)) in value.as_map()?.iter().enumerate() {
            let decoded_key = self.decode_ref(key, k).map_err(|e| e.at_index(i))?;
            let decoded = self.decode_ref(item, v).map_err(|e| e.in_field(&k.to_string()))?;
            entries.push((k, json!([decoded_key, decoded])));
        }
        entries.sort_by(|a, b| table_order(a.0, b.0));
        if let Some(pair) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(DecodeError::new(DecodeErrorKind::DuplicateKey(pair[0].0.to_string())));
        }
        Ok(Json::Array(entries.into_iter().map(|(_, entry)| entry).collect()))
    }
}

/// Order of table keys, matching the `Ord` of the native key types.
fn table_order(a: &Value, b: &Value) -> Ordering {
    match (a.as_int(), b.as_int()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => match (a, b) {
            (Value::Text(x), Value::Text(y)) => x.cmp(y),
            (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => a.encode().cmp(&b.encode()),
        },
    }
}

fn invalid(path: &str, reason: &str) -> CddlError {
    CddlError::InvalidInstance { path: path.to_owned(), reason: reason.to_owned() }
}

fn fixed_to_value(fixed: &FixedValue) -> Result<Value, DecodeError> {
    fixed.to_value().ok_or_else(|| {
        DecodeError::new(DecodeErrorKind::OutOfRange { value: fixed.label(), range: "a CBOR integer".to_owned() })
    })
}

fn fixed_value(fixed: &FixedValue, path: &str) -> Result<Value, CddlError> {
    fixed.to_value().ok_or_else(|| invalid(path, "literal does not fit in a CBOR integer"))
}

fn field_key(field: &Field, path: &str) -> Result<Value, CddlError> {
    match &field.key {
        Some(key) => fixed_value(key, path),
        None => Err(invalid(path, &format!("field {} has no key", field.name))),
    }
}

fn check_known_fields(record: &Record, object: &JsonMap<String, Json>, path: &str) -> Result<(), CddlError> {
    for name in object.keys() {
        let known = record.fields.iter().any(|f| &f.name == name && f.fixed_value().is_none());
        if !known {
            return Err(invalid(&format!("{}.{}", path, name), "unknown field"));
        }
    }
    Ok(())
}

fn check_occurrence(len: usize, min: u64, max: Option<u64>, path: &str) -> Result<(), CddlError> {
    check_length(len, min as usize, max.map(|m| m as usize)).map_err(|e| invalid(path, &e.kind.to_string()))
}

/// Bounds are checked on the encoded item: integer value, or string length.
fn check_bounds(graph: &TypeGraph, inner: &TypeRef, bounds: &Bounds, value: &Value) -> Result<(), DecodeError> {
    if bounds.is_empty() {
        return Ok(());
    }
    match graph.unalias(inner) {
        TypeRef::Primitive(Primitive::Text) => {
            let min = bounds.min.unwrap_or(0).max(0) as usize;
            check_length(value.as_text()?.len(), min, bounds.max.map(|m| m as usize))
        }
        TypeRef::Primitive(Primitive::Bytes) => {
            let min = bounds.min.unwrap_or(0).max(0) as usize;
            check_length(value.as_bytes()?.len(), min, bounds.max.map(|m| m as usize))
        }
        _ => check_range(value.as_int()?, bounds.min, bounds.max),
    }
}

fn json_int(instance: &Json) -> Option<i128> {
    match instance {
        Json::Number(n) => n.as_u64().map(i128::from).or_else(|| n.as_i64().map(i128::from)),
        _ => None,
    }
}

fn encode_primitive(p: Primitive, instance: &Json, path: &str) -> Result<Value, CddlError> {
    match p {
        Primitive::Bool => instance.as_bool().map(Value::Bool).ok_or_else(|| invalid(path, "expected a bool")),
        Primitive::F32 | Primitive::F64 => {
            let x = instance.as_f64().ok_or_else(|| invalid(path, "expected a number"))?;
            if p == Primitive::F32 && (x as f32) as f64 != x {
                return Err(invalid(path, &format!("{} does not fit in f32", x)));
            }
            Ok(Value::Float(x))
        }
        Primitive::Text => instance
            .as_str()
            .map(|s| Value::Text(s.to_owned()))
            .ok_or_else(|| invalid(path, "expected a string")),
        Primitive::Bytes => {
            let items = instance.as_array().ok_or_else(|| invalid(path, "expected an array of bytes"))?;
            items
                .iter()
                .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .map(Value::Bytes)
                .ok_or_else(|| invalid(path, "expected an array of bytes"))
        }
        Primitive::Any => Ok(json_to_any(instance)),
        _ => {
            let n = json_int(instance).ok_or_else(|| invalid(path, "expected an integer"))?;
            let (min, max) = p.int_bounds().unwrap_or((0, 0));
            if n < min || n > max {
                return Err(invalid(path, &format!("{} is out of range for {}", n, p.schema_name())));
            }
            Value::from_i128(n).ok_or_else(|| invalid(path, "integer out of range"))
        }
    }
}

fn decode_primitive(p: Primitive, value: &Value) -> Result<Json, DecodeError> {
    match p {
        Primitive::Bool => Ok(Json::Bool(value.as_bool()?)),
        Primitive::F32 | Primitive::F64 => {
            let x = value.as_float()?;
            if p == Primitive::F32 && !x.is_nan() && (x as f32) as f64 != x {
                return Err(DecodeError::new(DecodeErrorKind::OutOfRange { value: x.to_string(), range: "f32".to_owned() }));
            }
            Ok(Number::from_f64(x).map(Json::Number).unwrap_or(Json::Null))
        }
        Primitive::Text => Ok(Json::String(value.as_text()?.to_owned())),
        Primitive::Bytes => Ok(Json::Array(value.as_bytes()?.iter().map(|b| json!(b)).collect())),
        Primitive::Any => Ok(any_to_json(value)),
        Primitive::Nint => Ok(json!(decode_nint(value)?)),
        _ => {
            let n = value.as_int()?;
            let (min, max) = p.int_bounds().unwrap_or((0, 0));
            if n < min || n > max {
                return Err(DecodeError::new(DecodeErrorKind::OutOfRange {
                    value: n.to_string(),
                    range: p.rust_type().to_owned(),
                }));
            }
            Ok(if n >= 0 { json!(n as u64) } else { json!(n as i64) })
        }
    }
}

/// Best-effort JSON projection of an arbitrary CBOR item.
pub fn any_to_json(value: &Value) -> Json {
    match value {
        Value::Uint(n) => json!(n),
        Value::Nint(n) => i64::try_from(*n).map(|n| json!(-1 - n)).unwrap_or_else(|_| json!(value.to_string())),
        Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| json!(b)).collect()),
        Value::Text(text) => Json::String(text.clone()),
        Value::Array(items) | Value::IndefiniteArray(items) => Json::Array(items.iter().map(any_to_json).collect()),
        Value::Map(entries) => {
            let mut object = JsonMap::new();
            for (k, v) in entries {
                let key = match k {
                    Value::Text(text) => text.clone(),
                    other => other.to_string(),
                };
                object.insert(key, any_to_json(v));
            }
            Json::Object(object)
        }
        Value::Tag(tag, inner) => json!({ "tag": tag, "value": any_to_json(inner) }),
        Value::Bool(b) => Json::Bool(*b),
        Value::Null | Value::Undefined => Json::Null,
        Value::Float(x) => Number::from_f64(*x).map(Json::Number).unwrap_or(Json::Null),
    }
}

pub fn json_to_any(instance: &Json) -> Value {
    match instance {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => Value::Uint(u),
            (None, Some(i)) => Value::from(i),
            _ => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(json_to_any).collect()),
        Json::Object(object) => {
            Value::Map(object.iter().map(|(k, v)| (Value::Text(k.clone()), json_to_any(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_document, plan::{plan_graph, EncodingPolicy}, resolver::build_graph};

    fn compile(text: &str) -> (TypeGraph, Plans) {
        let doc = parse_document("test.cddl", text).unwrap();
        let graph = build_graph(&[doc], &[]).unwrap();
        let plans = plan_graph(&graph, &EncodingPolicy::default()).unwrap();
        (graph, plans)
    }

    #[test]
    fn test_point_round_trip() {
        let (graph, plans) = compile("point = { x: int, y: int }");
        let codec = Codec::new(&graph, &plans);
        let instance = json!({ "x": 1, "y": -2 });
        let value = codec.encode_value("point", &instance).unwrap();
        assert_eq!(
            value,
            Value::Map(vec![(Value::from("x"), Value::Uint(1)), (Value::from("y"), Value::Nint(1))])
        );
        let bytes = value.encode();
        assert_eq!(bytes, vec![0xa2, 0x61, b'x', 0x01, 0x61, b'y', 0x21]);
        assert_eq!(codec.decode("point", &bytes).unwrap(), instance);
    }

    #[test]
    fn test_choice_picks_the_right_variant() {
        let (graph, plans) = compile("shape = circle / square\ncircle = { radius: int }\nsquare = { side: int }");
        let codec = Codec::new(&graph, &plans);
        let bytes = codec.encode("shape", &json!({ "Circle": { "radius": 5 } })).unwrap();
        assert_eq!(codec.decode("shape", &bytes).unwrap(), json!({ "Circle": { "radius": 5 } }));
        let bytes = codec.encode("shape", &json!({ "Square": { "side": 2 } })).unwrap();
        assert_eq!(codec.decode("shape", &bytes).unwrap(), json!({ "Square": { "side": 2 } }));
    }

    #[test]
    fn test_overlapping_alternatives_pick_the_first_declared() {
        let (graph, plans) = compile("c = a / b / d\na = { n: uint }\nb = { n: int }\nd = { n: int }");
        let codec = Codec::new(&graph, &plans);
        // Written as B, but A is declared first and accepts it.
        let bytes = codec.encode("c", &json!({ "B": { "n": 3 } })).unwrap();
        assert_eq!(codec.decode("c", &bytes).unwrap(), json!({ "A": { "n": 3 } }));
        let bytes = codec.encode("c", &json!({ "D": { "n": -3 } })).unwrap();
        assert_eq!(codec.decode("c", &bytes).unwrap(), json!({ "B": { "n": -3 } }));

        // { "n": "" } fits none of them.
        match codec.decode("c", &[0xa1, 0x61, b'n', 0x60]) {
            Err(CddlError::Decode(e)) => assert_eq!(e.kind, DecodeErrorKind::NoMatchingAlternative("C".to_owned())),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let (graph, plans) = compile("person = { name: tstr, ? age: uint }");
        let codec = Codec::new(&graph, &plans);
        let value = codec.encode_value("person", &json!({ "name": "ada" })).unwrap();
        assert_eq!(value, Value::Map(vec![(Value::from("name"), Value::from("ada"))]));
        assert_eq!(codec.decode_value("person", &value).unwrap(), json!({ "name": "ada", "age": null }));
        let value = codec.encode_value("person", &json!({ "name": "ada", "age": 36 })).unwrap();
        assert_eq!(codec.decode_value("person", &value).unwrap(), json!({ "name": "ada", "age": 36 }));
    }

    #[test]
    fn test_arrays_tables_and_literals() {
        let (graph, plans) = compile(
            "tx = [0, inputs: [* uint], ? memo: tstr]\nledger = { * tstr => uint }\ncolor = &(red: 0, green: 1)\nblob = bytes .size (1..4)",
        );
        let codec = Codec::new(&graph, &plans);

        let bytes = codec.encode("tx", &json!({ "inputs": [1, 2], "memo": null })).unwrap();
        assert_eq!(bytes, vec![0x82, 0x00, 0x82, 0x01, 0x02]);
        assert_eq!(codec.decode("tx", &bytes).unwrap(), json!({ "inputs": [1, 2], "memo": null }));

        let bytes = codec.encode("ledger", &json!([["b", 2], ["a", 1]])).unwrap();
        assert_eq!(codec.decode("ledger", &bytes).unwrap(), json!([["a", 1], ["b", 2]]));

        let bytes = codec.encode("color", &json!("Green")).unwrap();
        assert_eq!(bytes, vec![0x01]);
        assert_eq!(codec.decode("color", &bytes).unwrap(), json!("Green"));

        assert!(codec.encode("blob", &json!([1, 2])).is_ok());
        assert!(matches!(codec.encode("blob", &json!([])), Err(CddlError::InvalidInstance { .. })));
        assert!(matches!(codec.decode("blob", &[0x40]), Err(CddlError::Decode(_))));
    }

    #[test]
    fn test_errors_carry_paths() {
        let (graph, plans) = compile("outer = { points: [* point] }\npoint = { x: uint, y: uint }");
        let codec = Codec::new(&graph, &plans);
        match codec.encode("outer", &json!({ "points": [{ "x": 1, "y": 2 }, { "x": 1, "y": -1 }] })) {
            Err(CddlError::InvalidInstance { path, .. }) => assert_eq!(path, "$.points[1].y"),
            other => panic!("unexpected {:?}", other),
        }

        // { "points": [ { "x": 1 } ] }
        let bytes = [0xa1, 0x66, b'p', b'o', b'i', b'n', b't', b's', 0x81, 0xa1, 0x61, b'x', 0x01];
        match codec.decode("outer", &bytes) {
            Err(CddlError::Decode(e)) => {
                assert_eq!(e.path.to_string(), "$.points[0].y");
                assert_eq!(e.kind, DecodeErrorKind::MissingField);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
