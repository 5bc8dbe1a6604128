//! Encoding decisions for every node of the type graph.
//!
//! The plan is derived data: it can always be recomputed from the graph and
//! the run's [EncodingPolicy]. The native backend and the reference codec
//! both follow it, which is what keeps them byte-for-byte in agreement.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::CddlError,
    types::{Field, FixedValue, Primitive, Record, ResolvedType, Shape, TypeGraph, TypeRef},
    utils::quote,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayLength {
    #[default]
    Definite,
    Indefinite,
}

/// Global policy, fixed for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingPolicy {
    /// Length encoding of homogeneous arrays. Decoders accept both.
    pub array_length:        ArrayLength,
    /// Sort map entries by encoded key (length first, then bytewise).
    pub canonical_map_order: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Integer,
    Text,
    Mixed,
}

/// How a choice finds the alternative an encoded item belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Discriminant {
    /// Every alternative carries a distinct CBOR tag, listed per variant.
    CborTag { tags: Vec<u64> },
    /// Every alternative is a distinct literal.
    Literal,
    /// Every alternative is an array whose first item is a distinct literal.
    LeadingValue { values: Vec<FixedValue> },
    /// Every alternative is a map with a distinct literal under `key`.
    KeyValue { key: FixedValue, values: Vec<FixedValue> },
    /// Decode each alternative in declaration order; the first success wins.
    TryInOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    /// Positional fields. `slots` are field indices in encoding order.
    Array { min_len: usize, max_len: Option<usize>, slots: Vec<usize> },
    /// Keyed fields. `slots` are field indices in encoding order.
    Map { key_kind: KeyKind, slots: Vec<usize> },
    Choice { discriminant: Discriminant },
    /// Encoded exactly like the type it wraps or aliases.
    Transparent,
    /// Map with variable keys.
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodingPlan {
    pub tag:    Option<u64>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Plans {
    pub plans:  IndexMap<String, EncodingPlan>,
    pub policy: EncodingPolicy,
}

impl Plans {
    pub fn get(&self, name: &str) -> Option<&EncodingPlan> {
        self.plans.get(name)
    }
}

/// Plan every node of `graph`. Layout rules the resolved shapes cannot
/// express (an optional field in the middle of an array, a repeated map
/// entry, ...) are reported as [CddlError::UnsupportedConstruct].
pub fn plan_graph(graph: &TypeGraph, policy: &EncodingPolicy) -> Result<Plans, CddlError> {
    let mut plans = IndexMap::new();
    for ty in graph.iter() {
        let plan = plan_type(graph, ty, policy)?;
        debug!(name = %ty.name, layout = ?plan.layout, "planned type");
        plans.insert(ty.name.clone(), plan);
    }
    Ok(Plans { plans, policy: policy.clone() })
}

pub fn plan_type(graph: &TypeGraph, ty: &ResolvedType, policy: &EncodingPolicy) -> Result<EncodingPlan, CddlError> {
    let layout = match &ty.shape {
        Shape::Array(record) => plan_array(ty, record)?,
        Shape::Record(record) | Shape::MapFixedKeys(record) => plan_map(ty, record, policy)?,
        Shape::Choice { variants } => {
            let refs: Vec<&TypeRef> = variants.iter().map(|v| &v.ty).collect();
            Layout::Choice { discriminant: choose_discriminant(graph, ty, &refs) }
        }
        Shape::MapVariableKeys { key, .. } => {
            check_table_key(graph, ty, key)?;
            Layout::Table
        }
        Shape::Wrapper { .. } | Shape::Alias(_) => Layout::Transparent,
    };
    check_nested_tables(graph, ty)?;
    Ok(EncodingPlan { tag: ty.tag, layout })
}

fn check_fixed_field(ty: &ResolvedType, field: &Field) -> Result<(), CddlError> {
    if field.fixed_value().is_some() && !field.occurrence.is_one() {
        return Err(CddlError::unsupported(
            &ty.name,
            format!("field {} holds a literal and must occur exactly once", quote(&field.name)),
        ));
    }
    Ok(())
}

fn plan_array(ty: &ResolvedType, record: &Record) -> Result<Layout, CddlError> {
    let last = record.fields.len().saturating_sub(1);
    let mut min_len = 0usize;
    let mut max_len = Some(0usize);

    for (i, field) in record.fields.iter().enumerate() {
        check_fixed_field(ty, field)?;
        if field.is_optional() && i != last {
            return Err(CddlError::unsupported(
                &ty.name,
                format!("optional field {} must be the last item of the array", quote(&field.name)),
            ));
        }
        if field.is_repeated() && i != last {
            return Err(CddlError::unsupported(
                &ty.name,
                format!("repeated field {} must be the last item of the array", quote(&field.name)),
            ));
        }
        min_len += field.occurrence.min as usize;
        max_len = match (max_len, field.occurrence.max) {
            (Some(total), Some(max)) => Some(total + max as usize),
            _ => None,
        };
    }

    Ok(Layout::Array { min_len, max_len, slots: (0..record.fields.len()).collect() })
}

fn plan_map(ty: &ResolvedType, record: &Record, policy: &EncodingPolicy) -> Result<Layout, CddlError> {
    let mut seen = HashSet::new();
    let mut has_int = false;
    let mut has_text = false;
    let mut keyed = Vec::with_capacity(record.fields.len());

    for (i, field) in record.fields.iter().enumerate() {
        check_fixed_field(ty, field)?;
        let key = match &field.key {
            Some(key) => key,
            None => return Err(CddlError::unsupported(&ty.name, format!("field {} has no key", quote(&field.name)))),
        };
        if field.is_repeated() {
            return Err(CddlError::unsupported(
                &ty.name,
                format!("map entry {} may occur only once", quote(&field.name)),
            ));
        }
        if !seen.insert(key.clone()) {
            return Err(CddlError::unsupported(&ty.name, format!("duplicate map key {}", key.label())));
        }
        let encoded = match key.to_value() {
            Some(value) => value.encode(),
            None => return Err(CddlError::unsupported(&ty.name, format!("map key {} is out of range", key.label()))),
        };
        match key {
            FixedValue::Int(_) => has_int = true,
            _ => has_text = true,
        }
        keyed.push((encoded, i));
    }

    if policy.canonical_map_order {
        keyed.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    }
    let key_kind = match (has_int, has_text) {
        (true, true) => KeyKind::Mixed,
        (true, false) => KeyKind::Integer,
        _ => KeyKind::Text,
    };
    Ok(Layout::Map { key_kind, slots: keyed.into_iter().map(|(_, i)| i).collect() })
}

/// Tag carried by whatever `ty` encodes to, if any.
fn carried_tag(graph: &TypeGraph, ty: &TypeRef) -> Option<u64> {
    match graph.unalias(ty) {
        TypeRef::Tagged { tag, .. } => Some(*tag),
        TypeRef::Named(name) => graph.get(name).and_then(|t| t.tag),
        _ => None,
    }
}

fn fixed_of<'a>(graph: &'a TypeGraph, ty: &'a TypeRef) -> Option<&'a FixedValue> {
    match graph.unalias(ty) {
        TypeRef::Fixed(value) => Some(value),
        _ => None,
    }
}

/// The untagged record behind `ty`, with its shape.
fn record_of<'a>(graph: &'a TypeGraph, ty: &'a TypeRef) -> Option<&'a Shape> {
    match graph.unalias(ty) {
        TypeRef::Named(name) => graph.get(name).filter(|t| t.tag.is_none()).map(|t| &t.shape),
        _ => None,
    }
}

fn distinct<T: PartialEq>(values: &[T]) -> bool {
    values.iter().enumerate().all(|(i, v)| !values[..i].contains(v))
}

pub fn choose_discriminant(graph: &TypeGraph, ty: &ResolvedType, variants: &[&TypeRef]) -> Discriminant {
    let tags: Option<Vec<u64>> = variants.iter().map(|v| carried_tag(graph, v)).collect();
    if let Some(tags) = tags {
        if distinct(&tags) {
            return Discriminant::CborTag { tags };
        }
    }

    let literals: Option<Vec<&FixedValue>> = variants.iter().map(|v| fixed_of(graph, v)).collect();
    if let Some(literals) = literals {
        if distinct(&literals) {
            return Discriminant::Literal;
        }
    }

    let leading: Option<Vec<FixedValue>> = variants
        .iter()
        .map(|v| match record_of(graph, v) {
            Some(Shape::Array(record)) => record.fields.first().and_then(|f| f.fixed_value()).cloned(),
            _ => None,
        })
        .collect();
    if let Some(values) = leading {
        if distinct(&values) {
            return Discriminant::LeadingValue { values };
        }
    }

    if let Some(discriminant) = key_value_discriminant(graph, variants) {
        return discriminant;
    }

    if overlapping(graph, variants) {
        warn!(
            name = %ty.name,
            "alternatives of {} overlap structurally; decoding picks the first declared match",
            quote(&ty.name)
        );
    }
    Discriminant::TryInOrder
}

fn key_value_discriminant(graph: &TypeGraph, variants: &[&TypeRef]) -> Option<Discriminant> {
    let records: Option<Vec<&Record>> = variants
        .iter()
        .map(|v| match record_of(graph, v) {
            Some(Shape::Record(record)) | Some(Shape::MapFixedKeys(record)) => Some(record),
            _ => None,
        })
        .collect();
    let records = records?;
    let first = records.first()?;

    for candidate in first.fields.iter().filter(|f| f.fixed_value().is_some()) {
        let key = candidate.key.as_ref()?;
        let values: Option<Vec<FixedValue>> = records
            .iter()
            .map(|record| {
                record
                    .fields
                    .iter()
                    .find(|f| f.key.as_ref() == Some(key) && f.occurrence.is_one())
                    .and_then(|f| f.fixed_value())
                    .cloned()
            })
            .collect();
        if let Some(values) = values {
            if distinct(&values) {
                return Some(Discriminant::KeyValue { key: key.clone(), values });
            }
        }
    }
    None
}

/// Coarse CBOR major-type classes an encoded reference can start with.
fn classes(graph: &TypeGraph, ty: &TypeRef, out: &mut Vec<&'static str>, depth: usize) {
    if depth > 16 {
        out.push("any");
        return;
    }
    match graph.unalias(ty) {
        TypeRef::Primitive(p) => out.push(match p {
            Primitive::Bool => "simple",
            Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64 => "uint",
            Primitive::Nint => "nint",
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64 => "int",
            Primitive::F32 | Primitive::F64 => "float",
            Primitive::Text => "text",
            Primitive::Bytes => "bytes",
            Primitive::Any => "any",
        }),
        TypeRef::Fixed(value) => out.push(match value {
            FixedValue::Int(v) if *v >= 0 => "uint",
            FixedValue::Int(_) => "nint",
            FixedValue::Text(_) => "text",
            FixedValue::Bytes(_) => "bytes",
            _ => "simple",
        }),
        TypeRef::Optional(inner) => {
            out.push("simple");
            classes(graph, inner, out, depth + 1);
        }
        TypeRef::Array { .. } => out.push("array"),
        TypeRef::Map { .. } => out.push("map"),
        TypeRef::Tagged { .. } => out.push("tag"),
        TypeRef::CborBytes(_) => out.push("bytes"),
        TypeRef::Named(name) => match graph.get(name) {
            Some(t) if t.tag.is_some() => out.push("tag"),
            Some(t) => match &t.shape {
                Shape::Record(_) | Shape::MapFixedKeys(_) | Shape::MapVariableKeys { .. } => out.push("map"),
                Shape::Array(_) => out.push("array"),
                Shape::Choice { variants } => {
                    for variant in variants {
                        classes(graph, &variant.ty, out, depth + 1);
                    }
                }
                Shape::Wrapper { inner, .. } | Shape::Alias(inner) => classes(graph, inner, out, depth + 1),
            },
            None => out.push("any"),
        },
    }
}

fn overlapping(graph: &TypeGraph, variants: &[&TypeRef]) -> bool {
    let sets: Vec<Vec<&'static str>> = variants
        .iter()
        .map(|v| {
            let mut out = Vec::new();
            classes(graph, v, &mut out, 0);
            out
        })
        .collect();
    let meets = |a: &str, b: &str| {
        a == b || a == "any" || b == "any" || (a == "int" && (b == "uint" || b == "nint")) || (b == "int" && (a == "uint" || a == "nint"))
    };
    sets.iter().enumerate().any(|(i, a)| {
        sets[..i].iter().any(|b| a.iter().any(|x| b.iter().any(|y| meets(x, y))))
    })
}

/// Table keys end up in a `BTreeMap`, so they need a total order.
fn check_table_key(graph: &TypeGraph, ty: &ResolvedType, key: &TypeRef) -> Result<(), CddlError> {
    let ok = match graph.unalias(key) {
        TypeRef::Primitive(p) => !p.is_float() && *p != Primitive::Any,
        TypeRef::Named(name) => match graph.get(name).map(|t| &t.shape) {
            Some(Shape::Wrapper { inner: TypeRef::Primitive(p), .. }) => !p.is_float() && *p != Primitive::Any,
            _ => false,
        },
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(CddlError::unsupported(&ty.name, "table keys must be integers, text, bytes or bool"))
    }
}

/// Tables nested inside fields or variants get the same key check.
fn check_nested_tables(graph: &TypeGraph, ty: &ResolvedType) -> Result<(), CddlError> {
    fn walk(graph: &TypeGraph, owner: &ResolvedType, r: &TypeRef) -> Result<(), CddlError> {
        match r {
            TypeRef::Map { key, value } => {
                check_table_key(graph, owner, key)?;
                walk(graph, owner, value)
            }
            TypeRef::Optional(inner) | TypeRef::CborBytes(inner) | TypeRef::Tagged { inner, .. } => walk(graph, owner, inner),
            TypeRef::Array { element, .. } => walk(graph, owner, element),
            _ => Ok(()),
        }
    }
    match &ty.shape {
        Shape::Record(record) | Shape::Array(record) | Shape::MapFixedKeys(record) => {
            record.fields.iter().try_for_each(|f| walk(graph, ty, &f.ty))
        }
        Shape::Choice { variants } => variants.iter().try_for_each(|v| walk(graph, ty, &v.ty)),
        Shape::Wrapper { inner, .. } | Shape::Alias(inner) => walk(graph, ty, inner),
        Shape::MapVariableKeys { value, .. } => walk(graph, ty, value),
    }
}
