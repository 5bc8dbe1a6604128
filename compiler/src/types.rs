use std::collections::HashMap;

use brine_cddl_runtime::Value;
use indexmap::IndexMap;
use serde::Serialize;

pub use crate::ast::Occurrence;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    /// Negative integers only, generated as the runtime `Nint`.
    Nint,
    F32,
    F64,
    Text,
    Bytes,
    Any,
}

impl Primitive {
    /// Name used in stable names and the schema export.
    pub fn schema_name(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "uint",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "int",
            Primitive::Nint => "nint",
            Primitive::F32 => "float32",
            Primitive::F64 => "float",
            Primitive::Text => "text",
            Primitive::Bytes => "bytes",
            Primitive::Any => "any",
        }
    }

    pub fn rust_type(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::Nint => "Nint",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::Text => "String",
            Primitive::Bytes => "Vec<u8>",
            Primitive::Any => "Value",
        }
    }

    /// Inclusive value range of the integer primitives.
    pub fn int_bounds(&self) -> Option<(i128, i128)> {
        match self {
            Primitive::U8 => Some((0, u8::MAX as i128)),
            Primitive::U16 => Some((0, u16::MAX as i128)),
            Primitive::U32 => Some((0, u32::MAX as i128)),
            Primitive::U64 => Some((0, u64::MAX as i128)),
            Primitive::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            Primitive::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            Primitive::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Primitive::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            Primitive::Nint => Some((i64::MIN as i128, -1)),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.int_bounds().is_some()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    /// Integer primitives whose range is exactly `min..=max`.
    pub fn exact_integer(min: i128, max: i128) -> Option<Primitive> {
        INTEGERS.iter().copied().find(|p| p.int_bounds() == Some((min, max)))
    }

    /// Smallest integer primitive that holds every value of `min..=max`.
    pub fn covering_integer(min: i128, max: i128) -> Option<Primitive> {
        INTEGERS
            .iter()
            .copied()
            .filter(|p| *p != Primitive::Nint)
            .find(|p| p.int_bounds().map_or(false, |(lo, hi)| lo <= min && max <= hi))
    }
}

const INTEGERS: [Primitive; 9] = [
    Primitive::U8,
    Primitive::U16,
    Primitive::U32,
    Primitive::U64,
    Primitive::I8,
    Primitive::I16,
    Primitive::I32,
    Primitive::I64,
    Primitive::Nint,
];

/// A literal the schema pins a position to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FixedValue {
    Int(i128),
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Null,
    Undefined,
}

impl FixedValue {
    pub fn to_value(&self) -> Option<Value> {
        Some(match self {
            FixedValue::Int(v) => return Value::from_i128(*v),
            FixedValue::Text(v) => Value::Text(v.clone()),
            FixedValue::Bytes(v) => Value::Bytes(v.clone()),
            FixedValue::Bool(v) => Value::Bool(*v),
            FixedValue::Null => Value::Null,
            FixedValue::Undefined => Value::Undefined,
        })
    }

    /// Rust expression that builds the runtime [Value] for this literal.
    pub fn value_expr(&self) -> String {
        match self {
            FixedValue::Int(v) if *v >= 0 => format!("Value::Uint({})", v),
            FixedValue::Int(v) => format!("Value::Nint({})", -1 - v),
            FixedValue::Text(v) => format!("Value::Text({}.to_owned())", crate::utils::quote(v)),
            FixedValue::Bytes(v) => format!("Value::Bytes(vec!{:?})", v),
            FixedValue::Bool(v) => format!("Value::Bool({})", v),
            FixedValue::Null => "Value::Null".to_owned(),
            FixedValue::Undefined => "Value::Undefined".to_owned(),
        }
    }

    /// Human readable form, also used to derive names.
    pub fn label(&self) -> String {
        match self {
            FixedValue::Int(v) if *v < 0 => format!("neg{}", -v),
            FixedValue::Int(v) => v.to_string(),
            FixedValue::Text(v) => v.clone(),
            FixedValue::Bytes(v) => format!("h{}", v.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
            FixedValue::Bool(v) => v.to_string(),
            FixedValue::Null => "null".to_owned(),
            FixedValue::Undefined => "undefined".to_owned(),
        }
    }
}

/// Reference from one place in the graph to a type. `Named` is a
/// back-reference by stable name, never ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeRef {
    Primitive(Primitive),
    Fixed(FixedValue),
    Named(String),
    /// `T / null`: present-or-null, encoded as CBOR null when absent.
    Optional(Box<TypeRef>),
    Array { element: Box<TypeRef>, occurrence: Occurrence },
    Map { key: Box<TypeRef>, value: Box<TypeRef> },
    Tagged { tag: u64, inner: Box<TypeRef> },
    /// `bytes .cbor T`
    CborBytes(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: &str) -> TypeRef {
        TypeRef::Named(name.to_owned())
    }

    /// Every stable name this reference mentions.
    pub fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeRef::Primitive(_) | TypeRef::Fixed(_) => {}
            TypeRef::Named(name) => out.push(name),
            TypeRef::Optional(inner) | TypeRef::CborBytes(inner) | TypeRef::Tagged { inner, .. } => {
                inner.collect_names(out)
            }
            TypeRef::Array { element, .. } => element.collect_names(out),
            TypeRef::Map { key, value } => {
                key.collect_names(out);
                value.collect_names(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Rust field identifier, unique within the record.
    pub name:       String,
    /// Map key. `None` for positional fields.
    pub key:        Option<FixedValue>,
    pub ty:         TypeRef,
    pub occurrence: Occurrence,
    pub doc:        Option<String>,
}

impl Field {
    pub fn is_optional(&self) -> bool {
        self.occurrence.is_optional()
    }

    pub fn is_repeated(&self) -> bool {
        self.occurrence.is_repeated()
    }

    /// Fixed fields carry no data and have no native field.
    pub fn fixed_value(&self) -> Option<&FixedValue> {
        match &self.ty {
            TypeRef::Fixed(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variant {
    pub name: String,
    pub ty:   TypeRef,
    pub doc:  Option<String>,
}

/// Inclusive bounds of a wrapper. For text and bytes they bound the length,
/// for integers the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub min: Option<i128>,
    pub max: Option<i128>,
}

impl Bounds {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: i128) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Shape {
    /// Map with bareword (text) keys.
    Record(Record),
    /// Positional fields in an array.
    Array(Record),
    Choice { variants: Vec<Variant> },
    /// A primitive with bounds or `@newtype`.
    Wrapper { inner: TypeRef, bounds: Bounds },
    /// Map whose keys include literal (integer or text) keys.
    MapFixedKeys(Record),
    /// `{ * key => value }`
    MapVariableKeys { key: TypeRef, value: TypeRef },
    Alias(TypeRef),
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Record(_) => "record",
            Shape::Array(_) => "array",
            Shape::Choice { .. } => "choice",
            Shape::Wrapper { .. } => "wrapper",
            Shape::MapFixedKeys(_) => "map_fixed_keys",
            Shape::MapVariableKeys { .. } => "map_variable_keys",
            Shape::Alias(_) => "alias",
        }
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Shape::Record(record) | Shape::Array(record) | Shape::MapFixedKeys(record) => Some(record),
            _ => None,
        }
    }
}

/// Key used to deduplicate instantiations of generic rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GenericInstantiation {
    pub rule: String,
    pub args: Vec<TypeRef>,
}

/// Recorded when resolution meets a type that is still being resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackReference {
    pub from: String,
    pub to:   String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedType {
    /// Stable name: the rule name, `rule<args>` for instantiations, or a
    /// generated name for anonymous inline types.
    pub name:        String,
    /// Rust identifier.
    pub ident:       String,
    pub shape:       Shape,
    pub tag:         Option<u64>,
    pub doc:         Option<String>,
    pub instance_of: Option<GenericInstantiation>,
    /// Sits on a reference cycle.
    pub recursive:   bool,
}

impl ResolvedType {
    /// Stable names this node references directly.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match &self.shape {
            Shape::Record(record) | Shape::Array(record) | Shape::MapFixedKeys(record) => {
                for field in &record.fields {
                    field.ty.collect_names(&mut out);
                }
            }
            Shape::Choice { variants } => {
                for variant in variants {
                    variant.ty.collect_names(&mut out);
                }
            }
            Shape::Wrapper { inner, .. } | Shape::Alias(inner) => inner.collect_names(&mut out),
            Shape::MapVariableKeys { key, value } => {
                key.collect_names(&mut out);
                value.collect_names(&mut out);
            }
        }
        out
    }
}

/// The closed, immutable type graph: an arena of nodes keyed by stable name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeGraph {
    pub types:           IndexMap<String, ResolvedType>,
    pub roots:           Vec<String>,
    pub back_references: Vec<BackReference>,
    pub instantiations:  Vec<(GenericInstantiation, String)>,
    /// Strongly connected component of every node.
    #[serde(skip)]
    pub components:      HashMap<String, usize>,
}

impl TypeGraph {
    pub fn get(&self, name: &str) -> Option<&ResolvedType> {
        self.types.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedType> {
        self.types.values()
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn ident<'s>(&'s self, name: &'s str) -> &'s str {
        self.types.get(name).map(|t| t.ident.as_str()).unwrap_or(name)
    }

    /// Follow aliases (not wrappers) to the reference they stand for.
    pub fn unalias<'a>(&'a self, ty: &'a TypeRef) -> &'a TypeRef {
        let mut current = ty;
        // Alias chains are finite: the verifier rejects alias cycles.
        for _ in 0..self.types.len() + 1 {
            match current {
                TypeRef::Named(name) => match self.types.get(name).map(|t| &t.shape) {
                    Some(Shape::Alias(inner)) => current = inner,
                    _ => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// A reference from `from` to `to` closes a cycle and needs indirection.
    pub fn needs_box(&self, from: &str, to: &str) -> bool {
        match (self.components.get(from), self.components.get(to)) {
            (Some(a), Some(b)) => a == b && self.types.get(to).map_or(false, |t| t.recursive),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_primitives() {
        assert_eq!(Primitive::exact_integer(0, 255), Some(Primitive::U8));
        assert_eq!(Primitive::exact_integer(-128, 127), Some(Primitive::I8));
        assert_eq!(Primitive::exact_integer(0, 100), None);
        assert_eq!(Primitive::covering_integer(0, 100), Some(Primitive::U8));
        assert_eq!(Primitive::covering_integer(-1, 300), Some(Primitive::I16));
        assert_eq!(Primitive::covering_integer(0, u64::MAX as i128 + 1), None);
    }

    #[test]
    fn test_fixed_values() {
        assert_eq!(FixedValue::Int(-3).value_expr(), "Value::Nint(2)");
        assert_eq!(FixedValue::Int(-3).to_value(), Some(Value::Nint(2)));
        assert_eq!(FixedValue::Text("a".into()).value_expr(), "Value::Text(\"a\".to_owned())");
        assert_eq!(FixedValue::Bytes(vec![1, 2]).value_expr(), "Value::Bytes(vec![1, 2])");
        assert_eq!(FixedValue::Int(-3).label(), "neg3");
    }

    #[test]
    fn test_collect_names() {
        let ty = TypeRef::Map {
            key:   Box::new(TypeRef::named("k")),
            value: Box::new(TypeRef::Optional(Box::new(TypeRef::Array {
                element:    Box::new(TypeRef::named("v")),
                occurrence: Occurrence::ZERO_OR_MORE,
            }))),
        };
        let mut names = vec![];
        ty.collect_names(&mut names);
        assert_eq!(names, vec!["k", "v"]);
    }

    #[test]
    fn test_ident_falls_back_to_the_name() {
        let graph = TypeGraph::default();
        let name = format!("{}<{}>", "pair", "uint");
        assert_eq!(graph.ident(&name), "pair<uint>");
    }
}
