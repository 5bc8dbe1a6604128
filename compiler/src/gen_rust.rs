//! Native backend: one Rust item per graph node, with `ToCbor` and
//! `FromCbor` impls that follow the node's encoding plan.

use tracing::debug;

use crate::{
    error::CddlError,
    plan::{ArrayLength, Discriminant, EncodingPlan, Layout, Plans},
    templates::{render, NATIVE_PRELUDE},
    types::{Bounds, Field, FixedValue, Primitive, Record, ResolvedType, Shape, TypeGraph, TypeRef, Variant},
    utils::{quote, to_snake_case},
};

/// Render the `lib.rs` of the native crate.
pub fn compile_graph_to_rust(graph: &TypeGraph, plans: &Plans, sources: &[String]) -> Result<String, CddlError> {
    let generator = RustGenerator::new(graph, plans, "");
    let mut rust_code: Vec<String> = Vec::new();

    rust_code.push(render(NATIVE_PRELUDE, &[("sources", &sources.join(", "))]));

    for ty in graph.iter() {
        let plan = plans
            .get(&ty.name)
            .ok_or_else(|| CddlError::VerifierError(format!("No encoding plan for {}", quote(&ty.name))))?;
        rust_code.push(generator.generate_type(ty, plan)?);
    }

    debug!(types = graph.len(), "rendered native crate");
    Ok(rust_code.join("\n"))
}

pub(crate) struct RustGenerator<'a> {
    graph:  &'a TypeGraph,
    plans:  &'a Plans,
    /// Path of the native crate as seen from the generated code.
    prefix: &'a str,
}

/// Doc comment lines for an item, or nothing.
fn doc_comment(doc: &Option<String>, indent: &str) -> String {
    match doc {
        Some(doc) => doc.lines().map(|line| format!("{}/// {}\n", indent, line).replace("/// \n", "///\n")).collect(),
        None => String::new(),
    }
}

fn option_expr(value: Option<usize>) -> String {
    match value {
        Some(value) => format!("Some({})", value),
        None => "None".to_owned(),
    }
}

fn bound_expr(value: Option<i128>) -> String {
    match value {
        Some(value) => format!("Some({})", value),
        None => "None".to_owned(),
    }
}

/// Wrap an encoded expression in the node's tag.
fn tagged(tag: Option<u64>, expr: String) -> String {
    match tag {
        Some(tag) => format!("Value::Tag({}, Box::new({}))", tag, expr),
        None => expr,
    }
}

/// Name for a local that must not shadow any of `fields`.
fn local_name(base: &str, fields: &[Field]) -> String {
    let mut name = base.to_owned();
    while fields.iter().any(|f| f.name == name) {
        name.push('_');
    }
    name
}

impl<'a> RustGenerator<'a> {
    pub(crate) fn new(graph: &'a TypeGraph, plans: &'a Plans, prefix: &'a str) -> RustGenerator<'a> {
        RustGenerator { graph, plans, prefix }
    }

    /// Aliases without a tag that are not on a cycle become `pub type` items,
    /// and their codecs are expanded at every use.
    pub(crate) fn is_inline_alias(&self, ty: &ResolvedType) -> bool {
        matches!(ty.shape, Shape::Alias(_) | Shape::MapVariableKeys { .. }) && !ty.recursive && ty.tag.is_none()
    }

    /// The reference an inline alias stands for.
    pub(crate) fn inline_target(&self, name: &str) -> Option<TypeRef> {
        let ty = self.graph.get(name).filter(|t| self.is_inline_alias(t))?;
        match &ty.shape {
            Shape::Alias(inner) => Some(inner.clone()),
            Shape::MapVariableKeys { key, value } => {
                Some(TypeRef::Map { key: Box::new(key.clone()), value: Box::new(value.clone()) })
            }
            _ => None,
        }
    }

    pub(crate) fn boxed(&self, owner: &str, name: &str, boxed_ok: bool) -> bool {
        boxed_ok && self.graph.needs_box(owner, name)
    }

    pub(crate) fn is_unit(&self, ty: &TypeRef) -> Option<FixedValue> {
        match self.graph.unalias(ty) {
            TypeRef::Fixed(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Rust type of a reference held by `owner`. Direct references around a
    /// cycle are boxed; `Vec` and `BTreeMap` already provide indirection.
    pub(crate) fn rust_type(&self, ty: &TypeRef, owner: &str, boxed_ok: bool) -> String {
        match ty {
            TypeRef::Primitive(p) => p.rust_type().to_owned(),
            TypeRef::Fixed(_) => "()".to_owned(),
            TypeRef::Named(name) => {
                let ident = format!("{}{}", self.prefix, self.graph.ident(name));
                if self.boxed(owner, name, boxed_ok) {
                    format!("Box<{}>", ident)
                } else {
                    ident
                }
            }
            TypeRef::Optional(inner) => format!("Option<{}>", self.rust_type(inner, owner, boxed_ok)),
            TypeRef::Array { element, .. } => format!("Vec<{}>", self.rust_type(element, owner, false)),
            TypeRef::Map { key, value } => format!(
                "BTreeMap<{}, {}>",
                self.rust_type(key, owner, false),
                self.rust_type(value, owner, false)
            ),
            TypeRef::Tagged { inner, .. } | TypeRef::CborBytes(inner) => self.rust_type(inner, owner, boxed_ok),
        }
    }

    fn field_type(&self, field: &Field, owner: &str) -> String {
        if field.is_repeated() {
            format!("Vec<{}>", self.rust_type(&field.ty, owner, false))
        } else if field.is_optional() {
            format!("Option<{}>", self.rust_type(&field.ty, owner, true))
        } else {
            self.rust_type(&field.ty, owner, true)
        }
    }

    /// Expression building the `Value` of `place`. `place` is any expression
    /// that can receive a method call on the value, owned or borrowed.
    pub(crate) fn encode_expr(&self, ty: &TypeRef, place: &str, depth: usize) -> String {
        let item = format!("item{}", depth);
        match ty {
            TypeRef::Primitive(Primitive::Bytes) => format!("Value::Bytes({}.clone())", place),
            TypeRef::Primitive(Primitive::Any) => format!("{}.clone()", place),
            TypeRef::Primitive(_) => format!("{}.to_cbor()", place),
            TypeRef::Fixed(value) => value.value_expr(),
            TypeRef::Named(name) => match self.inline_target(name) {
                Some(target) => self.encode_expr(&target, place, depth),
                None => format!("{}.to_cbor()", place),
            },
            TypeRef::Optional(inner) => format!(
                "match {}.as_ref() {{ Some({}) => {}, None => Value::Null }}",
                place,
                item,
                self.encode_expr(inner, &item, depth + 1)
            ),
            TypeRef::Array { element, .. } => {
                let constructor = match self.plans.policy.array_length {
                    ArrayLength::Definite => "Value::Array",
                    ArrayLength::Indefinite => "Value::IndefiniteArray",
                };
                format!(
                    "{}({}.iter().map(|{}| {}).collect())",
                    constructor,
                    place,
                    item,
                    self.encode_expr(element, &item, depth + 1)
                )
            }
            TypeRef::Map { key, value } => {
                let key_item = format!("key{}", depth);
                format!(
                    "Value::Map({}.iter().map(|({}, {})| ({}, {})).collect())",
                    place,
                    key_item,
                    item,
                    self.encode_expr(key, &key_item, depth + 1),
                    self.encode_expr(value, &item, depth + 1)
                )
            }
            TypeRef::Tagged { tag, inner } => {
                format!("Value::Tag({}, Box::new({}))", tag, self.encode_expr(inner, place, depth))
            }
            TypeRef::CborBytes(inner) => format!("Value::Bytes({}.encode())", self.encode_expr(inner, place, depth)),
        }
    }

    /// Expression of type `Result<T, DecodeError>` decoding the `&Value` in `source`.
    pub(crate) fn decode_expr(&self, ty: &TypeRef, source: &str, owner: &str, boxed_ok: bool, depth: usize) -> String {
        let item = format!("item{}", depth);
        match ty {
            TypeRef::Primitive(Primitive::Bytes) => format!("{}.as_bytes().map(<[u8]>::to_vec)", source),
            TypeRef::Primitive(p) => format!("{}::from_cbor({})", p.rust_type(), source),
            TypeRef::Fixed(value) => format!("expect_value({}, &{})", source, value.value_expr()),
            TypeRef::Named(name) => match self.inline_target(name) {
                Some(target) => self.decode_expr(&target, source, owner, boxed_ok, depth),
                None if self.boxed(owner, name, boxed_ok) => {
                    format!("{}{}::from_cbor({}).map(Box::new)", self.prefix, self.graph.ident(name), source)
                }
                None => format!("{}{}::from_cbor({})", self.prefix, self.graph.ident(name), source),
            },
            TypeRef::Optional(inner) => format!(
                "if {}.is_null() {{ Ok(None) }} else {{ {}.map(Some) }}",
                source,
                self.decode_expr(inner, source, owner, boxed_ok, depth)
            ),
            TypeRef::Array { element, occurrence } => format!(
                "decode_array({}, {}, {}, |{}| {})",
                source,
                occurrence.min,
                option_expr(occurrence.max.map(|m| m as usize)),
                item,
                self.decode_expr(element, &item, owner, false, depth + 1)
            ),
            TypeRef::Map { key, value } => {
                let key_item = format!("key{}", depth);
                format!(
                    "decode_table({}, |{}| {}, |{}| {})",
                    source,
                    key_item,
                    self.decode_expr(key, &key_item, owner, false, depth + 1),
                    item,
                    self.decode_expr(value, &item, owner, false, depth + 1)
                )
            }
            TypeRef::Tagged { tag, inner } => format!(
                "expect_tag({}, {}).and_then(|{}| {})",
                source,
                tag,
                item,
                self.decode_expr(inner, &item, owner, boxed_ok, depth + 1)
            ),
            TypeRef::CborBytes(inner) => format!(
                "decode_embedded({}, |{}| {})",
                source,
                item,
                self.decode_expr(inner, &item, owner, boxed_ok, depth + 1)
            ),
        }
    }

    fn generate_type(&self, ty: &ResolvedType, plan: &EncodingPlan) -> Result<String, CddlError> {
        match (&ty.shape, &plan.layout) {
            (Shape::Record(record) | Shape::MapFixedKeys(record), Layout::Map { slots, .. }) => {
                Ok(self.generate_map_record(ty, record, slots))
            }
            (Shape::Array(record), Layout::Array { min_len, max_len, slots }) => {
                Ok(self.generate_array_record(ty, record, *min_len, *max_len, slots))
            }
            (Shape::Choice { variants }, Layout::Choice { discriminant }) => {
                Ok(self.generate_choice(ty, variants, discriminant))
            }
            (Shape::Wrapper { inner, bounds }, _) => Ok(self.generate_wrapper(ty, inner, bounds)),
            (Shape::Alias(_) | Shape::MapVariableKeys { .. }, _) if self.is_inline_alias(ty) => {
                Ok(self.generate_inline_alias(ty))
            }
            (Shape::Alias(inner), _) => Ok(self.generate_newtype(ty, inner)),
            (Shape::MapVariableKeys { key, value }, _) => {
                let table = TypeRef::Map { key: Box::new(key.clone()), value: Box::new(value.clone()) };
                Ok(self.generate_newtype(ty, &table))
            }
            _ => Err(CddlError::VerifierError(format!(
                "The plan of {} does not match its shape ({})",
                quote(&ty.name),
                ty.shape.kind()
            ))),
        }
    }

    fn struct_definition(&self, ty: &ResolvedType, record: &Record) -> String {
        let mut fields = Vec::new();
        let mut params = Vec::new();
        let mut inits = Vec::new();

        for field in record.fields.iter().filter(|f| f.fixed_value().is_none()) {
            let field_type = self.field_type(field, &ty.name);
            fields.push(format!("{}    pub {}: {},", doc_comment(&field.doc, "    "), field.name, field_type));
            if field.is_repeated() {
                inits.push(format!("{}: Vec::new()", field.name));
            } else if field.is_optional() {
                inits.push(format!("{}: None", field.name));
            } else {
                params.push(format!("{}: {}", field.name, field_type));
                inits.push(field.name.clone());
            }
        }

        let body = if fields.is_empty() { ";".to_owned() } else { format!(" {{\n{}\n}}", fields.join("\n")) };
        let init = if inits.is_empty() { String::new() } else { format!(" {{ {} }}", inits.join(", ")) };
        format!(
            "{}#[derive(Clone, Debug, PartialEq)]\npub struct {}{}\n\nimpl {} {{\n    pub fn new({}) -> {} {{\n        {}{}\n    }}\n}}\n",
            doc_comment(&ty.doc, ""),
            ty.ident,
            body,
            ty.ident,
            params.join(", "),
            ty.ident,
            ty.ident,
            init
        )
    }

    fn construct(&self, ty: &ResolvedType, record: &Record) -> String {
        let names: Vec<&str> =
            record.fields.iter().filter(|f| f.fixed_value().is_none()).map(|f| f.name.as_str()).collect();
        if names.is_empty() {
            ty.ident.clone()
        } else {
            format!("{} {{ {} }}", ty.ident, names.join(", "))
        }
    }

    fn untag_statement(&self, ty: &ResolvedType) -> String {
        match ty.tag {
            Some(tag) => format!("        let value = expect_tag(value, {})?;\n", tag),
            None => String::new(),
        }
    }

    fn generate_map_record(&self, ty: &ResolvedType, record: &Record, slots: &[usize]) -> String {
        let mut encode = Vec::new();
        for &slot in slots {
            let field = &record.fields[slot];
            let key = field.key.as_ref().map(FixedValue::value_expr).unwrap_or_else(|| "Value::Null".to_owned());
            if let Some(value) = field.fixed_value() {
                encode.push(format!("        entries.push(({}, {}));", key, value.value_expr()));
            } else if field.is_optional() {
                encode.push(format!(
                    "        if let Some(item0) = self.{}.as_ref() {{\n            entries.push(({}, {}));\n        }}",
                    field.name,
                    key,
                    self.encode_expr(&field.ty, "item0", 1)
                ));
            } else {
                encode.push(format!(
                    "        entries.push(({}, {}));",
                    key,
                    self.encode_expr(&field.ty, &format!("self.{}", field.name), 0)
                ));
            }
        }

        let reader = local_name("reader", &record.fields);
        let mut decode = Vec::new();
        for field in &record.fields {
            let key = field.key.as_ref().map(FixedValue::value_expr).unwrap_or_else(|| "Value::Null".to_owned());
            let name = quote(&field.name);
            if let Some(value) = field.fixed_value() {
                decode.push(format!("        {}.fixed(&{}, {}, &{})?;", reader, key, name, value.value_expr()));
            } else {
                let method = if field.is_optional() { "optional" } else { "required" };
                decode.push(format!(
                    "        let {} = {}.{}(&{}, {}, |item0| {})?;",
                    field.name,
                    reader,
                    method,
                    key,
                    name,
                    self.decode_expr(&field.ty, "item0", &ty.name, true, 1)
                ));
            }
        }

        format!(
            "{}\nimpl ToCbor for {} {{\n    fn to_cbor(&self) -> Value {{\n        let mut entries = Vec::with_capacity({});\n{}\n        {}\n    }}\n}}\n\nimpl FromCbor for {} {{\n    fn from_cbor(value: &Value) -> Result<{}, DecodeError> {{\n{}        let mut {} = MapReader::new(value)?;\n{}\n        {}.finish()?;\n        Ok({})\n    }}\n}}\n",
            self.struct_definition(ty, record),
            ty.ident,
            slots.len(),
            encode.join("\n"),
            tagged(ty.tag, "Value::Map(entries)".to_owned()),
            ty.ident,
            ty.ident,
            self.untag_statement(ty),
            reader,
            decode.join("\n"),
            reader,
            self.construct(ty, record)
        )
    }

    fn generate_array_record(
        &self,
        ty: &ResolvedType,
        record: &Record,
        min_len: usize,
        max_len: Option<usize>,
        slots: &[usize],
    ) -> String {
        let mut encode = Vec::new();
        for &slot in slots {
            let field = &record.fields[slot];
            if let Some(value) = field.fixed_value() {
                encode.push(format!("        items.push({});", value.value_expr()));
            } else if field.is_repeated() {
                encode.push(format!(
                    "        items.extend(self.{}.iter().map(|item0| {}));",
                    field.name,
                    self.encode_expr(&field.ty, "item0", 1)
                ));
            } else if field.is_optional() {
                encode.push(format!(
                    "        if let Some(item0) = self.{}.as_ref() {{\n            items.push({});\n        }}",
                    field.name,
                    self.encode_expr(&field.ty, "item0", 1)
                ));
            } else {
                encode.push(format!(
                    "        items.push({});",
                    self.encode_expr(&field.ty, &format!("self.{}", field.name), 0)
                ));
            }
        }

        let reader = local_name("reader", &record.fields);
        let mut decode = Vec::new();
        for field in &record.fields {
            let name = quote(&field.name);
            if let Some(value) = field.fixed_value() {
                decode.push(format!("        {}.fixed({}, &{})?;", reader, name, value.value_expr()));
            } else if field.is_repeated() {
                decode.push(format!(
                    "        let {} = {}.rest({}, {}, {}, |item0| {})?;",
                    field.name,
                    reader,
                    name,
                    field.occurrence.min,
                    option_expr(field.occurrence.max.map(|m| m as usize)),
                    self.decode_expr(&field.ty, "item0", &ty.name, false, 1)
                ));
            } else {
                let method = if field.is_optional() { "optional" } else { "required" };
                decode.push(format!(
                    "        let {} = {}.{}({}, |item0| {})?;",
                    field.name,
                    reader,
                    method,
                    name,
                    self.decode_expr(&field.ty, "item0", &ty.name, true, 1)
                ));
            }
        }

        format!(
            "{}\nimpl ToCbor for {} {{\n    fn to_cbor(&self) -> Value {{\n        let mut items = Vec::with_capacity({});\n{}\n        {}\n    }}\n}}\n\nimpl FromCbor for {} {{\n    fn from_cbor(value: &Value) -> Result<{}, DecodeError> {{\n{}        let mut {} = ArrayReader::new(value, {}, {})?;\n{}\n        {}.finish()?;\n        Ok({})\n    }}\n}}\n",
            self.struct_definition(ty, record),
            ty.ident,
            min_len,
            encode.join("\n"),
            tagged(ty.tag, "Value::Array(items)".to_owned()),
            ty.ident,
            ty.ident,
            self.untag_statement(ty),
            reader,
            min_len,
            option_expr(max_len),
            decode.join("\n"),
            reader,
            self.construct(ty, record)
        )
    }

    /// Decoder of one variant, as a closure body over `item0`.
    fn variant_decoder(&self, ty: &ResolvedType, variant: &Variant, source: &str) -> String {
        match self.is_unit(&variant.ty) {
            Some(value) => format!("expect_value({}, &{}).map(|_| {}::{})", source, value.value_expr(), ty.ident, variant.name),
            None => format!(
                "{}.map({}::{})",
                self.decode_expr(&variant.ty, source, &ty.name, true, 1),
                ty.ident,
                variant.name
            ),
        }
    }

    fn generate_choice(&self, ty: &ResolvedType, variants: &[Variant], discriminant: &Discriminant) -> String {
        let mut definition = Vec::new();
        let mut encode = Vec::new();
        for variant in variants {
            match self.is_unit(&variant.ty) {
                Some(value) => {
                    definition.push(format!("{}    {},", doc_comment(&variant.doc, "    "), variant.name));
                    encode.push(format!("            {}::{} => {},", ty.ident, variant.name, value.value_expr()));
                }
                None => {
                    definition.push(format!(
                        "{}    {}({}),",
                        doc_comment(&variant.doc, "    "),
                        variant.name,
                        self.rust_type(&variant.ty, &ty.name, true)
                    ));
                    encode.push(format!(
                        "            {}::{}(item0) => {},",
                        ty.ident,
                        variant.name,
                        self.encode_expr(&variant.ty, "item0", 1)
                    ));
                }
            }
        }

        let no_match = format!("Err(no_alternative({}))", quote(&ty.ident));
        let decode = match discriminant {
            Discriminant::TryInOrder => {
                let attempts: Vec<String> = variants
                    .iter()
                    .map(|variant| format!("            |item0| {},", self.variant_decoder(ty, variant, "item0")))
                    .collect();
                format!(
                    "        let attempts: [fn(&Value) -> Result<{}, DecodeError>; {}] = [\n{}\n        ];\n        first_match({}, value, &attempts)",
                    ty.ident,
                    variants.len(),
                    attempts.join("\n"),
                    quote(&ty.ident)
                )
            }
            Discriminant::Literal => {
                let arms: Vec<String> = variants
                    .iter()
                    .filter_map(|variant| {
                        let value = self.is_unit(&variant.ty)?;
                        Some(format!(
                            "        if *value == {} {{\n            return Ok({}::{});\n        }}",
                            value.value_expr(),
                            ty.ident,
                            variant.name
                        ))
                    })
                    .collect();
                format!("{}\n        {}", arms.join("\n"), no_match)
            }
            Discriminant::CborTag { tags } => {
                let arms: Vec<String> = variants
                    .iter()
                    .zip(tags)
                    .map(|(variant, tag)| {
                        format!("            Some({}) => {},", tag, self.variant_decoder(ty, variant, "value"))
                    })
                    .collect();
                format!(
                    "        match tag_number(value) {{\n{}\n            _ => {},\n        }}",
                    arms.join("\n"),
                    no_match
                )
            }
            Discriminant::LeadingValue { values } => {
                let arms: Vec<String> = variants
                    .iter()
                    .zip(values)
                    .map(|(variant, expected)| {
                        format!(
                            "            Some(found) if *found == {} => {},",
                            expected.value_expr(),
                            self.variant_decoder(ty, variant, "value")
                        )
                    })
                    .collect();
                format!(
                    "        match leading_item(value) {{\n{}\n            _ => {},\n        }}",
                    arms.join("\n"),
                    no_match
                )
            }
            Discriminant::KeyValue { key, values } => {
                let arms: Vec<String> = variants
                    .iter()
                    .zip(values)
                    .map(|(variant, expected)| {
                        format!(
                            "            Some(found) if *found == {} => {},",
                            expected.value_expr(),
                            self.variant_decoder(ty, variant, "value")
                        )
                    })
                    .collect();
                format!(
                    "        match map_lookup(value, &{}) {{\n{}\n            _ => {},\n        }}",
                    key.value_expr(),
                    arms.join("\n"),
                    no_match
                )
            }
        };

        format!(
            "{}#[derive(Clone, Debug, PartialEq)]\npub enum {} {{\n{}\n}}\n\nimpl ToCbor for {} {{\n    fn to_cbor(&self) -> Value {{\n        let value = match self {{\n{}\n        }};\n        {}\n    }}\n}}\n\nimpl FromCbor for {} {{\n    fn from_cbor(value: &Value) -> Result<{}, DecodeError> {{\n{}{}\n    }}\n}}\n",
            doc_comment(&ty.doc, ""),
            ty.ident,
            definition.join("\n"),
            ty.ident,
            encode.join("\n"),
            tagged(ty.tag, "value".to_owned()),
            ty.ident,
            ty.ident,
            self.untag_statement(ty),
            decode
        )
    }

    fn generate_wrapper(&self, ty: &ResolvedType, inner: &TypeRef, bounds: &Bounds) -> String {
        let inner_type = self.rust_type(inner, &ty.name, true);
        let orderable = match self.graph.unalias(inner) {
            TypeRef::Primitive(p) => !p.is_float() && *p != Primitive::Any,
            _ => false,
        };
        let derives = if orderable {
            "#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]"
        } else {
            "#[derive(Clone, Debug, PartialEq)]"
        };

        let check = if bounds.is_empty() {
            None
        } else {
            Some(match self.graph.unalias(inner) {
                TypeRef::Primitive(Primitive::Text | Primitive::Bytes) => format!(
                    "check_length(value.len(), {}, {})",
                    bounds.min.unwrap_or(0).max(0),
                    option_expr(bounds.max.map(|m| m.max(0) as usize))
                ),
                _ => format!(
                    "check_range(i128::from(value), {}, {})",
                    bound_expr(bounds.min),
                    bound_expr(bounds.max)
                ),
            })
        };
        let constructor = match &check {
            Some(check) => format!(
                "    pub fn new(value: {}) -> Result<{}, DecodeError> {{\n        {}?;\n        Ok({}(value))\n    }}",
                inner_type, ty.ident, check, ty.ident
            ),
            None => format!("    pub fn new(value: {}) -> {} {{\n        {}(value)\n    }}", inner_type, ty.ident, ty.ident),
        };
        let from_inner = if check.is_some() { format!("{}::new(inner)", ty.ident) } else { format!("Ok({}::new(inner))", ty.ident) };

        format!(
            "{}{}\npub struct {}({});\n\nimpl {} {{\n{}\n\n    pub fn get(&self) -> &{} {{\n        &self.0\n    }}\n\n    pub fn into_inner(self) -> {} {{\n        self.0\n    }}\n}}\n\nimpl ToCbor for {} {{\n    fn to_cbor(&self) -> Value {{\n        {}\n    }}\n}}\n\nimpl FromCbor for {} {{\n    fn from_cbor(value: &Value) -> Result<{}, DecodeError> {{\n{}        let inner = {}?;\n        {}\n    }}\n}}\n",
            doc_comment(&ty.doc, ""),
            derives,
            ty.ident,
            inner_type,
            ty.ident,
            constructor,
            inner_type,
            inner_type,
            ty.ident,
            tagged(ty.tag, self.encode_expr(inner, "self.0", 0)),
            ty.ident,
            ty.ident,
            self.untag_statement(ty),
            self.decode_expr(inner, "value", &ty.name, true, 0),
            from_inner
        )
    }

    /// Recursive or tagged aliases need a nominal type to carry their impls.
    fn generate_newtype(&self, ty: &ResolvedType, inner: &TypeRef) -> String {
        format!(
            "{}#[derive(Clone, Debug, PartialEq)]\npub struct {}(pub {});\n\nimpl ToCbor for {} {{\n    fn to_cbor(&self) -> Value {{\n        {}\n    }}\n}}\n\nimpl FromCbor for {} {{\n    fn from_cbor(value: &Value) -> Result<{}, DecodeError> {{\n{}        {}.map({})\n    }}\n}}\n",
            doc_comment(&ty.doc, ""),
            ty.ident,
            self.rust_type(inner, &ty.name, true),
            ty.ident,
            tagged(ty.tag, self.encode_expr(inner, "self.0", 0)),
            ty.ident,
            ty.ident,
            self.untag_statement(ty),
            self.decode_expr(inner, "value", &ty.name, true, 0),
            ty.ident
        )
    }

    /// `pub type` plus free functions, since a type alias cannot carry impls.
    fn generate_inline_alias(&self, ty: &ResolvedType) -> String {
        let target = match self.inline_target(&ty.name) {
            Some(target) => target,
            None => return String::new(),
        };
        let snake = to_snake_case(&ty.ident);
        // A fixed value encodes to a constant and never reads its argument.
        let param = match self.is_unit(&target) {
            Some(_) => "_value",
            None => "value",
        };
        format!(
            "{}pub type {} = {};\n\npub fn {}_to_cbor({}: &{}) -> Value {{\n    {}\n}}\n\npub fn {}_from_cbor(value: &Value) -> Result<{}, DecodeError> {{\n    {}\n}}\n",
            doc_comment(&ty.doc, ""),
            ty.ident,
            self.rust_type(&target, &ty.name, false),
            snake,
            param,
            ty.ident,
            self.encode_expr(&target, "value", 0),
            snake,
            ty.ident,
            self.decode_expr(&target, "value", &ty.name, false, 0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_document, plan::{plan_graph, EncodingPolicy}, resolver::build_graph};

    fn generate(text: &str) -> String {
        generate_with(text, &EncodingPolicy::default())
    }

    fn generate_with(text: &str, policy: &EncodingPolicy) -> String {
        let doc = parse_document("test.cddl", text).unwrap();
        let graph = build_graph(&[doc], &[]).unwrap();
        let plans = plan_graph(&graph, policy).unwrap();
        compile_graph_to_rust(&graph, &plans, &["test.cddl".to_owned()]).unwrap()
    }

    #[test]
    fn test_prelude() {
        let code = generate("point = { x: int, y: int }");
        assert!(code.starts_with("//! Generated by brine-cddl from test.cddl."));
        assert!(code.contains("use brine_cddl_runtime::{"));
    }

    #[test]
    fn test_map_record() {
        let code = generate("; A point.\npoint = { x: int, ? label: tstr }");
        assert!(code.contains("/// A point.\n#[derive(Clone, Debug, PartialEq)]\npub struct Point {"));
        assert!(code.contains("    pub x: i64,"));
        assert!(code.contains("    pub label: Option<String>,"));
        assert!(code.contains("pub fn new(x: i64) -> Point {\n        Point { x, label: None }"));
        assert!(code.contains("entries.push((Value::Text(\"x\".to_owned()), self.x.to_cbor()));"));
        assert!(code.contains("if let Some(item0) = self.label.as_ref() {"));
        assert!(code.contains("let mut reader = MapReader::new(value)?;"));
        assert!(code.contains("let x = reader.required(&Value::Text(\"x\".to_owned()), \"x\", |item0| i64::from_cbor(item0))?;"));
        assert!(code.contains("let label = reader.optional("));
        assert!(code.contains("Ok(Point { x, label })"));
    }

    #[test]
    fn test_array_record() {
        let code = generate("tx = [0, inputs: [* uint], fee: uint, * extra: bytes]");
        assert!(code.contains("pub struct Tx {"));
        assert!(code.contains("    pub inputs: Vec<u64>,"));
        assert!(code.contains("    pub extra: Vec<Vec<u8>>,"));
        assert!(code.contains("items.push(Value::Uint(0));"));
        assert!(code.contains("items.push(Value::Array(self.inputs.iter().map(|item0| item0.to_cbor()).collect()));"));
        assert!(code.contains("items.extend(self.extra.iter().map(|item0| Value::Bytes(item0.clone())));"));
        assert!(code.contains("let mut reader = ArrayReader::new(value, 3, None)?;"));
        assert!(code.contains("reader.fixed("));
        assert!(code.contains("let inputs = reader.required(\"inputs\", |item0| decode_array(item0, 0, None, |item1| u64::from_cbor(item1)))?;"));
        assert!(code.contains("let extra = reader.rest(\"extra\", 0, None, |item0| item0.as_bytes().map(<[u8]>::to_vec))?;"));
    }

    #[test]
    fn test_indefinite_arrays() {
        let policy = EncodingPolicy { array_length: ArrayLength::Indefinite, ..EncodingPolicy::default() };
        let code = generate_with("tx = [inputs: [* uint]]", &policy);
        assert!(code.contains("Value::IndefiniteArray(self.inputs.iter()"));
        assert!(code.contains("Value::Array(items)"));
    }

    #[test]
    fn test_choices() {
        let code = generate("shape = circle / square\ncircle = { radius: int }\nsquare = { side: int }");
        assert!(code.contains("pub enum Shape {\n    Circle(Circle),\n    Square(Square),\n}"));
        assert!(code.contains("Shape::Circle(item0) => item0.to_cbor(),"));
        assert!(code.contains("let attempts: [fn(&Value) -> Result<Shape, DecodeError>; 2] = ["));
        assert!(code.contains("|item0| Circle::from_cbor(item0).map(Shape::Circle),"));
        assert!(code.contains("first_match(\"Shape\", value, &attempts)"));

        let code = generate("color = &(red: 0, green: 1)");
        assert!(code.contains("pub enum Color {\n    Red,\n    Green,\n}"));
        assert!(code.contains("Color::Green => Value::Uint(1),"));
        assert!(code.contains("if *value == Value::Uint(0) {\n            return Ok(Color::Red);"));

        let code = generate("msg = ping / pong\nping = [0, id: uint]\npong = [1, id: uint]");
        assert!(code.contains("match leading_item(value) {"));
        assert!(code.contains("Some(found) if *found == Value::Uint(1) => Pong::from_cbor(value).map(Msg::Pong),"));
        assert!(code.contains("_ => Err(no_alternative(\"Msg\")),"));

        let code = generate("date = tdate / epoch\ntdate = #6.0(tstr)\nepoch = #6.1(int)");
        assert!(code.contains("match tag_number(value) {"));
        assert!(code.contains("Some(0) => "));
    }

    #[test]
    fn test_wrappers() {
        let code = generate("; @newtype\nid = uint\nport = 1..1024\nname = tstr .size (1..16)");
        assert!(code.contains("#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]\npub struct Port(u16);"));
        assert!(code.contains("check_range(i128::from(value), Some(1), Some(1024))?;"));
        assert!(code.contains("check_length(value.len(), 1, Some(16))?;"));
        assert!(code.contains("pub fn new(value: u64) -> Id {"));
        assert!(code.contains("Ok(Id::new(inner))"));
        assert!(code.contains("Port::new(inner)"));
    }

    #[test]
    fn test_recursion_is_boxed() {
        let code = generate("tree = { value: uint, ? left: tree, ? right: tree }");
        assert!(code.contains("    pub left: Option<Box<Tree>>,"));
        assert!(code.contains("Tree::from_cbor(item0).map(Box::new)"));

        let code = generate("list = [* list]");
        assert!(code.contains("pub struct List(pub Vec<List>);"));
    }

    #[test]
    fn test_tables_and_aliases() {
        let code = generate("ledger = { * tstr => uint }\nhash = bytes .size 32\nholder = { owner: hash, balances: ledger }");
        assert!(code.contains("pub type Ledger = BTreeMap<String, u64>;"));
        assert!(code.contains("pub fn ledger_to_cbor(value: &Ledger) -> Value {"));
        assert!(code.contains("self.balances.iter().map(|(key0, item0)| (key0.to_cbor(), item0.to_cbor()))"));
        assert!(code.contains("decode_table(item0, |key1| String::from_cbor(key1), |item1| u64::from_cbor(item1))"));
        assert!(code.contains("pub struct Hash(Vec<u8>);"));
        assert!(code.contains("check_length(value.len(), 32, Some(32))?;"));
    }

    #[test]
    fn test_nint_is_a_distinct_type() {
        let code = generate("debt = { owed: nint, ? limit: nint }");
        assert!(code.contains("    pub owed: Nint,"));
        assert!(code.contains("    pub limit: Option<Nint>,"));
        assert!(code.contains("entries.push((Value::Text(\"owed\".to_owned()), self.owed.to_cbor()));"));
        assert!(code.contains("|item0| Nint::from_cbor(item0))?;"));
    }

    #[test]
    fn test_fixed_alias_ignores_its_argument() {
        let code = generate("magic = 42\nheader = { magic: magic, len: uint }");
        assert!(code.contains("pub type Magic = ();"));
        assert!(code.contains("pub fn magic_to_cbor(_value: &Magic) -> Value {\n    Value::Uint(42)\n}"));
        assert!(code.contains("pub fn magic_from_cbor(value: &Value) -> Result<Magic, DecodeError> {"));
    }

    #[test]
    fn test_tags() {
        let code = generate("wrapped = #6.24(bytes .cbor point)\npoint = #6.30([x: int, y: int])");
        assert!(code.contains("Value::Tag(30, Box::new(Value::Array(items)))"));
        assert!(code.contains("let value = expect_tag(value, 30)?;"));
        assert!(code.contains("pub type Wrapped = Point;"));
        assert!(code.contains("Value::Tag(24, Box::new(Value::Bytes(value.to_cbor().encode())))"));
        assert!(code.contains("expect_tag(value, 24).and_then(|item0| decode_embedded(item0, |item1| Point::from_cbor(item1)))"));
    }
}
