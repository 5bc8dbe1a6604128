//! Bridge backend: `wasm-bindgen` wrappers around the native types.
//!
//! Every native struct and enum gets a wrapper holding the native value.
//! Accessors use host types: small integers and `f32` cross as `f64` and are
//! narrowed with a checked conversion, 64-bit integers cross as `BigInt`.
//! Values with no host equivalent (nested tables, `any`, lists of lists) are
//! exposed as CBOR bytes through `*_cbor` accessors.

use tracing::debug;

use crate::{
    error::CddlError,
    gen_rust::RustGenerator,
    plan::Plans,
    templates::{render, BRIDGE_PRELUDE},
    types::{Bounds, Field, Primitive, Record, ResolvedType, Shape, TypeGraph, TypeRef, Variant},
    utils::{quote, to_snake_case},
};

/// Render the `lib.rs` of the bridge crate.
pub fn compile_graph_to_wasm(
    graph: &TypeGraph,
    plans: &Plans,
    sources: &[String],
    native_lib: &str,
) -> Result<String, CddlError> {
    let generator = WasmGenerator { graph, native: RustGenerator::new(graph, plans, "native::") };
    let mut wasm_code: Vec<String> = Vec::new();

    wasm_code.push(render(BRIDGE_PRELUDE, &[("sources", &sources.join(", ")), ("native_lib", native_lib)]));

    for ty in graph.iter() {
        if generator.native.is_inline_alias(ty) {
            continue;
        }
        wasm_code.push(generator.generate_type(ty)?);
    }

    debug!(types = graph.len(), "rendered bridge crate");
    Ok(wasm_code.join("\n"))
}

struct WasmGenerator<'a> {
    graph:  &'a TypeGraph,
    native: RustGenerator<'a>,
}

/// Conversion of a host value into its native counterpart. A fallible
/// conversion is an expression of type `Result<T, JsError>`.
struct Conversion {
    expr:     String,
    fallible: bool,
}

impl Conversion {
    fn infallible(expr: String) -> Conversion {
        Conversion { expr, fallible: false }
    }

    fn fallible(expr: String) -> Conversion {
        Conversion { expr, fallible: true }
    }

    /// The converted value, with `?` applied when needed.
    fn into_expr(self) -> String {
        if self.fallible {
            format!("{}?", self.expr)
        } else {
            self.expr
        }
    }
}

/// Type of a field as a whole: repetition and optionality folded in.
fn field_ref(field: &Field) -> TypeRef {
    if field.is_repeated() {
        TypeRef::Array { element: Box::new(field.ty.clone()), occurrence: field.occurrence }
    } else if field.is_optional() {
        TypeRef::Optional(Box::new(field.ty.clone()))
    } else {
        field.ty.clone()
    }
}

/// Host types `wasm-bindgen` can carry inside a `Vec`.
fn listable(host: &str) -> bool {
    matches!(host, "f64" | "u64" | "i64" | "String") || !(host.contains('<') || host == "bool" || host == "Vec<u8>")
}

/// Host types `wasm-bindgen` can carry inside an `Option`.
fn optionable(host: &str) -> bool {
    !host.starts_with("Option<") && (host == "Vec<u8>" || !host.starts_with("Vec<"))
}

fn small_number(p: Primitive) -> bool {
    matches!(p, Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::I8 | Primitive::I16 | Primitive::I32)
}

impl<'a> WasmGenerator<'a> {
    /// The reference with inline aliases, tags and embedded encodings looked
    /// through: they share the Rust type of what they wrap.
    fn host_view(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Named(name) => match self.native.inline_target(name) {
                Some(target) => self.host_view(&target),
                None => ty.clone(),
            },
            TypeRef::Tagged { inner, .. } | TypeRef::CborBytes(inner) => self.host_view(inner),
            _ => ty.clone(),
        }
    }

    /// Host type of a reference, or `None` when it crosses as CBOR bytes.
    fn host_type(&self, ty: &TypeRef) -> Option<String> {
        match self.host_view(ty) {
            TypeRef::Primitive(Primitive::Bool) => Some("bool".to_owned()),
            TypeRef::Primitive(p) if small_number(p) => Some("f64".to_owned()),
            TypeRef::Primitive(Primitive::F32 | Primitive::F64) => Some("f64".to_owned()),
            TypeRef::Primitive(Primitive::U64) => Some("u64".to_owned()),
            TypeRef::Primitive(Primitive::I64 | Primitive::Nint) => Some("i64".to_owned()),
            TypeRef::Primitive(Primitive::Text) => Some("String".to_owned()),
            TypeRef::Primitive(Primitive::Bytes) => Some("Vec<u8>".to_owned()),
            TypeRef::Named(name) => Some(self.graph.ident(&name).to_owned()),
            TypeRef::Optional(inner) => {
                let host = self.host_type(&inner)?;
                optionable(&host).then(|| format!("Option<{}>", host))
            }
            TypeRef::Array { element, .. } => {
                let host = self.host_type(&element)?;
                listable(&host).then(|| format!("Vec<{}>", host))
            }
            _ => None,
        }
    }

    /// Convert the owned host value `expr` to the native representation.
    fn into_native(&self, ty: &TypeRef, expr: &str, field: &str, owner: &str, boxed_ok: bool, depth: usize) -> Conversion {
        let item = format!("item{}", depth);
        match self.host_view(ty) {
            TypeRef::Primitive(p) if small_number(p) => Conversion::fallible(format!(
                "narrow::<{}>({}, {}).map_err(conversion_error)",
                p.rust_type(),
                expr,
                quote(field)
            )),
            TypeRef::Primitive(Primitive::F32) => {
                Conversion::fallible(format!("narrow_f32({}, {}).map_err(conversion_error)", expr, quote(field)))
            }
            TypeRef::Primitive(Primitive::Nint) => {
                Conversion::fallible(format!("Nint::new({}).map_err(|e| decode_error(e.in_field({})))", expr, quote(field)))
            }
            TypeRef::Named(name) if self.native.boxed(owner, &name, boxed_ok) => {
                Conversion::infallible(format!("Box::new({}.0)", expr))
            }
            TypeRef::Named(_) => Conversion::infallible(format!("{}.0", expr)),
            TypeRef::Optional(inner) => {
                let conversion = self.into_native(&inner, &item, field, owner, boxed_ok, depth + 1);
                if conversion.fallible {
                    Conversion::fallible(format!("{}.map(|{}| {}).transpose()", expr, item, conversion.expr))
                } else {
                    Conversion::infallible(format!("{}.map(|{}| {})", expr, item, conversion.expr))
                }
            }
            TypeRef::Array { element, .. } => {
                let conversion = self.into_native(&element, &item, field, owner, false, depth + 1);
                if conversion.fallible {
                    Conversion::fallible(format!(
                        "{}.into_iter().map(|{}| {}).collect::<Result<Vec<_>, JsError>>()",
                        expr, item, conversion.expr
                    ))
                } else {
                    Conversion::infallible(format!("{}.into_iter().map(|{}| {}).collect::<Vec<_>>()", expr, item, conversion.expr))
                }
            }
            _ => Conversion::infallible(expr.to_owned()),
        }
    }

    /// Host value of the native value behind the reference `expr`.
    fn from_native(&self, ty: &TypeRef, expr: &str, depth: usize) -> String {
        let item = format!("item{}", depth);
        match self.host_view(ty) {
            TypeRef::Primitive(p) if small_number(p) || p == Primitive::F32 => format!("f64::from({}.clone())", expr),
            TypeRef::Primitive(Primitive::Nint) => format!("i64::from({}.clone())", expr),
            TypeRef::Named(name) => {
                let ident = self.graph.ident(&name);
                format!("{}(native::{}::clone(&{}))", ident, ident, expr)
            }
            TypeRef::Optional(inner) => {
                format!("{}.as_ref().map(|{}| {})", expr, item, self.from_native(&inner, &item, depth + 1))
            }
            TypeRef::Array { element, .. } => {
                format!("{}.iter().map(|{}| {}).collect()", expr, item, self.from_native(&element, &item, depth + 1))
            }
            _ => format!("{}.clone()", expr),
        }
    }

    /// Statement binding `var` to the native value decoded from `bytes`.
    fn decode_bytes(&self, var: &str, ty: &TypeRef, bytes: &str, owner: &str) -> String {
        format!(
            "let {} = {{\n            let item0 = &Value::decode({}).map_err(decode_error)?;\n            {}.map_err(decode_error)?\n        }};",
            var,
            bytes,
            self.native.decode_expr(ty, "item0", owner, true, 1)
        )
    }

    fn common_impls(&self, ty: &ResolvedType) -> String {
        format!(
            "    pub fn to_cbor_bytes(&self) -> Vec<u8> {{\n        self.0.to_cbor().encode()\n    }}\n\n    pub fn from_cbor_bytes(bytes: &[u8]) -> Result<{}, JsError> {{\n        let value = Value::decode(bytes).map_err(decode_error)?;\n        native::{}::from_cbor(&value).map({}).map_err(decode_error)\n    }}",
            ty.ident, ty.ident, ty.ident
        )
    }

    fn wrapper_struct(&self, ty: &ResolvedType, methods: Vec<String>) -> String {
        format!(
            "#[wasm_bindgen]\n#[derive(Clone, Debug)]\npub struct {}(native::{});\n\n#[wasm_bindgen]\nimpl {} {{\n{}\n}}\n\nimpl From<native::{}> for {} {{\n    fn from(inner: native::{}) -> {} {{\n        {}(inner)\n    }}\n}}\n\nimpl From<{}> for native::{} {{\n    fn from(outer: {}) -> native::{} {{\n        outer.0\n    }}\n}}\n",
            ty.ident,
            ty.ident,
            ty.ident,
            methods.join("\n\n"),
            ty.ident,
            ty.ident,
            ty.ident,
            ty.ident,
            ty.ident,
            ty.ident,
            ty.ident,
            ty.ident,
            ty.ident
        )
    }

    fn generate_type(&self, ty: &ResolvedType) -> Result<String, CddlError> {
        let mut methods = match &ty.shape {
            Shape::Record(record) | Shape::Array(record) | Shape::MapFixedKeys(record) => self.record_methods(ty, record),
            Shape::Choice { variants } => return Ok(self.generate_choice(ty, variants)),
            Shape::Wrapper { inner, bounds } => self.wrapper_methods(ty, inner, bounds),
            Shape::Alias(_) | Shape::MapVariableKeys { .. } => Vec::new(),
        };
        methods.push(self.common_impls(ty));
        Ok(self.wrapper_struct(ty, methods))
    }

    fn record_methods(&self, ty: &ResolvedType, record: &Record) -> Vec<String> {
        let mut methods = Vec::new();
        let mut params = Vec::new();
        let mut statements = Vec::new();
        let mut args = Vec::new();

        let fields: Vec<&Field> = record.fields.iter().filter(|f| f.fixed_value().is_none()).collect();
        for field in &fields {
            if field.is_repeated() || field.is_optional() {
                continue;
            }
            match self.host_type(&field.ty) {
                Some(host) => {
                    params.push(format!("{}: {}", field.name, host));
                    let conversion = self.into_native(&field.ty, &field.name, &field.name, &ty.name, true, 0);
                    statements.push(format!("        let {} = {};", field.name, conversion.into_expr()));
                }
                None => {
                    params.push(format!("{}_cbor: &[u8]", field.name));
                    statements.push(format!(
                        "        {}",
                        self.decode_bytes(&field.name, &field.ty, &format!("{}_cbor", field.name), &ty.name)
                    ));
                }
            }
            args.push(field.name.clone());
        }
        methods.push(format!(
            "    #[wasm_bindgen(constructor)]\n    pub fn new({}) -> Result<{}, JsError> {{\n{}\n        Ok({}(native::{}::new({})))\n    }}",
            params.join(", "),
            ty.ident,
            statements.join("\n"),
            ty.ident,
            ty.ident,
            args.join(", ")
        ));

        for field in &fields {
            let whole = field_ref(field);
            let place = format!("self.0.{}", field.name);
            match self.host_type(&whole) {
                Some(host) => {
                    let conversion = self.into_native(&whole, "value", &field.name, &ty.name, true, 0);
                    methods.push(format!(
                        "    #[wasm_bindgen(getter)]\n    pub fn {}(&self) -> {} {{\n        {}\n    }}\n\n    pub fn set_{}(&mut self, value: {}) -> Result<(), JsError> {{\n        {} = {};\n        Ok(())\n    }}",
                        field.name,
                        host,
                        self.from_native(&whole, &place, 0),
                        field.name.trim_end_matches('_'),
                        host,
                        place,
                        conversion.into_expr()
                    ));
                }
                None => {
                    methods.push(format!(
                        "    pub fn {}_cbor(&self) -> Vec<u8> {{\n        {}.encode()\n    }}\n\n    pub fn set_{}_cbor(&mut self, bytes: &[u8]) -> Result<(), JsError> {{\n        {}\n        {} = value;\n        Ok(())\n    }}",
                        field.name.trim_end_matches('_'),
                        self.native.encode_expr(&whole, &place, 0),
                        field.name.trim_end_matches('_'),
                        self.decode_bytes("value", &whole, "bytes", &ty.name),
                        place
                    ));
                }
            }
        }
        methods
    }

    fn wrapper_methods(&self, ty: &ResolvedType, inner: &TypeRef, bounds: &Bounds) -> Vec<String> {
        let construct = if bounds.is_empty() {
            format!("Ok({}(native::{}::new(value)))", ty.ident, ty.ident)
        } else {
            format!("native::{}::new(value).map({}).map_err(decode_error)", ty.ident, ty.ident)
        };
        match self.host_type(inner) {
            Some(host) => {
                let conversion = self.into_native(inner, "value", "value", &ty.name, true, 0);
                vec![format!(
                    "    #[wasm_bindgen(constructor)]\n    pub fn new(value: {}) -> Result<{}, JsError> {{\n        let value = {};\n        {}\n    }}\n\n    #[wasm_bindgen(getter)]\n    pub fn value(&self) -> {} {{\n        {}\n    }}",
                    host,
                    ty.ident,
                    conversion.into_expr(),
                    construct,
                    host,
                    self.from_native(inner, "self.0.get()", 0)
                )]
            }
            None => vec![format!(
                "    #[wasm_bindgen(constructor)]\n    pub fn new(value_cbor: &[u8]) -> Result<{}, JsError> {{\n        {}\n        {}\n    }}",
                ty.ident,
                self.decode_bytes("value", inner, "value_cbor", &ty.name),
                construct
            )],
        }
    }

    fn generate_choice(&self, ty: &ResolvedType, variants: &[Variant]) -> String {
        let kind = format!("{}Kind", ty.ident);
        let mut methods = Vec::new();
        let mut kind_arms = Vec::new();

        for variant in variants {
            let snake = to_snake_case(&variant.name);
            if self.native.is_unit(&variant.ty).is_some() {
                kind_arms.push(format!("            native::{}::{} => {}::{},", ty.ident, variant.name, kind, variant.name));
                methods.push(format!(
                    "    pub fn new_{}() -> {} {{\n        {}(native::{}::{})\n    }}",
                    snake, ty.ident, ty.ident, ty.ident, variant.name
                ));
                continue;
            }

            kind_arms.push(format!("            native::{}::{}(_) => {}::{},", ty.ident, variant.name, kind, variant.name));
            match self.host_type(&variant.ty) {
                Some(host) => {
                    let conversion = self.into_native(&variant.ty, "value", &variant.name, &ty.name, true, 0);
                    methods.push(format!(
                        "    pub fn new_{}(value: {}) -> Result<{}, JsError> {{\n        Ok({}(native::{}::{}({})))\n    }}\n\n    pub fn as_{}(&self) -> Option<{}> {{\n        match &self.0 {{\n            native::{}::{}(item0) => Some({}),\n            _ => None,\n        }}\n    }}",
                        snake,
                        host,
                        ty.ident,
                        ty.ident,
                        ty.ident,
                        variant.name,
                        conversion.into_expr(),
                        snake,
                        host,
                        ty.ident,
                        variant.name,
                        self.from_native(&variant.ty, "item0", 1)
                    ));
                }
                None => methods.push(format!(
                    "    pub fn new_{}(value_cbor: &[u8]) -> Result<{}, JsError> {{\n        {}\n        Ok({}(native::{}::{}(value)))\n    }}\n\n    pub fn as_{}_cbor(&self) -> Option<Vec<u8>> {{\n        match &self.0 {{\n            native::{}::{}(item0) => Some({}.encode()),\n            _ => None,\n        }}\n    }}",
                    snake,
                    ty.ident,
                    self.decode_bytes("value", &variant.ty, "value_cbor", &ty.name),
                    ty.ident,
                    ty.ident,
                    variant.name,
                    snake,
                    ty.ident,
                    variant.name,
                    self.native.encode_expr(&variant.ty, "item0", 1)
                )),
            }
        }

        methods.insert(
            0,
            format!(
                "    #[wasm_bindgen(getter)]\n    pub fn kind(&self) -> {} {{\n        match &self.0 {{\n{}\n        }}\n    }}",
                kind,
                kind_arms.join("\n")
            ),
        );
        methods.push(self.common_impls(ty));

        let kinds: Vec<String> = variants.iter().map(|v| format!("    {},", v.name)).collect();
        format!(
            "#[wasm_bindgen]\n#[derive(Clone, Copy, Debug, PartialEq, Eq)]\npub enum {} {{\n{}\n}}\n\n{}",
            kind,
            kinds.join("\n"),
            self.wrapper_struct(ty, methods)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_document, plan::{plan_graph, EncodingPolicy}, resolver::build_graph};

    fn generate(text: &str) -> String {
        let doc = parse_document("test.cddl", text).unwrap();
        let graph = build_graph(&[doc], &[]).unwrap();
        let plans = plan_graph(&graph, &EncodingPolicy::default()).unwrap();
        compile_graph_to_wasm(&graph, &plans, &["test.cddl".to_owned()], "cddl_native").unwrap()
    }

    #[test]
    fn test_prelude() {
        let code = generate("point = { x: int, y: int }");
        assert!(code.contains("use cddl_native as native;"));
        assert!(code.contains("use wasm_bindgen::prelude::*;"));
    }

    #[test]
    fn test_record_accessors() {
        let code = generate("person = { name: tstr, age: u8, ? nick: tstr, tags: [* tstr], balance: uint }");
        assert!(code.contains("#[wasm_bindgen]\n#[derive(Clone, Debug)]\npub struct Person(native::Person);"));
        assert!(code.contains("pub fn new(name: String, age: f64, tags: Vec<String>, balance: u64) -> Result<Person, JsError> {"));
        assert!(code.contains("let age = narrow::<u8>(age, \"age\").map_err(conversion_error)?;"));
        assert!(code.contains("Ok(Person(native::Person::new(name, age, tags, balance)))"));
        assert!(code.contains("pub fn age(&self) -> f64 {\n        f64::from(self.0.age.clone())"));
        assert!(code.contains("pub fn nick(&self) -> Option<String> {"));
        assert!(code.contains("pub fn set_nick(&mut self, value: Option<String>) -> Result<(), JsError> {"));
        assert!(code.contains("pub fn to_cbor_bytes(&self) -> Vec<u8> {"));
        assert!(code.contains("native::Person::from_cbor(&value).map(Person).map_err(decode_error)"));
        assert!(code.contains("impl From<native::Person> for Person {"));
    }

    #[test]
    fn test_nested_and_fallback_fields() {
        let code = generate("outer = { inner: point, ledger: { * tstr => uint }, any: any }\npoint = [x: int, y: int]");
        assert!(code.contains("pub fn inner(&self) -> Point {\n        Point(native::Point::clone(&self.0.inner))"));
        assert!(code.contains("pub fn ledger_cbor(&self) -> Vec<u8> {"));
        assert!(code.contains("pub fn set_ledger_cbor(&mut self, bytes: &[u8]) -> Result<(), JsError> {"));
        assert!(code.contains("any_cbor: &[u8]"));
    }

    #[test]
    fn test_choices() {
        let code = generate("shape = circle / square / 0\ncircle = { radius: u16 }\nsquare = { side: u16 }");
        assert!(code.contains("pub enum ShapeKind {\n    Circle,\n    Square,"));
        assert!(code.contains("native::Shape::Circle(_) => ShapeKind::Circle,"));
        assert!(code.contains("pub fn new_circle(value: Circle) -> Result<Shape, JsError> {"));
        assert!(code.contains("pub fn as_square(&self) -> Option<Square> {"));
    }

    #[test]
    fn test_nint_fields_are_checked() {
        let code = generate("debt = { owed: nint }");
        assert!(code.contains("pub fn new(owed: i64) -> Result<Debt, JsError> {"));
        assert!(code.contains("Nint::new(owed).map_err(|e| decode_error(e.in_field(\"owed\")))"));
        assert!(code.contains("i64::from(self.0.owed.clone())"));
    }

    #[test]
    fn test_wrappers() {
        let code = generate("port = 1..1024");
        assert!(code.contains("pub fn new(value: f64) -> Result<Port, JsError> {"));
        assert!(code.contains("let value = narrow::<u16>(value, \"value\").map_err(conversion_error)?;"));
        assert!(code.contains("native::Port::new(value).map(Port).map_err(decode_error)"));
        assert!(code.contains("f64::from(self.0.get().clone())"));
    }
}
