//! Schema-export backend: a JSON description of the resolved graph that
//! other tools can validate against without parsing CDDL.

use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::{
    error::CddlError,
    plan::{EncodingPlan, EncodingPolicy, Plans},
    types::{Bounds, Field, FixedValue, Occurrence, ResolvedType, Shape, TypeGraph, TypeRef, Variant},
};

pub const EXPORT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SchemaExport<'a> {
    version:  u32,
    roots:    &'a [String],
    encoding: &'a EncodingPolicy,
    types:    Vec<TypeExport<'a>>,
}

#[derive(Serialize)]
struct TypeExport<'a> {
    name:        &'a str,
    ident:       &'a str,
    shape:       &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag:         Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc:         Option<&'a str>,
    recursive:   bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_of: Option<InstanceExport<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields:      Vec<FieldExport<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    variants:    Vec<VariantExport<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inner:       Option<TypeRefExport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds:      Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key:         Option<TypeRefExport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value:       Option<TypeRefExport>,
    encoding:    &'a EncodingPlan,
}

#[derive(Serialize)]
struct InstanceExport<'a> {
    rule: &'a str,
    args: Vec<TypeRefExport>,
}

#[derive(Serialize)]
struct FieldExport<'a> {
    name:       &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key:        Option<Json>,
    #[serde(rename = "type")]
    ty:         TypeRefExport,
    occurrence: Occurrence,
    optional:   bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc:        Option<&'a str>,
}

#[derive(Serialize)]
struct VariantExport<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    ty:   TypeRefExport,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc:  Option<&'a str>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TypeRefExport {
    Primitive { name: &'static str },
    Literal { value: Json },
    Named { name: String },
    Optional { inner: Box<TypeRefExport> },
    Array { element: Box<TypeRefExport>, occurrence: Occurrence },
    Map { key: Box<TypeRefExport>, value: Box<TypeRefExport> },
    Tagged { tag: u64, inner: Box<TypeRefExport> },
    Cbor { inner: Box<TypeRefExport> },
}

/// JSON form of a literal. Byte strings are `{"bytes": "<hex>"}` so they
/// stay distinguishable from text.
fn literal(value: &FixedValue) -> Json {
    match value {
        FixedValue::Int(v) => match (u64::try_from(*v), i64::try_from(*v)) {
            (Ok(v), _) => Json::from(v),
            (_, Ok(v)) => Json::from(v),
            _ => Json::String(v.to_string()),
        },
        FixedValue::Text(v) => Json::String(v.clone()),
        FixedValue::Bytes(v) => {
            serde_json::json!({ "bytes": v.iter().map(|b| format!("{:02x}", b)).collect::<String>() })
        }
        FixedValue::Bool(v) => Json::Bool(*v),
        FixedValue::Null => Json::Null,
        FixedValue::Undefined => serde_json::json!({ "undefined": true }),
    }
}

fn export_ref(ty: &TypeRef) -> TypeRefExport {
    match ty {
        TypeRef::Primitive(p) => TypeRefExport::Primitive { name: p.schema_name() },
        TypeRef::Fixed(value) => TypeRefExport::Literal { value: literal(value) },
        TypeRef::Named(name) => TypeRefExport::Named { name: name.clone() },
        TypeRef::Optional(inner) => TypeRefExport::Optional { inner: Box::new(export_ref(inner)) },
        TypeRef::Array { element, occurrence } => {
            TypeRefExport::Array { element: Box::new(export_ref(element)), occurrence: *occurrence }
        }
        TypeRef::Map { key, value } => {
            TypeRefExport::Map { key: Box::new(export_ref(key)), value: Box::new(export_ref(value)) }
        }
        TypeRef::Tagged { tag, inner } => TypeRefExport::Tagged { tag: *tag, inner: Box::new(export_ref(inner)) },
        TypeRef::CborBytes(inner) => TypeRefExport::Cbor { inner: Box::new(export_ref(inner)) },
    }
}

fn export_field(field: &Field) -> FieldExport<'_> {
    FieldExport {
        name:       &field.name,
        key:        field.key.as_ref().map(literal),
        ty:         export_ref(&field.ty),
        occurrence: field.occurrence,
        optional:   field.is_optional(),
        doc:        field.doc.as_deref(),
    }
}

fn export_variant(variant: &Variant) -> VariantExport<'_> {
    VariantExport { name: &variant.name, ty: export_ref(&variant.ty), doc: variant.doc.as_deref() }
}

fn export_type<'a>(ty: &'a ResolvedType, plan: &'a EncodingPlan) -> TypeExport<'a> {
    let mut export = TypeExport {
        name:        &ty.name,
        ident:       &ty.ident,
        shape:       ty.shape.kind(),
        tag:         ty.tag,
        doc:         ty.doc.as_deref(),
        recursive:   ty.recursive,
        instance_of: ty.instance_of.as_ref().map(|instance| InstanceExport {
            rule: &instance.rule,
            args: instance.args.iter().map(export_ref).collect(),
        }),
        fields:      Vec::new(),
        variants:    Vec::new(),
        inner:       None,
        bounds:      None,
        key:         None,
        value:       None,
        encoding:    plan,
    };
    match &ty.shape {
        Shape::Record(record) | Shape::Array(record) | Shape::MapFixedKeys(record) => {
            export.fields = record.fields.iter().map(export_field).collect();
        }
        Shape::Choice { variants } => export.variants = variants.iter().map(export_variant).collect(),
        Shape::Wrapper { inner, bounds } => {
            export.inner = Some(export_ref(inner));
            export.bounds = Some(*bounds);
        }
        Shape::MapVariableKeys { key, value } => {
            export.key = Some(export_ref(key));
            export.value = Some(export_ref(value));
        }
        Shape::Alias(inner) => export.inner = Some(export_ref(inner)),
    }
    export
}

/// Render `schema.json`.
pub fn compile_graph_to_schema(graph: &TypeGraph, plans: &Plans) -> Result<String, CddlError> {
    let mut types = Vec::with_capacity(graph.len());
    for ty in graph.iter() {
        let plan = plans
            .get(&ty.name)
            .ok_or_else(|| CddlError::VerifierError(format!("No encoding plan for \"{}\"", ty.name)))?;
        types.push(export_type(ty, plan));
    }
    let export = SchemaExport { version: EXPORT_VERSION, roots: graph.roots(), encoding: &plans.policy, types };
    let text = serde_json::to_string_pretty(&export)
        .map_err(|e| CddlError::VerifierError(format!("Could not serialize the schema export: {}", e)))?;
    debug!(bytes = text.len(), "rendered schema export");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_document, plan::plan_graph, resolver::build_graph};
    use serde_json::json;

    fn export(text: &str) -> Json {
        let doc = parse_document("test.cddl", text).unwrap();
        let graph = build_graph(&[doc], &[]).unwrap();
        let plans = plan_graph(&graph, &EncodingPolicy::default()).unwrap();
        serde_json::from_str(&compile_graph_to_schema(&graph, &plans).unwrap()).unwrap()
    }

    #[test]
    fn test_record_export() {
        let schema = export("; A person.\nperson = { name: tstr, ? age: uint, 1: bytes }");
        assert_eq!(schema["version"], json!(1));
        assert_eq!(schema["roots"], json!(["person"]));
        let person = &schema["types"][0];
        assert_eq!(person["name"], json!("person"));
        assert_eq!(person["ident"], json!("Person"));
        assert_eq!(person["shape"], json!("map_fixed_keys"));
        assert_eq!(person["doc"], json!("A person."));
        assert_eq!(person["fields"][0]["key"], json!("name"));
        assert_eq!(person["fields"][0]["type"], json!({ "kind": "primitive", "name": "text" }));
        assert_eq!(person["fields"][1]["optional"], json!(true));
        assert_eq!(person["fields"][1]["occurrence"], json!({ "min": 0, "max": 1 }));
        assert_eq!(person["fields"][2]["key"], json!(1));
        assert_eq!(person["encoding"]["layout"]["kind"], json!("map"));
        assert_eq!(person["encoding"]["layout"]["key_kind"], json!("mixed"));
    }

    #[test]
    fn test_choice_and_generic_export() {
        let schema = export("pair<a, b> = [first: a, second: b]\nentry = pair<uint, tstr> / null / tree\ntree = [* tree]");
        let types = schema["types"].as_array().unwrap();
        let pair = types.iter().find(|t| t["ident"] == json!("PairUintTstr") || t["ident"] == json!("PairUintText")).unwrap();
        assert_eq!(pair["instance_of"]["rule"], json!("pair"));
        assert_eq!(pair["fields"][1]["type"], json!({ "kind": "primitive", "name": "text" }));

        let entry = types.iter().find(|t| t["name"] == json!("entry")).unwrap();
        assert_eq!(entry["shape"], json!("choice"));
        assert_eq!(entry["variants"][1]["type"], json!({ "kind": "literal", "value": null }));
        assert_eq!(entry["encoding"]["layout"]["discriminant"]["strategy"], json!("try_in_order"));

        let tree = types.iter().find(|t| t["name"] == json!("tree")).unwrap();
        assert_eq!(tree["recursive"], json!(true));
        assert_eq!(tree["inner"]["kind"], json!("array"));
    }
}
