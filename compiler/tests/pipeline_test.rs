use brine_cddl_compiler::{
    compile, generate,
    types::{Shape, TypeRef},
    CddlError, GenerationOptions, MemorySink, SchemaSource,
};
use brine_cddl_runtime::Value;
use proptest::prelude::*;
use serde_json::{json, Value as Json};

const ORDERS: &str = r#"
; An order placed by a customer.
order = {
  id: uint,
  ? note: tstr,
  items: [* item],
  status: status,
  totals: { * tstr => int },
}

; One line of an order.
item = [sku: tstr, qty: uint, price: int]

status = &(open: 0, closed: 1)
"#;

fn orders() -> Vec<SchemaSource> {
    vec![SchemaSource::new("orders.cddl", ORDERS)]
}

#[test]
fn test_point_end_to_end() {
    let compilation = compile(&[SchemaSource::new("point.cddl", "point = { x: int, y: int }")], &[]).unwrap();
    let point = compilation.graph.get("point").unwrap();
    assert_eq!(point.shape.record().map(|r| r.fields.len()), Some(2));

    let codec = compilation.codec();
    let value = codec.encode_value("point", &json!({ "x": 1, "y": -2 })).unwrap();
    match &value {
        Value::Map(entries) => assert_eq!(entries.len(), 2),
        other => panic!("expected a map, found {}", other),
    }
    assert_eq!(codec.decode("point", &value.encode()).unwrap(), json!({ "x": 1, "y": -2 }));
}

#[test]
fn test_shape_end_to_end() {
    let text = "shape = circle / square\ncircle = { radius: int }\nsquare = { side: int }";
    let compilation = compile(&[SchemaSource::new("shape.cddl", text)], &["shape".to_owned()]).unwrap();
    match &compilation.graph.get("shape").unwrap().shape {
        Shape::Choice { variants } => assert_eq!(variants.len(), 2),
        other => panic!("expected a choice, found {:?}", other),
    }
    let codec = compilation.codec();
    let bytes = codec.encode("shape", &json!({ "Circle": { "radius": 5 } })).unwrap();
    assert_eq!(codec.decode("shape", &bytes).unwrap(), json!({ "Circle": { "radius": 5 } }));
}

#[test]
fn test_first_declared_alternative_wins() {
    let text = "msg = a / b / c\na = { id: tstr }\nb = { n: uint }\nc = { n: int }";
    let compilation = compile(&[SchemaSource::new("msg.cddl", text)], &[]).unwrap();
    let codec = compilation.codec();
    for _ in 0..8 {
        let bytes = codec.encode("msg", &json!({ "C": { "n": 7 } })).unwrap();
        assert_eq!(codec.decode("msg", &bytes).unwrap(), json!({ "B": { "n": 7 } }));
    }
}

#[test]
fn test_plugs_from_several_documents() {
    let sources = vec![
        SchemaSource::new("base.cddl", "envelope = { body: $body }\n$body /= ping"),
        SchemaSource::new("ext.cddl", "pong = { seq: uint }\n$body /= pong\nping = { seq: uint, ? echo: bool }"),
    ];
    let compilation = compile(&sources, &["envelope".to_owned()]).unwrap();
    match &compilation.graph.get("$body").unwrap().shape {
        Shape::Choice { variants } => {
            let names: Vec<_> = variants.iter().map(|v| v.name.as_str()).collect();
            assert_eq!(names, vec!["Ping", "Pong"]);
        }
        other => panic!("expected a choice, found {:?}", other),
    }
}

#[test]
fn test_generic_sites_share_a_node() {
    let text = "pair<a, b> = [first: a, second: b]\nleft = { p: pair<uint, tstr> }\nright = { q: pair<uint, tstr> }";
    let compilation = compile(&[SchemaSource::new("pair.cddl", text)], &[]).unwrap();
    let graph = &compilation.graph;
    let field = |name: &str| graph.get(name).and_then(|t| t.shape.record()).map(|r| r.fields[0].ty.clone());
    assert_eq!(field("left"), Some(TypeRef::named("pair<uint, tstr>")));
    assert_eq!(field("left"), field("right"));
    assert_eq!(graph.instantiations.len(), 1);
}

#[test]
fn test_recursive_rule_round_trips() {
    let text = "tree = { value: uint, ? left: tree, children: [* tree] }";
    let compilation = compile(&[SchemaSource::new("tree.cddl", text)], &[]).unwrap();
    assert!(compilation.graph.get("tree").unwrap().recursive);
    assert!(!compilation.graph.back_references.is_empty());

    let instance = json!({
        "value": 1,
        "left": { "value": 2, "left": null, "children": [] },
        "children": [{ "value": 3, "left": null, "children": [] }],
    });
    let codec = compilation.codec();
    let bytes = codec.encode("tree", &instance).unwrap();
    assert_eq!(codec.decode("tree", &bytes).unwrap(), instance);
}

#[test]
fn test_generate_orders() {
    let mut sink = MemorySink::default();
    let artifacts = generate(&orders(), &["order".to_owned()], &GenerationOptions::default(), &mut sink).unwrap();
    assert_eq!(artifacts.len(), 5);

    let native = artifacts.get("cddl-native/src/lib.rs").unwrap();
    assert!(native.contains("/// An order placed by a customer."));
    assert!(native.contains("pub struct Order {"));
    assert!(native.contains("pub note: Option<String>,"));
    assert!(native.contains("pub items: Vec<Item>,"));
    assert!(native.contains("pub enum Status {"));

    let bridge = artifacts.get("cddl-wasm/src/lib.rs").unwrap();
    assert!(bridge.contains("#[wasm_bindgen]"));
    assert!(bridge.contains("pub struct Order(native::Order);"));

    let schema: Json = serde_json::from_str(artifacts.get("schema.json").unwrap()).unwrap();
    assert_eq!(schema["roots"], json!(["order"]));
    let names: Vec<_> = schema["types"].as_array().unwrap().iter().map(|t| t["name"].clone()).collect();
    assert!(names.contains(&json!("item")));
    assert!(names.contains(&json!("status")));
}

#[test]
fn test_errors_stop_the_run() {
    let mut sink = MemorySink::default();
    let sources = vec![SchemaSource::new("bad.cddl", "a = {\n  b: uint,\n  c: [\n}")];
    match generate(&sources, &[], &GenerationOptions::default(), &mut sink) {
        Err(CddlError::SyntaxError { location, .. }) => {
            assert_eq!(location.source, "bad.cddl");
            assert_eq!(location.line, 4);
        }
        other => panic!("expected a syntax error, found {:?}", other),
    }
    assert!(sink.committed.is_none());
}

#[test]
fn test_decode_errors_are_located() {
    let compilation = compile(&orders(), &[]).unwrap();
    let codec = compilation.codec();
    let instance = json!({
        "id": 1,
        "note": null,
        "items": [["a", 1, 1], ["b", 2, -2]],
        "status": "Open",
        "totals": [],
    });
    let mut value = codec.encode_value("order", &instance).unwrap();
    // Replace the quantity of the second item with text.
    if let Value::Map(entries) = &mut value {
        if let Some((_, Value::Array(items))) = entries.iter_mut().find(|(k, _)| *k == Value::from("items")) {
            if let Value::Array(slots) = &mut items[1] {
                slots[1] = Value::from("two");
            }
        }
    }
    match codec.decode("order", &value.encode()) {
        Err(CddlError::Decode(e)) => assert_eq!(e.path.to_string(), "$.items[1].qty"),
        other => panic!("expected a decode error, found {:?}", other),
    }
}

fn item() -> impl Strategy<Value = Json> {
    ("[a-z0-9]{1,8}", any::<u64>(), any::<i64>())
        .prop_map(|(sku, qty, price)| json!({ "sku": sku, "qty": qty, "price": price }))
}

fn order() -> impl Strategy<Value = Json> {
    (
        any::<u64>(),
        proptest::option::of("\\PC{0,16}"),
        proptest::collection::vec(item(), 0..4),
        prop_oneof![Just("Open"), Just("Closed")],
        proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..4),
    )
        .prop_map(|(id, note, items, status, totals)| {
            json!({
                "id": id,
                "note": note,
                "items": items,
                "status": status,
                "totals": totals.into_iter().map(|(k, v)| json!([k, v])).collect::<Vec<_>>(),
            })
        })
}

proptest! {
    #[test]
    fn test_orders_round_trip(instance in order()) {
        let compilation = compile(&orders(), &[]).unwrap();
        let codec = compilation.codec();
        let bytes = codec.encode("order", &instance).unwrap();
        prop_assert_eq!(codec.decode("order", &bytes).unwrap(), instance);
    }
}
