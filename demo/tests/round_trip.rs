use std::fmt::Debug;

use brine_cddl::{compile, Compilation, SchemaSource, Value};
use brine_cddl_runtime::{DecodeErrorKind, FromCbor, Nint, ToCbor};
use demo_app::generated::*;
use proptest::prelude::*;
use serde_json::{json, Value as Json};

fn compilation() -> Compilation {
    let sources = vec![
        SchemaSource::new("orders.cddl", include_str!("../schema/orders.cddl")),
        SchemaSource::new("ledger.cddl", include_str!("../schema/ledger.cddl")),
    ];
    compile(&sources, &[]).unwrap()
}

/// The generated type writes the codec's bytes, and both read them back.
fn assert_agrees<T>(compilation: &Compilation, root: &str, native: &T, instance: &Json)
where
    T: ToCbor + FromCbor + PartialEq + Debug,
{
    let codec = compilation.codec();
    let bytes = native.to_cbor_bytes();
    assert_eq!(bytes, codec.encode(root, instance).unwrap());
    assert_eq!(&T::from_cbor_bytes(&bytes).unwrap(), native);
    assert_eq!(codec.decode(root, &bytes).unwrap(), *instance);
}

fn debt(holder: &str, owed: i64) -> Debt {
    Debt {
        holder:     PairUintText { first: 1, second: holder.to_owned() },
        owed:       Nint::new(owed).unwrap(),
        collateral: None,
    }
}

#[test]
fn test_order_matches_the_codec() {
    let order = Order {
        id:     7,
        note:   Some("gift".to_owned()),
        items:  vec![
            Item { sku: "apple".to_owned(), qty: 3, price: 120 },
            Item { sku: "pear".to_owned(), qty: 1, price: -15 },
        ],
        status: Status::Closed,
    };
    let instance = json!({
        "id": 7,
        "note": "gift",
        "items": [
            { "sku": "apple", "qty": 3, "price": 120 },
            { "sku": "pear", "qty": 1, "price": -15 },
        ],
        "status": "Closed",
    });
    assert_agrees(&compilation(), "order", &order, &instance);
}

#[test]
fn test_nint_and_generic_fields() {
    let compilation = compilation();
    let mut native = debt("ada", -250);
    native.collateral = Some(Asset::Coin(Coin { amount: 3 }));
    let instance = json!({
        "holder": { "first": 1, "second": "ada" },
        "owed": -250,
        "collateral": { "Coin": { "amount": 3 } },
    });
    assert_agrees(&compilation, "debt", &native, &instance);

    let lowest = debt("bob", i64::MIN);
    let instance = json!({ "holder": { "first": 1, "second": "bob" }, "owed": i64::MIN, "collateral": null });
    assert_agrees(&compilation, "debt", &lowest, &instance);

    // An unsigned `owed` is not a nint.
    let mut value = native.to_cbor();
    if let Value::Map(entries) = &mut value {
        for (key, item) in entries.iter_mut() {
            if *key == Value::from("owed") {
                *item = Value::Uint(250);
            }
        }
    }
    let err = Debt::from_cbor(&value).unwrap_err();
    assert_eq!(err.path.to_string(), "$.owed");
    assert!(matches!(err.kind, DecodeErrorKind::UnexpectedType { .. }));
}

#[test]
fn test_recursive_chain() {
    let compilation = compilation();
    let leaf = |holder: &str| Chain { debt: debt(holder, -1), next: None, guarantors: vec![] };
    let chain = Chain {
        debt:       debt("ada", -10),
        next:       Some(Box::new(leaf("bob"))),
        guarantors: vec![leaf("cy"), leaf("dee")],
    };
    let leaf_json = |holder: &str| {
        json!({
            "debt": { "holder": { "first": 1, "second": holder }, "owed": -1, "collateral": null },
            "next": null,
            "guarantors": [],
        })
    };
    let instance = json!({
        "debt": { "holder": { "first": 1, "second": "ada" }, "owed": -10, "collateral": null },
        "next": leaf_json("bob"),
        "guarantors": [leaf_json("cy"), leaf_json("dee")],
    });
    assert_agrees(&compilation, "chain", &chain, &instance);
}

#[test]
fn test_decode_rejects_an_unknown_status() {
    let mut value = Order { id: 1, note: None, items: vec![], status: Status::Open }.to_cbor();
    if let Value::Map(entries) = &mut value {
        for (key, item) in entries.iter_mut() {
            if *key == Value::from("status") {
                *item = Value::Uint(9);
            }
        }
    }
    let err = Order::from_cbor(&value).unwrap_err();
    assert_eq!(err.path.to_string(), "$.status");
    assert_eq!(err.kind, DecodeErrorKind::NoMatchingAlternative("Status".to_owned()));
}

fn order() -> impl Strategy<Value = (Order, Json)> {
    (
        any::<u64>(),
        proptest::option::of("\\PC{0,16}"),
        proptest::collection::vec(("[a-z0-9]{1,8}", any::<u64>(), any::<i64>()), 0..4),
        any::<bool>(),
    )
        .prop_map(|(id, note, items, open)| {
            let (status, label) = if open { (Status::Open, "Open") } else { (Status::Closed, "Closed") };
            let instance = json!({
                "id": id,
                "note": note,
                "items": items
                    .iter()
                    .map(|(sku, qty, price)| json!({ "sku": sku, "qty": qty, "price": price }))
                    .collect::<Vec<_>>(),
                "status": label,
            });
            let items = items.into_iter().map(|(sku, qty, price)| Item { sku, qty, price }).collect();
            (Order { id, note, items, status }, instance)
        })
}

proptest! {
    #[test]
    fn test_generated_orders_round_trip((native, instance) in order()) {
        let compilation = compilation();
        let codec = compilation.codec();
        let bytes = native.to_cbor_bytes();
        prop_assert_eq!(&bytes, &codec.encode("order", &instance).unwrap());
        prop_assert_eq!(Order::from_cbor_bytes(&bytes).unwrap(), native);
        prop_assert_eq!(codec.decode("order", &bytes).unwrap(), instance);
    }
}
