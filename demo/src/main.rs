// demo/src/main.rs

use brine_cddl::*;
use demo_app::generated::{Item, Order, Status};
use serde_json::json;

const ORDERS: &str = include_str!("../schema/orders.cddl");

fn main() -> Result<(), CddlError> {
    let compilation = compile(&[SchemaSource::new("orders.cddl", ORDERS)], &["order".to_owned()])?;
    let codec = compilation.codec();

    // The optional `note` is left out, so it is not written.
    let order = json!({
        "id": 7,
        "items": [
            { "sku": "apple", "qty": 3, "price": 120 },
            { "sku": "pear", "qty": 1, "price": -15 },
        ],
        "status": "Open",
    });

    let value = codec.encode_value("order", &order)?;
    let bytes = value.encode();
    println!("order   = {}", value);
    println!("encoded = {} bytes", bytes.len());

    // Decoding always writes absent optionals as null.
    println!("decoded = {}", decode_to_json(&compilation, "order", &bytes)?);

    // The generated types write the same bytes as the codec.
    let native = Order {
        id:     7,
        note:   None,
        items:  vec![
            Item { sku: "apple".to_owned(), qty: 3, price: 120 },
            Item { sku: "pear".to_owned(), qty: 1, price: -15 },
        ],
        status: Status::Open,
    };
    println!("native  = {}", if native.to_cbor_bytes() == bytes { "same bytes" } else { "different bytes" });
    println!("parsed  = {:?}", Order::from_cbor_bytes(&bytes)?);

    // A truncated buffer fails with a located error.
    match codec.decode("order", &bytes[..bytes.len() - 1]) {
        Err(e) => println!("truncated: {}", e),
        Ok(_) => println!("truncated buffer decoded unexpectedly"),
    }

    Ok(())
}
