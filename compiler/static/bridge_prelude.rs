//! Generated by brine-cddl from {{sources}}. Do not edit by hand.

#![allow(clippy::all, dead_code, unused_imports, non_snake_case)]

use std::collections::BTreeMap;

use brine_cddl_runtime::{
    decode_array, decode_embedded, decode_nint, decode_table, expect_tag, expect_value, narrow, narrow_f32,
    ConversionError, DecodeError, FromCbor, Nint, ToCbor, Value,
};
use wasm_bindgen::prelude::*;

use {{native_lib}} as native;

fn conversion_error(error: ConversionError) -> JsError {
    JsError::new(&error.to_string())
}

fn decode_error(error: DecodeError) -> JsError {
    JsError::new(&error.to_string())
}

fn any_from_bytes(bytes: &[u8]) -> Result<Value, JsError> {
    Value::decode(bytes).map_err(decode_error)
}
