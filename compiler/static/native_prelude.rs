//! Generated by brine-cddl from {{sources}}. Do not edit by hand.

#![allow(clippy::all, dead_code, unused_imports, unused_mut)]

use std::collections::BTreeMap;

use brine_cddl_runtime::{
    check_length, check_range, decode_array, decode_embedded, decode_nint, decode_table, expect_tag, expect_value,
    first_match, leading_item, map_lookup, tag_number, ArrayReader, DecodeError, DecodeErrorKind, FromCbor, MapReader,
    Nint, ToCbor, Value,
};

fn no_alternative(type_name: &str) -> DecodeError {
    DecodeError::new(DecodeErrorKind::NoMatchingAlternative(type_name.to_owned()))
}
