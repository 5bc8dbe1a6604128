//! Support code for types generated from CDDL schemas: CBOR byte buffers, a
//! dynamic [Value], decode helpers with field paths, and checked conversions
//! for host bindings.

pub mod bb;
pub mod bridge;
pub mod error;
pub mod nint;
pub mod reader;
pub mod traits;
pub mod value;

pub use bb::{ByteBuffer, ByteBufferMut};
pub use bridge::{narrow, narrow_f32, ConversionError};
pub use error::{DecodeError, DecodeErrorKind, FieldPath, PathSegment};
pub use nint::Nint;
pub use reader::{
    check_length, check_range, decode_array, decode_embedded, decode_nint, decode_table, expect_tag, expect_value,
    first_match, leading_item, map_lookup, tag_number, ArrayReader, MapReader,
};
pub use traits::{FromCbor, ToCbor};
pub use value::Value;
