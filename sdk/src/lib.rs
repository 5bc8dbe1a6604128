//! brine-cddl
//!
//! This crate bundles the compiler and the runtime behind one dependency.
//!
//! - `compile` / `generate` (re-exported from the compiler)
//! - `ToCbor` / `FromCbor` and the dynamic `Value` (re-exported from the runtime)
//! - Helpers that move instances between JSON and CBOR for a compiled schema

pub use brine_cddl_compiler::{
    compile, generate, ArtifactSink, Artifacts, Codec, Compilation, GenerationOptions, MemorySink, SchemaSource,
};
pub use brine_cddl_compiler::error::CddlError;
pub use brine_cddl_runtime::{DecodeError, FromCbor, ToCbor, Value};

/// Decode a CBOR buffer as `root` into a pretty-printed JSON string.
pub fn decode_to_json(compilation: &Compilation, root: &str, buffer: &[u8]) -> Result<String, CddlError> {
    let instance = compilation.codec().decode(root, buffer)?;
    serde_json::to_string_pretty(&instance)
        .map_err(|e| CddlError::InvalidInstance { path: "$".to_owned(), reason: e.to_string() })
}

/// Encode a JSON instance of `root` to CBOR.
pub fn encode_from_json(compilation: &Compilation, root: &str, json: &str) -> Result<Vec<u8>, CddlError> {
    let instance: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| CddlError::InvalidInstance { path: "$".to_owned(), reason: e.to_string() })?;
    compilation.codec().encode(root, &instance)
}

pub mod traits {
    pub use brine_cddl_compiler::traits::{ArtifactSink, MemorySink};
    pub use brine_cddl_runtime::{FromCbor, ToCbor};
}

pub mod error {
    pub use brine_cddl_compiler::error::{CddlError, Location};
    pub use brine_cddl_runtime::{DecodeError, DecodeErrorKind};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_helpers() {
        let compilation = compile(&[SchemaSource::new("point.cddl", "point = { x: int, y: int }")], &[]).unwrap();
        let bytes = encode_from_json(&compilation, "point", r#"{ "x": 1, "y": -2 }"#).unwrap();
        assert_eq!(bytes, vec![0xa2, 0x61, b'x', 0x01, 0x61, b'y', 0x21]);
        let json = decode_to_json(&compilation, "point", &bytes).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&json).unwrap(), serde_json::json!({ "x": 1, "y": -2 }));

        assert!(matches!(encode_from_json(&compilation, "point", "{"), Err(CddlError::InvalidInstance { .. })));
        assert!(matches!(decode_to_json(&compilation, "point", &[0xa0]), Err(CddlError::Decode(_))));
    }
}
