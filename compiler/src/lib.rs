//! brine-cddl-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for `.cddl` schema files,
//!  2) A resolver that turns rules into a type graph (generics, sockets, recursion),
//!  3) A verifier and an encoding planner for canonical CBOR,
//!  4) Code generation: a native Rust crate, a wasm bridge crate and a JSON schema export,
//!  5) A reference codec that encodes and decodes JSON instances straight from the graph,
//!  6) Error types (`CddlError`) and the `ArtifactSink` trait.

pub mod error;
pub mod ast;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod parser;
pub mod comments;
pub mod resolver;
pub mod verifier;
pub mod plan;
pub mod options;
pub mod templates;
pub mod codec;
pub mod compiler;
pub mod gen_rust;
pub mod gen_wasm;
pub mod gen_schema;
pub mod traits;

pub use codec::Codec;
pub use compiler::{compile, compile_with_policy, generate, render_artifacts, Artifact, Artifacts, Compilation, SchemaSource};
pub use error::CddlError;
pub use gen_rust::compile_graph_to_rust;
pub use gen_schema::compile_graph_to_schema;
pub use gen_wasm::compile_graph_to_wasm;
pub use options::{Backends, GenerationOptions};
pub use plan::{ArrayLength, EncodingPolicy, Plans};
pub use traits::{ArtifactSink, MemorySink};
pub use types::TypeGraph;
