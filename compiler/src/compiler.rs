use tracing::{debug, info};

use crate::{
    ast::SchemaDoc,
    codec::Codec,
    error::CddlError,
    gen_rust::compile_graph_to_rust,
    gen_schema::compile_graph_to_schema,
    gen_wasm::compile_graph_to_wasm,
    options::GenerationOptions,
    parser::parse_document,
    plan::{plan_graph, EncodingPolicy, Plans},
    resolver::build_graph,
    templates::{render, BRIDGE_MANIFEST, NATIVE_MANIFEST},
    traits::ArtifactSink,
    types::TypeGraph,
};

/// One schema document. `name` is used in locations and generated headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    pub name: String,
    pub text: String,
}

impl SchemaSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> SchemaSource {
        SchemaSource { name: name.into(), text: text.into() }
    }
}

/// The resolved graph of a schema set and its encoding plans.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub graph: TypeGraph,
    pub plans: Plans,
}

impl Compilation {
    pub fn codec(&self) -> Codec<'_> {
        Codec::new(&self.graph, &self.plans)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path relative to the output directory, `/` separated.
    pub path:     String,
    pub contents: String,
}

/// Everything one run produces, in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub files: Vec<Artifact>,
}

impl Artifacts {
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.iter().find(|a| a.path == path).map(|a| a.contents.as_str())
    }

    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|a| a.path.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn push(&mut self, path: String, contents: String) {
        self.files.push(Artifact { path, contents });
    }
}

pub fn parse_sources(sources: &[SchemaSource]) -> Result<Vec<SchemaDoc>, CddlError> {
    sources
        .iter()
        .map(|source| {
            let doc = parse_document(&source.name, &source.text)?;
            debug!(source = %source.name, rules = doc.rules.len(), "parsed schema document");
            Ok(doc)
        })
        .collect()
}

/// Parse, resolve and plan `sources` with the default encoding policy.
/// An empty `roots` makes every non-generic rule a root.
pub fn compile(sources: &[SchemaSource], roots: &[String]) -> Result<Compilation, CddlError> {
    compile_with_policy(sources, roots, &EncodingPolicy::default())
}

pub fn compile_with_policy(
    sources: &[SchemaSource],
    roots: &[String],
    policy: &EncodingPolicy,
) -> Result<Compilation, CddlError> {
    let docs = parse_sources(sources)?;
    let graph = build_graph(&docs, roots)?;
    let plans = plan_graph(&graph, policy)?;
    Ok(Compilation { graph, plans })
}

/// Render every enabled backend in memory.
pub fn render_artifacts(
    compilation: &Compilation,
    source_names: &[String],
    options: &GenerationOptions,
) -> Result<Artifacts, CddlError> {
    let Compilation { graph, plans } = compilation;
    let native_lib = options.native_lib_name();

    let render_native = || -> Result<Option<String>, CddlError> {
        match options.backends.native {
            true => compile_graph_to_rust(graph, plans, source_names).map(Some),
            false => Ok(None),
        }
    };
    let render_bridge = || -> Result<Option<String>, CddlError> {
        match options.backends.bridge {
            true => compile_graph_to_wasm(graph, plans, source_names, &native_lib).map(Some),
            false => Ok(None),
        }
    };
    let render_schema = || -> Result<Option<String>, CddlError> {
        match options.backends.schema {
            true => compile_graph_to_schema(graph, plans).map(Some),
            false => Ok(None),
        }
    };

    // The backends only read the graph, so they can run side by side.
    let (native, (bridge, schema)) = if options.parallel {
        rayon::join(render_native, || rayon::join(render_bridge, render_schema))
    } else {
        (render_native(), (render_bridge(), render_schema()))
    };

    let mut artifacts = Artifacts::default();
    if let Some(lib) = native? {
        let manifest = render(
            NATIVE_MANIFEST,
            &[("crate_name", &options.native_crate), ("runtime_version", &options.runtime_version)],
        );
        artifacts.push(format!("{}/Cargo.toml", options.native_crate), manifest);
        artifacts.push(format!("{}/src/lib.rs", options.native_crate), lib);
    }
    if let Some(lib) = bridge? {
        let manifest = render(
            BRIDGE_MANIFEST,
            &[
                ("crate_name", &options.bridge_crate),
                ("native_crate", &options.native_crate),
                ("runtime_version", &options.runtime_version),
            ],
        );
        artifacts.push(format!("{}/Cargo.toml", options.bridge_crate), manifest);
        artifacts.push(format!("{}/src/lib.rs", options.bridge_crate), lib);
    }
    if let Some(schema) = schema? {
        artifacts.push("schema.json".to_owned(), schema);
    }
    Ok(artifacts)
}

/// Run the whole pipeline and hand the result to `sink` in a single commit.
/// Nothing reaches the sink when any stage fails.
pub fn generate(
    sources: &[SchemaSource],
    roots: &[String],
    options: &GenerationOptions,
    sink: &mut dyn ArtifactSink,
) -> Result<Artifacts, CddlError> {
    options.validate()?;
    let compilation = compile_with_policy(sources, roots, &options.encoding)?;
    let source_names: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();
    let artifacts = render_artifacts(&compilation, &source_names, options)?;
    sink.commit(&artifacts)?;
    info!(
        types = compilation.graph.len(),
        artifacts = artifacts.len(),
        "generated {} from {}",
        artifacts.paths().join(", "),
        source_names.join(", ")
    );
    Ok(artifacts)
}
