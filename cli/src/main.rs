use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brine_cddl::{decode_to_json, encode_from_json};
use brine_cddl_compiler::error::CddlError;
use brine_cddl_compiler::{compile, compile_graph_to_schema, generate, GenerationOptions, SchemaSource};

mod sink;

use sink::DirectorySink;

#[derive(Parser)]
#[command(name = "bcddl")]
#[command(about = "Generate Rust, wasm bindings and a schema export from CDDL, or encode and decode instances", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the native crate, the wasm bridge crate and `schema.json`
    Generate {
        /// Input `.cddl` files, read in the order given
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Root rules (defaults to every non-generic rule)
        #[arg(short, long)]
        root: Vec<String>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// JSON file with generation options
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        no_native: bool,

        #[arg(long)]
        no_bridge: bool,

        #[arg(long)]
        no_schema: bool,

        /// Render the backends one after another
        #[arg(long)]
        sequential: bool,
    },

    /// Print the schema export (or write it with `-o`)
    Export {
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        #[arg(short, long)]
        root: Vec<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a CBOR file as a root rule and print it as JSON
    Decode {
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        #[arg(short, long)]
        root: String,

        /// CBOR input
        #[arg(long)]
        data: PathBuf,
    },

    /// Encode a JSON instance of a root rule to CBOR
    Encode {
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        #[arg(short, long)]
        root: String,

        /// JSON input
        #[arg(long)]
        json: PathBuf,

        /// CBOR output
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn read_sources(paths: &[PathBuf]) -> Result<Vec<SchemaSource>, CddlError> {
    paths
        .iter()
        .map(|path| Ok(SchemaSource::new(path.display().to_string(), fs::read_to_string(path)?)))
        .collect()
}

fn load_options(config: Option<&Path>) -> Result<GenerationOptions, CddlError> {
    match config {
        Some(path) => GenerationOptions::from_json(&fs::read_to_string(path)?),
        None => Ok(GenerationOptions::default()),
    }
}

fn main() -> Result<(), CddlError> {
    // Logs go to stderr so stdout only carries command output.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { input, root, output, config, no_native, no_bridge, no_schema, sequential } => {
            let sources = read_sources(input)?;
            let mut options = load_options(config.as_deref())?;
            options.backends.native &= !no_native;
            options.backends.bridge &= !no_bridge;
            options.backends.schema &= !no_schema;
            options.parallel &= !sequential;

            let mut sink = DirectorySink::new(output);
            let artifacts = generate(&sources, root, &options, &mut sink)?;
            for path in artifacts.paths() {
                println!("{}", output.join(path).display());
            }
            Ok(())
        }

        Commands::Export { input, root, output } => {
            let sources = read_sources(input)?;
            let compilation = compile(&sources, root)?;
            let schema = compile_graph_to_schema(&compilation.graph, &compilation.plans)?;
            if let Some(out_path) = output {
                fs::write(out_path, &schema)?;
                println!("Schema export written to {}", out_path.display());
            } else {
                println!("{}", schema);
            }
            Ok(())
        }

        Commands::Decode { input, root, data } => {
            let sources = read_sources(input)?;
            let compilation = compile(&sources, std::slice::from_ref(root))?;
            let bytes = fs::read(data)?;
            println!("{}", decode_to_json(&compilation, root, &bytes)?);
            Ok(())
        }

        Commands::Encode { input, root, json, output } => {
            let sources = read_sources(input)?;
            let compilation = compile(&sources, std::slice::from_ref(root))?;
            let text = fs::read_to_string(json)?;
            let bytes = encode_from_json(&compilation, root, &text)?;
            fs::write(output, &bytes)?;
            println!("Encoded {} → {} ({} bytes)", json.display(), output.display(), bytes.len());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_flags() {
        let cli = Cli::parse_from([
            "bcddl", "generate", "-i", "a.cddl", "-i", "b.cddl", "-r", "order", "-o", "out", "--no-bridge",
        ]);
        match cli.command {
            Commands::Generate { input, root, output, no_bridge, no_native, .. } => {
                assert_eq!(input, vec![PathBuf::from("a.cddl"), PathBuf::from("b.cddl")]);
                assert_eq!(root, vec!["order".to_owned()]);
                assert_eq!(output, PathBuf::from("out"));
                assert!(no_bridge);
                assert!(!no_native);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_sources_and_config_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("point.cddl");
        fs::write(&schema, "point = { x: int, y: int }").unwrap();
        let config = dir.path().join("options.json");
        fs::write(&config, r#"{ "native_crate": "points" }"#).unwrap();

        let sources = read_sources(&[schema.clone()]).unwrap();
        assert_eq!(sources[0].name, schema.display().to_string());
        assert_eq!(load_options(Some(&config)).unwrap().native_crate, "points");
        assert!(matches!(read_sources(&[dir.path().join("missing.cddl")]), Err(CddlError::Io(_))));
    }
}
