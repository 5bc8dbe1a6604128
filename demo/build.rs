use std::{env, fs, path::PathBuf};

use brine_cddl_compiler::{compile, compile_graph_to_rust, CddlError, SchemaSource};

const SCHEMAS: [&str; 2] = ["schema/orders.cddl", "schema/ledger.cddl"];

fn main() -> Result<(), CddlError> {
    let mut sources = Vec::new();
    for path in SCHEMAS {
        println!("cargo:rerun-if-changed={}", path);
        sources.push(SchemaSource::new(path, fs::read_to_string(path)?));
    }
    let names: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();

    let compilation = compile(&sources, &[])?;
    let lib = compile_graph_to_rust(&compilation.graph, &compilation.plans, &names)?;

    // The output is included as a module, where crate level docs and
    // attributes are not allowed.
    let module: String = lib
        .lines()
        .filter(|line| !line.starts_with("//!") && !line.starts_with("#!["))
        .map(|line| format!("{}\n", line))
        .collect();

    let out_dir = env::var_os("OUT_DIR").ok_or_else(|| CddlError::Config("OUT_DIR is not set".to_owned()))?;
    fs::write(PathBuf::from(out_dir).join("schemas.rs"), module)?;
    Ok(())
}
