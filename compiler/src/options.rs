use serde::{Deserialize, Serialize};

use crate::{error::CddlError, plan::EncodingPolicy};

/// Version of the runtime crate the generated manifests depend on.
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which backends a run renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backends {
    pub native: bool,
    pub bridge: bool,
    pub schema: bool,
}

impl Default for Backends {
    fn default() -> Self {
        Backends { native: true, bridge: true, schema: true }
    }
}

/// Options for one generation run. Every field has a default, so a config
/// file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub native_crate:    String,
    pub bridge_crate:    String,
    pub runtime_version: String,
    pub encoding:        EncodingPolicy,
    pub backends:        Backends,
    /// Render the backends concurrently.
    pub parallel:        bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        GenerationOptions {
            native_crate:    "cddl-native".to_owned(),
            bridge_crate:    "cddl-wasm".to_owned(),
            runtime_version: RUNTIME_VERSION.to_owned(),
            encoding:        EncodingPolicy::default(),
            backends:        Backends::default(),
            parallel:        true,
        }
    }
}

impl GenerationOptions {
    pub fn from_json(text: &str) -> Result<GenerationOptions, CddlError> {
        let options: GenerationOptions =
            serde_json::from_str(text).map_err(|e| CddlError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Crate names end up in generated manifests and `use` paths.
    pub fn validate(&self) -> Result<(), CddlError> {
        for (field, name) in [("native_crate", &self.native_crate), ("bridge_crate", &self.bridge_crate)] {
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                && name.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
            if !valid {
                return Err(CddlError::Config(format!("{} {:?} is not a valid crate name", field, name)));
            }
        }
        if self.backends.bridge && !self.backends.native {
            return Err(CddlError::Config("the bridge backend wraps the native crate and needs it enabled".to_owned()));
        }
        if self.native_crate == self.bridge_crate {
            return Err(CddlError::Config("native_crate and bridge_crate must differ".to_owned()));
        }
        Ok(())
    }

    /// `cddl-native` as it is spelled in Rust paths.
    pub fn native_lib_name(&self) -> String {
        self.native_crate.replace('-', "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ArrayLength;

    #[test]
    fn test_defaults() {
        let options = GenerationOptions::from_json("{}").unwrap();
        assert_eq!(options, GenerationOptions::default());
        assert_eq!(options.native_crate, "cddl-native");
        assert_eq!(options.native_lib_name(), "cddl_native");
        assert!(options.backends.native && options.backends.bridge && options.backends.schema);
        assert!(options.parallel);
    }

    #[test]
    fn test_partial_config() {
        let options = GenerationOptions::from_json(
            r#"{ "native_crate": "ledger", "encoding": { "array_length": "indefinite" }, "backends": { "bridge": false } }"#,
        )
        .unwrap();
        assert_eq!(options.native_crate, "ledger");
        assert_eq!(options.encoding.array_length, ArrayLength::Indefinite);
        assert!(!options.encoding.canonical_map_order);
        assert!(!options.backends.bridge);
        assert!(options.backends.schema);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(GenerationOptions::from_json("{ \"parallel\": 3 }"), Err(CddlError::Config(_))));
        assert!(matches!(GenerationOptions::from_json("{ \"native_crate\": \"a b\" }"), Err(CddlError::Config(_))));
        assert!(matches!(
            GenerationOptions::from_json("{ \"backends\": { \"native\": false } }"),
            Err(CddlError::Config(_))
        ));
    }
}
