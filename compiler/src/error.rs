use std::fmt;

use brine_cddl_runtime::DecodeError;
use serde::Serialize;
use thiserror::Error;

/// Position inside a schema document. Lines and columns are 1-based.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub source: String,
    pub line:   usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum CddlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error at {location}: expected {expected} but found {found}")]
    SyntaxError {
        location: Location,
        expected: String,
        found:    String,
    },

    #[error("Unresolved reference {name} in rule {rule}")]
    UnresolvedReference {
        name: String,
        rule: String,
    },

    #[error("Generic rule {rule} takes {expected} arguments but {found} were given")]
    GenericArityMismatch {
        rule:     String,
        expected: usize,
        found:    usize,
    },

    #[error("Unsupported construct in rule {rule}: {detail}")]
    UnsupportedConstruct {
        rule:   String,
        detail: String,
    },

    #[error("Invalid range in rule {rule}: {detail}")]
    InvalidRange {
        rule:   String,
        detail: String,
    },

    #[error("Verifier error: {0}")]
    VerifierError(String),

    #[error("Invalid instance at {path}: {reason}")]
    InvalidInstance {
        path:   String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl CddlError {
    pub fn unsupported(rule: &str, detail: impl Into<String>) -> CddlError {
        CddlError::UnsupportedConstruct { rule: rule.to_owned(), detail: detail.into() }
    }

    pub fn invalid_range(rule: &str, detail: impl Into<String>) -> CddlError {
        CddlError::InvalidRange { rule: rule.to_owned(), detail: detail.into() }
    }
}
