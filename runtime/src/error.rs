use std::fmt;

use thiserror::Error;

/// One step into a decoded value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Location of a failure inside a decoded value, outermost segment first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath(pub Vec<PathSegment>);

impl FieldPath {
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum DecodeErrorKind {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    #[error("malformed CBOR at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error("{0} trailing bytes after the top-level item")]
    TrailingBytes(usize),

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("expected {expected} but found {found}")]
    UnexpectedType { expected: String, found: String },

    #[error("missing required field")]
    MissingField,

    #[error("unknown map key {0}")]
    UnknownKey(String),

    #[error("duplicate map key {0}")]
    DuplicateKey(String),

    #[error("expected fixed value {expected} but found {found}")]
    FixedMismatch { expected: String, found: String },

    #[error("value {value} is outside {range}")]
    OutOfRange { value: String, range: String },

    #[error("length {len} is outside {range}")]
    LengthOutOfRange { len: usize, range: String },

    #[error("expected tag {expected} but found {found}")]
    TagMismatch { expected: u64, found: String },

    #[error("no alternative of {0} matched")]
    NoMatchingAlternative(String),
}

/// Error produced when a CBOR value does not satisfy a generated type.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{path}: {kind}")]
pub struct DecodeError {
    pub path: FieldPath,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind) -> DecodeError {
        DecodeError { path: FieldPath::default(), kind }
    }

    pub fn unexpected_type(expected: impl Into<String>, found: impl Into<String>) -> DecodeError {
        DecodeError::new(DecodeErrorKind::UnexpectedType { expected: expected.into(), found: found.into() })
    }

    /// Prefix the path with a field name.
    pub fn in_field(mut self, name: &str) -> DecodeError {
        self.path.0.insert(0, PathSegment::Field(name.to_owned()));
        self
    }

    /// Prefix the path with an array index.
    pub fn at_index(mut self, index: usize) -> DecodeError {
        self.path.0.insert(0, PathSegment::Index(index));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_built_outside_in() {
        let err = DecodeError::new(DecodeErrorKind::MissingField)
            .in_field("y")
            .at_index(2)
            .in_field("points");
        assert_eq!(err.path.to_string(), "$.points[2].y");
        assert_eq!(err.to_string(), "$.points[2].y: missing required field");
    }

    #[test]
    fn root_path() {
        let err = DecodeError::new(DecodeErrorKind::TrailingBytes(3));
        assert!(err.path.is_root());
        assert_eq!(err.to_string(), "$: 3 trailing bytes after the top-level item");
    }
}
