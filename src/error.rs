//! Error types for schema configuration, extraction, and splitting.

use crate::schema::ScalarKind;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Problems with the schema itself. Always detected before any input is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cyclic field dependencies between: {}", fields.join(", "))]
    CyclicDependency { fields: Vec<String> },

    #[error("field `{field}` depends on undeclared field `{dependency}`")]
    UnknownDependency { field: String, dependency: String },

    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    #[error("schema has no split_path; it is required to split a document")]
    MissingSplitPath,

    #[error("field `{0}` sets both `path` and `absolute_path`")]
    AmbiguousSource(String),

    #[error("invalid filter on field `{field}`: {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("invalid transform on field `{field}`: {reason}")]
    InvalidTransform { field: String, reason: String },

    #[error("invalid type on field `{field}`: {reason}")]
    InvalidType { field: String, reason: String },

    #[error("failed to read schema {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A value could not be converted to its declared type.
///
/// This aborts the whole run; schemas that expect dirty data must filter it
/// out before the cast.
#[derive(Debug, Error)]
#[error("field `{field}`: cannot cast {value:?} to {kind}")]
pub struct CastError {
    pub field: String,
    pub kind: ScalarKind,
    pub value: String,
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("no element at split path `{0}` was found; nothing to split")]
    NoSplitElements(String),

    #[error("part count must be at least 1")]
    ZeroParts,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cast(#[from] CastError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("xml error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("failed to write fragment: {0}")]
    Write(#[from] quick_xml::Error),

    #[error("invalid UTF-8 at byte {position}: {source}")]
    Encoding {
        position: u64,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("document ended with {0} unclosed element(s)")]
    UnexpectedEof(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("extraction of fragment {} failed: {source}", fragment.display())]
    Worker {
        fragment: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("output writer stopped before all records were delivered")]
    SinkClosed,

    #[error("extraction cancelled after another fragment failed")]
    Cancelled,
}

impl Error {
    pub(crate) fn xml(position: u64, source: impl Into<quick_xml::Error>) -> Self {
        Error::Xml {
            position,
            source: source.into(),
        }
    }
}
