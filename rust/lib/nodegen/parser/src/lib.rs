//! Schema front-ends.
//!
//! Produces a [`Schema`] from either source form:
//! - `.nodes` files (line-oriented DSL, see [`dsl`])
//! - `.json` files (the serialized `Schema` itself)

pub mod dsl;
pub mod util;

use std::path::{Path, PathBuf};

use nodegen_ir::Schema;
use thiserror::Error;
use tracing::debug;

pub use dsl::{parse, tag_externals};

/// A malformed `.nodes` line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{source}", .path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("{}: invalid JSON schema: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a JSON-encoded schema.
pub fn parse_json(input: &str) -> Result<Schema, serde_json::Error> {
    serde_json::from_str(input)
}

/// Read a schema file, picking the front-end by extension.
pub fn load_schema(path: impl AsRef<Path>) -> Result<Schema, LoadError> {
    let path = path.as_ref();
    let input = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    debug!(path = %path.display(), json = is_json, "loading schema");

    if is_json {
        parse_json(&input).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        parse(&input).map_err(|source| LoadError::Syntax {
            path: path.to_path_buf(),
            source,
        })
    }
}
