//! Codegen Library - renderers over the resolved node model.
//!
//! Every target consumes the same [`ResolvedModel`]; none of them re-derive
//! policy, so all targets agree on traversal and copy behavior.

pub mod json_model;
pub mod naming;
pub mod rust_nodes;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

pub use nodegen_ir::ResolvedModel;

pub use json_model::JsonModelGenerator;
pub use rust_nodes::RustNodesGenerator;

/// Codegen trait - implement this for each target language
pub trait Codegen {
    fn generate(&self, model: &ResolvedModel) -> Result<GeneratedCode>;
    fn language(&self) -> &str;
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedCode {
    pub files: Vec<GeneratedFile>,
}

#[derive(Debug, Clone)]
pub struct GeneratedFile {
    /// Relative to the output directory.
    pub path: String,
    pub content: String,
}

/// Target names accepted by [`generator_for`].
pub fn available_targets() -> &'static [&'static str] {
    &["json", "rust"]
}

/// Look up a generator by target name.
pub fn generator_for(target: &str) -> Option<Box<dyn Codegen>> {
    match target {
        "json" => Some(Box::new(JsonModelGenerator)),
        "rust" => Some(Box::new(RustNodesGenerator)),
        _ => None,
    }
}

/// Write generated files below `dir`, creating directories as needed.
pub fn write_generated(code: &GeneratedCode, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(code.files.len());
    for file in &code.files {
        let path = dir.join(&file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, &file.content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), bytes = file.content.len(), "wrote generated file");
        written.push(path);
    }
    info!(files = written.len(), dir = %dir.display(), "generated files written");
    Ok(written)
}
