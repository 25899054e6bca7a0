//! JSON model generator: the resolved model as a byte-stable document.

use anyhow::{Context, Result};
use nodegen_ir::ResolvedModel;

pub struct JsonModelGenerator;

impl crate::Codegen for JsonModelGenerator {
    fn generate(&self, model: &ResolvedModel) -> Result<crate::GeneratedCode> {
        let mut content =
            serde_json::to_string_pretty(model).context("failed to serialize resolved model")?;
        content.push('\n');
        Ok(crate::GeneratedCode {
            files: vec![crate::GeneratedFile {
                path: "model.json".into(),
                content,
            }],
        })
    }

    fn language(&self) -> &str {
        "json"
    }
}
