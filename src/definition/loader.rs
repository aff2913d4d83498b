use anyhow::{Context as AnyhowContext, Result};
use std::fs;
use crate::definition::{DefinitionDocument, ProcessDefinition};

pub fn load_definition_from_yaml_str(yaml_content: &str) -> Result<ProcessDefinition> {
    let document: DefinitionDocument = serde_yaml::from_str(yaml_content)
        .context("Failed to deserialize process definition")?;
    let id = document.id.clone();
    let definition = document
        .into_definition()
        .with_context(|| format!("Invalid process definition {}", id))?;
    Ok(definition)
}

pub fn load_definition_from_yaml(file_path: &str) -> Result<ProcessDefinition> {
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read YAML file from {}", file_path))?;

    load_definition_from_yaml_str(&yaml_content)
        .with_context(|| format!("Failed to load definition from {}", file_path))
}
