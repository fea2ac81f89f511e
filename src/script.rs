// script.rs - Scene script parsing
use crate::types::{Scene, SceneInput};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Invalid JSON format: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Input must be an array of scenes")]
    NotAnArray,
    #[error("Scene entry {index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },
    #[error("Scene number {0} appears more than once")]
    DuplicateScene(String),
}

/// Parse a scene script into fresh idle scenes.
///
/// The whole batch fails on the first problem; nothing is returned partially.
pub fn parse_scene_script(json: &str, style_prompt: &str) -> Result<Vec<Scene>, ScriptError> {
    let value: Value = serde_json::from_str(json)?;
    let items = match value {
        Value::Array(items) => items,
        _ => return Err(ScriptError::NotAnArray),
    };

    let mut seen = HashSet::new();
    let mut inputs = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let input: SceneInput = serde_json::from_value(item).map_err(|e| ScriptError::InvalidEntry {
            index,
            reason: e.to_string(),
        })?;

        // Export names archive entries after the scene number
        let key = input.scene.to_string();
        if !seen.insert(key.clone()) {
            return Err(ScriptError::DuplicateScene(key));
        }
        inputs.push(input);
    }

    Ok(inputs
        .into_iter()
        .map(|input| Scene::from_input(input, style_prompt))
        .collect())
}
