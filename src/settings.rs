//! Editor settings.
//!
//! Settings are resolved once at startup (defaults, optionally overridden by a
//! JSON file) and passed explicitly into the editor.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::canvas::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Where newly added compartments are placed before the next layout.
    pub default_node_position: Position,
    /// Maximum number of undo steps kept per workspace.
    pub history_depth: usize,
    pub compartment_id_prefix: String,
    pub constant_id_prefix: String,
    pub intervention_id_prefix: String,
    pub flow_id_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_node_position: Position::new(0.0, 0.0),
            history_depth: 100,
            compartment_id_prefix: "c".to_string(),
            constant_id_prefix: "k".to_string(),
            intervention_id_prefix: "u".to_string(),
            flow_id_prefix: "f".to_string(),
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Parse settings JSON")
    }

    pub fn load<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("Open {}", path))?;
        Self::from_json_str(&text).with_context(|| format!("Failed to load settings {}", path))
    }
}
