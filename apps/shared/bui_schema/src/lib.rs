//! Persisted configuration for BridgeUI panel groups
//!
//! A panel group is authored visually and stored as JSON: the list of bridge
//! records (`in_node -> out_node` with a show model) and, per panel, where its
//! visual asset comes from and the [`UiType`] it is displayed with.
//!
//! Every document is validated twice on load: structurally, against the JSON
//! Schema derived from the Rust types, and semantically via [`Validatable::check`].

use schemars::JsonSchema;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub mod error;
pub mod group;
pub mod ui_type;

pub use error::{Result, SchemaError};
pub use group::{
    BridgeInfo, GraphIssue, GraphRecord, LoadType, PanelGroupConfig, PanelNode, PanelSource,
    ShowModel,
};
pub use ui_type::{CloseRule, FormType, HideRule, UiAnim, UiType};

/// Trait for documents that can be validated against their JSON Schema
pub trait Validatable: JsonSchema + for<'de> Deserialize<'de> {
    /// Semantic checks the schema cannot express (value ranges, cross references)
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Load and validate from a JSON file
    fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Reading {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| SchemaError::Io(path.display().to_string(), e))?;

        Self::from_json_str(&content)
    }

    /// Load and validate from a JSON string
    fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let schema_json = serde_json::to_value(Self::generate_schema())?;
        let compiled = jsonschema::validator_for(&schema_json)
            .map_err(|e| SchemaError::Validation(e.to_string()))?;

        compiled
            .validate(&value)
            .map_err(|e| SchemaError::Validation(e.to_string()))?;

        let document: Self = serde_json::from_value(value)?;
        document.check()?;
        Ok(document)
    }

    /// Generate JSON Schema for this type
    fn generate_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Self)
    }

    /// Generate JSON Schema as a pretty-printed JSON string
    fn schema_json() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::generate_schema())?)
    }
}
