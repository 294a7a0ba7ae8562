use thiserror::Error;

use crate::binding::PropertyKind;
use crate::panel::PanelId;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Bridge {route} already created panel {first}, rejected {rejected}")]
    BridgeAlreadyCreated {
        route: String,
        first: PanelId,
        rejected: PanelId,
    },

    #[error("Panel '{0}' is not declared in the group")]
    UnknownPanel(String),

    #[error("Group configuration error: {0}")]
    Schema(#[from] bui_schema::SchemaError),
}

/// Why a value could not be written into a view-model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("View-model has no property '{0}'")]
    UnknownProperty(String),

    #[error("Property '{property}' expects {expected}, got {found}")]
    TypeMismatch {
        property: String,
        expected: PropertyKind,
        found: String,
    },
}
