//! Per-panel display configuration
//!
//! [`UiType`] tells the runtime how a panel is hidden, how it is closed, which
//! animations play on enter/quit and whether the panel can be dragged. The
//! `layer`/`layer_index` pair is consumed by the engine-side placement code only.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Result, SchemaError};

/// How a panel is hidden
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HideRule {
    /// Fade to `hide_alpha` and stop blocking input
    #[default]
    AlphaFade,
    /// Deactivate the visual object
    Deactivate,
    /// Only the logical flag changes
    None,
}

/// What `close` does once the quit animation (if any) has finished
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CloseRule {
    /// Synchronous teardown
    DestroyImmediate,
    /// Teardown after a short fixed delay, lets effects finish
    DestroyDeferred,
    /// Teardown on the next tick
    #[default]
    DestroyNormal,
    /// Hide instead of destroying
    HideInstead,
}

/// Enter or quit animation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UiAnim {
    #[default]
    None,
    /// Animation played by the engine under this name
    Named(String),
}

impl UiAnim {
    pub fn named(name: impl Into<String>) -> Self {
        UiAnim::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            UiAnim::None => None,
            UiAnim::Named(name) => Some(name),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, UiAnim::None)
    }
}

/// Behaviors appended to a panel when it starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    #[default]
    Plain,
    /// The panel can be dragged around by the user
    Draggable,
}

fn default_hide_alpha() -> f32 {
    0.1
}

fn default_anim_duration() -> f32 {
    0.25
}

/// Display configuration of a panel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "How a panel is placed, hidden, closed and animated")]
pub struct UiType {
    #[serde(default)]
    pub form: FormType,

    /// Placement layer (engine side)
    #[serde(default)]
    pub layer: u32,

    /// Sibling index inside the layer, negative values count from the end
    #[serde(default)]
    pub layer_index: i32,

    #[serde(default)]
    pub hide_rule: HideRule,

    /// Alpha applied by [`HideRule::AlphaFade`], 0.0-1.0
    #[serde(default = "default_hide_alpha")]
    pub hide_alpha: f32,

    #[serde(default)]
    pub close_rule: CloseRule,

    #[serde(default)]
    pub enter_anim: UiAnim,

    #[serde(default)]
    pub quit_anim: UiAnim,

    /// Duration of enter/quit animations in seconds
    #[serde(default = "default_anim_duration")]
    pub anim_duration: f32,
}

impl Default for UiType {
    fn default() -> Self {
        Self {
            form: FormType::default(),
            layer: 0,
            layer_index: 0,
            hide_rule: HideRule::default(),
            hide_alpha: default_hide_alpha(),
            close_rule: CloseRule::default(),
            enter_anim: UiAnim::None,
            quit_anim: UiAnim::None,
            anim_duration: default_anim_duration(),
        }
    }
}

impl UiType {
    pub fn with_form(mut self, form: FormType) -> Self {
        self.form = form;
        self
    }

    pub fn with_layer(mut self, layer: u32, layer_index: i32) -> Self {
        self.layer = layer;
        self.layer_index = layer_index;
        self
    }

    pub fn with_hide_rule(mut self, rule: HideRule, alpha: f32) -> Self {
        self.hide_rule = rule;
        self.hide_alpha = alpha;
        self
    }

    pub fn with_close_rule(mut self, rule: CloseRule) -> Self {
        self.close_rule = rule;
        self
    }

    pub fn with_anims(mut self, enter: UiAnim, quit: UiAnim) -> Self {
        self.enter_anim = enter;
        self.quit_anim = quit;
        self
    }

    pub fn with_anim_duration(mut self, seconds: f32) -> Self {
        self.anim_duration = seconds;
        self
    }

    /// Range checks the JSON Schema does not cover
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.hide_alpha) {
            return Err(SchemaError::Validation(format!(
                "hide_alpha must be within 0.0-1.0, got {}",
                self.hide_alpha
            )));
        }
        if !self.anim_duration.is_finite() || self.anim_duration < 0.0 {
            return Err(SchemaError::Validation(format!(
                "anim_duration must be a non-negative number of seconds, got {}",
                self.anim_duration
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let ui: UiType = serde_json::from_str("{}").unwrap();
        assert_eq!(ui, UiType::default());
        assert_eq!(ui.close_rule, CloseRule::DestroyNormal);
        assert!(ui.enter_anim.is_none());
    }

    #[test]
    fn test_deserialize_full() {
        let json = r#"{
            "form": "draggable",
            "layer": 2,
            "hide_rule": "deactivate",
            "close_rule": "hide_instead",
            "enter_anim": { "named": "scale_in" },
            "quit_anim": "none",
            "anim_duration": 0.5
        }"#;
        let ui: UiType = serde_json::from_str(json).unwrap();
        assert_eq!(ui.form, FormType::Draggable);
        assert_eq!(ui.hide_rule, HideRule::Deactivate);
        assert_eq!(ui.close_rule, CloseRule::HideInstead);
        assert_eq!(ui.enter_anim.name(), Some("scale_in"));
        assert!(ui.quit_anim.is_none());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(UiType::default().validate().is_ok());
        assert!(
            UiType::default()
                .with_hide_rule(HideRule::AlphaFade, 1.5)
                .validate()
                .is_err()
        );
        assert!(UiType::default().with_anim_duration(-1.0).validate().is_err());
    }
}
