//! Panels and their lifecycle
//!
//! A panel is a UI unit (screen, dialog, popup) owned by a [`PanelRegistry`].
//! Parent and child links are plain [`PanelId`]s resolved through the
//! registry; a parent never owns its children.
//!
//! ```text
//! Initializing -> Showing <-> Hidden
//!                    |          |
//!                    v          v
//!                 Closing --> Destroyed (terminal)
//! ```
//!
//! Once a panel is destroyed, `is_showing` and `is_alive` are `false` for good
//! and every further lifecycle request is ignored.

mod registry;

pub use registry::PanelRegistry;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bui_schema::{FormType, UiType};
use serde_json::Value;
use tracing::trace;

use crate::anim::AnimPlayer;
use crate::binding::{PropertyBinder, PropertyKind, ViewModel};
use crate::bridge::{Bridge, SubscriberToken};
use crate::event::{Event, ListenerId};
use crate::payload::Payload;

/// Registry-unique panel instance id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(u64);

impl PanelId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Initializing,
    Showing,
    Hidden,
    /// Quit animation running, close rule pending
    Closing,
    Destroyed,
}

/// Visual state the host engine mirrors onto the panel's object
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSurface {
    /// Object enabled in the scene
    pub active: bool,
    pub alpha: f32,
    pub interactable: bool,
    pub blocks_raycasts: bool,
    /// Drag handler attached
    pub draggable: bool,
    /// Raycast-blocking cover layer under the content
    pub covered: bool,
    /// Underlying object torn down, only set by the registry
    destroyed: bool,
}

impl Default for PanelSurface {
    fn default() -> Self {
        Self {
            active: true,
            alpha: 1.0,
            interactable: true,
            blocks_raycasts: true,
            draggable: false,
            covered: false,
            destroyed: false,
        }
    }
}

impl PanelSurface {
    /// Alpha of the cover layer added by `cover`
    pub const COVER_ALPHA: f32 = 0.01;

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }

    /// Fade to `alpha`, clamped to 0.0-1.0 (NaN reads as 0.0)
    pub(crate) fn fade_out(&mut self, alpha: f32) {
        self.alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
        self.interactable = false;
        self.blocks_raycasts = false;
    }

    pub(crate) fn fade_in(&mut self) {
        self.alpha = 1.0;
        self.interactable = true;
        self.blocks_raycasts = true;
    }
}

/// Panel-specific hooks, called by the registry during the lifecycle
///
/// All methods have empty defaults; a plain panel needs none of them.
pub trait PanelBehavior {
    /// First hook at initialization, before any binding
    fn init_components(&mut self, _surface: &mut PanelSurface) {}

    /// Register the members that follow view-model properties
    fn prop_bindings(&mut self, _binder: &mut PropertyBinder) {}

    /// Payloads that are neither a view-model nor a key/value map
    fn handle_data(&mut self, _payload: &Payload, _context: &ViewModel) {}

    /// Called after the binder moved to a new context
    fn on_binding_context_changed(&mut self, _context: &ViewModel) {}
}

/// Behavior of a panel without custom hooks
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBehavior;

impl PanelBehavior for NoBehavior {}

/// Data side of a panel: binding context, binder and behavior
///
/// Shared with the bridge subscriber through a weak handle, so payloads are
/// applied synchronously while the registry stays untouched.
pub(crate) struct DataPort {
    panel: PanelId,
    name: String,
    behavior: Box<dyn PanelBehavior>,
    binder: PropertyBinder,
    context: ViewModel,
}

impl DataPort {
    fn new(panel: PanelId, name: &str, behavior: Box<dyn PanelBehavior>) -> Self {
        Self {
            panel,
            name: name.to_string(),
            behavior,
            binder: PropertyBinder::new(name),
            context: ViewModel::empty(),
        }
    }

    pub(crate) fn context(&self) -> &ViewModel {
        &self.context
    }

    pub(crate) fn set_binding_context(&mut self, view_model: ViewModel) {
        self.binder.unbind();
        self.context = view_model;
        self.binder.bind(&self.context);
        trace!(panel = %self.name, "Binding context is now {}", self.context.type_name());
        self.behavior.on_binding_context_changed(&self.context);
    }

    pub(crate) fn handle_payload(&mut self, payload: &Payload) {
        match payload {
            Payload::ViewModel(view_model) => self.set_binding_context(view_model.clone()),
            Payload::Map(map) => {
                for (key, value) in map {
                    self.apply_entry(key, value);
                }
            }
            Payload::Value(Value::Null) => {}
            other => self.behavior.handle_data(other, &self.context),
        }
    }

    fn apply_entry(&self, key: &str, value: &Value) {
        let Some(kind) = PropertyKind::of(value) else {
            trace!(panel = %self.name, "Null value for '{}' skipped", key);
            return;
        };
        let Some(property) = self.context.get_bindable_property(key, kind) else {
            trace!(panel = %self.name, "No bindable '{}' of kind {} in {}", key, kind, self.context.type_name());
            return;
        };
        if let Err(e) = property.set_value(value.clone()) {
            trace!(panel = %self.name, "Skipped '{}': {}", key, e);
        }
    }

    fn unbind(&mut self) {
        self.binder.unbind();
    }
}

impl fmt::Debug for DataPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPort")
            .field("panel", &self.panel)
            .field("context", &self.context.type_name())
            .field("bound", &self.binder.active_count())
            .finish()
    }
}

/// One panel instance, owned by a [`PanelRegistry`]
pub struct Panel {
    id: PanelId,
    name: String,
    ui_type: UiType,
    state: PanelState,
    showing: bool,
    alive: bool,
    surface: PanelSurface,
    parent: Option<PanelId>,
    /// Our listener on our own `on_delete`, registered for the parent
    parent_listener: Option<ListenerId>,
    children: Vec<PanelId>,
    bridge: Option<Bridge>,
    subscription: Option<SubscriberToken>,
    port: Rc<RefCell<DataPort>>,
    anim: AnimPlayer,
    on_delete: Event<PanelId>,
    on_property_changed: Event<String>,
    group: Option<String>,
}

impl Panel {
    fn new(id: PanelId, name: String, ui_type: UiType, behavior: Box<dyn PanelBehavior>, group: Option<String>) -> Self {
        let port = DataPort::new(id, &name, behavior);
        Self {
            id,
            name,
            ui_type,
            state: PanelState::Initializing,
            showing: true,
            alive: true,
            surface: PanelSurface::default(),
            parent: None,
            parent_listener: None,
            children: Vec::new(),
            bridge: None,
            subscription: None,
            port: Rc::new(RefCell::new(port)),
            anim: AnimPlayer::new(),
            on_delete: Event::new(),
            on_property_changed: Event::new(),
            group,
        }
    }

    pub fn id(&self) -> PanelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ui_type(&self) -> &UiType {
        &self.ui_type
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    /// Visible and interactive; always `false` once the object is destroyed
    pub fn is_showing(&self) -> bool {
        self.showing && !self.surface.destroyed
    }

    /// Not destroyed yet
    pub fn is_alive(&self) -> bool {
        self.alive && !self.surface.destroyed
    }

    pub fn is_draggable(&self) -> bool {
        self.ui_type.form == FormType::Draggable
    }

    pub fn surface(&self) -> &PanelSurface {
        &self.surface
    }

    pub fn parent(&self) -> Option<PanelId> {
        self.parent
    }

    pub fn children(&self) -> &[PanelId] {
        &self.children
    }

    /// Inbound bridge, if one is attached
    pub fn bridge(&self) -> Option<&Bridge> {
        self.bridge.as_ref()
    }

    /// Current view-model; an empty one until data provides another
    pub fn binding_context(&self) -> ViewModel {
        self.port.borrow().context().clone()
    }

    pub fn anim(&self) -> &AnimPlayer {
        &self.anim
    }

    /// Fired once, with this panel's id, when the panel is destroyed
    pub fn on_delete(&self) -> &Event<PanelId> {
        &self.on_delete
    }

    /// Fired with the property name after a panel-side write
    pub fn on_property_changed(&self) -> &Event<String> {
        &self.on_property_changed
    }

    /// Name of the owning group, if any
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }
}

impl fmt::Debug for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("showing", &self.is_showing())
            .field("alive", &self.is_alive())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

/// Everything needed to create a panel
pub struct PanelSpec {
    name: String,
    ui_type: UiType,
    behavior: Box<dyn PanelBehavior>,
    initial: Option<Payload>,
    group: Option<String>,
}

impl PanelSpec {
    pub fn new(name: impl Into<String>, ui_type: UiType) -> Self {
        Self {
            name: name.into(),
            ui_type,
            behavior: Box::new(NoBehavior),
            initial: None,
            group: None,
        }
    }

    pub fn with_behavior(mut self, behavior: impl PanelBehavior + 'static) -> Self {
        self.behavior = Box::new(behavior);
        self
    }

    pub fn with_boxed_behavior(mut self, behavior: Box<dyn PanelBehavior>) -> Self {
        self.behavior = behavior;
        self
    }

    /// View-model or data set applied right after bindings are set up
    pub fn with_initial(mut self, data: impl Into<Payload>) -> Self {
        self.initial = Some(data.into());
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for PanelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelSpec")
            .field("name", &self.name)
            .field("ui_type", &self.ui_type)
            .field("initial", &self.initial)
            .field("group", &self.group)
            .finish()
    }
}
