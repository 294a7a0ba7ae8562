//! BridgeUI runtime core
//!
//! Panel lifecycle state machine and the bridge objects that carry data and
//! callbacks between a panel and the panels it opens.
//!
//! # Architecture
//!
//! - [`PanelRegistry`] owns every [`Panel`](panel::Panel) and drives show, hide,
//!   close and destroy. Parent/child links are [`PanelId`]s.
//! - [`Bridge`] is a shared handle created per open request. Data sent before
//!   the receiving panel exists waits in its queue.
//! - [`ViewModel`] values are the panels' binding contexts; a
//!   [`PropertyBinder`] keeps panel members in sync with them.
//! - [`PanelGroup`] resolves configured routes into bridges and reacts to
//!   bridge releases.
//!
//! Everything runs on the caller's thread. Time-based work (animations,
//! deferred teardown) only advances through [`PanelRegistry::tick`].
//!
//! # Example
//!
//! ```rust,ignore
//! use bui_core::{Bridge, PanelRegistry, PanelSpec, ShowModel, UiType};
//! use serde_json::json;
//!
//! let bridge = Bridge::from_route("", "Settings", ShowModel::Overlay);
//! bridge.send(json!({"volume": 0.5}));
//!
//! let mut registry = PanelRegistry::new();
//! let id = registry.create(PanelSpec::new("Settings", UiType::default()).with_initial(audio), Some(bridge));
//! registry.close(id);
//! registry.tick(std::time::Duration::from_millis(16));
//! ```

pub mod anim;
pub mod binding;
pub mod bridge;
pub mod error;
pub mod event;
pub mod group;
pub mod panel;
pub mod payload;
pub mod scheduler;

pub use anim::{AnimPhase, AnimPlayer};
pub use binding::{PropertyBinder, PropertyHandle, PropertyKind, ViewModel, ViewModelSchema};
pub use bridge::{Bridge, DataQueue, SubscriberToken};
pub use error::{BindingError, CoreError, Result};
pub use event::{Event, ListenerId};
pub use group::PanelGroup;
pub use panel::{NoBehavior, Panel, PanelBehavior, PanelId, PanelRegistry, PanelSpec, PanelState, PanelSurface};
pub use payload::Payload;
pub use scheduler::DEFERRED_DESTROY_DELAY;

pub use bui_schema::{BridgeInfo, CloseRule, FormType, HideRule, ShowModel, UiAnim, UiType};
