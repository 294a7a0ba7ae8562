//! Runtime side of a panel group
//!
//! [`PanelGroup`] turns the persisted routes of a [`PanelGroupConfig`] into
//! bridges: `open` looks up the `(in_node, out_node, show_model)` record, wires
//! a fresh [`Bridge`] and creates the panel in the group's [`PanelRegistry`].
//!
//! Bridge releases come back as messages in an outbox that is pumped after
//! every lifecycle call made through the group, so listeners never need
//! access to the registry.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use bui_schema::{BridgeInfo, PanelGroupConfig, ShowModel, Validatable};
use tracing::{debug, info, trace, warn};

use crate::bridge::Bridge;
use crate::error::{CoreError, Result};
use crate::panel::{NoBehavior, PanelBehavior, PanelId, PanelRegistry, PanelSpec};
use crate::payload::Payload;

type BehaviorFactory = Box<dyn Fn() -> Box<dyn PanelBehavior>>;

#[derive(Debug, Clone)]
enum GroupEvent {
    Released {
        route: String,
        in_panel: Option<PanelId>,
        show_model: ShowModel,
    },
}

pub struct PanelGroup {
    config: PanelGroupConfig,
    registry: PanelRegistry,
    behaviors: HashMap<String, BehaviorFactory>,
    outbox: Rc<RefCell<VecDeque<GroupEvent>>>,
}

impl PanelGroup {
    pub fn new(config: PanelGroupConfig) -> Self {
        for issue in config.issues() {
            warn!("Group '{}': {}", config.name, issue);
        }
        Self {
            config,
            registry: PanelRegistry::new(),
            behaviors: HashMap::new(),
            outbox: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Load a group document and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = PanelGroupConfig::from_json_file(path)?;
        info!("Loaded group '{}' ({} panels, {} bridges)", config.name, config.nodes.len(), config.bridges.len());
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &PanelGroupConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PanelRegistry {
        &mut self.registry
    }

    /// Behavior given to every panel opened under `panel_name`
    pub fn register_behavior<F, B>(&mut self, panel_name: impl Into<String>, factory: F)
    where
        F: Fn() -> B + 'static,
        B: PanelBehavior + 'static,
    {
        self.behaviors
            .insert(panel_name.into(), Box::new(move || Box::new(factory()) as Box<dyn PanelBehavior>));
    }

    /// Open `panel_name`, from another panel or (with `None`) from the system
    ///
    /// Routes missing from the configuration open as an overlay. `data` is
    /// queued on the bridge before the panel exists and delivered during its
    /// initialization.
    pub fn open(
        &mut self,
        from: Option<PanelId>,
        panel_name: &str,
        data: Option<Payload>,
    ) -> Result<(PanelId, Bridge)> {
        let node = self
            .config
            .node(panel_name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownPanel(panel_name.to_string()))?;

        let in_node = match from {
            Some(id) => self
                .registry
                .get(id)
                .filter(|p| p.is_alive())
                .map(|p| p.name().to_string())
                .ok_or_else(|| CoreError::UnknownPanel(id.to_string()))?,
            None => String::new(),
        };

        let info = match self.config.find_bridge(&in_node, panel_name) {
            Some(info) => info.clone(),
            None => {
                debug!("No route {}->{}, opening as overlay", in_node, panel_name);
                BridgeInfo::new(in_node, panel_name, ShowModel::Overlay)
            }
        };

        let bridge = Bridge::new(info);
        bridge.reset(from);
        let outbox = self.outbox.clone();
        bridge.on_release().subscribe(move |released: &Bridge| {
            outbox.borrow_mut().push_back(GroupEvent::Released {
                route: released.route(),
                in_panel: released.in_panel(),
                show_model: released.show_model(),
            });
        });
        if let Some(data) = data {
            bridge.send(data);
        }

        let behavior = self
            .behaviors
            .get(panel_name)
            .map(|factory| factory())
            .unwrap_or_else(|| Box::new(NoBehavior));
        let spec = PanelSpec::new(panel_name, node.ui_type)
            .with_boxed_behavior(behavior)
            .in_group(self.config.name.as_str());
        let id = self.registry.create(spec, Some(bridge.clone()));

        if let Some(from) = from {
            self.registry.record_child(from, id);
            if bridge.show_model() == ShowModel::Replace {
                self.registry.hide(from);
            }
        }

        info!(bridge = %bridge.route(), "Opened {} as {}", panel_name, id);
        self.pump();
        Ok((id, bridge))
    }

    pub fn close(&mut self, id: PanelId) -> bool {
        let closed = self.registry.close(id);
        self.pump();
        closed
    }

    pub fn destroy(&mut self, id: PanelId) -> bool {
        let destroyed = self.registry.destroy(id);
        self.pump();
        destroyed
    }

    pub fn tick(&mut self, dt: Duration) {
        self.registry.tick(dt);
        self.pump();
    }

    /// Apply queued bridge notifications, returns how many were handled
    pub fn pump(&mut self) -> usize {
        let events: Vec<GroupEvent> = self.outbox.borrow_mut().drain(..).collect();
        let count = events.len();

        for event in events {
            match event {
                GroupEvent::Released {
                    route,
                    in_panel,
                    show_model,
                } => {
                    trace!(bridge = %route, "Release handled");
                    if show_model != ShowModel::Replace {
                        continue;
                    }
                    if let Some(in_panel) = in_panel.filter(|id| self.registry.is_alive(*id)) {
                        self.registry.unhide(in_panel);
                    }
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{PropertyBinder, PropertyKind, ViewModel, ViewModelSchema};
    use bui_schema::{LoadType, PanelNode, PanelSource, UiType};
    use serde_json::{Value, json};

    fn node(name: &str) -> PanelNode {
        PanelNode::new(
            name,
            UiType::default(),
            PanelSource::Prefab {
                prefab: format!("Panels/{}", name),
            },
        )
    }

    fn demo_group() -> PanelGroup {
        let mut config = PanelGroupConfig::new("Demo", LoadType::Prefab);
        config.insert_nodes(["Main", "Settings", "Bag", "Tips"].map(node));
        config.insert_bridges([
            BridgeInfo::from_system("Main", ShowModel::Overlay),
            BridgeInfo::new("Main", "Bag", ShowModel::Replace),
            BridgeInfo::new("Main", "Tips", ShowModel::Push),
        ]);
        PanelGroup::new(config)
    }

    #[test]
    fn test_open_from_system_delivers_data() {
        let mut group = demo_group();
        let vm = ViewModel::new(ViewModelSchema::new("Audio").with_property("volume", PropertyKind::Number));

        let (id, bridge) = group.open(None, "Settings", Some(vm.clone().into())).unwrap();
        bridge.send(json!({"volume": 0.5}));

        assert_eq!(vm.value("volume"), Some(json!(0.5)));
        assert_eq!(bridge.info(), &BridgeInfo::from_system("Settings", ShowModel::Overlay));
        assert_eq!(bridge.in_panel(), None);
        assert_eq!(group.registry().get(id).unwrap().group(), Some("Demo"));
    }

    #[test]
    fn test_unknown_panel() {
        let mut group = demo_group();
        assert!(matches!(
            group.open(None, "Credits", None),
            Err(CoreError::UnknownPanel(name)) if name == "Credits"
        ));
    }

    #[test]
    fn test_push_records_child() {
        let mut group = demo_group();
        let (main, _) = group.open(None, "Main", None).unwrap();
        let (tips, bridge) = group.open(Some(main), "Tips", None).unwrap();

        assert_eq!(bridge.show_model(), ShowModel::Push);
        assert_eq!(bridge.in_panel(), Some(main));
        assert_eq!(group.registry().get(main).unwrap().children(), &[tips]);
        assert!(group.registry().is_showing(main));
    }

    #[test]
    fn test_replace_hides_until_released() {
        let mut group = demo_group();
        let (main, _) = group.open(None, "Main", None).unwrap();
        let (bag, _) = group.open(Some(main), "Bag", None).unwrap();
        assert!(!group.registry().is_showing(main));

        assert!(group.close(bag));
        assert!(!group.registry().is_showing(main));
        group.tick(Duration::ZERO);

        assert!(!group.registry().is_alive(bag));
        assert!(group.registry().is_showing(main));
        assert!(group.registry().get(main).unwrap().children().is_empty());
    }

    #[test]
    fn test_registered_behavior_is_used() {
        struct Title(Rc<RefCell<Option<Value>>>);
        impl PanelBehavior for Title {
            fn prop_bindings(&mut self, binder: &mut PropertyBinder) {
                let slot = self.0.clone();
                binder.add_member("title", move |v: &Value| *slot.borrow_mut() = Some(v.clone()));
            }
        }

        let slot = Rc::new(RefCell::new(None));
        let mut group = demo_group();
        let s = slot.clone();
        group.register_behavior("Main", move || Title(s.clone()));

        let vm = ViewModel::new(ViewModelSchema::new("Hud").with_property("title", PropertyKind::String))
            .with_value("title", "Village");
        group.open(None, "Main", Some(vm.into())).unwrap();

        assert_eq!(*slot.borrow(), Some(json!("Village")));
    }

    #[test]
    fn test_open_from_destroyed_panel_fails() {
        let mut group = demo_group();
        let (main, _) = group.open(None, "Main", None).unwrap();
        group.destroy(main);
        assert!(group.open(Some(main), "Bag", None).is_err());
    }
}
