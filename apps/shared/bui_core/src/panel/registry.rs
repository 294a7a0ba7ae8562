use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use bui_schema::{CloseRule, FormType, HideRule};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::{DataPort, Panel, PanelId, PanelSpec, PanelState};
use crate::anim::{AnimPhase, Continuation};
use crate::binding::ViewModel;
use crate::bridge::Bridge;
use crate::error::BindingError;
use crate::payload::Payload;
use crate::scheduler::{DEFERRED_DESTROY_DELAY, Scheduler, Task};

/// (parent, child) pairs posted by a child's `on_delete`
type Orphans = Rc<RefCell<Vec<(PanelId, PanelId)>>>;

/// Owning arena of panels and driver of their lifecycle
///
/// Lifecycle requests return `true` when applied. Requests on unknown or
/// destroyed panels are ignored (logged at debug) and return `false`.
/// Destroyed panels stay as tombstones until [`purge_destroyed`](Self::purge_destroyed).
#[derive(Debug, Default)]
pub struct PanelRegistry {
    panels: BTreeMap<PanelId, Panel>,
    next_id: u64,
    scheduler: Scheduler,
    orphans: Orphans,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate a panel and run its initialization
    ///
    /// Order: component setup, bindings, initial data, bridge creation notice
    /// plus backlog delivery, enter animation, drag handler.
    pub fn create(&mut self, spec: PanelSpec, bridge: Option<Bridge>) -> PanelId {
        self.next_id += 1;
        let id = PanelId(self.next_id);

        let PanelSpec {
            name,
            ui_type,
            behavior,
            initial,
            group,
        } = spec;
        if let Err(e) = ui_type.validate() {
            warn!(panel = %name, "Display config out of range, clamping: {}", e);
        }
        let mut panel = Panel::new(id, name, ui_type, behavior, group);

        {
            let mut port = panel.port.borrow_mut();
            let DataPort {
                behavior,
                binder,
                context,
                ..
            } = &mut *port;
            behavior.init_components(&mut panel.surface);
            behavior.prop_bindings(binder);
            binder.bind(context);

            if let Some(initial) = initial {
                port.handle_payload(&initial);
            }
        }

        debug!(panel = %panel.name, "Created {}", id);
        self.panels.insert(id, panel);

        if let Some(bridge) = bridge {
            match bridge.notify_created(id) {
                Ok(()) => {
                    self.handle_data(id, &bridge);
                }
                Err(e) => warn!("Panel {} starts without a bridge: {}", id, e),
            }
        }

        if let Some(panel) = self.panels.get_mut(&id) {
            Self::play_enter(panel);
            if panel.ui_type.form == FormType::Draggable {
                panel.surface.draggable = true;
            }
            panel.state = PanelState::Showing;
        }
        id
    }

    pub fn get(&self, id: PanelId) -> Option<&Panel> {
        self.panels.get(&id)
    }

    pub fn contains(&self, id: PanelId) -> bool {
        self.panels.contains_key(&id)
    }

    /// Panels held, tombstones included
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PanelId> + '_ {
        self.panels.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Panel> {
        self.panels.values()
    }

    /// Oldest live panel with this name
    pub fn find_by_name(&self, name: &str) -> Option<PanelId> {
        self.panels
            .values()
            .find(|p| p.is_alive() && p.name == name)
            .map(|p| p.id)
    }

    pub fn is_showing(&self, id: PanelId) -> bool {
        self.panels.get(&id).is_some_and(|p| p.is_showing())
    }

    pub fn is_alive(&self, id: PanelId) -> bool {
        self.panels.get(&id).is_some_and(|p| p.is_alive())
    }

    pub fn state(&self, id: PanelId) -> Option<PanelState> {
        self.panels.get(&id).map(|p| p.state)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn hide(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.live_mut(id, "hide") else {
            return false;
        };
        Self::apply_hide(panel);
        true
    }

    pub fn unhide(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.live_mut(id, "unhide") else {
            return false;
        };
        if panel.state == PanelState::Closing {
            debug!(panel = %panel.name, "Unhide ignored while closing");
            return false;
        }

        match panel.ui_type.hide_rule {
            HideRule::AlphaFade => panel.surface.fade_in(),
            HideRule::Deactivate => panel.surface.active = true,
            HideRule::None => {}
        }
        panel.showing = true;
        panel.state = PanelState::Showing;
        Self::play_enter(panel);
        trace!(panel = %panel.name, "Unhidden");
        true
    }

    /// Close through the quit animation (when showing) and the close rule
    pub fn close(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.live_mut(id, "close") else {
            return false;
        };
        if panel.state == PanelState::Closing {
            debug!(panel = %panel.name, "Close ignored, already closing");
            return false;
        }

        if panel.is_showing() {
            if let Some(anim) = panel.ui_type.quit_anim.name() {
                let duration = anim_duration(panel.ui_type.anim_duration);
                panel.anim.play(anim, AnimPhase::Quit, duration, Some(Continuation::Close));
                panel.state = PanelState::Closing;
                debug!(panel = %panel.name, "Closing after quit animation '{}'", anim);
                return true;
            }
        }
        self.close_internal(id)
    }

    fn close_internal(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.live_mut(id, "close") else {
            return false;
        };
        panel.showing = false;
        let rule = panel.ui_type.close_rule;

        let delay = match rule {
            CloseRule::DestroyImmediate => return self.destroy(id),
            CloseRule::HideInstead => {
                Self::apply_hide(panel);
                panel.state = PanelState::Hidden;
                return true;
            }
            CloseRule::DestroyDeferred => DEFERRED_DESTROY_DELAY,
            CloseRule::DestroyNormal => Duration::ZERO,
        };
        panel.state = PanelState::Closing;
        trace!(panel = %panel.name, "Destroy scheduled in {:?}", delay);
        self.scheduler.schedule(delay, Task::Destroy(id));
        true
    }

    /// Tear a panel down; runs at most once per panel
    ///
    /// Releases the inbound bridge, fires `on_delete` (parents drop the panel
    /// from their child list) and removes every binding. Children are detached,
    /// not destroyed.
    pub fn destroy(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.panels.get_mut(&id) else {
            debug!("Destroy ignored, unknown panel {}", id);
            return false;
        };
        if panel.state == PanelState::Destroyed {
            trace!(panel = %panel.name, "Already destroyed");
            return false;
        }

        panel.surface.mark_destroyed();
        panel.alive = false;
        panel.showing = false;
        panel.state = PanelState::Destroyed;
        panel.anim.cancel();
        self.scheduler.cancel_panel(id);

        if let Some(bridge) = panel.bridge.clone() {
            if let Some(token) = panel.subscription.take() {
                bridge.detach_subscriber(token);
            }
            bridge.release();
        }

        panel.on_delete.emit(&id);
        panel.on_delete.clear();
        panel.on_property_changed.clear();
        panel.parent = None;
        panel.parent_listener = None;
        panel.port.borrow_mut().unbind();
        let children = std::mem::take(&mut panel.children);
        info!(panel = %panel.name, "Destroyed {}", id);

        for child_id in children {
            if let Some(child) = self.panels.get_mut(&child_id) {
                if let Some(listener) = child.parent_listener.take() {
                    child.on_delete.unsubscribe(listener);
                }
                child.parent = None;
            }
        }
        self.collect_orphans();
        true
    }

    /// Register `child` under `parent`
    ///
    /// Idempotent. A child recorded under another parent is moved. Links that
    /// would make a panel its own ancestor are refused.
    pub fn record_child(&mut self, parent: PanelId, child: PanelId) -> bool {
        if parent == child || !self.is_alive(parent) || !self.is_alive(child) {
            debug!("Cannot record {} as child of {}", child, parent);
            return false;
        }
        if self.is_ancestor(child, parent) {
            warn!("Refusing to record {} under its own descendant {}", child, parent);
            return false;
        }

        let previous = self.panels.get(&child).and_then(|c| c.parent);
        if let Some(old) = previous.filter(|old| *old != parent) {
            if let Some(old_parent) = self.panels.get_mut(&old) {
                old_parent.children.retain(|c| *c != child);
            }
            if let Some(c) = self.panels.get_mut(&child) {
                if let Some(listener) = c.parent_listener.take() {
                    c.on_delete.unsubscribe(listener);
                }
            }
            trace!("Moved {} from {} to {}", child, old, parent);
        }

        if let Some(p) = self.panels.get_mut(&parent) {
            if !p.children.contains(&child) {
                p.children.push(child);
            }
        }

        if let Some(c) = self.panels.get_mut(&child) {
            c.parent = Some(parent);
            if c.parent_listener.is_none() {
                let orphans = self.orphans.clone();
                let listener = c
                    .on_delete
                    .subscribe(move |id: &PanelId| orphans.borrow_mut().push((parent, *id)));
                c.parent_listener = Some(listener);
            }
        }
        true
    }

    /// Attach a panel to `bridge`: drain its backlog, then follow later sends
    pub fn handle_data(&mut self, id: PanelId, bridge: &Bridge) -> bool {
        let Some(panel) = self.live_mut(id, "handle_data") else {
            return false;
        };

        if let (Some(previous), Some(token)) = (panel.bridge.take(), panel.subscription.take()) {
            previous.detach_subscriber(token);
        }
        panel.bridge = Some(bridge.clone());

        let port = Rc::downgrade(&panel.port);
        let name = panel.name.clone();
        let token = bridge.attach_subscriber(move |queue| {
            let Some(port) = port.upgrade() else {
                return;
            };
            let Ok(mut port) = port.try_borrow_mut() else {
                warn!(panel = %name, "Data port busy, {} payload(s) left queued", queue.len());
                return;
            };
            while let Some(payload) = queue.pop_front() {
                port.handle_payload(&payload);
            }
        });
        panel.subscription = Some(token);
        trace!(panel = %panel.name, bridge = %bridge.route(), "Attached");
        true
    }

    /// Send a result back through the panel's inbound bridge
    pub fn call_back(&self, id: PanelId, payload: impl Into<Payload>) -> bool {
        let Some(panel) = self.panels.get(&id).filter(|p| p.is_alive()) else {
            debug!("Callback ignored, {} is not alive", id);
            return false;
        };
        match &panel.bridge {
            Some(bridge) => {
                bridge.call_back(id, payload);
                true
            }
            None => {
                trace!(panel = %panel.name, "Callback dropped, no bridge");
                false
            }
        }
    }

    /// Fire the panel's property-changed notification
    pub fn property_changed(&self, id: PanelId, property: &str) -> bool {
        let Some(panel) = self.panels.get(&id).filter(|p| p.is_alive()) else {
            return false;
        };
        panel.on_property_changed.emit(&property.to_string());
        true
    }

    /// Write into the panel's binding context, then notify property listeners
    ///
    /// `Ok(false)` when the panel is gone or the value did not change.
    pub fn commit_property(&self, id: PanelId, property: &str, value: Value) -> Result<bool, BindingError> {
        let Some(panel) = self.panels.get(&id).filter(|p| p.is_alive()) else {
            return Ok(false);
        };
        let context = panel.binding_context();
        if !context.set_value(property, value)? {
            return Ok(false);
        }
        panel.on_property_changed.emit(&property.to_string());
        Ok(true)
    }

    pub fn set_binding_context(&mut self, id: PanelId, view_model: ViewModel) -> bool {
        let Some(panel) = self.live_mut(id, "set_binding_context") else {
            return false;
        };
        panel.port.borrow_mut().set_binding_context(view_model);
        true
    }

    /// Feed one payload to the panel as if it came through its bridge
    pub fn push_data(&mut self, id: PanelId, payload: impl Into<Payload>) -> bool {
        let Some(panel) = self.live_mut(id, "push_data") else {
            return false;
        };
        panel.port.borrow_mut().handle_payload(&payload.into());
        true
    }

    /// Put a raycast-blocking cover under the panel content
    pub fn cover(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.live_mut(id, "cover") else {
            return false;
        };
        panel.surface.covered = true;
        trace!(panel = %panel.name, "Covered");
        true
    }

    /// Advance the frame clock: due teardowns first, then animations
    pub fn tick(&mut self, dt: Duration) {
        for task in self.scheduler.advance(dt) {
            match task {
                Task::Destroy(id) => {
                    self.destroy(id);
                }
            }
        }

        let finished: Vec<_> = self
            .panels
            .iter_mut()
            .filter_map(|(id, panel)| panel.anim.advance(dt).map(|f| (*id, f)))
            .collect();

        for (id, finished) in finished {
            trace!("Animation {:?} of {} finished", finished.phase, id);
            if finished.then == Some(Continuation::Close) {
                self.close_internal(id);
            }
        }
    }

    /// Drop destroyed panels, returns how many were removed
    pub fn purge_destroyed(&mut self) -> usize {
        let before = self.panels.len();
        self.panels.retain(|_, p| p.state != PanelState::Destroyed);

        let live: BTreeSet<PanelId> = self.panels.keys().copied().collect();
        for panel in self.panels.values_mut() {
            panel.children.retain(|c| live.contains(c));
            if panel.parent.is_some_and(|p| !live.contains(&p)) {
                panel.parent = None;
            }
        }
        before - self.panels.len()
    }

    fn live_mut(&mut self, id: PanelId, op: &str) -> Option<&mut Panel> {
        match self.panels.get_mut(&id) {
            Some(panel) if panel.is_alive() => Some(panel),
            Some(panel) => {
                debug!(panel = %panel.name, "{} ignored, panel destroyed", op);
                None
            }
            None => {
                debug!("{} ignored, unknown panel {}", op, id);
                None
            }
        }
    }

    fn is_ancestor(&self, candidate: PanelId, of: PanelId) -> bool {
        let mut current = self.panels.get(&of).and_then(|p| p.parent);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.panels.get(&id).and_then(|p| p.parent);
        }
        false
    }

    fn collect_orphans(&mut self) {
        let orphans: Vec<_> = self.orphans.borrow_mut().drain(..).collect();
        for (parent, child) in orphans {
            if let Some(p) = self.panels.get_mut(&parent) {
                p.children.retain(|c| *c != child);
                trace!(panel = %p.name, "Child {} removed", child);
            }
        }
    }

    fn apply_hide(panel: &mut Panel) {
        panel.showing = false;
        match panel.ui_type.hide_rule {
            HideRule::AlphaFade => panel.surface.fade_out(panel.ui_type.hide_alpha),
            HideRule::Deactivate => panel.surface.active = false,
            HideRule::None => {}
        }
        if panel.state != PanelState::Closing {
            panel.state = PanelState::Hidden;
        }
        trace!(panel = %panel.name, "Hidden ({:?})", panel.ui_type.hide_rule);
    }

    fn play_enter(panel: &mut Panel) {
        if let Some(anim) = panel.ui_type.enter_anim.name() {
            let duration = anim_duration(panel.ui_type.anim_duration);
            panel.anim.play(anim, AnimPhase::Enter, duration, None);
        }
    }
}

fn anim_duration(seconds: f32) -> Duration {
    Duration::try_from_secs_f32(seconds).unwrap_or(Duration::ZERO)
}
