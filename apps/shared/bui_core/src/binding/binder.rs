use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

use super::ViewModel;
use crate::event::ListenerId;

type MemberSetter = Rc<RefCell<dyn FnMut(&Value)>>;

/// Connects panel members to the properties of a binding context
///
/// Members are registered once (while the panel sets up its bindings) and
/// follow whichever view-model is bound: [`bind`](Self::bind) pushes the
/// current values and subscribes to changes, [`unbind`](Self::unbind) removes
/// every subscription made by the previous `bind`.
pub struct PropertyBinder {
    owner: String,
    members: Vec<(String, MemberSetter)>,
    context: Option<ViewModel>,
    active: Vec<(String, ListenerId)>,
}

impl PropertyBinder {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            members: Vec::new(),
            context: None,
            active: Vec::new(),
        }
    }

    /// Register a member that follows `property`
    pub fn add_member<F>(&mut self, property: impl Into<String>, setter: F)
    where
        F: FnMut(&Value) + 'static,
    {
        let setter: MemberSetter = Rc::new(RefCell::new(setter));
        self.members.push((property.into(), setter));
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Number of live subscriptions into the bound view-model
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn context(&self) -> Option<&ViewModel> {
        self.context.as_ref()
    }

    pub fn bind(&mut self, view_model: &ViewModel) {
        self.unbind();

        for (property, setter) in &self.members {
            let member = setter.clone();
            let Some(id) = view_model.subscribe(property, move |value: &Value| {
                if let Ok(mut set) = member.try_borrow_mut() {
                    (&mut *set)(value);
                }
            }) else {
                tracing::trace!(
                    panel = %self.owner,
                    "{} has no property '{}', member left unbound",
                    view_model.type_name(),
                    property
                );
                continue;
            };
            self.active.push((property.clone(), id));

            if let Some(current) = view_model.value(property).filter(|v| !v.is_null()) {
                if let Ok(mut set) = setter.try_borrow_mut() {
                    (&mut *set)(&current);
                }
            }
        }

        self.context = Some(view_model.clone());
    }

    pub fn unbind(&mut self) {
        if let Some(view_model) = self.context.take() {
            for (property, id) in self.active.drain(..) {
                view_model.unsubscribe(&property, id);
            }
        }
        self.active.clear();
    }
}

impl Drop for PropertyBinder {
    fn drop(&mut self) {
        self.unbind();
    }
}
