//! Data carried through a bridge

use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::binding::ViewModel;

/// One queued piece of data sent to a panel
///
/// Panels understand two shapes natively: a [`ViewModel`] replaces their
/// binding context, a [`Payload::Map`] is written key by key into the current
/// context. Everything else is handed to the panel's behavior.
#[derive(Clone)]
pub enum Payload {
    ViewModel(ViewModel),
    Map(Map<String, Value>),
    Value(Value),
    Opaque(Rc<dyn Any>),
}

impl Payload {
    /// Wrap an arbitrary value for a custom panel behavior
    pub fn opaque<T: Any>(value: T) -> Self {
        Payload::Opaque(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Payload::Opaque(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Value(Value::Null))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::ViewModel(_) => "view-model",
            Payload::Map(_) => "map",
            Payload::Value(_) => "value",
            Payload::Opaque(_) => "opaque",
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Payload::Map(map),
            other => Payload::Value(other),
        }
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload::Map(map)
    }
}

impl From<ViewModel> for Payload {
    fn from(view_model: ViewModel) -> Self {
        Payload::ViewModel(view_model)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::ViewModel(vm) => f.debug_tuple("ViewModel").field(&vm.type_name()).finish(),
            Payload::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Payload::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Payload::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}
