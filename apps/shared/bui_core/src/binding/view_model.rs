use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::error::BindingError;
use crate::event::{Event, ListenerId};

/// Kind of value a bindable property holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Any JSON number
    Number,
    /// Whole numbers only
    Integer,
    String,
    Bool,
    Array,
    Object,
    /// No type check
    Any,
}

impl PropertyKind {
    /// Kind carried by a value; `None` for null, which matches no property
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(PropertyKind::Bool),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(PropertyKind::Integer),
            Value::Number(_) => Some(PropertyKind::Number),
            Value::String(_) => Some(PropertyKind::String),
            Value::Array(_) => Some(PropertyKind::Array),
            Value::Object(_) => Some(PropertyKind::Object),
        }
    }

    /// Whether a property of this kind can take a value of kind `other`
    pub fn accepts(&self, other: PropertyKind) -> bool {
        match (self, other) {
            (PropertyKind::Any, _) => true,
            (PropertyKind::Number, PropertyKind::Integer) => true,
            (expected, found) => *expected == found,
        }
    }

    /// Whether `value` can be stored in a property of this kind
    pub fn accepts_value(&self, value: &Value) -> bool {
        match PropertyKind::of(value) {
            Some(kind) => self.accepts(kind),
            None => *self == PropertyKind::Any,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Number => "number",
            PropertyKind::Integer => "integer",
            PropertyKind::String => "string",
            PropertyKind::Bool => "bool",
            PropertyKind::Array => "array",
            PropertyKind::Object => "object",
            PropertyKind::Any => "any",
        };
        f.write_str(name)
    }
}

/// Bindable properties of one view-model type
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewModelSchema {
    pub name: String,
    pub properties: BTreeMap<String, PropertyKind>,
}

impl ViewModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.insert(name.into(), kind);
        self
    }

    pub fn kind_of(&self, property: &str) -> Option<PropertyKind> {
        self.properties.get(property).copied()
    }
}

struct ViewModelInner {
    schema: Rc<ViewModelSchema>,
    values: RefCell<HashMap<String, Value>>,
    changed: HashMap<String, Event<Value>>,
}

/// Shared handle to a view-model instance
///
/// Clones refer to the same instance; a panel and the code that sent the
/// view-model observe the same values.
#[derive(Clone)]
pub struct ViewModel {
    inner: Rc<ViewModelInner>,
}

impl ViewModel {
    pub fn new(schema: impl Into<Rc<ViewModelSchema>>) -> Self {
        let schema = schema.into();
        let values = schema
            .properties
            .keys()
            .map(|name| (name.clone(), Value::Null))
            .collect();
        let changed = schema
            .properties
            .keys()
            .map(|name| (name.clone(), Event::new()))
            .collect();

        Self {
            inner: Rc::new(ViewModelInner {
                schema,
                values: RefCell::new(values),
                changed,
            }),
        }
    }

    /// A view-model without properties, every write to it is rejected
    pub fn empty() -> Self {
        Self::new(ViewModelSchema::new("empty"))
    }

    /// Builder-style initial value, ignored if the property does not accept it
    pub fn with_value(self, property: &str, value: impl Into<Value>) -> Self {
        if let Err(e) = self.set_value(property, value.into()) {
            tracing::debug!("Initial value for '{}' rejected: {}", property, e);
        }
        self
    }

    pub fn schema(&self) -> &ViewModelSchema {
        &self.inner.schema
    }

    pub fn type_name(&self) -> &str {
        &self.inner.schema.name
    }

    pub fn ptr_eq(&self, other: &ViewModel) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Look up a property that can take values of kind `expected`
    pub fn get_bindable_property(&self, name: &str, expected: PropertyKind) -> Option<PropertyHandle> {
        let kind = self.inner.schema.kind_of(name)?;
        kind.accepts(expected).then(|| PropertyHandle {
            view_model: self.clone(),
            name: name.to_string(),
            kind,
        })
    }

    pub fn value(&self, property: &str) -> Option<Value> {
        self.inner.values.borrow().get(property).cloned()
    }

    /// Write a property by name
    ///
    /// Returns `Ok(false)` when the value is unchanged; change listeners only
    /// run when the stored value actually changes.
    pub fn set_value(&self, property: &str, value: Value) -> Result<bool, BindingError> {
        let kind = self
            .inner
            .schema
            .kind_of(property)
            .ok_or_else(|| BindingError::UnknownProperty(property.to_string()))?;

        if !kind.accepts_value(&value) {
            return Err(BindingError::TypeMismatch {
                property: property.to_string(),
                expected: kind,
                found: PropertyKind::of(&value)
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "null".to_string()),
            });
        }

        {
            let mut values = self.inner.values.borrow_mut();
            if values.get(property) == Some(&value) {
                return Ok(false);
            }
            values.insert(property.to_string(), value.clone());
        }

        if let Some(event) = self.inner.changed.get(property) {
            event.emit(&value);
        }
        Ok(true)
    }

    /// Listen for changes of one property
    pub fn subscribe<F>(&self, property: &str, listener: F) -> Option<ListenerId>
    where
        F: FnMut(&Value) + 'static,
    {
        self.inner
            .changed
            .get(property)
            .map(|event| event.subscribe(listener))
    }

    pub fn unsubscribe(&self, property: &str, id: ListenerId) -> bool {
        self.inner
            .changed
            .get(property)
            .is_some_and(|event| event.unsubscribe(id))
    }

    /// Number of change listeners on a property
    pub fn listener_count(&self, property: &str) -> usize {
        self.inner.changed.get(property).map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("type", &self.type_name())
            .field("values", &*self.inner.values.borrow())
            .finish()
    }
}

/// A resolved, type-checked property of a view-model
#[derive(Clone, Debug)]
pub struct PropertyHandle {
    view_model: ViewModel,
    name: String,
    kind: PropertyKind,
}

impl PropertyHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn value(&self) -> Option<Value> {
        self.view_model.value(&self.name)
    }

    /// Write a boxed value through this handle
    pub fn set_value(&self, value: Value) -> Result<bool, BindingError> {
        self.view_model.set_value(&self.name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn audio_schema() -> ViewModelSchema {
        ViewModelSchema::new("Audio")
            .with_property("volume", PropertyKind::Number)
            .with_property("muted", PropertyKind::Bool)
            .with_property("preset", PropertyKind::String)
    }

    #[test]
    fn test_property_kind_of() {
        assert_eq!(PropertyKind::of(&json!(1)), Some(PropertyKind::Integer));
        assert_eq!(PropertyKind::of(&json!(0.5)), Some(PropertyKind::Number));
        assert_eq!(PropertyKind::of(&json!("x")), Some(PropertyKind::String));
        assert_eq!(PropertyKind::of(&Value::Null), None);
    }

    #[test]
    fn test_kind_compatibility() {
        assert!(PropertyKind::Number.accepts(PropertyKind::Integer));
        assert!(!PropertyKind::Integer.accepts(PropertyKind::Number));
        assert!(PropertyKind::Any.accepts(PropertyKind::Object));
        assert!(!PropertyKind::Bool.accepts(PropertyKind::String));
    }

    #[test]
    fn test_set_value_notifies_on_change_only() {
        let vm = ViewModel::new(audio_schema());
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        vm.subscribe("volume", move |_| h.set(h.get() + 1)).unwrap();

        assert_eq!(vm.set_value("volume", json!(0.5)), Ok(true));
        assert_eq!(vm.set_value("volume", json!(0.5)), Ok(false));
        assert_eq!(hits.get(), 1);
        assert_eq!(vm.value("volume"), Some(json!(0.5)));
    }

    #[test]
    fn test_set_value_errors() {
        let vm = ViewModel::new(audio_schema());
        assert_eq!(
            vm.set_value("brightness", json!(1)),
            Err(BindingError::UnknownProperty("brightness".to_string()))
        );
        assert!(matches!(
            vm.set_value("muted", json!("yes")),
            Err(BindingError::TypeMismatch { .. })
        ));
        assert_eq!(vm.value("muted"), Some(Value::Null));
    }

    #[test]
    fn test_get_bindable_property() {
        let vm = ViewModel::new(audio_schema());
        let handle = vm.get_bindable_property("volume", PropertyKind::Integer).unwrap();
        assert_eq!(handle.kind(), PropertyKind::Number);
        handle.set_value(json!(1)).unwrap();
        assert_eq!(vm.value("volume"), Some(json!(1)));

        assert!(vm.get_bindable_property("volume", PropertyKind::String).is_none());
        assert!(vm.get_bindable_property("missing", PropertyKind::Any).is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let vm = ViewModel::new(audio_schema()).with_value("preset", "night");
        let other = vm.clone();
        other.set_value("muted", json!(true)).unwrap();
        assert!(vm.ptr_eq(&other));
        assert_eq!(vm.value("muted"), Some(json!(true)));
        assert_eq!(vm.value("preset"), Some(json!("night")));
    }
}
