//! View-model binding
//!
//! A [`ViewModelSchema`] is the per-type registry of bindable properties, built
//! once and shared by every [`ViewModel`] of that type. Values are written by
//! name through [`ViewModel::set_value`] or a [`PropertyHandle`]; unknown names
//! and incompatible kinds come back as [`BindingError`](crate::BindingError)s.
//!
//! A [`PropertyBinder`] connects panel members (setter closures) to the
//! properties of the panel's current binding context.

mod binder;
mod view_model;

pub use binder::PropertyBinder;
pub use view_model::{PropertyHandle, PropertyKind, ViewModel, ViewModelSchema};
