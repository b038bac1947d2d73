//! Module values.
//!
//! A module is a named bundle of exported values: built-in natives first,
//! plus script-defined globals when the module was compiled from source.
//! A module may also carry a default call handler, which makes the module
//! itself callable (sugared constructors).

use crate::native::NativeFunction;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A namespace value.
#[derive(Debug)]
pub struct Module {
    name: String,
    attrs: RwLock<BTreeMap<String, Value>>,
    call: Option<Arc<NativeFunction>>,
}

impl Module {
    /// Creates a module with the given exported names.
    pub fn new(name: &str, attrs: BTreeMap<String, Value>) -> Self {
        Self {
            name: name.to_string(),
            attrs: RwLock::new(attrs),
            call: None,
        }
    }

    /// Creates a callable module: attribute access works as usual, and
    /// calling the module itself dispatches to `call`.
    pub fn with_call(name: &str, attrs: BTreeMap<String, Value>, call: NativeFunction) -> Self {
        Self {
            name: name.to_string(),
            attrs: RwLock::new(attrs),
            call: Some(Arc::new(call)),
        }
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves an exported name.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.attrs.read().get(name).cloned()
    }

    /// Inserts or replaces an exported name.
    pub fn set(&self, name: &str, value: Value) {
        self.attrs.write().insert(name.to_string(), value);
    }

    /// Removes an exported name, returning whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.attrs.write().remove(name).is_some()
    }

    /// Returns the exported names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.attrs.read().keys().cloned().collect()
    }

    /// Returns the default call handler, if the module is callable.
    pub fn call_handler(&self) -> Option<&Arc<NativeFunction>> {
        self.call.as_ref()
    }

    /// Returns true when the module carries a default call handler.
    pub fn is_callable(&self) -> bool {
        self.call.is_some()
    }
}
