//! Evaluation options.

use crate::runtime::Runtime;
use parking_lot::Mutex;
use quill_core::{Error, Limits, Result};
use quill_modules::default_globals;
use quill_object::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Options recognized by [`crate::compile`], [`crate::eval`],
/// [`crate::run`], and [`crate::Runtime`].
///
/// The default environment carries the builtin functions and standard
/// modules; hosts can start empty, add their own globals, remove entries
/// (including dotted paths into modules), or override nested entries.
/// Passing a pre-created VM via [`Options::with_vm`] reuses that
/// runtime's environment instead, preserving definitions across calls.
#[derive(Default)]
pub struct Options {
    file: Option<String>,
    globals: BTreeMap<String, Value>,
    no_default_globals: bool,
    removed: Vec<String>,
    overrides: Vec<(String, Value)>,
    limits: Limits,
    vm: Option<Arc<Mutex<Runtime>>>,
}

impl Options {
    /// Creates the default option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the source file for error locations.
    pub fn with_file<S: Into<String>>(mut self, file: S) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Adds one host-visible global binding.
    pub fn with_global<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    /// Adds several host-visible global bindings.
    pub fn with_globals(mut self, globals: BTreeMap<String, Value>) -> Self {
        self.globals.extend(globals);
        self
    }

    /// Starts from an empty global environment.
    pub fn without_default_globals(mut self) -> Self {
        self.no_default_globals = true;
        self
    }

    /// Removes a global, or a dotted path into a module
    /// (e.g. `"os.setenv"`).
    pub fn without_global<S: Into<String>>(mut self, path: S) -> Self {
        self.removed.push(path.into());
        self
    }

    /// Replaces a global or a nested module entry.
    pub fn override_global<S: Into<String>>(mut self, path: S, value: Value) -> Self {
        self.overrides.push((path.into(), value));
        self
    }

    /// Sets the VM resource limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Reuses a pre-created VM: [`crate::compile`], [`crate::eval`], and
    /// [`crate::run`] execute against the shared runtime, so definitions
    /// persist across calls (REPL semantics). The runtime keeps the
    /// environment it was created with; this option set's other
    /// environment knobs do not apply to it.
    pub fn with_vm(mut self, vm: Arc<Mutex<Runtime>>) -> Self {
        self.vm = Some(vm);
        self
    }

    pub(crate) fn vm(&self) -> Option<&Arc<Mutex<Runtime>>> {
        self.vm.as_ref()
    }

    pub(crate) fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub(crate) fn limits(&self) -> Limits {
        self.limits
    }

    /// Materializes the global environment this option set describes.
    pub(crate) fn effective_globals(&self) -> Result<BTreeMap<String, Value>> {
        let mut globals = if self.no_default_globals {
            BTreeMap::new()
        } else {
            default_globals()
        };
        for (name, value) in &self.globals {
            globals.insert(name.clone(), value.clone());
        }
        for (path, value) in &self.overrides {
            apply_override(&mut globals, path, value.clone())?;
        }
        for path in &self.removed {
            apply_removal(&mut globals, path)?;
        }
        Ok(globals)
    }
}

fn walk_modules(
    globals: &BTreeMap<String, Value>,
    path: &str,
    segments: &[&str],
) -> Result<Arc<quill_object::Module>> {
    let head = segments[0];
    let Some(Value::Module(module)) = globals.get(head) else {
        return Err(Error::import(format!(
            "no module {head:?} along path {path:?}"
        )));
    };
    let mut current = Arc::clone(module);
    for segment in &segments[1..] {
        match current.get(segment) {
            Some(Value::Module(next)) => current = next,
            _ => {
                return Err(Error::import(format!(
                    "no module {segment:?} along path {path:?}"
                )))
            }
        }
    }
    Ok(current)
}

fn apply_removal(globals: &mut BTreeMap<String, Value>, path: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() == 1 {
        globals.remove(path);
        return Ok(());
    }
    let module = walk_modules(globals, path, &segments[..segments.len() - 1])?;
    module.remove(segments[segments.len() - 1]);
    Ok(())
}

fn apply_override(globals: &mut BTreeMap<String, Value>, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() == 1 {
        globals.insert(path.to_string(), value);
        return Ok(());
    }
    let module = walk_modules(globals, path, &segments[..segments.len() - 1])?;
    module.set(segments[segments.len() - 1], value);
    Ok(())
}
