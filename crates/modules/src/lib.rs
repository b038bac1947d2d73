//! Default global environment: builtin functions plus the standard host
//! modules (`math`, `strings`, `time`, `rand`, `regex`, `os`, `json`).
//!
//! Everything here registers through the host-bridge contract: a module
//! is a [`quill_object::Module`] value holding named native callables.
//! Hosts start from [`default_globals`] and may remove, override, or
//! extend entries before evaluation.

mod builtins;
mod jsonmod;
mod mathmod;
mod osmod;
mod randmod;
mod regexmod;
mod stringsmod;
mod timemod;

use quill_object::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds the default global bindings. Each call produces fresh module
/// instances, so per-evaluation overrides never leak between hosts.
pub fn default_globals() -> BTreeMap<String, Value> {
    let mut globals = builtins::globals();
    for module in [
        mathmod::module(),
        stringsmod::module(),
        timemod::module(),
        randmod::module(),
        regexmod::module(),
        osmod::module(),
        jsonmod::module(),
    ] {
        globals.insert(module.name().to_string(), Value::Module(Arc::new(module)));
    }
    globals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_globals_shape() {
        let globals = default_globals();
        for name in ["len", "type", "print", "math", "strings", "json"] {
            assert!(globals.contains_key(name), "missing {name}");
        }
        assert!(matches!(globals.get("math"), Some(Value::Module(_))));
        assert!(matches!(globals.get("len"), Some(Value::Native(_))));
    }

    #[test]
    fn test_fresh_instances_per_call() {
        let a = default_globals();
        let b = default_globals();
        let (Some(Value::Module(ma)), Some(Value::Module(mb))) = (a.get("math"), b.get("math"))
        else {
            panic!("math module missing");
        };
        assert!(!Arc::ptr_eq(ma, mb));
    }
}
