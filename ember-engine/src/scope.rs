//! Persistent variable namespaces carried across snippet executions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::value::Value;

/// A session's variable bindings, split into globals and locals.
///
/// Cheap to clone: clones share the same underlying namespaces, which is what
/// lets a spawned execution merge its bindings back into the session after it
/// finishes. Use [`Scope::clean`] for an independent copy.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Arc<Mutex<Namespaces>>,
}

#[derive(Clone, Default)]
struct Namespaces {
    globals: HashMap<String, Value>,
    locals: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_globals(globals: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Namespaces {
                globals,
                locals: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Namespaces> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge another scope's namespaces into this one, overwriting on
    /// conflict.
    pub fn update(&self, other: &Scope) {
        let other = other.lock().clone();
        let mut this = self.lock();
        this.globals.extend(other.globals);
        this.locals.extend(other.locals);
    }

    /// Merge bindings into the globals namespace. This is how executed
    /// snippets persist the variables they defined.
    pub fn update_globals(&self, bindings: HashMap<String, Value>) {
        self.lock().globals.extend(bindings);
    }

    /// Merge bindings into the locals namespace.
    pub fn update_locals(&self, bindings: HashMap<String, Value>) {
        self.lock().locals.extend(bindings);
    }

    /// An independent copy sharing no mutable state with this scope.
    pub fn clean(&self) -> Scope {
        Scope {
            inner: Arc::new(Mutex::new(self.lock().clone())),
        }
    }

    /// Drop all bindings.
    pub fn clear(&self) {
        let mut this = self.lock();
        this.globals.clear();
        this.locals.clear();
    }

    /// Look up a name, locals first.
    pub fn get(&self, name: &str) -> Option<Value> {
        let this = self.lock();
        this.locals
            .get(name)
            .or_else(|| this.globals.get(name))
            .cloned()
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.lock().globals.insert(name.to_owned(), value);
    }

    /// Merged snapshot (globals overlaid by locals) used to seed a fresh
    /// execution environment.
    pub fn seed(&self) -> HashMap<String, Value> {
        let this = self.lock();
        let mut merged = this.globals.clone();
        merged.extend(this.locals.clone());
        merged
    }
}
