use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::number;

use super::namespace::Namespace;

/// A value stored under a name.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Number(f64),
    /// Read-only numeric array supplied by the host, used by indexing and `for_each`.
    Array(Vec<f64>),
}

/// Result of reading a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookup {
    pub value: f64,
    /// `true` when the slot held no number and `0.0` was substituted.
    pub was_default: bool,
}

impl Lookup {
    pub const DEFAULT: Lookup = Lookup {
        value: 0.0,
        was_default: true,
    };

    #[inline(always)]
    pub fn found(value: f64) -> Self {
        Lookup {
            value,
            was_default: false,
        }
    }
}

type Store = FxHashMap<SmolStr, Binding>;

/// Namespaced, caller-owned binding store that compiled expressions read and write.
///
/// Reads never fail: unset names evaluate to `0.0`. The `temp` namespace is
/// cleared before each top-level evaluation, everything else persists until
/// the host changes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    stores: FxHashMap<Namespace, Store>,
    this: f64,
    children: FxHashMap<i64, Scope>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn get(&self, namespace: Namespace, name: &str) -> Lookup {
        match self.stores.get(&namespace).and_then(|store| store.get(name)) {
            Some(Binding::Number(value)) => Lookup::found(*value),
            Some(Binding::Array(_)) | None => Lookup::DEFAULT,
        }
    }

    /// Reads `name[index]` with wrap-around indexing.
    #[inline(always)]
    pub fn get_index(&self, namespace: Namespace, name: &str, index: f64) -> Lookup {
        self.get_array(namespace, name)
            .and_then(|values| number::wrap_index(index, values.len()).map(|i| Lookup::found(values[i])))
            .unwrap_or(Lookup::DEFAULT)
    }

    pub fn get_array(&self, namespace: Namespace, name: &str) -> Option<&[f64]> {
        match self.stores.get(&namespace).and_then(|store| store.get(name)) {
            Some(Binding::Array(values)) => Some(values.as_slice()),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn set(&mut self, namespace: Namespace, name: impl Into<SmolStr>, value: f64) {
        self.stores
            .entry(namespace)
            .or_default()
            .insert(name.into(), Binding::Number(value));
    }

    pub fn set_array(&mut self, namespace: Namespace, name: impl Into<SmolStr>, values: Vec<f64>) {
        self.stores
            .entry(namespace)
            .or_default()
            .insert(name.into(), Binding::Array(values));
    }

    pub fn remove(&mut self, namespace: Namespace, name: &str) -> Option<Binding> {
        self.stores.get_mut(&namespace).and_then(|store| store.remove(name))
    }

    pub fn clear_namespace(&mut self, namespace: Namespace) {
        if let Some(store) = self.stores.get_mut(&namespace) {
            store.clear();
        }
    }

    /// Clears the per-evaluation `temp` namespace.
    #[inline(always)]
    pub fn clear_temp(&mut self) {
        self.clear_namespace(Namespace::Temp);
    }

    #[inline(always)]
    pub fn this(&self) -> f64 {
        self.this
    }

    pub fn set_this(&mut self, value: f64) {
        self.this = value;
    }

    /// Registers the scope that `handle -> expr` evaluates `expr` against.
    pub fn insert_child(&mut self, handle: i64, scope: Scope) -> Option<Scope> {
        self.children.insert(handle, scope)
    }

    pub fn child(&self, handle: i64) -> Option<&Scope> {
        self.children.get(&handle)
    }

    pub fn child_mut(&mut self, handle: i64) -> Option<&mut Scope> {
        self.children.get_mut(&handle)
    }

    pub fn remove_child(&mut self, handle: i64) -> Option<Scope> {
        self.children.remove(&handle)
    }
}
