use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::error::RuntimeError;
use super::namespace::{Namespace, NamespaceId};
use super::scope::Scope;

pub type HostFn = dyn Fn(&[f64], &mut Scope) -> Result<f64, RuntimeError> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl Arity {
    #[inline(always)]
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => *n == count,
            Arity::Variadic => true,
        }
    }

    /// Whether the function may be read as a plain name, e.g. `query.is_baby`.
    pub fn accepts_no_args(&self) -> bool {
        self.accepts(0)
    }
}

/// A function registered by the host.
pub struct HostFunction {
    pub namespace: Option<Namespace>,
    pub name: SmolStr,
    pub arity: Arity,
    callable: Box<HostFn>,
}

impl HostFunction {
    #[inline(always)]
    pub fn call(&self, args: &[f64], scope: &mut Scope) -> Result<f64, RuntimeError> {
        (self.callable)(args, scope)
    }
}

impl Debug for HostFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

type FunctionKey = (Option<Namespace>, SmolStr);

/// Functions and custom namespaces known to an engine.
///
/// Populated while the host sets up the engine and read-only afterwards;
/// bound expressions keep `Arc`s to the functions they call.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<FunctionKey, Arc<HostFunction>>,
    namespaces: FxHashMap<SmolStr, Namespace>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f`, replacing any function with the same namespace and name.
    pub fn register<F>(&mut self, namespace: Option<Namespace>, name: &str, arity: Arity, f: F)
    where
        F: Fn(&[f64], &mut Scope) -> Result<f64, RuntimeError> + Send + Sync + 'static,
    {
        let name = SmolStr::new(name);
        let function = HostFunction {
            namespace,
            name: name.clone(),
            arity,
            callable: Box::new(f),
        };

        self.functions.insert((namespace, name), Arc::new(function));
    }

    #[inline(always)]
    pub fn lookup(&self, namespace: Option<Namespace>, name: &str) -> Option<&Arc<HostFunction>> {
        self.functions.get(&(namespace, SmolStr::new(name)))
    }

    /// Declares a host namespace. Built-in tags and already declared tags
    /// resolve to their existing namespace.
    pub fn register_namespace(&mut self, tag: &str) -> Namespace {
        if let Some(namespace) = self.namespace(tag) {
            return namespace;
        }

        let namespace = Namespace::Custom(NamespaceId(self.namespaces.len() as u32));
        self.namespaces.insert(SmolStr::new(tag), namespace);
        namespace
    }

    /// Resolves a namespace tag: built-ins and their aliases first, then host namespaces.
    pub fn namespace(&self, tag: &str) -> Option<Namespace> {
        Namespace::builtin(tag).or_else(|| self.namespaces.get(tag).copied())
    }

    pub fn namespace_tag(&self, namespace: Namespace) -> Option<SmolStr> {
        match namespace {
            Namespace::Custom(_) => self
                .namespaces
                .iter()
                .find(|(_, ns)| **ns == namespace)
                .map(|(tag, _)| tag.clone()),
            builtin => Some(SmolStr::new(builtin.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Arity::Fixed(2), 2, true)]
    #[case(Arity::Fixed(2), 3, false)]
    #[case(Arity::Fixed(0), 0, true)]
    #[case(Arity::Variadic, 0, true)]
    #[case(Arity::Variadic, 5, true)]
    fn test_arity_accepts(#[case] arity: Arity, #[case] count: usize, #[case] expected: bool) {
        assert_eq!(arity.accepts(count), expected);
    }

    #[test]
    fn test_register_and_call() {
        let mut registry = FunctionRegistry::new();
        registry.register(Some(Namespace::Query), "sum", Arity::Variadic, |args, _| {
            Ok(args.iter().sum())
        });

        let function = registry.lookup(Some(Namespace::Query), "sum").unwrap();
        assert_eq!(function.call(&[1.0, 2.0, 3.0], &mut Scope::new()), Ok(6.0));
        assert!(registry.lookup(None, "sum").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_function_can_write_scope() {
        let mut registry = FunctionRegistry::new();
        registry.register(None, "mark", Arity::Fixed(1), |args, scope| {
            scope.set(Namespace::Variable, "marked", args[0]);
            Ok(0.0)
        });

        let mut scope = Scope::new();
        let function = registry.lookup(None, "mark").unwrap();
        function.call(&[4.0], &mut scope).unwrap();

        assert_eq!(scope.get(Namespace::Variable, "marked").value, 4.0);
    }

    #[test]
    fn test_register_namespace() {
        let mut registry = FunctionRegistry::new();

        let entity = registry.register_namespace("entity");
        assert!(matches!(entity, Namespace::Custom(_)));
        assert_eq!(registry.register_namespace("entity"), entity);
        assert_eq!(registry.register_namespace("v"), Namespace::Variable);
        assert_eq!(registry.namespace("entity"), Some(entity));
        assert_eq!(registry.namespace_tag(entity).as_deref(), Some("entity"));
        assert_ne!(registry.register_namespace("world"), entity);
    }
}
