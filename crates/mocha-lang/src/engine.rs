use std::sync::Arc;
use std::time::Instant;

use crate::{
    binder::Binder,
    cache::ExpressionCache,
    compiler::{CompiledExpression, Compiler},
    error::Error,
    optimizer::Optimizer,
    parse,
    runtime::{Arity, FunctionRegistry, Namespace, RuntimeError, Scope, math},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Run constant folding and dead-branch elimination before code generation.
    pub optimize: bool,
    /// Clear the `temp` namespace at the start of every evaluation.
    pub reset_temp: bool,
    /// Maximum number of cached expressions; `0` means unbounded.
    pub cache_capacity: usize,
    /// Upper bound on the iterations of a single `loop` or `for_each`.
    pub max_loop_iterations: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            optimize: true,
            reset_temp: true,
            cache_capacity: 1024,
            max_loop_iterations: None,
        }
    }
}

/// Compiles expressions against a set of registered functions and namespaces.
///
/// Compilation through `&self` is thread-safe; registering functions needs
/// `&mut self`, so it cannot happen while expressions are being compiled.
/// Changing functions or options drops every cached expression.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<FunctionRegistry>,
    options: Options,
    cache: ExpressionCache,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            registry: Arc::new(FunctionRegistry::new()),
            cache: ExpressionCache::new(options.cache_capacity),
            options,
        }
    }

    /// An engine with the `math` library registered.
    pub fn standard() -> Self {
        let mut engine = Self::default();
        math::register(Arc::make_mut(&mut engine.registry));
        engine
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn set_optimize(&mut self, optimize: bool) {
        self.options.optimize = optimize;
        self.invalidate();
    }

    pub fn set_reset_temp(&mut self, reset_temp: bool) {
        self.options.reset_temp = reset_temp;
        self.invalidate();
    }

    pub fn set_max_loop_iterations(&mut self, limit: Option<u64>) {
        self.options.max_loop_iterations = limit;
        self.invalidate();
    }

    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.options.cache_capacity = capacity;
        self.cache = ExpressionCache::new(capacity);
    }

    /// Registers `f` under `namespace` (a tag such as `"query"`, `"q"` or a
    /// host-defined one) or globally when `namespace` is `None`. Unknown tags
    /// are declared as new namespaces.
    pub fn register_function<F>(&mut self, namespace: Option<&str>, name: &str, arity: Arity, f: F)
    where
        F: Fn(&[f64], &mut Scope) -> Result<f64, RuntimeError> + Send + Sync + 'static,
    {
        let registry = Arc::make_mut(&mut self.registry);
        let namespace = namespace.map(|tag| registry.register_namespace(tag));
        registry.register(namespace, name, arity, f);
        self.invalidate();
    }

    pub fn register_namespace(&mut self, tag: &str) -> Namespace {
        let namespace = Arc::make_mut(&mut self.registry).register_namespace(tag);
        self.invalidate();
        namespace
    }

    pub fn namespace(&self, tag: &str) -> Option<Namespace> {
        self.registry.namespace(tag)
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Runs the full pipeline without consulting the cache.
    #[allow(clippy::result_large_err)]
    pub fn compile(&self, source: &str) -> Result<Arc<CompiledExpression>, Error> {
        self.build(source).map(Arc::new)
    }

    /// Like [`Engine::compile`], but returns the shared instance for `source`
    /// when it has been compiled before.
    #[allow(clippy::result_large_err)]
    pub fn compile_cached(&self, source: &str) -> Result<Arc<CompiledExpression>, Error> {
        self.cache.get_or_compile(source, || self.build(source))
    }

    #[allow(clippy::result_large_err)]
    pub fn evaluate(&self, expr: &CompiledExpression, scope: &mut Scope) -> Result<f64, Error> {
        expr.evaluate(scope)
            .map_err(|err| Error::from_error(expr.source(), err))
    }

    /// Compiles `source` through the cache and evaluates it against `scope`.
    #[allow(clippy::result_large_err)]
    pub fn eval(&self, source: &str, scope: &mut Scope) -> Result<f64, Error> {
        let expr = self.compile_cached(source)?;
        self.evaluate(&expr, scope)
    }

    #[allow(clippy::result_large_err)]
    fn build(&self, source: &str) -> Result<CompiledExpression, Error> {
        let started = Instant::now();
        tracing::debug!(len = source.len(), optimize = self.options.optimize, "compiling expression");

        let node = parse(source)?;
        let bound = Binder::new(&self.registry)
            .bind(&node)
            .map_err(|err| Error::from_error(source, err))?;

        let bound = if self.options.optimize {
            let size = bound.size();
            let mut optimizer = Optimizer::new();
            let optimized = optimizer.optimize(bound);
            tracing::trace!(
                before = size,
                after = optimized.size(),
                passes = optimizer.passes(),
                "optimized expression"
            );
            optimized
        } else {
            bound
        };

        let root = Compiler::with_max_loop_iterations(self.options.max_loop_iterations)
            .generate(&bound)
            .map_err(|err| Error::from_error(source, err))?;

        tracing::debug!(elapsed = ?started.elapsed(), "compiled expression");
        Ok(CompiledExpression::new(source, root, self.options.reset_temp))
    }

    fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            tracing::debug!(entries = self.cache.len(), "clearing expression cache");
            self.cache.clear();
        }
    }
}
