//! Environment module.
//!
//! This module contains the Environment type, which owns a registry, the
//! scope cache built on it, the resolution engine and the default identity
//! providers, and exposes the registration, resolution and scope control
//! surfaces in one place.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::cache::{ScopeCache, TeardownReport};
use crate::config::EnvironmentConfig;
use crate::error::InjectResult;
use crate::identity::{IdentityProvider, TaskProvider, ThreadProvider};
use crate::key::Identifier;
use crate::policy::{CachingPolicy, PolicySet};
use crate::registration::{Recipe, RegisterOutcome, Registry};
use crate::resolve::{InjectMembers, InjectedFn, Injector, Signature};
use crate::value::{Arguments, Value};

pub mod module_system;

pub use module_system::RegistrationModule;

/// Registry, scope cache and providers bundled together.
///
/// Cloning an `Environment` is cheap; clones share all state.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{CachingPolicy, Environment, Recipe};
/// use std::sync::Arc;
///
/// struct Config { name: &'static str }
/// struct Service { config: Arc<Config> }
///
/// let env = Environment::new();
/// env.register(
///     Recipe::of::<Config>()
///         .policy(CachingPolicy::Singleton)
///         .factory(|_| Config { name: "prod" }),
/// ).unwrap();
/// env.register(
///     Recipe::of::<Service>().try_factory(|ctx| {
///         Ok::<_, ferrous_inject::InjectError>(Service { config: ctx.get::<Config>()? })
///     }),
/// ).unwrap();
///
/// let service = env.get::<Service>().unwrap();
/// assert_eq!(service.config.name, "prod");
/// assert!(Arc::ptr_eq(&service, &env.get::<Service>().unwrap()));
/// ```
#[derive(Clone)]
pub struct Environment {
    registry: Registry,
    cache: ScopeCache,
    injector: Injector,
    thread: Option<Arc<ThreadProvider>>,
    task: Option<Arc<TaskProvider>>,
}

impl Environment {
    /// Environment with the thread and task providers and default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts an [`EnvironmentBuilder`] with default settings.
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// Environment built from `config`.
    pub fn from_config(config: EnvironmentConfig) -> Self {
        Self::builder().config(config).build()
    }

    // ----- Registration -----

    /// Registers `recipe`.
    ///
    /// When the recipe replaces an existing one, every cached instance of the
    /// identifier is evicted so nothing built from the old recipe is returned
    /// again.
    pub fn register(&self, recipe: Recipe) -> InjectResult<RegisterOutcome> {
        let identifier = recipe.identifier().clone();
        let outcome = self.registry.register(recipe)?;
        if outcome == RegisterOutcome::Replaced {
            let evicted = self.cache.clear_identifier(&identifier);
            debug!(identifier = %identifier, evicted, "recipe replaced");
        }
        Ok(outcome)
    }

    /// Registers `T` as scope-cached, built with `T::default()`.
    pub fn injectable<T: Default + Send + Sync + 'static>(&self) -> InjectResult<RegisterOutcome> {
        self.register(Recipe::default_of::<T>())
    }

    /// Registers `T` as a singleton, built with `T::default()`.
    pub fn injectable_global<T: Default + Send + Sync + 'static>(&self) -> InjectResult<RegisterOutcome> {
        self.register(Recipe::default_of::<T>().policy(CachingPolicy::Singleton))
    }

    /// Registers `T` as never cached, built with `T::default()`.
    pub fn injectable_nocache<T: Default + Send + Sync + 'static>(&self) -> InjectResult<RegisterOutcome> {
        self.register(Recipe::default_of::<T>().policy(CachingPolicy::NoCache))
    }

    /// Replaces the recipe of `recipe`'s identifier regardless of weight.
    pub fn override_with(&self, recipe: Recipe) -> InjectResult<RegisterOutcome> {
        self.register(recipe.force())
    }

    // ----- Resolution -----

    /// Instance of `T`, according to its caching policy.
    pub fn get<T: Any + Send + Sync>(&self) -> InjectResult<Arc<T>> {
        self.get_value(Identifier::of::<T>())?.downcast::<T>()
    }

    /// Instance registered under `name`, as a `T`.
    pub fn get_named<T: Any + Send + Sync>(&self, name: impl Into<Identifier>) -> InjectResult<Arc<T>> {
        self.get_value(name)?.downcast::<T>()
    }

    /// Type-erased instance of `identifier`.
    pub fn get_value(&self, identifier: impl Into<Identifier>) -> InjectResult<Value> {
        self.cache.get(&identifier.into())
    }

    /// Binds call arguments against `signature`. See [`Injector::resolve`].
    pub fn resolve(&self, signature: &Signature, args: Arguments) -> InjectResult<Arguments> {
        self.injector.resolve(signature, args)
    }

    /// Resolves the arguments of `f` and runs it.
    pub fn call<R>(&self, f: &InjectedFn<R>, args: Arguments) -> InjectResult<R> {
        self.injector.call(f, args)
    }

    /// Fills the unset injectable members of `target`.
    pub fn bind_members<T: InjectMembers>(&self, target: &mut T) -> InjectResult<usize> {
        self.injector.bind_members(target)
    }

    /// Binds the members of `seed`, then runs `body` on it.
    pub fn construct<T, F>(&self, seed: T, body: F) -> InjectResult<T>
    where
        T: InjectMembers,
        F: FnOnce(&mut T),
    {
        self.injector.construct(seed, body)
    }

    // ----- Scope control -----

    /// Registers an identity provider with the scope cache.
    pub fn register_provider(&self, provider: Arc<dyn IdentityProvider>) {
        self.cache.register_provider(provider);
    }

    /// See [`ScopeCache::destroy_scope`].
    pub fn destroy_scope(&self, provider: &str, scope_id: &str) -> InjectResult<usize> {
        self.cache.destroy_scope(provider, scope_id)
    }

    /// See [`ScopeCache::sweep`].
    pub fn sweep(&self) -> usize {
        self.cache.sweep()
    }

    /// See [`ScopeCache::teardown`].
    pub fn teardown(&self) -> TeardownReport {
        self.cache.teardown()
    }

    /// Guard that tears the cache down when dropped.
    ///
    /// Hold it in `main` (or a test) to get cleanup at the end of the
    /// program even though clones of the environment may still be alive.
    ///
    /// ```
    /// use ferrous_inject::Environment;
    ///
    /// let env = Environment::new();
    /// {
    ///     let _guard = env.teardown_on_drop();
    /// }
    /// assert!(env.cache().is_torn_down());
    /// ```
    pub fn teardown_on_drop(&self) -> TeardownGuard {
        TeardownGuard {
            cache: self.cache.clone(),
        }
    }

    // ----- Accessors -----

    /// The built-in thread provider, when enabled.
    pub fn thread_scopes(&self) -> Option<Arc<ThreadProvider>> {
        self.thread.clone()
    }

    /// The built-in task provider, when enabled.
    pub fn task_scopes(&self) -> Option<Arc<TaskProvider>> {
        self.task.clone()
    }

    /// The construction registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The scope cache.
    pub fn cache(&self) -> &ScopeCache {
        &self.cache
    }

    /// The call-site and member injector.
    pub fn injector(&self) -> &Injector {
        &self.injector
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Builder for [`Environment`].
///
/// # Examples
///
/// ```
/// use ferrous_inject::{Environment, NamedProvider};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let env = Environment::builder()
///     .without_default_providers()
///     .provider(Arc::new(NamedProvider::new()))
///     .sweep_interval(Duration::from_secs(1))
///     .build();
/// assert_eq!(env.cache().provider_names(), vec!["named_context".to_string()]);
/// ```
#[derive(Default)]
pub struct EnvironmentBuilder {
    config: EnvironmentConfig,
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl EnvironmentBuilder {
    /// Replaces all settings with `config`.
    pub fn config(mut self, config: EnvironmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Skip the thread and task providers.
    pub fn without_default_providers(mut self) -> Self {
        self.config.thread_scopes = false;
        self.config.task_scopes = false;
        self
    }

    /// Minimum time between automatic sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Caching policies the cache will serve.
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.config.policies = policies;
        self
    }

    /// Registers `provider` after the default ones.
    pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Creates the environment and attaches its providers.
    pub fn build(self) -> Environment {
        let registry = Registry::new();
        let cache = ScopeCache::with_settings(
            registry.clone(),
            self.config.sweep_interval,
            self.config.policies,
        );

        let thread = self.config.thread_scopes.then(|| Arc::new(ThreadProvider::new()));
        if let Some(provider) = &thread {
            cache.register_provider(provider.clone());
        }
        let task = self.config.task_scopes.then(|| Arc::new(TaskProvider::new()));
        if let Some(provider) = &task {
            cache.register_provider(provider.clone());
        }
        for provider in self.providers {
            cache.register_provider(provider);
        }

        Environment {
            registry,
            injector: Injector::new(cache.clone()),
            cache,
            thread,
            task,
        }
    }
}

impl fmt::Debug for EnvironmentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentBuilder")
            .field("config", &self.config)
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Tears the scope cache down when dropped. See
/// [`Environment::teardown_on_drop`].
#[must_use = "the cache is torn down as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TeardownGuard {
    cache: ScopeCache,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.cache.teardown();
    }
}

static GLOBAL: Lazy<Environment> = Lazy::new(|| Environment::from_config(EnvironmentConfig::from_env()));

/// Process-wide default environment, created on first use from
/// [`EnvironmentConfig::from_env`].
///
/// Statics are never dropped and nothing runs at process exit, so its cache
/// is only torn down by an explicit [`Environment::teardown`] or a
/// [`TeardownGuard`]. Take the guard at the top of `main`:
///
/// ```
/// fn main() {
///     let _guard = ferrous_inject::global().teardown_on_drop();
///     // cached instances are disposed when `main` returns
/// }
/// ```
pub fn global() -> &'static Environment {
    &GLOBAL
}
