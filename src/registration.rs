//! Construction recipes and the registry holding them.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::cache::{BuildContext, ScopeCache};
use crate::error::{BoxError, InjectError, InjectResult};
use crate::key::Identifier;
use crate::policy::CachingPolicy;
use crate::traits::{Construct, Dispose};
use crate::value::{Arguments, Value};

/// Builder invoked to construct a fresh instance.
pub type Builder = Arc<dyn Fn(&BuildContext<'_>) -> Result<Value, BoxError> + Send + Sync>;

/// A build recipe waiting to be registered.
///
/// Carries the identifier, the builder, the fixed arguments handed to the
/// builder on every call, the caching policy and the priority weight.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{CachingPolicy, Environment, Recipe};
///
/// struct Pool { size: usize }
///
/// let env = Environment::new();
/// env.register(
///     Recipe::named("app::Pool")
///         .policy(CachingPolicy::Singleton)
///         .weight(10)
///         .kwarg("size", 8usize)
///         .try_factory(|ctx| Ok::<_, ferrous_inject::InjectError>(Pool {
///             size: *ctx.args().keyword::<usize>("size")?,
///         })),
/// ).unwrap();
///
/// let pool = env.get_named::<Pool>("app::Pool").unwrap();
/// assert_eq!(pool.size, 8);
/// ```
#[derive(Clone)]
pub struct Recipe {
    identifier: Identifier,
    builder: Option<Builder>,
    arguments: Arguments,
    policy: CachingPolicy,
    weight: i64,
    force: bool,
}

impl Recipe {
    /// Recipe for the type `T`, without a builder yet.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(Identifier::of::<T>())
    }

    /// Recipe for an arbitrary identifier, without a builder yet.
    pub fn named(identifier: impl Into<Identifier>) -> Self {
        Self {
            identifier: identifier.into(),
            builder: None,
            arguments: Arguments::new(),
            policy: CachingPolicy::default(),
            weight: 0,
            force: false,
        }
    }

    /// Recipe for `T` that builds with `T::default()`.
    pub fn default_of<T: Default + Send + Sync + 'static>() -> Self {
        Self::of::<T>().factory(|_| T::default())
    }

    /// Recipe for `T` that builds with [`Construct::construct`] from the
    /// recipe's stored arguments.
    pub fn construct<T: Construct>() -> Self {
        Self::of::<T>().try_factory(|ctx| T::construct(ctx.args()))
    }

    /// Sets the raw builder.
    pub fn builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&BuildContext<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.builder = Some(Arc::new(builder));
        self
    }

    /// Sets an infallible builder returning a plain instance.
    pub fn factory<T, F>(self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&BuildContext<'_>) -> T + Send + Sync + 'static,
    {
        self.builder(move |ctx| Ok(Value::new(factory(ctx))))
    }

    /// Sets a fallible builder. Its error reaches the caller of `get`
    /// unchanged.
    pub fn try_factory<T, E, F>(self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&BuildContext<'_>) -> Result<T, E> + Send + Sync + 'static,
    {
        self.builder(move |ctx| factory(ctx).map(Value::new).map_err(Into::into))
    }

    /// Sets a builder whose instances carry their [`Dispose`] hook.
    pub fn disposable_factory<T, F>(self, factory: F) -> Self
    where
        T: Dispose,
        F: Fn(&BuildContext<'_>) -> T + Send + Sync + 'static,
    {
        self.builder(move |ctx| Ok(Value::disposable(factory(ctx))))
    }

    /// Sets the caching policy (default [`CachingPolicy::ScopeCached`]).
    pub fn policy(mut self, policy: CachingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the priority weight (default 0).
    pub fn weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    /// Replace any existing recipe regardless of weight.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Appends a fixed positional argument.
    pub fn arg<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.arguments = self.arguments.arg(value);
        self
    }

    /// Sets a fixed keyword argument.
    pub fn kwarg<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.arguments = self.arguments.kwarg(name, value);
        self
    }

    /// Replaces all fixed arguments.
    pub fn arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// The identifier this recipe registers.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }
}

impl std::fmt::Debug for Recipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recipe")
            .field("identifier", &self.identifier)
            .field("has_builder", &self.builder.is_some())
            .field("policy", &self.policy)
            .field("weight", &self.weight)
            .field("force", &self.force)
            .finish()
    }
}

/// Stored form of a registered recipe
pub(crate) struct Registration {
    pub(crate) builder: Builder,
    pub(crate) arguments: Arguments,
    pub(crate) policy: CachingPolicy,
    pub(crate) weight: i64,
}

/// What `register` did with a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First recipe for the identifier
    Inserted,
    /// An existing recipe was replaced
    Replaced,
    /// An existing recipe with a strictly higher weight was kept
    Ignored,
}

/// Construction registry: identifier to recipe.
///
/// Cloning a `Registry` yields another handle to the same map. Lookups take a
/// read lock; the lock is always released before a builder runs, so builders
/// may freely resolve their own dependencies.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{CachingPolicy, Identifier, InjectError, Recipe, Registry, RegisterOutcome};
///
/// let registry = Registry::new();
/// assert!(!registry.is_registered("app::Port"));
///
/// let outcome = registry
///     .register(Recipe::named("app::Port").weight(5).factory(|_| 8080u16))
///     .unwrap();
/// assert_eq!(outcome, RegisterOutcome::Inserted);
///
/// // Lower weight loses silently
/// let outcome = registry
///     .register(Recipe::named("app::Port").factory(|_| 9090u16))
///     .unwrap();
/// assert_eq!(outcome, RegisterOutcome::Ignored);
///
/// let port = registry.instantiate("app::Port").unwrap();
/// assert_eq!(port.downcast_ref::<u16>(), Some(&8080));
/// assert_eq!(registry.policy_of("app::Port").unwrap(), CachingPolicy::ScopeCached);
/// assert!(matches!(
///     registry.policy_of("app::Other"),
///     Err(InjectError::ClassNotFound(_))
/// ));
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    recipes: Arc<RwLock<HashMap<Identifier, Arc<Registration>>>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `recipe`, subject to the weight rule.
    ///
    /// An existing recipe with a strictly higher weight is kept and the call
    /// is a silent no-op, unless the new recipe was marked with
    /// [`Recipe::force`]. A recipe without a builder is rejected with
    /// [`InjectError::InvalidRecipe`].
    pub fn register(&self, recipe: Recipe) -> InjectResult<RegisterOutcome> {
        let Recipe {
            identifier,
            builder,
            arguments,
            policy,
            weight,
            force,
        } = recipe;

        let builder = builder.ok_or_else(|| InjectError::InvalidRecipe(identifier.clone()))?;

        let mut recipes = self.recipes.write();
        let outcome = match recipes.get(&identifier) {
            Some(existing) if existing.weight > weight && !force => {
                debug!(
                    identifier = %identifier,
                    stored_weight = existing.weight,
                    weight,
                    "ignoring lower-weight registration"
                );
                return Ok(RegisterOutcome::Ignored);
            }
            Some(_) => RegisterOutcome::Replaced,
            None => RegisterOutcome::Inserted,
        };

        debug!(identifier = %identifier, %policy, weight, ?outcome, "registered recipe");
        recipes.insert(
            identifier,
            Arc::new(Registration {
                builder,
                arguments,
                policy,
                weight,
            }),
        );
        Ok(outcome)
    }

    /// Whether `identifier` has a recipe.
    pub fn is_registered(&self, identifier: impl Into<Identifier>) -> bool {
        self.recipes.read().contains_key(&identifier.into())
    }

    /// Caching policy of `identifier`.
    pub fn policy_of(&self, identifier: impl Into<Identifier>) -> InjectResult<CachingPolicy> {
        Ok(self.lookup(&identifier.into())?.policy)
    }

    /// Weight of the stored recipe, if any.
    pub fn weight_of(&self, identifier: impl Into<Identifier>) -> Option<i64> {
        self.recipes.read().get(&identifier.into()).map(|r| r.weight)
    }

    /// Identifiers with a recipe, in no particular order.
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.recipes.read().keys().cloned().collect()
    }

    /// Number of registered recipes.
    pub fn len(&self) -> usize {
        self.recipes.read().len()
    }

    /// No recipes registered.
    pub fn is_empty(&self) -> bool {
        self.recipes.read().is_empty()
    }

    /// Builds a fresh instance of `identifier` from its stored recipe.
    ///
    /// Dependencies requested by the builder are built fresh as well, since no
    /// cache is involved. Builder errors propagate unchanged.
    pub fn instantiate(&self, identifier: impl Into<Identifier>) -> InjectResult<Value> {
        self.instantiate_with(&identifier.into(), None)
    }

    pub(crate) fn instantiate_with(
        &self,
        identifier: &Identifier,
        cache: Option<&ScopeCache>,
    ) -> InjectResult<Value> {
        let registration = self.lookup(identifier)?;
        self.build_from(identifier, &registration, cache)
    }

    pub(crate) fn build_from(
        &self,
        identifier: &Identifier,
        registration: &Registration,
        cache: Option<&ScopeCache>,
    ) -> InjectResult<Value> {
        trace!(identifier = %identifier, "building instance");
        let ctx = BuildContext::new(identifier, &registration.arguments, self, cache);
        (registration.builder)(&ctx).map_err(InjectError::from_builder)
    }

    /// Whether `registration` is still the stored recipe of `identifier`.
    pub(crate) fn is_current(&self, identifier: &Identifier, registration: &Arc<Registration>) -> bool {
        self.recipes
            .read()
            .get(identifier)
            .is_some_and(|stored| Arc::ptr_eq(stored, registration))
    }

    pub(crate) fn lookup(&self, identifier: &Identifier) -> InjectResult<Arc<Registration>> {
        self.recipes
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| InjectError::ClassNotFound(identifier.clone()))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("recipes", &self.recipes.read().len())
            .finish()
    }
}
