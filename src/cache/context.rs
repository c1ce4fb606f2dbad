//! Build context handed to builders.
//!
//! This module contains the BuildContext type which gives a builder its
//! recipe's fixed arguments and a way to resolve its own dependencies.

use std::any::Any;
use std::sync::Arc;

use crate::error::InjectResult;
use crate::key::Identifier;
use crate::registration::Registry;
use crate::value::{Arguments, Value};

use super::ScopeCache;

/// Context passed to builders.
///
/// Dependencies requested through [`BuildContext::get`] go through the same
/// scope cache (and therefore the same caching policies) as the outer
/// request. Construction is lazy and on demand: nothing is resolved until a
/// builder asks for it.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{CachingPolicy, Environment, Recipe};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let env = Environment::new();
/// env.register(
///     Recipe::of::<Database>()
///         .policy(CachingPolicy::Singleton)
///         .factory(|_| Database { url: "postgres://localhost".to_string() }),
/// ).unwrap();
/// env.register(
///     Recipe::of::<UserService>()
///         .policy(CachingPolicy::NoCache)
///         .try_factory(|ctx| Ok::<_, ferrous_inject::InjectError>(UserService {
///             db: ctx.get::<Database>()?,
///         })),
/// ).unwrap();
///
/// let a = env.get::<UserService>().unwrap();
/// let b = env.get::<UserService>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&a.db, &b.db));
/// ```
pub struct BuildContext<'a> {
    identifier: &'a Identifier,
    arguments: &'a Arguments,
    registry: &'a Registry,
    cache: Option<&'a ScopeCache>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        identifier: &'a Identifier,
        arguments: &'a Arguments,
        registry: &'a Registry,
        cache: Option<&'a ScopeCache>,
    ) -> Self {
        Self {
            identifier,
            arguments,
            registry,
            cache,
        }
    }

    /// Identifier being built.
    pub fn identifier(&self) -> &Identifier {
        self.identifier
    }

    /// Fixed arguments captured at registration.
    pub fn args(&self) -> &Arguments {
        self.arguments
    }

    /// Resolves a dependency by identifier.
    pub fn get_value(&self, identifier: impl Into<Identifier>) -> InjectResult<Value> {
        let identifier = identifier.into();
        match self.cache {
            Some(cache) => cache.get(&identifier),
            None => self.registry.instantiate_with(&identifier, None),
        }
    }

    /// Resolves a dependency of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> InjectResult<Arc<T>> {
        self.get_value(Identifier::of::<T>())?.downcast::<T>()
    }

    /// Resolves a dependency registered under `name` as a `T`.
    pub fn get_named<T: Any + Send + Sync>(&self, name: impl Into<Identifier>) -> InjectResult<Arc<T>> {
        self.get_value(name)?.downcast::<T>()
    }
}
