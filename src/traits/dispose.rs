//! Cleanup capability for cached instances.

use crate::error::BoxError;

/// Trait for instance cleanup.
///
/// Implement this trait for instances that need structured teardown (e.g., flushing caches,
/// closing connections) and hand them to the environment through
/// [`Value::disposable`](crate::Value::disposable) or
/// [`Recipe::disposable_factory`](crate::Recipe::disposable_factory). The hook runs once,
/// when the instance leaves the cache: its scope is destroyed, its recipe is
/// overridden, or the environment is torn down.
///
/// Instances without the capability are dropped without any hook.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{BoxError, CachingPolicy, Dispose, Environment, Recipe};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), BoxError> {
///         self.flushed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let env = Environment::new();
/// env.register(
///     Recipe::of::<Cache>()
///         .policy(CachingPolicy::Singleton)
///         .disposable_factory(|_| Cache { flushed: AtomicBool::new(false) }),
/// ).unwrap();
///
/// let cache = env.get::<Cache>().unwrap();
/// env.teardown();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform cleanup of resources.
    fn dispose(&self) -> Result<(), BoxError>;
}
