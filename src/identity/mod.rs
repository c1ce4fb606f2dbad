//! Scope identity providers and the composite scope key.
//!
//! An identity provider answers "which scope am I in right now?" for one
//! dimension (thread, task, named label). The [`ScopeComposer`] asks every
//! registered provider and folds the answers into a [`ScopeKey`], which is
//! what the scope cache buckets instances by.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::cache::CacheInner;
use crate::error::InjectResult;

pub mod named;
pub mod task;
pub mod thread;

pub use named::NamedProvider;
pub use task::{ContextLocal, EntryMode, Scoped, TaskContext, TaskProvider, TaskScope};
pub use thread::ThreadProvider;

/// Source of "the current scope" for one dimension.
///
/// Implementations must be cheap to query: `scope_id` runs on every
/// resolution of a scope-cached identifier.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{Environment, IdentityProvider, Recipe};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// struct TenantProvider {
///     tenant: AtomicU32,
/// }
///
/// impl IdentityProvider for TenantProvider {
///     fn name(&self) -> &str {
///         "tenant"
///     }
///
///     fn scope_id(&self) -> String {
///         self.tenant.load(Ordering::SeqCst).to_string()
///     }
/// }
///
/// #[derive(Default)]
/// struct TenantCache;
///
/// let env = Environment::builder().without_default_providers().build();
/// let tenants = Arc::new(TenantProvider { tenant: AtomicU32::new(1) });
/// env.register_provider(tenants.clone());
/// env.register(Recipe::default_of::<TenantCache>()).unwrap();
///
/// let first = env.get::<TenantCache>().unwrap();
/// tenants.tenant.store(2, Ordering::SeqCst);
/// assert!(!Arc::ptr_eq(&first, &env.get::<TenantCache>().unwrap()));
/// ```
pub trait IdentityProvider: Send + Sync {
    /// Unique name of this provider. Registering a second provider with the
    /// same name replaces the first.
    fn name(&self) -> &str;

    /// Identifier of the caller's current scope.
    fn scope_id(&self) -> String;

    /// Scopes this provider knows to be finished. Called by the cache's sweep,
    /// which destroys each returned scope. Providers that cannot observe
    /// liveness return nothing.
    fn expired_scopes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called once when the provider is registered with a cache, handing it a
    /// link it can use to destroy its own scopes.
    fn attach(&self, _link: CacheLink) {}
}

/// Weak handle from a provider back to the cache it is registered with.
///
/// Never keeps the cache alive; operations on a link whose cache is gone
/// are no-ops.
#[derive(Clone)]
pub struct CacheLink {
    inner: Weak<CacheInner>,
}

impl CacheLink {
    pub(crate) fn new(inner: Weak<CacheInner>) -> Self {
        Self { inner }
    }

    /// Destroys every bucket keyed by `(provider, scope_id)`, running cleanup
    /// hooks. Returns the number of buckets removed.
    pub fn destroy_scope(&self, provider: &str, scope_id: &str) -> InjectResult<usize> {
        match self.inner.upgrade() {
            Some(inner) => inner.destroy_scope(provider, scope_id),
            None => Ok(0),
        }
    }

    /// Whether the cache is still alive.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for CacheLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLink")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Storage for a provider's [`CacheLink`].
///
/// Built-in providers keep one of these and fill it from
/// [`IdentityProvider::attach`].
#[derive(Default)]
pub struct LinkSlot {
    link: Mutex<Option<CacheLink>>,
}

impl LinkSlot {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `link`, replacing any previous one.
    pub fn set(&self, link: CacheLink) {
        *self.link.lock() = Some(link);
    }

    /// Current link, if attached.
    pub fn get(&self) -> Option<CacheLink> {
        self.link.lock().clone()
    }

    /// Destroys `(provider, scope_id)` through the stored link.
    pub fn destroy(&self, provider: &str, scope_id: &str) -> InjectResult<usize> {
        match self.get() {
            Some(link) => link.destroy_scope(provider, scope_id),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for LinkSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkSlot")
            .field("attached", &self.link.lock().is_some())
            .finish()
    }
}

/// Composite key of a scope bucket.
///
/// Holds one `(provider name, scope id)` component per registered provider,
/// in registration order. The encoded form `base::name:id::...` escapes `\`
/// and `:` inside names and ids, so providers with similar names or ids can
/// never produce colliding keys.
///
/// # Examples
///
/// ```
/// use ferrous_inject::ScopeKey;
///
/// let key = ScopeKey::compose([("thread", "7"), ("named_context", "alpha")]);
/// assert_eq!(key.as_str(), "base::thread:7::named_context:alpha::");
/// assert!(key.contains("named_context", "alpha"));
/// assert!(!key.contains("named_context", "7"));
///
/// // Separators inside a component are escaped
/// let a = ScopeKey::compose([("a:b", "c")]);
/// let b = ScopeKey::compose([("a", "b:c")]);
/// assert_ne!(a, b);
/// ```
#[derive(Clone)]
pub struct ScopeKey {
    encoded: String,
    parts: Arc<[(String, String)]>,
}

impl ScopeKey {
    /// Builds a key from `(provider name, scope id)` pairs.
    pub fn compose<I, N, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let parts: Vec<(String, String)> = parts
            .into_iter()
            .map(|(name, id)| (name.into(), id.into()))
            .collect();

        let mut encoded = String::from("base::");
        for (name, id) in &parts {
            escape_into(&mut encoded, name);
            encoded.push(':');
            escape_into(&mut encoded, id);
            encoded.push_str("::");
        }

        Self {
            encoded,
            parts: parts.into(),
        }
    }

    /// Whether the provider `name` reported `scope_id` for this key.
    pub fn contains(&self, name: &str, scope_id: &str) -> bool {
        self.parts.iter().any(|(n, id)| n == name && id == scope_id)
    }

    /// Scope id the provider `name` reported for this key.
    pub fn scope_id_of(&self, name: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id.as_str())
    }

    /// Encoded form.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Components in provider order.
    pub fn parts(&self) -> &[(String, String)] {
        &self.parts
    }
}

impl PartialEq for ScopeKey {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for ScopeKey {}

impl std::hash::Hash for ScopeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl fmt::Debug for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeKey({})", self.encoded)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

fn escape_into(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        if ch == '\\' || ch == ':' {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Aggregates every registered identity provider into one [`ScopeKey`].
#[derive(Default)]
pub struct ScopeComposer {
    providers: RwLock<Vec<Arc<dyn IdentityProvider>>>,
}

impl ScopeComposer {
    /// Composer with no providers. Its key is constant, so scope-cached
    /// identifiers behave like singletons until a provider is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `provider`, or replaces the registered provider of the same
    /// name in place.
    pub fn register_provider(&self, provider: Arc<dyn IdentityProvider>) {
        let mut providers = self.providers.write();
        let name = provider.name().to_string();
        match providers.iter().position(|p| p.name() == name) {
            Some(slot) => {
                debug!(provider = %name, "replacing identity provider");
                providers[slot] = provider;
            }
            None => {
                debug!(provider = %name, "registering identity provider");
                providers.push(provider);
            }
        }
    }

    /// Key of the caller's current scope.
    pub fn current_key(&self) -> ScopeKey {
        let providers = self.providers();
        ScopeKey::compose(
            providers
                .iter()
                .map(|p| (p.name().to_string(), p.scope_id())),
        )
    }

    /// Snapshot of the registered providers, in order.
    pub fn providers(&self) -> Vec<Arc<dyn IdentityProvider>> {
        self.providers.read().clone()
    }

    /// Names of the registered providers, in order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// The provider registered as `name`.
    pub fn provider(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }
}

impl fmt::Debug for ScopeComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeComposer")
            .field("providers", &self.provider_names())
            .finish()
    }
}
