//! Scope cache module.
//!
//! This module contains the ScopeCache type, which stores built instances
//! according to their caching policy and runs their cleanup hooks when they
//! leave the cache.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::error::{BoxError, InjectError, InjectResult};
use crate::identity::{CacheLink, IdentityProvider, ScopeComposer, ScopeKey};
use crate::internal::DisposeBag;
use crate::key::Identifier;
use crate::policy::{CachingPolicy, PolicySet};
use crate::registration::{Registration, Registry};
use crate::value::Value;

mod context;

pub use context::BuildContext;

/// Default minimum time between two automatic sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// A cleanup hook that failed or panicked.
#[derive(Debug)]
pub struct DisposeFailure {
    /// Identifier the instance was cached under
    pub identifier: Identifier,
    /// Error returned by the hook, or the panic message
    pub error: BoxError,
}

/// Outcome of [`ScopeCache::teardown`].
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Number of hooks that ran (successfully or not)
    pub disposed: usize,
    /// Hooks that failed
    pub failures: Vec<DisposeFailure>,
}

impl TeardownReport {
    /// Every hook succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Instances stored under one key, with their build sequence numbers.
#[derive(Default)]
struct Bucket {
    slots: HashMap<Identifier, (u64, Value)>,
}

impl Bucket {
    fn get(&self, identifier: &Identifier) -> Option<Value> {
        self.slots.get(identifier).map(|(_, v)| v.clone())
    }

    /// Stores `value` unless another caller got there first; returns the
    /// instance everyone should use from now on.
    fn publish(&mut self, identifier: &Identifier, seq: u64, value: Value) -> Value {
        match self.slots.get(identifier) {
            Some((_, existing)) => {
                trace!(identifier = %identifier, "lost publish race, using stored instance");
                existing.clone()
            }
            None => {
                self.slots.insert(identifier.clone(), (seq, value.clone()));
                value
            }
        }
    }

    fn remove(&mut self, identifier: &Identifier) -> Option<(u64, Value)> {
        self.slots.remove(identifier)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn drain(self) -> impl Iterator<Item = (u64, Identifier, Value)> {
        self.slots.into_iter().map(|(id, (seq, v))| (seq, id, v))
    }
}

/// Three-tier instance store: ephemeral, singleton and scope-keyed.
///
/// `ScopeCache` is a cheap handle; clones share the same storage. It is the
/// only component that inserts or removes cached instances.
///
/// # Thread Safety
///
/// The singleton slot map and the bucket map each sit behind their own
/// mutex, held only for lookup-or-insert and removal. Builders and cleanup
/// hooks always run with no cache lock held, so they may resolve other
/// identifiers freely. Two first callers racing on the same slot may both
/// build; the first to publish wins and both get the published instance.
/// Publishing re-checks the registry under the tier lock, so a build that
/// started before its recipe was replaced is never stored.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{CachingPolicy, NamedProvider, Recipe, Registry, ScopeCache};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Session;
///
/// let registry = Registry::new();
/// registry.register(Recipe::default_of::<Session>()).unwrap();
///
/// let cache = ScopeCache::new(registry);
/// let named = Arc::new(NamedProvider::new());
/// cache.register_provider(named.clone());
///
/// let id = ferrous_inject::key_of_type::<Session>();
/// let a = cache.get(&id).unwrap();
/// assert!(a.ptr_eq(&cache.get(&id).unwrap()));
///
/// cache.destroy_scope("named_context", "_default").unwrap();
/// assert!(!a.ptr_eq(&cache.get(&id).unwrap()));
/// ```
#[derive(Clone)]
pub struct ScopeCache {
    inner: Arc<CacheInner>,
}

pub(crate) struct CacheInner {
    registry: Registry,
    composer: ScopeComposer,
    singletons: Mutex<Bucket>,
    scopes: Mutex<HashMap<ScopeKey, Bucket>>,
    last_sweep: Mutex<Instant>,
    sweep_interval: Duration,
    policies: PolicySet,
    build_seq: AtomicU64,
    torn_down: AtomicBool,
}

impl ScopeCache {
    /// Cache over `registry` serving every policy, with the default sweep
    /// interval and no identity providers.
    pub fn new(registry: Registry) -> Self {
        Self::with_settings(registry, DEFAULT_SWEEP_INTERVAL, PolicySet::all())
    }

    /// Cache with an explicit sweep interval and policy set.
    pub fn with_settings(registry: Registry, sweep_interval: Duration, policies: PolicySet) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                registry,
                composer: ScopeComposer::new(),
                singletons: Mutex::new(Bucket::default()),
                scopes: Mutex::new(HashMap::new()),
                last_sweep: Mutex::new(Instant::now()),
                sweep_interval,
                policies,
                build_seq: AtomicU64::new(0),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    /// Returns an instance of `identifier` according to its caching policy.
    ///
    /// Triggers a sweep first when the sweep interval has elapsed. An
    /// instance whose recipe was replaced while it was being built is handed
    /// to this caller only and never stored.
    pub fn get(&self, identifier: &Identifier) -> InjectResult<Value> {
        self.inner.maybe_sweep();

        let registration = self.inner.registry.lookup(identifier)?;
        let policy = registration.policy;
        if !self.inner.policies.contains(policy) {
            return Err(InjectError::CacheStrategyNotSupported(policy));
        }

        match policy {
            CachingPolicy::NoCache => self.build(identifier, &registration),
            CachingPolicy::Singleton => {
                // Double-checked locking: never hold the lock while building
                if let Some(hit) = self.inner.singletons.lock().get(identifier) {
                    trace!(identifier = %identifier, "singleton hit");
                    return Ok(hit);
                }

                let seq = self.inner.next_seq();
                let value = self.build(identifier, &registration)?;
                let mut singletons = self.inner.singletons.lock();
                if !self.inner.registry.is_current(identifier, &registration) {
                    trace!(identifier = %identifier, "recipe replaced during build, not caching");
                    return Ok(value);
                }
                Ok(singletons.publish(identifier, seq, value))
            }
            CachingPolicy::ScopeCached => {
                let key = self.inner.composer.current_key();
                if let Some(hit) = self
                    .inner
                    .scopes
                    .lock()
                    .get(&key)
                    .and_then(|bucket| bucket.get(identifier))
                {
                    trace!(identifier = %identifier, scope = %key, "scope hit");
                    return Ok(hit);
                }

                let seq = self.inner.next_seq();
                let value = self.build(identifier, &registration)?;
                let mut scopes = self.inner.scopes.lock();
                if !self.inner.registry.is_current(identifier, &registration) {
                    trace!(identifier = %identifier, scope = %key, "recipe replaced during build, not caching");
                    return Ok(value);
                }
                Ok(scopes.entry(key).or_default().publish(identifier, seq, value))
            }
        }
    }

    fn build(&self, identifier: &Identifier, registration: &Registration) -> InjectResult<Value> {
        self.inner.registry.build_from(identifier, registration, Some(self))
    }

    /// Forgets every cached instance of `identifier`, in the singleton tier
    /// and in every scope bucket. Empty buckets are dropped.
    ///
    /// Cleanup hooks of the evicted instances run best-effort; failures are
    /// logged. Returns the number of instances evicted.
    pub fn clear_identifier(&self, identifier: &Identifier) -> usize {
        let mut evicted = Vec::new();

        if let Some((seq, value)) = self.inner.singletons.lock().remove(identifier) {
            evicted.push((seq, value));
        }
        {
            let mut scopes = self.inner.scopes.lock();
            for bucket in scopes.values_mut() {
                if let Some(entry) = bucket.remove(identifier) {
                    evicted.push(entry);
                }
            }
            scopes.retain(|_, bucket| !bucket.is_empty());
        }

        let count = evicted.len();
        if count > 0 {
            debug!(identifier = %identifier, evicted = count, "cleared cached instances");
            evicted.sort_by_key(|(seq, _)| *seq);
            let mut bag = DisposeBag::default();
            for (_, value) in &evicted {
                bag.push(identifier.clone(), value);
            }
            bag.run_all_reverse();
        }
        count
    }

    /// Destroys every bucket whose key contains `(provider, scope_id)`.
    ///
    /// Buckets are removed atomically, then the cleanup hooks of their
    /// instances run with no lock held. Every hook runs; the first failure is
    /// returned as [`InjectError::Dispose`]. On success returns the number of
    /// buckets removed.
    pub fn destroy_scope(&self, provider: &str, scope_id: &str) -> InjectResult<usize> {
        self.inner.destroy_scope(provider, scope_id)
    }

    /// Runs the cleanup hook of every cached instance exactly once, then
    /// empties the cache.
    ///
    /// Idempotent: every call after the first returns an empty report. Never
    /// panics; failing and panicking hooks are contained and reported.
    pub fn teardown(&self) -> TeardownReport {
        self.inner.teardown()
    }

    /// Whether [`ScopeCache::teardown`] has already run.
    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    /// Asks every provider for finished scopes and destroys them now,
    /// regardless of the sweep interval. Returns the number of buckets
    /// removed.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Registers an identity provider and hands it a link back to this cache.
    ///
    /// A provider with the same name as an existing one takes over its slot.
    /// Existing buckets are not migrated to the new key space.
    pub fn register_provider(&self, provider: Arc<dyn IdentityProvider>) {
        self.inner.composer.register_provider(provider.clone());
        provider.attach(self.link());
    }

    /// Weak link to this cache, as handed to providers.
    pub fn link(&self) -> CacheLink {
        CacheLink::new(Arc::downgrade(&self.inner))
    }

    /// The registry this cache builds from.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Minimum time between automatic sweeps.
    pub fn sweep_interval(&self) -> Duration {
        self.inner.sweep_interval
    }

    /// Policies this cache serves.
    pub fn policies(&self) -> PolicySet {
        self.inner.policies
    }

    /// Number of live scope buckets.
    pub fn bucket_count(&self) -> usize {
        self.inner.scopes.lock().len()
    }

    /// Number of stored singletons.
    pub fn singleton_count(&self) -> usize {
        self.inner.singletons.lock().len()
    }

    /// Keys of the live scope buckets.
    pub fn scope_keys(&self) -> Vec<ScopeKey> {
        self.inner.scopes.lock().keys().cloned().collect()
    }

    /// Key the caller would resolve scope-cached identifiers under right now.
    pub fn current_scope_key(&self) -> ScopeKey {
        self.inner.composer.current_key()
    }

    /// Registered providers, in order.
    pub fn providers(&self) -> Vec<Arc<dyn IdentityProvider>> {
        self.inner.composer.providers()
    }

    /// Names of the registered providers, in order.
    pub fn provider_names(&self) -> Vec<String> {
        self.inner.composer.provider_names()
    }
}

impl fmt::Debug for ScopeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeCache")
            .field("providers", &self.provider_names())
            .field("singletons", &self.singleton_count())
            .field("buckets", &self.bucket_count())
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

impl CacheInner {
    fn next_seq(&self) -> u64 {
        self.build_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn maybe_sweep(&self) {
        {
            let mut last = self.last_sweep.lock();
            if last.elapsed() < self.sweep_interval {
                return;
            }
            *last = Instant::now();
        }
        self.sweep_providers();
    }

    fn sweep(&self) -> usize {
        *self.last_sweep.lock() = Instant::now();
        self.sweep_providers()
    }

    fn sweep_providers(&self) -> usize {
        let mut removed = 0;
        for provider in self.composer.providers() {
            let name = provider.name().to_string();
            for scope_id in provider.expired_scopes() {
                match self.destroy_scope(&name, &scope_id) {
                    Ok(n) => removed += n,
                    Err(err) => {
                        warn!(provider = %name, scope = %scope_id, error = %err, "cleanup failed during sweep")
                    }
                }
            }
        }
        if removed > 0 {
            debug!(removed, "sweep destroyed expired scopes");
        }
        removed
    }

    pub(crate) fn destroy_scope(&self, provider: &str, scope_id: &str) -> InjectResult<usize> {
        let doomed: Vec<(ScopeKey, Bucket)> = {
            let mut scopes = self.scopes.lock();
            let keys: Vec<ScopeKey> = scopes
                .keys()
                .filter(|key| key.contains(provider, scope_id))
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| scopes.remove(&key).map(|bucket| (key, bucket)))
                .collect()
        };

        let removed = doomed.len();
        if removed == 0 {
            return Ok(0);
        }
        debug!(provider, scope = scope_id, buckets = removed, "destroying scope");

        let mut failures = Vec::new();
        for (_, bucket) in doomed {
            let mut entries: Vec<_> = bucket.drain().collect();
            entries.sort_by_key(|(seq, _, _)| *seq);
            let mut bag = DisposeBag::default();
            for (_, identifier, value) in &entries {
                bag.push(identifier.clone(), value);
            }
            failures.extend(bag.run_all_reverse());
        }

        match failures.into_iter().next() {
            Some(first) => Err(InjectError::Dispose(first.error)),
            None => Ok(removed),
        }
    }

    fn teardown(&self) -> TeardownReport {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return TeardownReport::default();
        }

        let singletons = std::mem::take(&mut *self.singletons.lock());
        let scopes = std::mem::take(&mut *self.scopes.lock());

        let mut entries: Vec<(u64, Identifier, Value)> = singletons.drain().collect();
        for (_, bucket) in scopes {
            entries.extend(bucket.drain());
        }
        entries.sort_by_key(|(seq, _, _)| *seq);

        // One instance may sit in several slots; dispose it once
        let mut seen = HashSet::new();
        let mut bag = DisposeBag::default();
        for (_, identifier, value) in &entries {
            if seen.insert(value.addr()) {
                bag.push(identifier.clone(), value);
            }
        }

        let disposed = bag.len();
        let failures = bag.run_all_reverse();
        info!(
            instances = entries.len(),
            disposed,
            failures = failures.len(),
            "scope cache torn down"
        );
        TeardownReport { disposed, failures }
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        if !self.torn_down.load(Ordering::SeqCst) {
            self.teardown();
        }
    }
}
