//! Thread-bound identity provider.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::trace;

use super::{CacheLink, IdentityProvider, LinkSlot};
use crate::error::InjectResult;

thread_local! {
    // Dropped when the owning thread exits, which is how liveness is observed
    static LIVENESS: Arc<()> = Arc::new(());
}

/// Provider name of [`ThreadProvider`].
pub const THREAD_PROVIDER: &str = "thread";

/// Scopes instances to the calling OS thread.
///
/// Every thread that resolves a scope-cached identifier is recorded in a live
/// set together with a weak handle on a thread-local token. Once the thread
/// exits the token is gone, and the next sweep destroys the thread's buckets.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{Environment, Recipe};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Buffer;
///
/// let env = Environment::new();
/// env.register(Recipe::default_of::<Buffer>()).unwrap();
///
/// let here = env.get::<Buffer>().unwrap();
/// let worker = env.clone();
/// let there = std::thread::spawn(move || worker.get::<Buffer>().unwrap())
///     .join()
///     .unwrap();
/// assert!(!Arc::ptr_eq(&here, &there));
///
/// // The spawned thread is gone; its bucket goes with the next sweep
/// assert_eq!(env.sweep(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ThreadProvider {
    live: Mutex<HashMap<String, Weak<()>>>,
    link: LinkSlot,
}

impl ThreadProvider {
    /// Provider named `"thread"` with an empty live set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Destroys the calling thread's scope.
    pub fn destroy_self(&self) -> InjectResult<usize> {
        self.destroy_thread(thread::current().id())
    }

    /// Destroys the scope of the thread `id`.
    pub fn destroy_thread(&self, id: ThreadId) -> InjectResult<usize> {
        let scope_id = scope_id_of(id);
        self.live.lock().remove(&scope_id);
        self.link.destroy(THREAD_PROVIDER, &scope_id)
    }

    /// Number of threads currently recorded as live.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

fn scope_id_of(id: ThreadId) -> String {
    format!("{id:?}")
}

impl IdentityProvider for ThreadProvider {
    fn name(&self) -> &str {
        THREAD_PROVIDER
    }

    fn scope_id(&self) -> String {
        let scope_id = scope_id_of(thread::current().id());
        // Fails only while the thread's locals are being destroyed
        if let Ok(token) = LIVENESS.try_with(Arc::downgrade) {
            self.live
                .lock()
                .entry(scope_id.clone())
                .or_insert(token);
        }
        scope_id
    }

    fn expired_scopes(&self) -> Vec<String> {
        let mut live = self.live.lock();
        let dead: Vec<String> = live
            .iter()
            .filter(|(_, token)| token.strong_count() == 0)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            trace!(thread = %id, "thread exited");
            live.remove(id);
        }
        dead
    }

    fn attach(&self, link: CacheLink) {
        self.link.set(link);
    }
}
