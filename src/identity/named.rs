//! Manually switched identity provider.

use parking_lot::RwLock;
use tracing::debug;

use super::{CacheLink, IdentityProvider, LinkSlot};
use crate::error::InjectResult;

/// Provider name of [`NamedProvider`].
pub const NAMED_PROVIDER: &str = "named_context";

/// Label used until [`NamedProvider::switch`] is called.
pub const DEFAULT_LABEL: &str = "_default";

/// Scopes instances to an explicitly selected label.
///
/// The label is process-wide for the provider: switching it affects every
/// caller. Labels never expire on their own; destroy them explicitly.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{Environment, NamedProvider, Recipe};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Settings;
///
/// let env = Environment::builder().without_default_providers().build();
/// let named = Arc::new(NamedProvider::new());
/// env.register_provider(named.clone());
/// env.register(Recipe::default_of::<Settings>()).unwrap();
///
/// let default = env.get::<Settings>().unwrap();
/// named.switch("staging");
/// let staging = env.get::<Settings>().unwrap();
/// assert!(!Arc::ptr_eq(&default, &staging));
///
/// named.switch("_default");
/// assert!(Arc::ptr_eq(&default, &env.get::<Settings>().unwrap()));
/// ```
#[derive(Debug)]
pub struct NamedProvider {
    name: String,
    label: RwLock<String>,
    link: LinkSlot,
}

impl NamedProvider {
    /// Provider starting on the `"_default"` label.
    pub fn new() -> Self {
        Self::with_name(NAMED_PROVIDER)
    }

    /// Provider registered under a custom name, so several independent
    /// label dimensions can coexist.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: RwLock::new(DEFAULT_LABEL.to_string()),
            link: LinkSlot::new(),
        }
    }

    /// Makes `label` the current scope. Returns the previous label.
    pub fn switch(&self, label: impl Into<String>) -> String {
        let label = label.into();
        debug!(provider = %self.name, label = %label, "switching named scope");
        std::mem::replace(&mut *self.label.write(), label)
    }

    /// The current label.
    pub fn current(&self) -> String {
        self.label.read().clone()
    }

    /// Destroys the bucket(s) of `label`.
    pub fn destroy(&self, label: &str) -> InjectResult<usize> {
        self.link.destroy(&self.name, label)
    }

    /// Destroys the bucket(s) of the current label.
    pub fn destroy_current(&self) -> InjectResult<usize> {
        let label = self.current();
        self.destroy(&label)
    }
}

impl Default for NamedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for NamedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope_id(&self) -> String {
        self.current()
    }

    fn attach(&self, link: CacheLink) {
        self.link.set(link);
    }
}
