//! Caching policy definitions.

use std::fmt;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Caching policies controlling instance reuse
///
/// Declared per identifier at registration time, the policy decides whether
/// the scope cache builds a fresh instance, shares one process-wide, or pins
/// one to the caller's current scope.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{CachingPolicy, Environment, Recipe, NamedProvider};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Database;
/// #[derive(Default)]
/// struct Session;
/// #[derive(Default)]
/// struct Request;
///
/// let env = Environment::builder().without_default_providers().build();
/// let named = Arc::new(NamedProvider::new());
/// env.register_provider(named.clone());
///
/// env.register(Recipe::default_of::<Database>().policy(CachingPolicy::Singleton)).unwrap();
/// env.register(Recipe::default_of::<Session>()).unwrap(); // ScopeCached by default
/// env.register(Recipe::default_of::<Request>().policy(CachingPolicy::NoCache)).unwrap();
///
/// named.switch("alpha");
/// let db1 = env.get::<Database>().unwrap();
/// let s1 = env.get::<Session>().unwrap();
/// assert!(!Arc::ptr_eq(&env.get::<Request>().unwrap(), &env.get::<Request>().unwrap()));
///
/// named.switch("beta");
/// assert!(Arc::ptr_eq(&db1, &env.get::<Database>().unwrap()));
/// assert!(!Arc::ptr_eq(&s1, &env.get::<Session>().unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum CachingPolicy {
    /// New instance per resolution, never stored
    NoCache,
    /// Single instance per environment, stored until teardown
    Singleton,
    /// Single instance per composite scope key
    ///
    /// Two resolutions share the instance only when every registered identity
    /// provider reports the same scope id for both.
    #[default]
    ScopeCached,
}

impl fmt::Display for CachingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CachingPolicy::NoCache => "NoCache",
            CachingPolicy::Singleton => "Singleton",
            CachingPolicy::ScopeCached => "ScopeCached",
        };
        f.write_str(name)
    }
}

/// The set of policies a scope cache is willing to serve.
///
/// A cache built with a reduced set answers any other policy with
/// [`InjectError::CacheStrategyNotSupported`](crate::InjectError::CacheStrategyNotSupported).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct PolicySet {
    no_cache: bool,
    singleton: bool,
    scope_cached: bool,
}

impl PolicySet {
    /// Every policy.
    pub const fn all() -> Self {
        Self {
            no_cache: true,
            singleton: true,
            scope_cached: true,
        }
    }

    /// Exactly the listed policies.
    pub fn only(policies: &[CachingPolicy]) -> Self {
        let mut set = Self {
            no_cache: false,
            singleton: false,
            scope_cached: false,
        };
        for policy in policies {
            match policy {
                CachingPolicy::NoCache => set.no_cache = true,
                CachingPolicy::Singleton => set.singleton = true,
                CachingPolicy::ScopeCached => set.scope_cached = true,
            }
        }
        set
    }

    /// Whether `policy` is served.
    #[inline]
    pub fn contains(&self, policy: CachingPolicy) -> bool {
        match policy {
            CachingPolicy::NoCache => self.no_cache,
            CachingPolicy::Singleton => self.singleton,
            CachingPolicy::ScopeCached => self.scope_cached,
        }
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::all()
    }
}
