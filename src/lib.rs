//! # ferrous-inject
//!
//! Scoped object-lifecycle cache and dependency resolution for Rust.
//!
//! Callers ask for "an instance of identifier X" and get a freshly built
//! object, a process-wide singleton, or an instance pinned to their current
//! logical scope (thread, task or named label), depending on the caching
//! policy declared when X was registered.
//!
//! ## Features
//!
//! - **Caching policies**: NoCache, Singleton and ScopeCached
//! - **Weighted registration**: lower-weight re-registrations are ignored
//! - **Pluggable scopes**: thread, task and named identity providers, or your own
//! - **Explicit cleanup**: `Dispose` hooks run when scopes end and on teardown
//! - **Call-site binding**: inject the parameters of a declared signature
//! - **Member binding**: fill a type's unset `Option<Arc<T>>` members
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_inject::{CachingPolicy, Environment, Recipe};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let env = Environment::new();
//! env.register(
//!     Recipe::of::<Database>()
//!         .policy(CachingPolicy::Singleton)
//!         .factory(|_| Database { connection_string: "postgres://localhost".to_string() }),
//! ).unwrap();
//! env.register(
//!     Recipe::of::<UserService>()
//!         .policy(CachingPolicy::NoCache)
//!         .try_factory(|ctx| Ok::<_, ferrous_inject::InjectError>(UserService { db: ctx.get()? })),
//! ).unwrap();
//!
//! let user_service = env.get::<UserService>().unwrap();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Scopes
//!
//! Scope-cached identifiers get one instance per composite scope key. The
//! key combines the answer of every registered identity provider, so with
//! the default thread and task providers an instance is shared by callers on
//! the same thread inside the same task context.
//!
//! ```rust
//! use ferrous_inject::{EntryMode, Environment, Recipe};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct RequestState;
//!
//! let env = Environment::new();
//! env.register(Recipe::default_of::<RequestState>()).unwrap();
//! let tasks = env.task_scopes().unwrap();
//!
//! let (a, b) = tasks.within(EntryMode::Empty, || {
//!     (env.get::<RequestState>().unwrap(), env.get::<RequestState>().unwrap())
//! });
//! assert!(Arc::ptr_eq(&a, &b));
//! assert!(!Arc::ptr_eq(&a, &env.get::<RequestState>().unwrap()));
//! ```
//!
//! ## Lookup by name
//!
//! Identifiers are canonical strings, so a type registered by type can be
//! looked up by its path without importing it.
//!
//! ```rust
//! use ferrous_inject::Environment;
//!
//! let env = Environment::new();
//! env.injectable_global::<Vec<u8>>().unwrap();
//! let bytes = env.get_named::<Vec<u8>>("alloc::vec::Vec<u8>").unwrap();
//! assert!(bytes.is_empty());
//! ```
//!
//! ## Cleanup at exit
//!
//! Rust has no process-exit hooks, and [`global()`] lives in a static that is
//! never dropped. Cleanup hooks of its cached instances therefore only run
//! when something tears it down. Hold a [`TeardownGuard`] for the lifetime of
//! `main`; it tears the cache down when `main` returns or unwinds.
//!
//! ```rust
//! fn main() {
//!     let _guard = ferrous_inject::global().teardown_on_drop();
//!
//!     // ... run the application ...
//! }
//! ```
//!
//! Environments created with [`Environment::new`] also tear down when their
//! last handle is dropped.

pub mod cache;
pub mod config;
pub mod environment;
pub mod error;
pub mod identity;
pub mod key;
pub mod policy;
pub mod registration;
pub mod resolve;
pub mod traits;
pub mod value;

mod internal;

pub use cache::{BuildContext, DisposeFailure, ScopeCache, TeardownReport};
pub use config::EnvironmentConfig;
pub use environment::{global, Environment, EnvironmentBuilder, RegistrationModule, TeardownGuard};
pub use error::{BoxError, InjectError, InjectResult};
pub use identity::{
    CacheLink, ContextLocal, EntryMode, IdentityProvider, LinkSlot, NamedProvider, ScopeComposer,
    ScopeKey, Scoped, TaskContext, TaskProvider, TaskScope, ThreadProvider,
};
pub use key::{canonicalize, key_of_type, Identifier};
pub use policy::{CachingPolicy, PolicySet};
pub use registration::{Builder, Recipe, RegisterOutcome, Registry};
pub use resolve::{InjectMembers, InjectedFn, Injector, MemberSlot, MemberTable, ParamKind, Parameter, Signature};
pub use traits::{Construct, Dispose};
pub use value::{Arguments, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn bare() -> Environment {
        Environment::builder().without_default_providers().build()
    }

    #[test]
    fn test_singleton_resolution() {
        let env = bare();
        env.register(Recipe::of::<usize>().policy(CachingPolicy::Singleton).factory(|_| 42usize))
            .unwrap();

        let a = env.get::<usize>().unwrap();
        let b = env.get::<usize>().unwrap();

        assert_eq!(*a, 42);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_nocache_resolution() {
        let env = bare();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        env.register(Recipe::of::<String>().policy(CachingPolicy::NoCache).factory(move |_| {
            let n = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
            format!("instance-{n}")
        }))
        .unwrap();

        let a = env.get::<String>().unwrap();
        let b = env.get::<String>().unwrap();

        assert_eq!(a.as_str(), "instance-1");
        assert_eq!(b.as_str(), "instance-2");
        assert_eq!(env.cache().singleton_count(), 0);
        assert_eq!(env.cache().bucket_count(), 0);
    }

    #[test]
    fn test_scope_cached_without_providers_shares_one_bucket() {
        let env = bare();
        env.injectable::<String>().unwrap();

        let a = env.get::<String>().unwrap();
        let b = env.get::<String>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(env.cache().bucket_count(), 1);
        assert_eq!(env.cache().current_scope_key().as_str(), "base::");
    }

    #[test]
    fn test_unsupported_policy() {
        let env = Environment::builder()
            .without_default_providers()
            .policies(PolicySet::only(&[CachingPolicy::Singleton, CachingPolicy::ScopeCached]))
            .build();
        env.injectable_nocache::<String>().unwrap();

        assert!(matches!(
            env.get::<String>(),
            Err(InjectError::CacheStrategyNotSupported(CachingPolicy::NoCache))
        ));
    }

    #[test]
    fn test_nested_inject_error_is_not_wrapped() {
        struct Outer;
        let env = bare();
        env.register(Recipe::of::<Outer>().try_factory(|ctx| {
            ctx.get_named::<u8>("missing::Dependency")?;
            Ok::<_, InjectError>(Outer)
        }))
        .unwrap();

        match env.get::<Outer>().err() {
            Some(InjectError::ClassNotFound(id)) => assert_eq!(id.as_str(), "missing::Dependency"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
