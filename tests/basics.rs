use ferrous_inject::{
    BoxError, CachingPolicy, Construct, Arguments, Environment, Identifier, InjectError, Recipe,
    RegisterOutcome, Registry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn bare() -> Environment {
    Environment::builder().without_default_providers().build()
}

#[derive(Debug, Default)]
struct Database {
    url: String,
}

struct UserService {
    db: Arc<Database>,
}

#[test]
fn test_register_and_get_by_type() {
    let env = bare();
    env.register(Recipe::of::<Database>().factory(|_| Database { url: "postgres://db".into() }))
        .unwrap();

    let db = env.get::<Database>().unwrap();
    assert_eq!(db.url, "postgres://db");
}

#[test]
fn test_registered_by_type_found_by_name() {
    let env = bare();
    env.injectable_global::<Database>().unwrap();

    let by_type = env.get::<Database>().unwrap();
    let name = std::any::type_name::<Database>();
    let by_name = env.get_named::<Database>(format!("  ::{name} ")).unwrap();
    assert!(Arc::ptr_eq(&by_type, &by_name));
}

#[test]
fn test_registered_by_name_found_by_type() {
    let env = bare();
    env.register(
        Recipe::named(std::any::type_name::<Database>())
            .policy(CachingPolicy::Singleton)
            .factory(|_| Database { url: "by-name".into() }),
    )
    .unwrap();

    assert_eq!(env.get::<Database>().unwrap().url, "by-name");
}

#[test]
fn test_unregistered_identifier() {
    let env = bare();
    match env.get::<Database>().err() {
        Some(InjectError::ClassNotFound(id)) => assert_eq!(id, Identifier::of::<Database>()),
        other => panic!("expected ClassNotFound, got {other:?}"),
    }
    assert!(matches!(
        env.registry().policy_of("app::Nothing"),
        Err(InjectError::ClassNotFound(_))
    ));
    assert!(matches!(
        env.registry().instantiate("app::Nothing"),
        Err(InjectError::ClassNotFound(_))
    ));
}

#[test]
fn test_recipe_without_builder_is_invalid() {
    let registry = Registry::new();
    let result = registry.register(Recipe::named("app::Nothing"));
    assert!(matches!(result, Err(InjectError::InvalidRecipe(_))));
    assert!(!registry.is_registered("app::Nothing"));
}

#[test]
fn test_lower_weight_is_ignored() {
    let env = bare();
    env.register(Recipe::named("app::Port").weight(10).factory(|_| 1u16)).unwrap();

    let outcome = env
        .register(Recipe::named("app::Port").weight(5).factory(|_| 2u16))
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::Ignored);
    assert_eq!(*env.get_named::<u16>("app::Port").unwrap(), 1);
    assert_eq!(env.registry().weight_of("app::Port"), Some(10));
}

#[test]
fn test_equal_weight_replaces_and_clears_cache() {
    let env = bare();
    env.register(Recipe::named("app::Port").policy(CachingPolicy::Singleton).factory(|_| 1u16))
        .unwrap();
    assert_eq!(*env.get_named::<u16>("app::Port").unwrap(), 1);
    assert_eq!(env.cache().singleton_count(), 1);

    let outcome = env
        .register(Recipe::named("app::Port").policy(CachingPolicy::Singleton).factory(|_| 2u16))
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::Replaced);
    assert_eq!(env.cache().singleton_count(), 0);
    assert_eq!(*env.get_named::<u16>("app::Port").unwrap(), 2);
}

#[test]
fn test_higher_weight_replaces() {
    let env = bare();
    env.register(Recipe::named("app::Port").factory(|_| 1u16)).unwrap();
    env.get_named::<u16>("app::Port").unwrap();

    env.register(Recipe::named("app::Port").weight(3).factory(|_| 2u16)).unwrap();
    assert_eq!(env.cache().bucket_count(), 0);
    assert_eq!(*env.get_named::<u16>("app::Port").unwrap(), 2);
}

#[test]
fn test_force_overrides_weight() {
    let env = bare();
    env.register(Recipe::named("app::Port").weight(100).factory(|_| 1u16)).unwrap();

    let outcome = env
        .override_with(Recipe::named("app::Port").factory(|_| 2u16))
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::Replaced);
    assert_eq!(*env.get_named::<u16>("app::Port").unwrap(), 2);
    assert_eq!(env.registry().weight_of("app::Port"), Some(0));
}

#[test]
fn test_builder_error_propagates_unchanged() {
    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct ConnectError;

    let env = bare();
    env.register(Recipe::of::<Database>().try_factory(|_| Err::<Database, _>(ConnectError)))
        .unwrap();

    match env.get::<Database>().err() {
        Some(InjectError::Build(err)) => {
            assert!(err.downcast_ref::<ConnectError>().is_some());
            assert_eq!(err.to_string(), "connection refused");
        }
        other => panic!("expected Build, got {other:?}"),
    }
    // Nothing was cached for the failed build
    assert_eq!(env.cache().bucket_count(), 0);
}

#[test]
fn test_nested_dependencies_share_cache() {
    let env = bare();
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    env.register(
        Recipe::of::<Database>()
            .policy(CachingPolicy::Singleton)
            .factory(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Database::default()
            }),
    )
    .unwrap();
    env.register(
        Recipe::of::<UserService>()
            .policy(CachingPolicy::NoCache)
            .try_factory(|ctx| Ok::<_, InjectError>(UserService { db: ctx.get()? })),
    )
    .unwrap();

    let a = env.get::<UserService>().unwrap();
    let b = env.get::<UserService>().unwrap();
    assert!(Arc::ptr_eq(&a.db, &b.db));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_registry_instantiate_builds_fresh() {
    let registry = Registry::new();
    registry
        .register(Recipe::of::<Database>().policy(CachingPolicy::Singleton).factory(|_| Database::default()))
        .unwrap();

    let a = registry.instantiate(Identifier::of::<Database>()).unwrap();
    let b = registry.instantiate(Identifier::of::<Database>()).unwrap();
    assert!(!a.ptr_eq(&b));
}

#[test]
fn test_fixed_arguments_reach_builder() {
    struct Endpoint {
        host: String,
        port: u16,
    }

    impl Construct for Endpoint {
        fn construct(args: &Arguments) -> Result<Self, BoxError> {
            Ok(Endpoint {
                host: args.positional::<String>(0)?.as_ref().clone(),
                port: *args.keyword::<u16>("port")?,
            })
        }
    }

    let env = bare();
    env.register(Recipe::construct::<Endpoint>().arg("localhost".to_string()).kwarg("port", 8080u16))
        .unwrap();

    let endpoint = env.get::<Endpoint>().unwrap();
    assert_eq!(endpoint.host, "localhost");
    assert_eq!(endpoint.port, 8080);
}

#[test]
fn test_missing_fixed_argument() {
    struct NeedsPort;

    impl Construct for NeedsPort {
        fn construct(args: &Arguments) -> Result<Self, BoxError> {
            args.keyword::<u16>("port")?;
            Ok(NeedsPort)
        }
    }

    let env = bare();
    env.register(Recipe::construct::<NeedsPort>()).unwrap();
    assert!(matches!(
        env.get::<NeedsPort>().err(),
        Some(InjectError::MissingArgument(name)) if name == "port"
    ));
}

#[test]
fn test_type_mismatch_on_wrong_downcast() {
    let env = bare();
    env.register(Recipe::named("app::Port").factory(|_| 8080u16)).unwrap();
    assert!(matches!(
        env.get_named::<String>("app::Port").err(),
        Some(InjectError::TypeMismatch { .. })
    ));
}

#[test]
fn test_registry_introspection() {
    let registry = Registry::new();
    assert!(registry.is_empty());
    registry.register(Recipe::named("a").factory(|_| 1u8)).unwrap();
    registry.register(Recipe::named("b").policy(CachingPolicy::NoCache).factory(|_| 2u8)).unwrap();

    let mut ids: Vec<String> = registry.identifiers().iter().map(|i| i.to_string()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.policy_of("b").unwrap(), CachingPolicy::NoCache);
}

#[derive(Debug)]
struct Versioned(&'static str);

/// Registers `Versioned("old")` with a builder that parks between two
/// barriers, so the recipe can be replaced while the build is in flight.
fn register_parked_builder(
    env: &Environment,
    policy: CachingPolicy,
) -> (Arc<std::sync::Barrier>, Arc<std::sync::Barrier>) {
    let started = Arc::new(std::sync::Barrier::new(2));
    let release = Arc::new(std::sync::Barrier::new(2));
    let (s, r) = (started.clone(), release.clone());
    env.register(Recipe::of::<Versioned>().policy(policy).factory(move |_| {
        s.wait();
        r.wait();
        Versioned("old")
    }))
    .unwrap();
    (started, release)
}

fn assert_override_wins_over_inflight_build(env: Environment, policy: CachingPolicy) {
    let (started, release) = register_parked_builder(&env, policy);

    let worker = {
        let env = env.clone();
        std::thread::spawn(move || env.get::<Versioned>().unwrap())
    };
    started.wait();

    let outcome = env
        .register(Recipe::of::<Versioned>().policy(policy).weight(1).factory(|_| Versioned("new")))
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::Replaced);
    release.wait();

    // The in-flight caller still gets what it built, but it is not cached
    assert_eq!(worker.join().unwrap().0, "old");

    let first = env.get::<Versioned>().unwrap();
    assert_eq!(first.0, "new");
    assert!(Arc::ptr_eq(&first, &env.get::<Versioned>().unwrap()));
}

#[test]
fn test_replaced_recipe_never_cached_by_inflight_singleton_build() {
    assert_override_wins_over_inflight_build(bare(), CachingPolicy::Singleton);
}

#[test]
fn test_replaced_recipe_never_cached_by_inflight_scoped_build() {
    let named = Arc::new(ferrous_inject::NamedProvider::new());
    let env = Environment::builder()
        .without_default_providers()
        .provider(named)
        .build();
    assert_override_wins_over_inflight_build(env, CachingPolicy::ScopeCached);
}
