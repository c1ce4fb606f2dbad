/// Tests for the process-wide default environment

use ferrous_inject::{global, CachingPolicy, Recipe};
use serial_test::serial;
use std::sync::Arc;

#[derive(Default)]
struct AppState;

#[test]
#[serial]
fn test_global_is_shared() {
    assert!(std::ptr::eq(global(), global()));
    global()
        .register(Recipe::default_of::<AppState>().policy(CachingPolicy::Singleton).force())
        .unwrap();

    let here = global().get::<AppState>().unwrap();
    let there = std::thread::spawn(|| global().get::<AppState>().unwrap())
        .join()
        .unwrap();
    assert!(Arc::ptr_eq(&here, &there));
}

#[test]
#[serial]
fn test_global_has_default_providers() {
    let names = global().cache().provider_names();
    assert!(names.iter().any(|n| n == "thread"));
    assert!(names.iter().any(|n| n == "task"));
}

struct Journal(Arc<std::sync::atomic::AtomicUsize>);

impl ferrous_inject::Dispose for Journal {
    fn dispose(&self) -> Result<(), ferrous_inject::BoxError> {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[test]
#[serial]
fn test_guard_in_main_tears_global_down() {
    let flushed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = flushed.clone();
    global()
        .register(
            Recipe::of::<Journal>()
                .policy(CachingPolicy::Singleton)
                .force()
                .disposable_factory(move |_| Journal(counter.clone())),
        )
        .unwrap();

    fn main_body() {
        let _guard = global().teardown_on_drop();
        global().get::<Journal>().unwrap();
    }
    main_body();

    assert_eq!(flushed.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(global().cache().is_torn_down());
}
