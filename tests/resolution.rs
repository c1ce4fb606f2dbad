use ferrous_inject::{
    Arguments, CachingPolicy, Environment, InjectError, InjectedFn, Parameter, Recipe, Signature,
    Value,
};
use std::sync::Arc;

#[derive(Debug)]
struct Mailer {
    id: u32,
}

struct NotRegistered;

fn env_with_mailer() -> Environment {
    let env = Environment::builder().without_default_providers().build();
    env.register(
        Recipe::of::<Mailer>()
            .policy(CachingPolicy::Singleton)
            .factory(|_| Mailer { id: 1 }),
    )
    .unwrap();
    env
}

// f(a, injected: Mailer, b=5)
fn simple_signature() -> Signature {
    Signature::new()
        .param(Parameter::new("a"))
        .param(Parameter::new("injected").typed::<Mailer>())
        .param(Parameter::new("b").default_value(5i32))
}

#[test]
fn test_injects_registered_parameter() {
    let env = env_with_mailer();
    let bound = env
        .resolve(&simple_signature(), Arguments::new().arg("x"))
        .unwrap();

    assert_eq!(bound.positional_len(), 3);
    assert_eq!(*bound.positional::<&str>(0).unwrap(), "x");
    assert_eq!(bound.positional::<Mailer>(1).unwrap().id, 1);
    assert_eq!(*bound.positional::<i32>(2).unwrap(), 5);
    assert!(bound.kwargs().is_empty());
}

#[test]
fn test_explicit_keyword_beats_injection() {
    let env = env_with_mailer();
    let bound = env
        .resolve(
            &simple_signature(),
            Arguments::new().arg("x").kwarg("injected", Mailer { id: 99 }),
        )
        .unwrap();

    assert_eq!(bound.positional::<Mailer>(1).unwrap().id, 99);
}

#[test]
fn test_positional_never_beats_injection() {
    let env = env_with_mailer();
    // The second positional does not land on `injected`, it lands on `b`
    let bound = env
        .resolve(&simple_signature(), Arguments::new().arg("x").arg(7i32))
        .unwrap();

    assert_eq!(bound.positional::<Mailer>(1).unwrap().id, 1);
    assert_eq!(*bound.positional::<i32>(2).unwrap(), 7);
}

#[test]
fn test_injected_value_is_the_cached_instance() {
    let env = env_with_mailer();
    let bound = env
        .resolve(&simple_signature(), Arguments::new().arg("x"))
        .unwrap();
    let cached = env.get::<Mailer>().unwrap();
    assert!(Arc::ptr_eq(&bound.positional::<Mailer>(1).unwrap(), &cached));
}

#[test]
fn test_unregistered_annotation_takes_positional() {
    let env = env_with_mailer();
    let sig = Signature::new().param(Parameter::new("thing").typed::<NotRegistered>());

    let bound = env.resolve(&sig, Arguments::new().arg(3u8)).unwrap();
    assert_eq!(*bound.positional::<u8>(0).unwrap(), 3);

    assert!(matches!(
        env.resolve(&sig, Arguments::new()),
        Err(InjectError::MissingArgument(name)) if name == "thing"
    ));
}

#[test]
fn test_positional_only_rejects_keyword() {
    // f(a, x: Mailer, /)
    let env = env_with_mailer();
    let sig = Signature::new()
        .param(Parameter::positional_only("a"))
        .param(Parameter::positional_only("x").typed::<Mailer>());

    let result = env.resolve(&sig, Arguments::new().kwarg("x", Mailer { id: 2 }));
    assert!(matches!(result, Err(InjectError::MissingArgument(name)) if name == "a"));
}

#[test]
fn test_positional_only_extra_positional() {
    let env = env_with_mailer();
    let sig = Signature::new()
        .param(Parameter::positional_only("a"))
        .param(Parameter::positional_only("x").typed::<Mailer>());

    let result = env.resolve(&sig, Arguments::new().arg(1u8).arg(2u8));
    assert!(matches!(result, Err(InjectError::ExtraPositionalArguments(1))));
}

#[test]
fn test_keyword_only_goes_to_keyword_output() {
    let env = env_with_mailer();
    let sig = Signature::new()
        .param(Parameter::new("a"))
        .param(Parameter::keyword_only("mailer").typed::<Mailer>())
        .param(Parameter::keyword_only("retries").default_value(3u8))
        .param(Parameter::keyword_only("verbose"));

    let bound = env
        .resolve(&sig, Arguments::new().arg("a").kwarg("verbose", true))
        .unwrap();

    assert_eq!(bound.positional_len(), 1);
    assert_eq!(bound.keyword::<Mailer>("mailer").unwrap().id, 1);
    assert_eq!(*bound.keyword::<u8>("retries").unwrap(), 3);
    assert!(*bound.keyword::<bool>("verbose").unwrap());
}

#[test]
fn test_keyword_only_never_takes_positional() {
    let env = env_with_mailer();
    let sig = Signature::new().param(Parameter::keyword_only("verbose"));

    let result = env.resolve(&sig, Arguments::new().arg(true));
    assert!(matches!(result, Err(InjectError::MissingArgument(name)) if name == "verbose"));
}

#[test]
fn test_extra_keyword_arguments() {
    let env = env_with_mailer();
    let result = env.resolve(
        &simple_signature(),
        Arguments::new().arg("x").kwarg("zeta", 1u8).kwarg("alpha", 2u8),
    );
    match result {
        Err(InjectError::ExtraKeywordArguments(names)) => assert_eq!(names, vec!["alpha", "zeta"]),
        other => panic!("expected ExtraKeywordArguments, got {other:?}"),
    }
}

#[test]
fn test_variadics_collect_leftovers() {
    let env = env_with_mailer();
    let sig = simple_signature().var_positional().var_keyword();

    let bound = env
        .resolve(
            &sig,
            Arguments::new()
                .arg("x")
                .arg(6i32)
                .arg("extra")
                .kwarg("flag", true),
        )
        .unwrap();

    assert_eq!(bound.positional_len(), 4);
    assert_eq!(*bound.positional::<&str>(3).unwrap(), "extra");
    assert!(*bound.keyword::<bool>("flag").unwrap());
}

#[test]
fn test_receiver_passes_through() {
    struct Handler;

    let env = env_with_mailer();
    let sig = Signature::new()
        .receiver("self")
        .param(Parameter::new("mailer").typed::<Mailer>());

    let receiver = Value::new(Handler);
    let bound = env
        .resolve(&sig, Arguments::new().arg_value(receiver.clone()))
        .unwrap();
    assert!(bound.args()[0].ptr_eq(&receiver));
    assert_eq!(bound.positional::<Mailer>(1).unwrap().id, 1);

    assert!(matches!(
        env.resolve(&sig, Arguments::new()),
        Err(InjectError::MissingArgument(name)) if name == "self"
    ));
}

#[test]
fn test_complex_signature() {
    // f(self, a, /, b: Mailer, c=1, *args, d, e: Mailer = None, **kwargs)
    let env = env_with_mailer();
    let sig = Signature::new()
        .receiver("self")
        .param(Parameter::positional_only("a"))
        .param(Parameter::new("b").typed::<Mailer>())
        .param(Parameter::new("c").default_value(1u8))
        .var_positional()
        .param(Parameter::keyword_only("d"))
        .param(Parameter::keyword_only("e").typed::<Mailer>().default_value(()))
        .var_keyword();

    let bound = env
        .resolve(
            &sig,
            Arguments::new()
                .arg("self")
                .arg("a")
                .arg(2u8)
                .arg("rest")
                .kwarg("d", "d")
                .kwarg("a", "kw-a")
                .kwarg("other", 0u8),
        )
        .unwrap();

    // self, a, b (injected), c, *args
    assert_eq!(bound.positional_len(), 5);
    assert_eq!(*bound.positional::<&str>(1).unwrap(), "a");
    assert_eq!(bound.positional::<Mailer>(2).unwrap().id, 1);
    assert_eq!(*bound.positional::<u8>(3).unwrap(), 2);
    assert_eq!(*bound.positional::<&str>(4).unwrap(), "rest");

    // d, e (injected), and the leftovers: the positional-only `a` cannot
    // take the keyword, so it falls through to **kwargs
    assert_eq!(*bound.keyword::<&str>("d").unwrap(), "d");
    assert_eq!(bound.keyword::<Mailer>("e").unwrap().id, 1);
    assert_eq!(*bound.keyword::<&str>("a").unwrap(), "kw-a");
    assert_eq!(*bound.keyword::<u8>("other").unwrap(), 0);
}

#[test]
fn test_injection_error_propagates() {
    struct Broken;

    let env = env_with_mailer();
    env.register(Recipe::of::<Broken>().try_factory(|_| Err::<Broken, _>("broken builder")))
        .unwrap();
    let sig = Signature::new().param(Parameter::new("broken").typed::<Broken>());

    match env.resolve(&sig, Arguments::new()) {
        Err(InjectError::Build(err)) => assert_eq!(err.to_string(), "broken builder"),
        other => panic!("expected Build, got {other:?}"),
    }
}

#[test]
fn test_call_runs_body_with_bound_arguments() {
    let env = env_with_mailer();
    let send = InjectedFn::new(
        Signature::new()
            .param(Parameter::new("to"))
            .param(Parameter::new("mailer").typed::<Mailer>()),
        |args| -> Result<String, InjectError> {
            let to = args.positional::<&str>(0)?;
            let mailer = args.positional::<Mailer>(1)?;
            Ok(format!("{} via {}", to, mailer.id))
        },
    );

    let out = env.call(&send, Arguments::new().arg("bob")).unwrap().unwrap();
    assert_eq!(out, "bob via 1");

    let out = env
        .call(&send, Arguments::new().kwarg("to", "amy").kwarg("mailer", Mailer { id: 7 }))
        .unwrap()
        .unwrap();
    assert_eq!(out, "amy via 7");

    assert!(matches!(
        env.call(&send, Arguments::new()),
        Err(InjectError::MissingArgument(_))
    ));
}

#[test]
fn test_argument_counts_agree_with_is_empty() {
    let keywords_only = Arguments::new().kwarg("flag", true);
    assert_eq!(keywords_only.positional_len(), 0);
    assert_eq!(keywords_only.len(), 1);
    assert!(!keywords_only.is_empty());

    let mixed = Arguments::new().arg(1u8).arg(2u8).kwarg("flag", true);
    assert_eq!(mixed.positional_len(), 2);
    assert_eq!(mixed.len(), 3);

    let none = Arguments::new();
    assert_eq!(none.len(), 0);
    assert!(none.is_empty());
}
