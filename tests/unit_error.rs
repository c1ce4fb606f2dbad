/// Unit tests for InjectError and InjectResult

use ferrous_inject::{CachingPolicy, Environment, Identifier, InjectError, InjectResult, Recipe};
use std::error::Error;

#[test]
fn test_error_display_class_not_found() {
    let error = InjectError::ClassNotFound(Identifier::named("app::Mailer"));
    assert_eq!(error.to_string(), "Object app::Mailer not registered for injection");
}

#[test]
fn test_error_display_invalid_recipe() {
    let error = InjectError::InvalidRecipe(Identifier::named("app::Mailer"));
    assert_eq!(error.to_string(), "No usable builder for app::Mailer");
}

#[test]
fn test_error_display_missing_argument() {
    let error = InjectError::MissingArgument("mailer".to_string());
    assert_eq!(error.to_string(), "Missing argument: mailer");
}

#[test]
fn test_error_display_extra_arguments() {
    let error = InjectError::ExtraPositionalArguments(2);
    assert_eq!(error.to_string(), "2 extra positional argument(s) supplied");

    let error = InjectError::ExtraKeywordArguments(vec!["a".to_string(), "b".to_string()]);
    assert_eq!(error.to_string(), "Unexpected keyword argument(s): a, b");
}

#[test]
fn test_error_display_policy_not_supported() {
    let error = InjectError::CacheStrategyNotSupported(CachingPolicy::ScopeCached);
    assert_eq!(
        error.to_string(),
        "Caching policy ScopeCached is not supported by this scope cache"
    );
}

#[test]
fn test_error_display_type_mismatch() {
    let error = InjectError::TypeMismatch {
        expected: "alloc::string::String",
    };
    assert_eq!(error.to_string(), "Type mismatch for: alloc::string::String");
}

#[test]
fn test_build_error_is_transparent() {
    let error = InjectError::Build("disk full".into());
    assert_eq!(error.to_string(), "disk full");
    // Transparent variants forward source() to the inner error's own source
    assert!(error.source().is_none());
}

#[test]
fn test_invalid_recipe_on_register() {
    let env = Environment::builder().without_default_providers().build();
    let result = env.register(Recipe::named("app::NoBuilder"));
    assert!(matches!(result, Err(InjectError::InvalidRecipe(id)) if id.as_str() == "app::NoBuilder"));
    assert!(!env.registry().is_registered("app::NoBuilder"));
}

#[test]
fn test_wrong_type_request_is_mismatch() {
    let env = Environment::builder().without_default_providers().build();
    env.register(Recipe::named("app::Port").factory(|_| 8080u16)).unwrap();

    match env.get_named::<String>("app::Port") {
        Err(InjectError::TypeMismatch { expected }) => assert!(expected.contains("String")),
        other => panic!("expected TypeMismatch, got {:?}", other.err()),
    }
}

#[test]
fn test_result_alias() {
    fn lookup(env: &Environment) -> InjectResult<u16> {
        Ok(*env.get_named::<u16>("app::Port")?)
    }

    let env = Environment::builder().without_default_providers().build();
    assert!(matches!(lookup(&env), Err(InjectError::ClassNotFound(_))));
    env.register(Recipe::named("app::Port").factory(|_| 1u16)).unwrap();
    assert_eq!(lookup(&env).unwrap(), 1);
}
