/// Unit tests for Identifier and canonicalization

use ferrous_inject::{canonicalize, key_of_type, Identifier};
use std::collections::HashMap;

mod app {
    pub struct Mailer;
}

#[test]
fn test_type_and_name_agree() {
    let by_type = Identifier::of::<app::Mailer>();
    let by_name = Identifier::named(std::any::type_name::<app::Mailer>());
    assert_eq!(by_type, by_name);
    assert_eq!(key_of_type::<app::Mailer>(), by_type);
    assert!(by_type.as_str().ends_with("app::Mailer"));
}

#[test]
fn test_whitespace_and_leading_separator() {
    assert_eq!(canonicalize("  app::Cache\t"), "app::Cache");
    assert_eq!(canonicalize("::app::Cache"), "app::Cache");
    assert_eq!(canonicalize("dyn   app::Plugin"), "dyn app::Plugin");
}

#[test]
fn test_generic_spelling() {
    assert_eq!(
        canonicalize("std::collections::HashMap< String ,u32 >"),
        "std::collections::HashMap<String, u32>"
    );
    assert_eq!(canonicalize("( u8 ,u16 )"), "(u8, u16)");
    assert_eq!(canonicalize("& str"), "&str");
}

#[test]
fn test_type_name_is_already_canonical() {
    let name = std::any::type_name::<HashMap<String, Vec<(u8, i32)>>>();
    assert_eq!(canonicalize(name), name);
    assert_eq!(
        Identifier::of::<HashMap<String, Vec<(u8, i32)>>>().as_str(),
        name
    );
}

#[test]
fn test_conversions() {
    let id: Identifier = "app::Port".into();
    assert_eq!(id, Identifier::from(String::from(" app::Port ")));
    assert_eq!(Identifier::from(&id), id);
    assert_eq!(id.to_string(), "app::Port");
    assert_eq!(format!("{id:?}"), "Identifier(app::Port)");
}

#[test]
fn test_identifiers_as_map_keys() {
    let mut map = HashMap::new();
    map.insert(Identifier::named("a"), 1);
    map.insert(Identifier::named(" a"), 2);
    map.insert(Identifier::named("b"), 3);
    assert_eq!(map.len(), 2);
    assert_eq!(map[&Identifier::named("a")], 2);
}
