//! Construction-time member injection.

use std::any::Any;
use std::sync::Arc;

use crate::error::InjectResult;
use crate::key::Identifier;
use crate::value::Value;

/// Declared injectable members of a type, in declaration order.
///
/// Declaring a name twice keeps the latest declaration, and
/// [`MemberTable::inherit`] never overrides a name that is already present,
/// so the most-derived declaration wins whichever order a type declares its
/// own members and its base's in.
#[derive(Clone, Debug, Default)]
pub struct MemberTable {
    members: Vec<(String, Identifier)>,
}

impl MemberTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares member `name` of type `identifier`.
    pub fn member(&mut self, name: impl Into<String>, identifier: impl Into<Identifier>) -> &mut Self {
        let name = name.into();
        let identifier = identifier.into();
        match self.members.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = identifier,
            None => self.members.push((name, identifier)),
        }
        self
    }

    /// Declares member `name` of type `T`.
    pub fn member_of<T: ?Sized + 'static>(&mut self, name: impl Into<String>) -> &mut Self {
        self.member(name, Identifier::of::<T>())
    }

    /// Adds the members of `B` whose names are not declared yet.
    pub fn inherit<B: InjectMembers>(&mut self) -> &mut Self {
        let mut base = MemberTable::new();
        B::declare_members(&mut base);
        for (name, identifier) in base.members {
            if self.get(&name).is_none() {
                self.members.push((name, identifier));
            }
        }
        self
    }

    /// Declared type of member `name`.
    pub fn get(&self, name: &str) -> Option<&Identifier> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id)
    }

    /// Declared members as `(name, type)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Identifier)> {
        self.members.iter().map(|(n, id)| (n.as_str(), id))
    }

    /// Number of declared members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// No members declared.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A type whose members can be injected at construction time.
///
/// Usually implemented with [`inject_members!`](crate::inject_members).
///
/// # Examples
///
/// ```
/// use ferrous_inject::{inject_members, Environment, Recipe};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Logger;
/// #[derive(Default)]
/// struct Metrics;
///
/// #[derive(Default)]
/// struct Handler {
///     logger: Option<Arc<Logger>>,
///     metrics: Option<Arc<Metrics>>,
///     label: &'static str,
/// }
///
/// inject_members!(Handler { logger: Logger, metrics: Metrics });
///
/// let env = Environment::new();
/// env.register(Recipe::default_of::<Logger>()).unwrap();
///
/// let handler = env.construct(Handler::default(), |h| h.label = "ready").unwrap();
/// assert!(handler.logger.is_some());
/// assert!(handler.metrics.is_none()); // not registered
/// assert_eq!(handler.label, "ready");
/// ```
pub trait InjectMembers: 'static {
    /// Declares the type's injectable members, including inherited ones.
    fn declare_members(table: &mut MemberTable)
    where
        Self: Sized;

    /// Storage of member `name`, if the type has one.
    fn member_slot(&mut self, name: &str) -> Option<&mut dyn MemberSlot>;
}

/// Storage for one injectable member.
pub trait MemberSlot {
    /// Whether the member already holds a value.
    fn is_set(&self) -> bool;

    /// Stores `value` in the member.
    fn fill(&mut self, value: Value) -> InjectResult<()>;
}

impl<T: Any + Send + Sync> MemberSlot for Option<Arc<T>> {
    fn is_set(&self) -> bool {
        self.is_some()
    }

    fn fill(&mut self, value: Value) -> InjectResult<()> {
        *self = Some(value.downcast::<T>()?);
        Ok(())
    }
}

/// Implements [`InjectMembers`] for a struct whose injectable members are
/// `Option<Arc<T>>` fields.
///
/// `inject_members!(Ty { field: Type, ... })` declares the listed fields.
/// `inject_members!(Ty => base: Base { field: Type, ... })` also inherits the
/// members of the embedded `base: Base` field, with the fields listed here
/// taking precedence.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{inject_members, Environment, Recipe};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Config;
/// #[derive(Default)]
/// struct Cache;
///
/// #[derive(Default)]
/// struct Base {
///     config: Option<Arc<Config>>,
/// }
/// inject_members!(Base { config: Config });
///
/// #[derive(Default)]
/// struct Service {
///     base: Base,
///     cache: Option<Arc<Cache>>,
/// }
/// inject_members!(Service => base: Base { cache: Cache });
///
/// let env = Environment::new();
/// env.register(Recipe::default_of::<Config>()).unwrap();
/// env.register(Recipe::default_of::<Cache>()).unwrap();
///
/// let mut service = Service::default();
/// assert_eq!(env.bind_members(&mut service).unwrap(), 2);
/// assert!(service.base.config.is_some());
/// assert!(service.cache.is_some());
/// ```
#[macro_export]
macro_rules! inject_members {
    ($ty:ty => $base_field:ident : $base:ty { $($field:ident : $member:ty),* $(,)? }) => {
        impl $crate::InjectMembers for $ty {
            fn declare_members(table: &mut $crate::MemberTable) {
                $( table.member_of::<$member>(stringify!($field)); )*
                table.inherit::<$base>();
            }

            fn member_slot(&mut self, name: &str) -> ::std::option::Option<&mut dyn $crate::MemberSlot> {
                match name {
                    $( stringify!($field) => ::std::option::Option::Some(&mut self.$field as &mut dyn $crate::MemberSlot), )*
                    _ => $crate::InjectMembers::member_slot(&mut self.$base_field, name),
                }
            }
        }
    };
    ($ty:ty { $($field:ident : $member:ty),* $(,)? }) => {
        impl $crate::InjectMembers for $ty {
            fn declare_members(table: &mut $crate::MemberTable) {
                $( table.member_of::<$member>(stringify!($field)); )*
                let _ = table;
            }

            fn member_slot(&mut self, name: &str) -> ::std::option::Option<&mut dyn $crate::MemberSlot> {
                match name {
                    $( stringify!($field) => ::std::option::Option::Some(&mut self.$field as &mut dyn $crate::MemberSlot), )*
                    _ => ::std::option::Option::None,
                }
            }
        }
    };
}
