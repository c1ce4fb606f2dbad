//! Self-constructing injectables.

use crate::error::BoxError;
use crate::value::Arguments;

/// A type that can build itself from the fixed arguments captured in its
/// recipe.
///
/// This is the counterpart of registering an identifier without a separate
/// builder: the identifier's own type is the builder. Types that need no
/// arguments can use [`Recipe::default_of`](crate::Recipe::default_of)
/// instead.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{Arguments, BoxError, Construct, Environment, Recipe};
///
/// struct Greeter {
///     greeting: String,
///     name: String,
/// }
///
/// impl Construct for Greeter {
///     fn construct(args: &Arguments) -> Result<Self, BoxError> {
///         Ok(Greeter {
///             greeting: args.positional::<&str>(0)?.to_string(),
///             name: args.keyword::<String>("name")?.as_ref().clone(),
///         })
///     }
/// }
///
/// let env = Environment::new();
/// env.register(Recipe::construct::<Greeter>().arg("hello").kwarg("name", "world".to_string()))
///     .unwrap();
/// let greeter = env.get::<Greeter>().unwrap();
/// assert_eq!(format!("{} {}", greeter.greeting, greeter.name), "hello world");
/// ```
pub trait Construct: Send + Sync + Sized + 'static {
    /// Build an instance from the recipe's stored arguments.
    fn construct(args: &Arguments) -> Result<Self, BoxError>;
}
