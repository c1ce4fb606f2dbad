//! Registration modules.
//!
//! Plugin and startup code groups its registrations into modules and hands
//! them to [`Environment::install`].

use crate::environment::Environment;
use crate::error::InjectResult;

/// A group of registrations that can be installed into an [`Environment`].
///
/// Installing a module more than once, or installing it after some
/// identifiers were already resolved, is allowed; every registration goes
/// through the usual weight rule.
///
/// # Example
///
/// ```rust
/// use ferrous_inject::{CachingPolicy, Environment, InjectResult, Recipe, RegistrationModule};
///
/// #[derive(Default)]
/// struct UserConfig;
///
/// struct UserRepo;
///
/// struct UserModule;
///
/// impl RegistrationModule for UserModule {
///     fn register(self, env: &Environment) -> InjectResult<()> {
///         env.register(Recipe::default_of::<UserConfig>().policy(CachingPolicy::Singleton))?;
///         env.register(Recipe::of::<UserRepo>().factory(|_| UserRepo))?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> InjectResult<()> {
/// let env = Environment::new();
/// env.install(UserModule)?
///     .install(|env: &Environment| env.injectable_nocache::<String>().map(|_| ()))?;
/// assert!(env.registry().is_registered(ferrous_inject::key_of_type::<UserRepo>()));
/// # Ok(())
/// # }
/// ```
pub trait RegistrationModule {
    /// Registers this module's recipes with `env`.
    fn register(self, env: &Environment) -> InjectResult<()>;
}

impl<F> RegistrationModule for F
where
    F: FnOnce(&Environment) -> InjectResult<()>,
{
    fn register(self, env: &Environment) -> InjectResult<()> {
        self(env)
    }
}

impl Environment {
    /// Installs `module`, returning `self` for chaining.
    pub fn install<M: RegistrationModule>(&self, module: M) -> InjectResult<&Self> {
        module.register(self)?;
        Ok(self)
    }
}
