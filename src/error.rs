//! Error types for the injection environment.

use thiserror::Error;

use crate::key::Identifier;
use crate::policy::CachingPolicy;

/// Boxed error returned by builders and cleanup hooks.
///
/// The environment never inspects or wraps these; they travel back to the
/// caller through [`InjectError::Build`] and [`InjectError::Dispose`] untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Injection errors
///
/// Represents the failures that can occur while registering recipes,
/// resolving instances, binding call arguments or tearing down scopes.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Environment, InjectError};
///
/// let env = Environment::new();
/// match env.get_value("app::Missing") {
///     Err(InjectError::ClassNotFound(id)) => {
///         assert_eq!(id.as_str(), "app::Missing");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Error)]
pub enum InjectError {
    /// Identifier was never registered
    #[error("Object {0} not registered for injection")]
    ClassNotFound(Identifier),
    /// Recipe has no usable builder
    #[error("No usable builder for {0}")]
    InvalidRecipe(Identifier),
    /// A declared parameter received no value
    #[error("Missing argument: {0}")]
    MissingArgument(String),
    /// Positional arguments left over with no variadic slot to take them
    #[error("{0} extra positional argument(s) supplied")]
    ExtraPositionalArguments(usize),
    /// Keyword arguments left over with no variadic slot to take them
    #[error("Unexpected keyword argument(s): {}", .0.join(", "))]
    ExtraKeywordArguments(Vec<String>),
    /// The caching policy is not handled by this scope cache
    #[error("Caching policy {0} is not supported by this scope cache")]
    CacheStrategyNotSupported(CachingPolicy),
    /// A value was downcast to the wrong type
    #[error("Type mismatch for: {expected}")]
    TypeMismatch {
        /// Name of the type that was requested
        expected: &'static str,
    },
    /// Error raised inside a builder
    #[error(transparent)]
    Build(BoxError),
    /// Error raised inside a cleanup hook
    #[error(transparent)]
    Dispose(BoxError),
}

impl InjectError {
    /// Converts an error coming out of a builder.
    ///
    /// Builders that resolve nested dependencies usually bubble an
    /// `InjectError` up through `?`; that error is handed back as-is rather
    /// than nested inside `Build`.
    pub(crate) fn from_builder(err: BoxError) -> Self {
        match err.downcast::<InjectError>() {
            Ok(inner) => *inner,
            Err(other) => InjectError::Build(other),
        }
    }

    pub(crate) fn type_mismatch<T: ?Sized>() -> Self {
        InjectError::TypeMismatch {
            expected: std::any::type_name::<T>(),
        }
    }
}

/// Result type for injection operations
pub type InjectResult<T> = Result<T, InjectError>;
