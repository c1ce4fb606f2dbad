//! Type-erased instances and argument lists.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{InjectError, InjectResult};
use crate::traits::Dispose;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// A shared, type-erased instance.
///
/// Everything the environment builds, caches or binds travels as a `Value`.
/// Cloning a `Value` never copies the instance: clones point at the same
/// allocation, which is what [`Value::ptr_eq`] compares.
///
/// A value may also carry the [`Dispose`] capability of the instance it
/// wraps. The scope cache checks for it structurally when an instance leaves
/// the cache; a value without it is simply dropped.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::Value;
///
/// let v = Value::new(String::from("hello"));
/// assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("hello"));
/// assert!(v.downcast_ref::<u32>().is_none());
///
/// let same = v.clone();
/// assert!(v.ptr_eq(&same));
/// assert!(!v.ptr_eq(&Value::new(String::from("hello"))));
/// ```
#[derive(Clone)]
pub struct Value {
    any: AnyArc,
    disposer: Option<Arc<dyn Dispose>>,
    type_name: &'static str,
}

impl Value {
    /// Wraps `value` with no cleanup capability.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared instance.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            any: value,
            disposer: None,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wraps `value` and records its [`Dispose`] implementation as the
    /// cleanup hook.
    pub fn disposable<T: Dispose>(value: T) -> Self {
        Self::disposable_arc(Arc::new(value))
    }

    /// Shared-instance variant of [`Value::disposable`].
    pub fn disposable_arc<T: Dispose>(value: Arc<T>) -> Self {
        Self {
            any: value.clone(),
            disposer: Some(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the instance as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.any.downcast_ref::<T>()
    }

    /// Get the instance as a typed `Arc`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> InjectResult<Arc<T>> {
        self.any
            .clone()
            .downcast::<T>()
            .map_err(|_| InjectError::type_mismatch::<T>())
    }

    /// Whether the instance is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.any.is::<T>()
    }

    /// Whether both values wrap the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }

    /// Name of the wrapped type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The cleanup capability, when the instance has one.
    pub fn disposer(&self) -> Option<&Arc<dyn Dispose>> {
        self.disposer.as_ref()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.any) as *const () as usize
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.type_name)
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

/// Positional and keyword arguments.
///
/// Used for the fixed arguments captured by a recipe, for the arguments of a
/// call site before injection, and for the bound arguments afterwards.
/// Keyword arguments are kept sorted by name.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::Arguments;
///
/// let args = Arguments::new().arg(5u32).arg("two").kwarg("flag", true);
/// assert_eq!(args.positional_len(), 2);
/// assert_eq!(args.len(), 3);
/// assert_eq!(*args.positional::<u32>(0).unwrap(), 5);
/// assert_eq!(*args.keyword::<bool>("flag").unwrap(), true);
/// assert!(args.keyword::<bool>("missing").is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl Arguments {
    /// Empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.args.push(Value::new(value));
        self
    }

    /// Appends a positional argument that is already a [`Value`].
    pub fn arg_value(mut self, value: Value) -> Self {
        self.args.push(value);
        self
    }

    /// Sets a keyword argument.
    pub fn kwarg<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.kwargs.insert(name.into(), Value::new(value));
        self
    }

    /// Sets a keyword argument that is already a [`Value`].
    pub fn kwarg_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    /// Positional argument `index` as `T`.
    pub fn positional<T: Any + Send + Sync>(&self, index: usize) -> InjectResult<Arc<T>> {
        self.args
            .get(index)
            .ok_or_else(|| InjectError::MissingArgument(format!("#{index}")))?
            .downcast::<T>()
    }

    /// Keyword argument `name` as `T`.
    pub fn keyword<T: Any + Send + Sync>(&self, name: &str) -> InjectResult<Arc<T>> {
        self.kwargs
            .get(name)
            .ok_or_else(|| InjectError::MissingArgument(name.to_string()))?
            .downcast::<T>()
    }

    /// Positional values in order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Keyword values by name.
    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    /// Number of positional and keyword values together.
    pub fn len(&self) -> usize {
        self.args.len() + self.kwargs.len()
    }

    /// Number of positional values.
    pub fn positional_len(&self) -> usize {
        self.args.len()
    }

    /// No positional and no keyword values.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    /// Splits into positional and keyword parts.
    pub fn into_parts(self) -> (Vec<Value>, BTreeMap<String, Value>) {
        (self.args, self.kwargs)
    }

    /// Reassembles from positional and keyword parts.
    pub fn from_parts(args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Self {
        Self { args, kwargs }
    }
}
