//! Resolution engine.
//!
//! Binds call-site arguments against a declared [`Signature`] and injects
//! type members declared through [`InjectMembers`]. Both go through the
//! scope cache, so injected values obey their caching policy.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::cache::ScopeCache;
use crate::error::{InjectError, InjectResult};
use crate::key::Identifier;
use crate::value::{Arguments, Value};

mod members;

pub use members::{InjectMembers, MemberSlot, MemberTable};

/// How a parameter may receive a caller-supplied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamKind {
    /// Only by position
    PositionalOnly,
    /// By position or by name
    #[default]
    PositionalOrKeyword,
    /// Only by name
    KeywordOnly,
}

impl ParamKind {
    /// Whether a positional argument can bind this kind.
    #[inline]
    pub fn accepts_positional(self) -> bool {
        !matches!(self, ParamKind::KeywordOnly)
    }

    /// Whether a keyword argument can bind this kind.
    #[inline]
    pub fn accepts_keyword(self) -> bool {
        !matches!(self, ParamKind::PositionalOnly)
    }
}

/// One declared parameter of a [`Signature`].
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    kind: ParamKind,
    annotation: Option<Identifier>,
    default: Option<Value>,
}

impl Parameter {
    /// Positional-or-keyword parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            annotation: None,
            default: None,
        }
    }

    /// Parameter that only binds positionally.
    pub fn positional_only(name: impl Into<String>) -> Self {
        Self::new(name).kind(ParamKind::PositionalOnly)
    }

    /// Parameter that only binds by keyword.
    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::new(name).kind(ParamKind::KeywordOnly)
    }

    /// Sets the binding kind.
    pub fn kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    /// Declares the parameter's type as `T`.
    pub fn typed<T: ?Sized + 'static>(self) -> Self {
        self.annotated(Identifier::of::<T>())
    }

    /// Declares the parameter's type by identifier.
    pub fn annotated(mut self, identifier: impl Into<Identifier>) -> Self {
        self.annotation = Some(identifier.into());
        self
    }

    /// Value used when nothing else binds the parameter.
    pub fn default_value<T: std::any::Any + Send + Sync>(self, value: T) -> Self {
        self.default(Value::new(value))
    }

    /// Already-wrapped default value.
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binding kind.
    pub fn param_kind(&self) -> ParamKind {
        self.kind
    }

    /// Declared type, if any.
    pub fn annotation(&self) -> Option<&Identifier> {
        self.annotation.as_ref()
    }
}

/// Declared parameter list of an injectable callable.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{Arguments, Environment, Parameter, Recipe, Signature};
///
/// #[derive(Default)]
/// struct Clock;
///
/// let env = Environment::new();
/// env.register(Recipe::default_of::<Clock>()).unwrap();
///
/// // fn handler(path, clock: Clock, retries = 3)
/// let sig = Signature::new()
///     .param(Parameter::new("path"))
///     .param(Parameter::new("clock").typed::<Clock>())
///     .param(Parameter::new("retries").default_value(3u32));
///
/// let bound = env.resolve(&sig, Arguments::new().arg("/index")).unwrap();
/// assert_eq!(bound.positional_len(), 3);
/// assert_eq!(*bound.positional::<&str>(0).unwrap(), "/index");
/// assert!(bound.args()[1].is::<Clock>());
/// assert_eq!(*bound.positional::<u32>(2).unwrap(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Signature {
    receiver: Option<String>,
    params: Vec<Parameter>,
    var_positional: bool,
    var_keyword: bool,
}

impl Signature {
    /// Empty signature: no receiver, no parameters, no variadics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a receiver, passed through untouched as the first positional.
    pub fn receiver(mut self, name: impl Into<String>) -> Self {
        self.receiver = Some(name.into());
        self
    }

    /// Appends a parameter.
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Accept extra positional arguments.
    pub fn var_positional(mut self) -> Self {
        self.var_positional = true;
        self
    }

    /// Accept extra keyword arguments.
    pub fn var_keyword(mut self) -> Self {
        self.var_keyword = true;
        self
    }

    /// Declared parameters in order, receiver excluded.
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Name of the receiver parameter, if declared.
    pub fn receiver_name(&self) -> Option<&str> {
        self.receiver.as_deref()
    }
}

/// A callable body paired with its declared signature.
///
/// Calling it is the explicit two-step: [`Injector::resolve`] the arguments,
/// then run the body with the bound result.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{Arguments, Environment, InjectedFn, Parameter, Recipe, Signature};
///
/// struct Greeting(&'static str);
///
/// let env = Environment::new();
/// env.register(Recipe::of::<Greeting>().factory(|_| Greeting("hello"))).unwrap();
///
/// let greet = InjectedFn::new(
///     Signature::new()
///         .param(Parameter::new("greeting").typed::<Greeting>())
///         .param(Parameter::new("name")),
///     |args| {
///         let greeting = args.positional::<Greeting>(0)?;
///         let name = args.positional::<&str>(1)?;
///         Ok::<_, ferrous_inject::InjectError>(format!("{} {}", greeting.0, name))
///     },
/// );
///
/// let out = env.call(&greet, Arguments::new().arg("world")).unwrap().unwrap();
/// assert_eq!(out, "hello world");
/// ```
pub struct InjectedFn<R> {
    signature: Signature,
    body: Arc<dyn Fn(Arguments) -> R + Send + Sync>,
}

impl<R> InjectedFn<R> {
    /// Pairs `signature` with the body that receives the bound arguments.
    pub fn new<F>(signature: Signature, body: F) -> Self
    where
        F: Fn(Arguments) -> R + Send + Sync + 'static,
    {
        Self {
            signature,
            body: Arc::new(body),
        }
    }

    /// The declared signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Runs the body with already bound arguments.
    pub fn invoke(&self, bound: Arguments) -> R {
        (self.body)(bound)
    }
}

impl<R> Clone for InjectedFn<R> {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature.clone(),
            body: self.body.clone(),
        }
    }
}

impl<R> fmt::Debug for InjectedFn<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedFn")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Binds call-site arguments and type members through a [`ScopeCache`].
#[derive(Clone)]
pub struct Injector {
    cache: ScopeCache,
    members: Arc<RwLock<HashMap<TypeId, Arc<MemberTable>>>>,
}

impl Injector {
    /// Injector resolving through `cache`.
    pub fn new(cache: ScopeCache) -> Self {
        Self {
            cache,
            members: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cache injected values come from.
    pub fn cache(&self) -> &ScopeCache {
        &self.cache
    }

    /// Produces the final arguments for a call to `signature`.
    ///
    /// For each declared parameter, in order: an explicit keyword argument
    /// wins; else a registered type annotation is injected; else the next
    /// unconsumed positional is taken; else the default is used; else the
    /// call fails with [`InjectError::MissingArgument`]. An explicit keyword
    /// beats injection but a positional never does.
    ///
    /// Parameters that accept positionals are bound into the positional
    /// output, keyword-only ones into the keyword output. Leftovers are
    /// passed through to declared variadic slots or rejected.
    pub fn resolve(&self, signature: &Signature, args: Arguments) -> InjectResult<Arguments> {
        let (args, mut kwargs) = args.into_parts();
        let mut positional = args.into_iter();
        let mut bound_args = Vec::with_capacity(signature.params.len() + 1);
        let mut bound_kwargs = BTreeMap::new();

        if let Some(receiver) = &signature.receiver {
            let value = positional
                .next()
                .ok_or_else(|| InjectError::MissingArgument(receiver.clone()))?;
            bound_args.push(value);
        }

        let registry = self.cache.registry();
        for param in &signature.params {
            let explicit = if param.kind.accepts_keyword() {
                kwargs.remove(&param.name)
            } else {
                None
            };

            let value = match explicit {
                Some(value) => value,
                None => match &param.annotation {
                    Some(annotation) if registry.is_registered(annotation) => {
                        trace!(param = %param.name, identifier = %annotation, "injecting parameter");
                        self.cache.get(annotation)?
                    }
                    _ => {
                        let next = if param.kind.accepts_positional() {
                            positional.next()
                        } else {
                            None
                        };
                        match next.or_else(|| param.default.clone()) {
                            Some(value) => value,
                            None => return Err(InjectError::MissingArgument(param.name.clone())),
                        }
                    }
                },
            };

            if param.kind.accepts_positional() {
                bound_args.push(value);
            } else {
                bound_kwargs.insert(param.name.clone(), value);
            }
        }

        let leftover: Vec<Value> = positional.collect();
        if !leftover.is_empty() {
            if !signature.var_positional {
                return Err(InjectError::ExtraPositionalArguments(leftover.len()));
            }
            bound_args.extend(leftover);
        }

        if !kwargs.is_empty() {
            if !signature.var_keyword {
                return Err(InjectError::ExtraKeywordArguments(kwargs.into_keys().collect()));
            }
            bound_kwargs.extend(kwargs);
        }

        Ok(Arguments::from_parts(bound_args, bound_kwargs))
    }

    /// Resolves the arguments of `f` and runs it.
    pub fn call<R>(&self, f: &InjectedFn<R>, args: Arguments) -> InjectResult<R> {
        let bound = self.resolve(&f.signature, args)?;
        Ok(f.invoke(bound))
    }

    /// Fills every unset member of `target` whose declared type is
    /// registered. Returns the number of members filled.
    pub fn bind_members<T: InjectMembers>(&self, target: &mut T) -> InjectResult<usize> {
        let table = self.member_table::<T>();
        let registry = self.cache.registry();
        let mut filled = 0;

        for (name, identifier) in table.iter() {
            if !registry.is_registered(identifier) {
                continue;
            }
            let Some(slot) = target.member_slot(name) else {
                continue;
            };
            if slot.is_set() {
                continue;
            }
            slot.fill(self.cache.get(identifier)?)?;
            filled += 1;
        }

        trace!(ty = std::any::type_name::<T>(), filled, "bound members");
        Ok(filled)
    }

    /// Binds the members of `seed`, then runs the constructor `body` on it.
    pub fn construct<T, F>(&self, mut seed: T, body: F) -> InjectResult<T>
    where
        T: InjectMembers,
        F: FnOnce(&mut T),
    {
        self.bind_members(&mut seed)?;
        body(&mut seed);
        Ok(seed)
    }

    /// Declared members of `T`, computed on first use and cached.
    pub fn member_table<T: InjectMembers>(&self) -> Arc<MemberTable> {
        let type_id = TypeId::of::<T>();
        if let Some(table) = self.members.read().get(&type_id) {
            return table.clone();
        }

        let mut table = MemberTable::new();
        T::declare_members(&mut table);
        self.members
            .write()
            .entry(type_id)
            .or_insert_with(|| Arc::new(table))
            .clone()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("cache", &self.cache)
            .field("member_tables", &self.members.read().len())
            .finish()
    }
}
