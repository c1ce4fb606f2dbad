//! Logical-task identity provider.
//!
//! A [`TaskContext`] is an explicit, passable scope handle: it carries the
//! injection token that names its cache bucket plus any context-local values.
//! Code runs "inside" a context either synchronously with
//! [`TaskContext::run`] or asynchronously with [`TaskContext::scope`], which
//! wraps a future so that every poll sees the context, whichever thread polls
//! it. Outside any entered context, each thread has a root context of its own.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tracing::{trace, warn};
use uuid::Uuid;

use super::{CacheLink, IdentityProvider, LinkSlot};
use crate::error::InjectResult;
use crate::value::Value;

/// Provider name of [`TaskProvider`].
pub const TASK_PROVIDER: &str = "task";

thread_local! {
    static ENTERED: RefCell<Vec<TaskContext>> = const { RefCell::new(Vec::new()) };
    static ROOT: TaskContext = TaskContext::new();
}

fn fresh_token() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Default)]
struct ContextState {
    token: Option<String>,
    locals: HashMap<&'static str, Value>,
}

/// Scope handle for logical tasks.
///
/// Cloning a `TaskContext` yields another handle to the same context. Use
/// [`TaskContext::copy`] for an independent copy.
///
/// # Examples
///
/// ```
/// use ferrous_inject::TaskContext;
///
/// let ctx = TaskContext::new();
/// let token = ctx.run(|| TaskContext::current().token());
/// assert_eq!(token, ctx.token());
/// assert_ne!(TaskContext::current().token(), token);
/// ```
#[derive(Clone, Default)]
pub struct TaskContext {
    state: Arc<Mutex<ContextState>>,
}

impl TaskContext {
    /// Empty context, with no token yet and no locals.
    pub fn new() -> Self {
        Self::default()
    }

    /// The innermost entered context, or the calling thread's root context.
    pub fn current() -> Self {
        ENTERED
            .try_with(|stack| stack.borrow().last().cloned())
            .ok()
            .flatten()
            .or_else(|| ROOT.try_with(Clone::clone).ok())
            .unwrap_or_default()
    }

    /// Independent copy holding the same token and the same local values.
    ///
    /// The copy resolves into the same bucket as `self` until it is
    /// freshened.
    pub fn copy(&self) -> Self {
        let state = self.state.lock();
        Self {
            state: Arc::new(Mutex::new(ContextState {
                token: state.token.clone(),
                locals: state.locals.clone(),
            })),
        }
    }

    /// Injection token of this context, generated on first use.
    pub fn token(&self) -> String {
        self.state
            .lock()
            .token
            .get_or_insert_with(fresh_token)
            .clone()
    }

    /// Whether a token has been generated yet.
    pub fn has_token(&self) -> bool {
        self.state.lock().token.is_some()
    }

    /// Replaces the token with a fresh one, so the context resolves into a new
    /// bucket from now on. Returns the new token.
    pub fn freshen(&self) -> String {
        let token = fresh_token();
        self.state.lock().token = Some(token.clone());
        token
    }

    pub(crate) fn replace_token(&self, token: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.state.lock().token, token)
    }

    pub(crate) fn take_token(&self) -> Option<String> {
        self.state.lock().token.take()
    }

    /// Context-local value `name`.
    pub fn local(&self, name: &str) -> Option<Value> {
        self.state.lock().locals.get(name).cloned()
    }

    /// Sets the context-local value `name`.
    pub fn set_local(&self, name: &'static str, value: Value) {
        self.state.lock().locals.insert(name, value);
    }

    /// Whether both handles point at the same context.
    pub fn ptr_eq(&self, other: &TaskContext) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Runs `f` with this context as the current one.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _entered = Entered::push(self.clone());
        f()
    }

    /// Wraps `fut` so that it runs with this context as the current one.
    pub fn scope<F: Future>(&self, fut: F) -> Scoped<F> {
        Scoped {
            ctx: self.clone(),
            fut: Box::pin(fut),
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskContext")
            .field("token", &state.token)
            .field("locals", &state.locals.len())
            .finish()
    }
}

/// Pops the entered context on drop, including during unwinding.
struct Entered;

impl Entered {
    fn push(ctx: TaskContext) -> Self {
        let _ = ENTERED.try_with(|stack| stack.borrow_mut().push(ctx));
        Entered
    }
}

impl Drop for Entered {
    fn drop(&mut self) {
        let _ = ENTERED.try_with(|stack| stack.borrow_mut().pop());
    }
}

/// Future running inside a [`TaskContext`]. Created by [`TaskContext::scope`].
pub struct Scoped<F> {
    ctx: TaskContext,
    fut: Pin<Box<F>>,
}

impl<F> Scoped<F> {
    /// The context the future runs in.
    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _entered = Entered::push(this.ctx.clone());
        this.fut.as_mut().poll(cx)
    }
}

impl<F> fmt::Debug for Scoped<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped").field("ctx", &self.ctx).finish()
    }
}

/// Typed accessor for a context-local value.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{ContextLocal, TaskContext};
///
/// static REQUEST_ID: ContextLocal<u64> = ContextLocal::new("request_id");
///
/// let ctx = TaskContext::new();
/// ctx.run(|| REQUEST_ID.set(42));
/// assert_eq!(ctx.run(|| REQUEST_ID.get()).as_deref(), Some(&42));
/// assert!(TaskContext::new().run(|| REQUEST_ID.get()).is_none());
/// ```
pub struct ContextLocal<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ContextLocal<T> {
    /// Declares a context-local slot; use it in a `static`.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Value in the current context.
    pub fn get(&self) -> Option<Arc<T>> {
        TaskContext::current()
            .local(self.name)
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Sets the value in the current context.
    pub fn set(&self, value: T) {
        TaskContext::current().set_local(self.name, Value::new(value));
    }

    /// Name the slot was declared with.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for ContextLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextLocal").field("name", &self.name).finish()
    }
}

/// How [`TaskProvider::enter`] derives the child context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryMode {
    /// Copy of the ambient context's locals with a fresh token
    #[default]
    Copy,
    /// Brand new context: no locals, fresh token
    Empty,
    /// The ambient context itself, with a fresh token swapped in until exit
    Same,
}

/// Scopes instances to logical tasks.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{EntryMode, Environment, Recipe};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Transaction;
///
/// let env = Environment::new();
/// env.register(Recipe::default_of::<Transaction>()).unwrap();
/// let tasks = env.task_scopes().unwrap();
///
/// let outer = env.get::<Transaction>().unwrap();
/// let scope = tasks.enter(EntryMode::Copy);
/// let inner = scope.run(|| env.get::<Transaction>().unwrap());
/// assert!(!Arc::ptr_eq(&outer, &inner));
/// scope.exit().unwrap();
///
/// assert!(Arc::ptr_eq(&outer, &env.get::<Transaction>().unwrap()));
/// ```
#[derive(Debug, Default)]
pub struct TaskProvider {
    link: LinkSlot,
}

impl TaskProvider {
    /// Provider named `"task"`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a nested task scope derived from the current context.
    ///
    /// For [`EntryMode::Copy`] and [`EntryMode::Empty`] the new context is
    /// only current inside [`TaskScope::run`] and [`TaskScope::scope`]. For
    /// [`EntryMode::Same`] the ambient context is reused, so the change is
    /// visible immediately.
    pub fn enter(&self, mode: EntryMode) -> TaskScope {
        let ambient = TaskContext::current();
        let (ctx, previous) = match mode {
            EntryMode::Copy => {
                let ctx = ambient.copy();
                ctx.freshen();
                (ctx, None)
            }
            EntryMode::Empty => {
                let ctx = TaskContext::new();
                ctx.freshen();
                (ctx, None)
            }
            EntryMode::Same => {
                let previous = ambient.replace_token(Some(fresh_token()));
                (ambient, Some(previous))
            }
        };
        trace!(?mode, token = %ctx.token(), "entered task scope");

        TaskScope {
            ctx,
            previous,
            link: self.link.get(),
            keep: false,
            done: false,
        }
    }

    /// Runs `f` inside a fresh task scope, destroying it afterwards.
    pub fn within<R>(&self, mode: EntryMode, f: impl FnOnce() -> R) -> R {
        let scope = self.enter(mode);
        let out = scope.run(f);
        if let Err(err) = scope.exit() {
            warn!(error = %err, "cleanup failed on task scope exit");
        }
        out
    }

    /// Async variant of [`TaskProvider::within`].
    pub fn within_async<F: Future>(&self, mode: EntryMode, fut: F) -> impl Future<Output = F::Output> {
        let scope = self.enter(mode);
        async move {
            let out = scope.scope(fut).await;
            if let Err(err) = scope.exit() {
                warn!(error = %err, "cleanup failed on task scope exit");
            }
            out
        }
    }

    /// Destroys the bucket of `ctx` and clears its token, so the next
    /// resolution inside it starts from a new bucket.
    pub fn destroy_self(&self, ctx: &TaskContext) -> InjectResult<usize> {
        match ctx.take_token() {
            Some(token) => self.link.destroy(TASK_PROVIDER, &token),
            None => Ok(0),
        }
    }

    /// Detaches `ctx` from the bucket it currently shares (for example with
    /// the context it was copied from). Returns the new token.
    pub fn freshen(&self, ctx: &TaskContext) -> String {
        ctx.freshen()
    }
}

impl IdentityProvider for TaskProvider {
    fn name(&self) -> &str {
        TASK_PROVIDER
    }

    fn scope_id(&self) -> String {
        TaskContext::current().token()
    }

    fn attach(&self, link: CacheLink) {
        self.link.set(link);
    }
}

/// A nested task scope. Leaving it destroys its bucket.
///
/// Leave explicitly with [`TaskScope::exit`] to observe cleanup failures;
/// dropping the scope leaves it too and logs them instead.
#[must_use = "dropping a TaskScope immediately destroys its bucket"]
pub struct TaskScope {
    ctx: TaskContext,
    // Only set in Same mode: the ambient token to restore on exit
    previous: Option<Option<String>>,
    link: Option<CacheLink>,
    keep: bool,
    done: bool,
}

impl TaskScope {
    /// The scope's context.
    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Runs `f` inside the scope.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        self.ctx.run(f)
    }

    /// Wraps `fut` to run inside the scope.
    pub fn scope<F: Future>(&self, fut: F) -> Scoped<F> {
        self.ctx.scope(fut)
    }

    /// Keep the scope's bucket alive after exit.
    pub fn keep(&mut self) {
        self.keep = true;
    }

    /// Leaves the scope, destroying its bucket unless [`TaskScope::keep`] was
    /// called.
    pub fn exit(mut self) -> InjectResult<()> {
        self.finish()
    }

    fn finish(&mut self) -> InjectResult<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;

        let token = match self.previous.take() {
            Some(previous) => self.ctx.replace_token(previous),
            None if self.keep => None,
            None => self.ctx.take_token(),
        };

        match (token, &self.link) {
            (Some(token), Some(link)) if !self.keep => {
                trace!(token = %token, "leaving task scope");
                link.destroy_scope(TASK_PROVIDER, &token).map(|_| ())
            }
            _ => Ok(()),
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!(error = %err, "cleanup failed on task scope exit");
        }
    }
}

impl fmt::Debug for TaskScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScope")
            .field("ctx", &self.ctx)
            .field("keep", &self.keep)
            .finish()
    }
}
