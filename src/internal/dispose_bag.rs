//! Internal disposal bag for running cleanup hooks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::cache::DisposeFailure;
use crate::error::BoxError;
use crate::key::Identifier;
use crate::traits::Dispose;
use crate::value::Value;

/// Container for cleanup hooks with LIFO execution order.
///
/// Hooks are pushed in build order and run newest first, so an instance is
/// always cleaned up before the dependencies it was built from.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<(Identifier, Arc<dyn Dispose>)>,
}

impl DisposeBag {
    /// Queues the hook of `value`, if it carries one.
    pub(crate) fn push(&mut self, identifier: Identifier, value: &Value) {
        if let Some(disposer) = value.disposer() {
            self.hooks.push((identifier, disposer.clone()));
        }
    }

    /// Number of queued hooks.
    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Runs every hook in reverse order.
    ///
    /// A failing or panicking hook never stops the remaining ones; each
    /// failure is logged and returned.
    pub(crate) fn run_all_reverse(&mut self) -> Vec<DisposeFailure> {
        let mut failures = Vec::new();
        while let Some((identifier, hook)) = self.hooks.pop() {
            trace!(identifier = %identifier, "running cleanup hook");
            let outcome = catch_unwind(AssertUnwindSafe(|| hook.dispose()));
            let error: BoxError = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(payload) => panic_message(payload.as_ref()).into(),
            };
            warn!(identifier = %identifier, error = %error, "cleanup hook failed");
            failures.push(DisposeFailure { identifier, error });
        }
        failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("cleanup hook panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("cleanup hook panicked: {msg}")
    } else {
        "cleanup hook panicked".to_string()
    }
}
