use std::cell::RefCell;
use std::fmt;
use std::panic;

use crate::context::Context;
use crate::key::Key;

thread_local! {
    static CURRENT_CONTEXT: RefCell<Context> = RefCell::new(Context::empty());
}

/// An execution context is the context of the current logical flow of execution.
///
/// Every thread has a current [`Context`] which starts out empty.  An
/// execution context can be captured from it, sent to another thread or
/// stored alongside a pending computation and then be used to run code with
/// the captured elements visible again.
///
/// Nothing is ever mutated: running code in an execution context only swaps
/// which immutable context is current on this thread and restores the old
/// one afterwards.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    context: Context,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("context", &self.context)
            .finish()
    }
}

impl From<Context> for ExecutionContext {
    fn from(context: Context) -> ExecutionContext {
        ExecutionContext { context }
    }
}

impl ExecutionContext {
    /// Captures the current execution context and returns it.
    pub fn capture() -> ExecutionContext {
        ExecutionContext {
            context: ExecutionContext::current(),
        }
    }

    /// Returns the context that is current on this thread.
    pub fn current() -> Context {
        CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Looks up an element in the current context and clones it.
    pub fn get<E: Clone + 'static>(key: &Key<E>) -> Option<E> {
        CURRENT_CONTEXT.with(|ctx| ctx.borrow().get(key).cloned())
    }

    /// Returns the captured context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns a new execution context with the given elements merged in.
    pub fn plus<C: Into<Context>>(&self, other: C) -> ExecutionContext {
        ExecutionContext {
            context: self.context.plus(other),
        }
    }

    /// Runs a function with additional elements in the current flow.
    ///
    /// The elements are merged into the current context for the duration
    /// of the function.
    ///
    /// ## Example
    ///
    /// ```
    /// # #[macro_use] extern crate context_registry;
    /// # use context_registry::{Element, ExecutionContext, KeyRef};
    /// # context_key!(static REQUEST_ID: Key<RequestId>);
    /// # #[derive(Clone, Debug, PartialEq, Hash)] struct RequestId(u64);
    /// # impl Element for RequestId { fn key(&self) -> KeyRef { KeyRef::of(&REQUEST_ID) } }
    /// # fn main() {
    /// ExecutionContext::scope(RequestId(42), || {
    ///     assert_eq!(ExecutionContext::get(&REQUEST_ID), Some(RequestId(42)));
    /// });
    /// assert_eq!(ExecutionContext::get(&REQUEST_ID), None);
    /// # }
    /// ```
    pub fn scope<C, F, R>(elements: C, f: F) -> R
    where
        C: Into<Context>,
        F: FnOnce() -> R,
    {
        ExecutionContext::capture().plus(elements).run(f)
    }

    /// Runs a function in the context of the given execution context.
    ///
    /// The captured context is current for the duration of the function and
    /// the previous one is restored afterwards, also if the function panics.
    ///
    /// ## Example
    ///
    /// ```
    /// # use std::thread;
    /// # use context_registry::ExecutionContext;
    /// let ec = ExecutionContext::capture();
    /// thread::spawn(move || {
    ///     ec.run(|| {
    ///         // the captured execution context is carried into
    ///         // another thread.
    ///     });
    /// }).join().unwrap();
    /// ```
    pub fn run<F: FnOnce() -> R, R>(&self, f: F) -> R {
        // figure out where we want to switch to.  In case the current
        // context is the target context we can get away without having
        // to do any panic handling and swapping.
        if let Some(old_ctx) = CURRENT_CONTEXT.with(|ctx| {
            let mut cur = ctx.borrow_mut();
            if cur.ptr_eq(&self.context) {
                None
            } else {
                Some(std::mem::replace(&mut *cur, self.context.clone()))
            }

        // this is for the case where we just switched the context.  This
        // means we need to catch the panic, restore the old context and
        // resume the panic if needed.
        }) {
            tracing::trace!(elements = self.context.len(), "entering execution context");
            let rv = panic::catch_unwind(panic::AssertUnwindSafe(f));
            CURRENT_CONTEXT.with(|ctx| *ctx.borrow_mut() = old_ctx);
            tracing::trace!("left execution context");
            match rv {
                Err(err) => panic::resume_unwind(err),
                Ok(rv) => rv,
            }

        // simple case: same context.  We can just invoke the function
        } else {
            f()
        }
    }
}
