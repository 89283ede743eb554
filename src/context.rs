//! Request-scoped context.
//!
//! A [`Context`] is an immutable bag of values keyed by type. Deriving a new
//! context with [`Context::with`] leaves the original untouched, so a value a
//! middleware adds is visible only to the handlers it wraps.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::{self, BoxedHandler, Handler};

type Values = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Values visible to every handler and middleware on one request.
///
/// Cloning is one atomic increment. The router clones its base context once
/// per request, so nothing a request adds leaks into another.
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<Values>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a derived context that also carries `value`, replacing any
    /// previous value of the same type.
    pub fn with<T: Any + Send + Sync>(&self, value: T) -> Self {
        let mut values = Values::clone(&self.values);
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self { values: Arc::new(values) }
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns a derived context whose not-implemented handler is `handler`.
    pub fn with_not_implemented_handler(&self, handler: impl Handler) -> Self {
        self.with(NotImplemented(handler.into_boxed_handler()))
    }

    pub(crate) fn with_boxed_not_implemented(&self, handler: BoxedHandler) -> Self {
        self.with(NotImplemented(handler))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("values", &self.values.len()).finish()
    }
}

struct NotImplemented(BoxedHandler);

/// Returns the not-implemented handler bound to `ctx`, or the default
/// `405 Method Not Allowed` handler when none is set.
pub fn not_implemented_handler(ctx: &Context) -> BoxedHandler {
    match ctx.get::<NotImplemented>() {
        Some(NotImplemented(handler)) => Arc::clone(handler),
        None => handler::not_implemented.into_boxed_handler(),
    }
}
