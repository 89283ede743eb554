//! Method tables and their composition with middleware.

use std::array;
use std::fmt;
use std::sync::Arc;

use tracing::Span;

use crate::context::{self, Context};
use crate::error::BoxError;
use crate::handler::{self, BoxFuture, BoxedHandler, handler_fn};
use crate::method::Method;
use crate::middleware::{Middleware, MiddlewareConfig};
use crate::request::Request;
use crate::spec::ResourceSpec;

/// One handler per [`Method`]. Every slot is always filled; a slot nobody set
/// defers to the request context's not-implemented handler.
#[derive(Clone)]
pub struct HandlerMap {
    slots: [BoxedHandler; 6],
}

impl HandlerMap {
    pub fn new() -> Self {
        Self { slots: array::from_fn(|_| handler::context_not_implemented()) }
    }

    /// A table whose slots call the matching method of `spec`.
    pub fn from_spec<S: ResourceSpec + ?Sized>(spec: Arc<S>) -> Self {
        Self { slots: Method::ALL.map(|method| spec_handler(&spec, method)) }
    }

    pub fn get(&self, method: Method) -> &BoxedHandler {
        &self.slots[method.index()]
    }

    pub fn set(&mut self, method: Method, handler: BoxedHandler) {
        self.slots[method.index()] = handler;
    }

    /// Replaces the handler of each of `methods` with `middleware`'s
    /// conversion of it.
    pub(crate) fn apply(&mut self, middleware: &dyn Middleware, methods: &[Method]) -> Result<(), BoxError> {
        for &method in methods {
            let wrapped = middleware.convert(Arc::clone(self.get(method)))?;
            self.set(method, wrapped);
        }
        Ok(())
    }
}

impl Default for HandlerMap {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMap").finish_non_exhaustive()
    }
}

fn spec_handler<S: ResourceSpec + ?Sized>(spec: &Arc<S>, method: Method) -> BoxedHandler {
    let spec = Arc::clone(spec);
    handler_fn(move |ctx: Context, req: Request, span: Span| {
        let spec = Arc::clone(&spec);
        async move {
            match method {
                Method::Get     => spec.get(ctx, req, span).await,
                Method::Options => spec.options(ctx, req, span).await,
                Method::Post    => spec.post(ctx, req, span).await,
                Method::Put     => spec.put(ctx, req, span).await,
                Method::Patch   => spec.patch(ctx, req, span).await,
                Method::Delete  => spec.delete(ctx, req, span).await,
            }
        }
    })
}

/// Decorates `handlers` with route-level and then global middleware.
///
/// Wrapping makes the last middleware applied the outermost layer, so both
/// lists are applied back to front. The resulting chain runs `global` in order,
/// then `route` in order, then the bare handler. A route config restricted to
/// some methods leaves the other methods' chains without that layer.
pub fn compose(
    mut handlers: HandlerMap,
    route: &[MiddlewareConfig],
    global: &[Arc<dyn Middleware>],
) -> Result<HandlerMap, BoxError> {
    for config in route.iter().rev() {
        config.apply(&mut handlers)?;
    }
    for middleware in global.iter().rev() {
        handlers.apply(middleware.as_ref(), &Method::ALL)?;
    }
    Ok(handlers)
}

/// A composed method table bound to a URL pattern.
///
/// Immutable once built: concurrent requests share it through an `Arc`.
#[derive(Clone, Debug)]
pub struct Resource {
    handlers: HandlerMap,
}

impl Resource {
    pub fn new(handlers: HandlerMap) -> Self {
        Self { handlers }
    }

    /// Dispatches on the request method. A verb outside [`Method`] goes to the
    /// context's not-implemented handler.
    pub fn handle(&self, ctx: Context, req: Request, span: Span) -> BoxFuture {
        match req.method().parse::<Method>() {
            Ok(method) => self.handlers.get(method).call(ctx, req, span),
            Err(_) => context::not_implemented_handler(&ctx).call(ctx, req, span),
        }
    }
}
