//! Middleware layer.
//!
//! A [`Middleware`] converts one handler into another. Conversion happens once,
//! when a resource is registered, never per request; a conversion error aborts
//! the registration.
//!
//! Route-level middleware is attached with [`with_middleware`] (every method)
//! or [`with_middleware_for`] (a subset). Global middleware is added with
//! [`Router::add_middleware`](crate::Router::add_middleware). On a request the
//! layers run outermost first: global middleware in the order it was added,
//! then route middleware in the order it was passed to `register`.
//!
//! Built-in middleware:
//! - [`cache`]: serve GET responses from a tagged key/value cache
//! - [`logging`]: log every request and its outcome
//! - [`request_id`]: propagate or generate `X-Request-ID`
//! - [`recover`]: turn handler panics into `500` responses
//! - [`auth`]: gate handlers behind an [`auth::Authorizer`]

pub mod auth;
pub mod cache;
pub mod logging;
pub mod recover;
pub mod request_id;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;

use crate::error::BoxError;
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::resource::HandlerMap;
use crate::response::Response;

/// Transforms a handler into a decorated handler.
pub trait Middleware: Send + Sync {
    /// Wraps `handler`. May fail if the middleware was configured with invalid
    /// arguments; the failure is reported by `Router::register`.
    fn convert(&self, handler: BoxedHandler) -> Result<BoxedHandler, BoxError>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn convert(&self, handler: BoxedHandler) -> Result<BoxedHandler, BoxError> {
        (**self).convert(handler)
    }
}

/// Adapts a closure into a [`Middleware`].
///
/// ```rust
/// use arbor::middleware::middleware_fn;
/// use arbor::handler_fn;
///
/// let passthrough = middleware_fn(|inner| {
///     Ok(handler_fn(move |ctx, req, span| inner.call(ctx, req, span)))
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: Fn(BoxedHandler) -> Result<BoxedHandler, BoxError> + Send + Sync,
{
    MiddlewareFn(f)
}

/// Middleware backed by a closure. See [`middleware_fn`].
#[derive(Clone)]
pub struct MiddlewareFn<F>(F);

impl<F> Middleware for MiddlewareFn<F>
where
    F: Fn(BoxedHandler) -> Result<BoxedHandler, BoxError> + Send + Sync,
{
    fn convert(&self, handler: BoxedHandler) -> Result<BoxedHandler, BoxError> {
        (self.0)(handler)
    }
}

/// A route-level middleware together with the methods it decorates.
#[derive(Clone)]
pub struct MiddlewareConfig {
    middleware: Arc<dyn Middleware>,
    methods: Vec<Method>,
}

impl MiddlewareConfig {
    pub(crate) fn apply(&self, handlers: &mut HandlerMap) -> Result<(), BoxError> {
        handlers.apply(self.middleware.as_ref(), &self.methods)
    }
}

impl fmt::Debug for MiddlewareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareConfig").field("methods", &self.methods).finish_non_exhaustive()
    }
}

/// Decorates every method of the resource with `middleware`.
pub fn with_middleware(middleware: impl Middleware + 'static) -> MiddlewareConfig {
    with_middleware_for(middleware, &Method::ALL)
}

/// Decorates only `methods` with `middleware`.
pub fn with_middleware_for(middleware: impl Middleware + 'static, methods: &[Method]) -> MiddlewareConfig {
    MiddlewareConfig { middleware: Arc::new(middleware), methods: methods.to_vec() }
}

/// Builds the response returned in place of a handler's when a middleware
/// hits an error (cache backend down, request-id entropy exhausted, ...).
pub type ErrorFactory<E = BoxError> = Arc<dyn Fn(&E) -> Response + Send + Sync>;

/// Builds a fixed response (e.g. `403 Forbidden`).
pub type ResponseFactory = Arc<dyn Fn() -> Response + Send + Sync>;

/// Builds the response for a handler that panicked, given the panic payload.
pub type PanicErrorFactory = Arc<dyn Fn(&(dyn Any + Send)) -> Response + Send + Sync>;

pub(crate) fn default_error_factory<E: 'static>() -> ErrorFactory<E> {
    Arc::new(|_: &E| Response::empty(StatusCode::INTERNAL_SERVER_ERROR))
}
