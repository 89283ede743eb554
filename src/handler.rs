//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! A resource holds one handler per [`Method`](crate::Method), and middleware
//! replaces those handlers with decorated ones at registration time. All of
//! them live behind the same trait object (`dyn ErasedHandler`) so a table slot
//! can hold a bare `async fn` or a ten-layer middleware chain alike.
//!
//! ```text
//! async fn show(ctx, req, span) -> Response { … }  ← user writes this
//!        ↓ handler_fn(show) / Handler::into_boxed_handler
//! Arc::new(FnHandler(show))                        ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! middleware.convert(handler)                      ← wraps, returns a new BoxedHandler
//!        ↓
//! handler.call(ctx, req, span) at request time     ← one vtable dispatch per layer
//! ```
//!
//! The `span` argument is the request logger: middleware may record fields on
//! it or emit events parented to it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use tracing::Span;

use crate::context::{self, Context};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` let tokio move the future across threads safely.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Uniform calling interface for every handler, bare or decorated.
///
/// Middleware authors call this on the handler they wrap; application code
/// normally writes plain `async fn`s and never implements it by hand.
pub trait ErasedHandler {
    fn call(&self, ctx: Context, req: Request, span: Span) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` with the signature:
///
/// ```text
/// async fn name(ctx: Context, req: Request, span: Span) -> impl IntoResponse
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it. For
/// closures, use [`handler_fn`], which gives the compiler the argument types.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Context, Request, Span) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context, Request, Span) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Boxes a closure (or function) as a [`BoxedHandler`].
///
/// ```rust
/// use arbor::{handler_fn, Response};
/// use http::StatusCode;
///
/// let teapot = handler_fn(|_ctx, _req, _span| async { Response::empty(StatusCode::IM_A_TEAPOT) });
/// ```
pub fn handler_fn<F, Fut, R>(f: F) -> BoxedHandler
where
    F: Fn(Context, Request, Span) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Context, Request, Span) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, ctx: Context, req: Request, span: Span) -> BoxFuture {
        let fut = (self.0)(ctx, req, span);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Default not-found handler: empty `404 Not Found`.
pub async fn not_found(_ctx: Context, _req: Request, _span: Span) -> Response {
    Response::empty(StatusCode::NOT_FOUND)
}

/// Default not-implemented handler: empty `405 Method Not Allowed`.
pub async fn not_implemented(_ctx: Context, _req: Request, _span: Span) -> Response {
    Response::empty(StatusCode::METHOD_NOT_ALLOWED)
}

/// Handler that defers to whatever not-implemented handler the request
/// context carries. Unimplemented table slots hold this.
pub(crate) fn context_not_implemented() -> BoxedHandler {
    handler_fn(|ctx: Context, req: Request, span: Span| {
        context::not_implemented_handler(&ctx).call(ctx, req, span)
    })
}
