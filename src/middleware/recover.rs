//! Panic recovery middleware.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::{Span, error};

use super::{Middleware, PanicErrorFactory};
use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{BoxedHandler, handler_fn};
use crate::request::Request;
use crate::response::Response;

/// Catches a panic raised while the wrapped handler runs, logs it, and
/// answers with the error factory's response (`500`, empty body, by default).
#[derive(Clone)]
pub struct RecoverMiddleware {
    error_factory: PanicErrorFactory,
}

impl RecoverMiddleware {
    pub fn new() -> Self {
        Self { error_factory: Arc::new(|_: &(dyn Any + Send)| Response::empty(StatusCode::INTERNAL_SERVER_ERROR)) }
    }

    pub fn error_factory(mut self, f: impl Fn(&(dyn Any + Send)) -> Response + Send + Sync + 'static) -> Self {
        self.error_factory = Arc::new(f);
        self
    }
}

impl Default for RecoverMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RecoverMiddleware {
    fn convert(&self, inner: BoxedHandler) -> Result<BoxedHandler, BoxError> {
        let factory = Arc::clone(&self.error_factory);
        Ok(handler_fn(move |ctx: Context, req: Request, span: Span| {
            let inner = Arc::clone(&inner);
            let factory = Arc::clone(&factory);
            async move {
                let handled = AssertUnwindSafe(async { inner.call(ctx, req, span.clone()).await });
                match handled.catch_unwind().await {
                    Ok(resp) => resp,
                    Err(payload) => {
                        error!(parent: &span, panic = panic_message(payload.as_ref()), "request handler panicked");
                        factory(payload.as_ref())
                    }
                }
            }
        }))
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic payload>"
    }
}
