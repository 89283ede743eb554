//! Request ID propagation.
//!
//! Reuses the client's `X-Request-ID` when it sends a non-empty one and
//! generates a UUID v4 otherwise. The ID is stored in the [`Context`],
//! recorded on the request span and echoed back in the response header.

use std::sync::Arc;

use tracing::{Span, error};
use uuid::Uuid;

use super::{ErrorFactory, Middleware, default_error_factory};
use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{BoxedHandler, handler_fn};
use crate::request::Request;
use crate::response::Response;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// The current request's ID, as stored in the [`Context`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Returns the ID [`RequestIdMiddleware`] attached to `ctx`.
pub fn request_id(ctx: &Context) -> Option<&str> {
    ctx.get::<RequestId>().map(|id| id.0.as_str())
}

type Generator = Arc<dyn Fn() -> Result<String, BoxError> + Send + Sync>;

#[derive(Clone)]
pub struct RequestIdMiddleware {
    generator: Generator,
    error_factory: ErrorFactory,
}

impl RequestIdMiddleware {
    pub fn new() -> Self {
        Self {
            generator: Arc::new(|| Ok(Uuid::new_v4().to_string())),
            error_factory: default_error_factory(),
        }
    }

    /// Replaces the UUID v4 generator.
    pub fn generator(mut self, f: impl Fn() -> Result<String, BoxError> + Send + Sync + 'static) -> Self {
        self.generator = Arc::new(f);
        self
    }

    /// Response used when the generator fails. Defaults to an empty `500`.
    pub fn error_factory(mut self, f: impl Fn(&BoxError) -> Response + Send + Sync + 'static) -> Self {
        self.error_factory = Arc::new(f);
        self
    }
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RequestIdMiddleware {
    fn convert(&self, inner: BoxedHandler) -> Result<BoxedHandler, BoxError> {
        let generator = Arc::clone(&self.generator);
        let factory = Arc::clone(&self.error_factory);
        Ok(handler_fn(move |ctx: Context, req: Request, span: Span| {
            let inner = Arc::clone(&inner);
            let generator = Arc::clone(&generator);
            let factory = Arc::clone(&factory);
            async move {
                let id = match req.header(REQUEST_ID_HEADER).filter(|id| !id.is_empty()) {
                    Some(id) => id.to_owned(),
                    None => match generator() {
                        Ok(id) => id,
                        Err(err) => {
                            error!(parent: &span, error = %err, "failed to generate request id");
                            return factory(&err);
                        }
                    },
                };

                span.record("request_id", id.as_str());
                let mut resp = inner.call(ctx.with(RequestId(id.clone())), req, span).await;
                resp.set_header(REQUEST_ID_HEADER, &id);
                resp
            }
        }))
    }
}
