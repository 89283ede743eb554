//! Request logging middleware.

use std::sync::Arc;
use std::time::Instant;

use tracing::{Span, info};

use super::Middleware;
use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{BoxedHandler, handler_fn};
use crate::request::Request;

/// Logs each request before the wrapped handler runs, and its status and
/// latency after.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn convert(&self, inner: BoxedHandler) -> Result<BoxedHandler, BoxError> {
        Ok(handler_fn(move |ctx: Context, req: Request, span: Span| {
            let inner = Arc::clone(&inner);
            async move {
                let method = req.method().to_owned();
                let uri = req.uri();
                info!(
                    parent: &span,
                    %method,
                    %uri,
                    host = req.header("host"),
                    user_agent = req.header("user-agent"),
                    "handling http request",
                );

                let start = Instant::now();
                let resp = inner.call(ctx, req, span.clone()).await;

                info!(
                    parent: &span,
                    %method,
                    %uri,
                    status = resp.status_code().as_u16(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "handled http request",
                );
                resp
            }
        }))
    }
}
