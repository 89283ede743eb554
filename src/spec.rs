//! Per-method resource behavior.

use async_trait::async_trait;
use tracing::Span;

use crate::context::{self, Context};
use crate::error::BoxError;
use crate::request::Request;
use crate::response::Response;
use crate::services::Services;

/// The handlers, one per method, a resource responds with.
///
/// Every method defaults to the router's not-implemented handler, so a
/// resource overrides only the verbs it supports:
///
/// ```rust
/// use arbor::{async_trait, Context, Request, Response, ResourceSpec};
/// use tracing::Span;
///
/// struct Health;
///
/// #[async_trait]
/// impl ResourceSpec for Health {
///     async fn get(&self, _ctx: Context, _req: Request, _span: Span) -> Response {
///         Response::text("ok")
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceSpec: Send + Sync + 'static {
    /// Pulls the services this resource depends on. Runs once, before the
    /// resource is composed; an error aborts registration.
    fn inject(&mut self, _services: &Services) -> Result<(), BoxError> {
        Ok(())
    }

    async fn get(&self, ctx: Context, req: Request, span: Span) -> Response {
        unimplemented_method(ctx, req, span).await
    }

    async fn options(&self, ctx: Context, req: Request, span: Span) -> Response {
        unimplemented_method(ctx, req, span).await
    }

    async fn post(&self, ctx: Context, req: Request, span: Span) -> Response {
        unimplemented_method(ctx, req, span).await
    }

    async fn put(&self, ctx: Context, req: Request, span: Span) -> Response {
        unimplemented_method(ctx, req, span).await
    }

    async fn patch(&self, ctx: Context, req: Request, span: Span) -> Response {
        unimplemented_method(ctx, req, span).await
    }

    async fn delete(&self, ctx: Context, req: Request, span: Span) -> Response {
        unimplemented_method(ctx, req, span).await
    }
}

async fn unimplemented_method(ctx: Context, req: Request, span: Span) -> Response {
    context::not_implemented_handler(&ctx).call(ctx, req, span).await
}

/// A resource that implements no method.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySpec;

impl ResourceSpec for EmptySpec {}
