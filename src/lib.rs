//! # arbor
//!
//! Resource-oriented HTTP routing for Rust services.
//!
//! A resource is a type implementing [`ResourceSpec`]: one async method per
//! HTTP verb, each defaulting to the router's not-implemented handler. The
//! [`Router`] binds resources to URL patterns and decorates their handlers
//! with middleware once, at registration time:
//!
//! - Radix-tree routing via [`matchit`]
//! - Route middleware per method, global middleware for everything
//!   registered after it, composed in a fixed and predictable order
//! - Response caching, request IDs, panic recovery, logging and auth
//!   middleware in [`middleware`]
//! - Graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use arbor::middleware::logging::LoggingMiddleware;
//! use arbor::{async_trait, Context, Request, ResourceSpec, Response, Router, Server};
//! use tracing::Span;
//!
//! struct User;
//!
//! #[async_trait]
//! impl ResourceSpec for User {
//!     async fn get(&self, _ctx: Context, req: Request, _span: Span) -> Response {
//!         let id = req.param("id").unwrap_or("unknown");
//!         Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), arbor::Error> {
//!     let mut router = Router::new();
//!     router.add_middleware(LoggingMiddleware::new());
//!     router.register("/users/{id}", User, [])?;
//!
//!     Server::new(([0, 0, 0, 0], 3000).into()).serve(router).await
//! }
//! ```

mod boot;
mod config;
mod context;
mod error;
mod handler;
mod method;
mod request;
mod resource;
mod response;
mod router;
mod server;
mod services;
mod spec;

#[cfg(test)]
mod test_support;

pub mod cache;
pub mod middleware;

pub use async_trait::async_trait;

pub use boot::{RouteInitializer, boot, build_router};
pub use config::{ConfigError, ServerConfig};
pub use context::{Context, not_implemented_handler};
pub use error::{BoxError, Error};
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, handler_fn};
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use resource::{HandlerMap, Resource, compose};
pub use response::{Body, BodyReader, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{Server, serve_listener, shutdown_signal};
pub use services::Services;
pub use spec::{EmptySpec, ResourceSpec};
