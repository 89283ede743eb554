//! URL-pattern router.
//!
//! Patterns are matched by a radix tree (`matchit`): O(path-length) lookup,
//! `{name}` segments captured as path parameters. Each pattern is bound to one
//! [`Resource`], which dispatches by method. Build the router once at startup,
//! then share it read-only across requests.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use matchit::Router as MatchitRouter;
use tracing::{Instrument, debug, field, info_span};

use crate::context::Context;
use crate::error::Error;
use crate::handler::{self, BoxedHandler, Handler};
use crate::middleware::{Middleware, MiddlewareConfig};
use crate::request::Request;
use crate::resource::{self, HandlerMap, Resource};
use crate::response::Response;
use crate::services::Services;
use crate::spec::ResourceSpec;

/// The application router.
///
/// ```rust,no_run
/// use arbor::middleware::{logging::LoggingMiddleware, recover::RecoverMiddleware, with_middleware_for};
/// use arbor::{EmptySpec, Method, Router};
///
/// let mut router = Router::new();
/// router.add_middleware(LoggingMiddleware::new());
/// router.register("/users/{id}", EmptySpec, [with_middleware_for(RecoverMiddleware::new(), &[Method::Post])])?;
/// # Ok::<(), arbor::Error>(())
/// ```
pub struct Router {
    services: Services,
    middleware: Vec<Arc<dyn Middleware>>,
    routes: MatchitRouter<Arc<Resource>>,
    patterns: HashSet<String>,
    not_found: BoxedHandler,
    base_ctx: Context,
}

impl Router {
    pub fn new() -> Self {
        Self {
            services: Services::new(),
            middleware: Vec::new(),
            routes: MatchitRouter::new(),
            patterns: HashSet::new(),
            not_found: handler::not_found.into_boxed_handler(),
            base_ctx: Context::new().with_boxed_not_implemented(handler::not_implemented.into_boxed_handler()),
        }
    }

    /// Services injected into every resource registered afterwards.
    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    /// Handler invoked when no pattern matches the request path.
    pub fn not_found_handler(mut self, handler: impl Handler) -> Self {
        self.not_found = handler.into_boxed_handler();
        self
    }

    /// Handler invoked when a resource does not implement the request method.
    /// It travels in the request context, see
    /// [`not_implemented_handler`](crate::not_implemented_handler).
    pub fn not_implemented_handler(mut self, handler: impl Handler) -> Self {
        self.base_ctx = self.base_ctx.with_not_implemented_handler(handler);
        self
    }

    /// Appends `middleware` to the global stack.
    ///
    /// Only resources registered after this call are decorated with it.
    pub fn add_middleware(&mut self, middleware: impl Middleware + 'static) {
        self.middleware.push(Arc::new(middleware));
    }

    /// Binds `spec`, decorated with `configs` and the global middleware, to
    /// `pattern`.
    ///
    /// A failed registration installs nothing: the pattern stays free and the
    /// router keeps serving the resources it already has.
    pub fn register<S, I>(&mut self, pattern: &str, mut spec: S, configs: I) -> Result<(), Error>
    where
        S: ResourceSpec,
        I: IntoIterator<Item = MiddlewareConfig>,
    {
        if self.patterns.contains(pattern) {
            return Err(Error::DuplicatePattern(pattern.to_owned()));
        }

        spec.inject(&self.services).map_err(Error::Inject)?;

        let configs: Vec<_> = configs.into_iter().collect();
        let handlers = resource::compose(HandlerMap::from_spec(Arc::new(spec)), &configs, &self.middleware)
            .map_err(Error::Middleware)?;

        self.routes
            .insert(pattern, Arc::new(Resource::new(handlers)))
            .map_err(|source| Error::InvalidPattern { pattern: pattern.to_owned(), source })?;
        self.patterns.insert(pattern.to_owned());

        debug!(pattern, route_middleware = configs.len(), global_middleware = self.middleware.len(), "resource registered");
        Ok(())
    }

    /// Like [`register`](Self::register), for startup code that cannot
    /// continue without the route.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub fn must_register<S, I>(&mut self, pattern: &str, spec: S, configs: I)
    where
        S: ResourceSpec,
        I: IntoIterator<Item = MiddlewareConfig>,
    {
        if let Err(e) = self.register(pattern, spec, configs) {
            panic!("{e}");
        }
    }

    /// Whether a resource is registered to exactly `pattern`.
    pub fn has_route(&self, pattern: &str) -> bool {
        self.patterns.contains(pattern)
    }

    /// Routes one request and produces one response.
    ///
    /// Each request gets a fresh context derived from the router's and its own
    /// span, which handlers receive as their logger.
    pub async fn serve(&self, mut req: Request) -> Response {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.path(),
            request_id = field::Empty,
        );
        let ctx = self.base_ctx.clone();

        let matched = self.routes.at(req.path()).ok().map(|m| {
            let params = m.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect::<HashMap<_, _>>();
            (Arc::clone(m.value), params)
        });

        let response = match matched {
            Some((resource, params)) => {
                req.set_params(params);
                resource.handle(ctx, req, span.clone())
            }
            None => self.not_found.call(ctx, req, span.clone()),
        };

        response.instrument(span).await
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut patterns: Vec<_> = self.patterns.iter().collect();
        patterns.sort();
        f.debug_struct("Router")
            .field("patterns", &patterns)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}
