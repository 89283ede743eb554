//! End-to-end dispatch through the router.
//!
//! Verifies middleware ordering, service injection and the fallbacks as a
//! client of the public API sees them.

use std::sync::Arc;

use arbor::middleware::recover::RecoverMiddleware;
use arbor::middleware::request_id::{REQUEST_ID_HEADER, RequestIdMiddleware};
use arbor::middleware::{Middleware, middleware_fn, with_middleware, with_middleware_for};
use arbor::{
    BoxError, BoxedHandler, Context, EmptySpec, Error, Method, Request, ResourceSpec, Response, Router,
    Services, async_trait, handler_fn,
};
use http::StatusCode;
use parking_lot::Mutex;
use tracing::Span;

type Trace = Arc<Mutex<Vec<&'static str>>>;

/// Middleware that records `name` each time the handler it wraps is entered.
fn tag(name: &'static str, trace: &Trace) -> impl Middleware + use<> {
    let trace = Arc::clone(trace);
    middleware_fn(move |inner: BoxedHandler| {
        let trace = Arc::clone(&trace);
        Ok(handler_fn(move |ctx, req, span| {
            trace.lock().push(name);
            inner.call(ctx, req, span)
        }))
    })
}

struct ReadWrite;

#[async_trait]
impl ResourceSpec for ReadWrite {
    async fn get(&self, _ctx: Context, _req: Request, _span: Span) -> Response {
        Response::text("read")
    }

    async fn post(&self, _ctx: Context, _req: Request, _span: Span) -> Response {
        Response::builder().status(StatusCode::CREATED).text("written")
    }
}

#[tokio::test]
async fn global_then_route_middleware_in_declaration_order() {
    let trace = Trace::default();
    let mut router = Router::new();
    router.add_middleware(tag("global-1", &trace));
    router.add_middleware(tag("global-2", &trace));
    router
        .register(
            "/items",
            ReadWrite,
            [
                with_middleware(tag("route-all", &trace)),
                with_middleware_for(tag("route-get", &trace), &[Method::Get]),
            ],
        )
        .unwrap();

    let resp = router.serve(Request::new("GET", "/items")).await;
    assert_eq!(resp.into_bytes().await.unwrap().as_ref(), b"read");
    assert_eq!(*trace.lock(), ["global-1", "global-2", "route-all", "route-get"]);

    trace.lock().clear();
    let resp = router.serve(Request::new("POST", "/items")).await;
    assert_eq!(resp.status_code(), StatusCode::CREATED);
    assert_eq!(*trace.lock(), ["global-1", "global-2", "route-all"]);
}

#[tokio::test]
async fn unimplemented_methods_are_still_decorated() {
    let trace = Trace::default();
    let mut router = Router::new();
    router.add_middleware(tag("global", &trace));
    router.register("/items", ReadWrite, []).unwrap();

    let resp = router.serve(Request::new("DELETE", "/items")).await;

    assert_eq!(resp.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(*trace.lock(), ["global"]);
}

#[tokio::test]
async fn global_middleware_only_decorates_later_registrations() {
    let trace = Trace::default();
    let mut router = Router::new();
    router.register("/early", ReadWrite, []).unwrap();
    router.add_middleware(tag("late", &trace));
    router.register("/later", ReadWrite, []).unwrap();

    router.serve(Request::new("GET", "/early")).await;
    assert!(trace.lock().is_empty());

    router.serve(Request::new("GET", "/later")).await;
    assert_eq!(*trace.lock(), ["late"]);
}

#[tokio::test]
async fn verbs_outside_the_method_set_are_not_implemented() {
    let mut router = Router::new().not_implemented_handler(|_: Context, req: Request, _: Span| async move {
        Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .text(format!("{} not supported", req.method()))
    });
    router.register("/pot", EmptySpec, []).unwrap();

    let resp = router.serve(Request::new("BREW", "/pot")).await;

    assert_eq!(resp.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.into_bytes().await.unwrap().as_ref(), b"BREW not supported");
}

#[tokio::test]
async fn unknown_verbs_skip_global_middleware() {
    let trace = Trace::default();
    let mut router = Router::new();
    router.add_middleware(tag("global", &trace));
    router.register("/pot", ReadWrite, []).unwrap();

    let resp = router.serve(Request::new("BREW", "/pot")).await;
    assert_eq!(resp.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(trace.lock().is_empty());

    let resp = router.serve(Request::new("DELETE", "/pot")).await;
    assert_eq!(resp.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(*trace.lock(), ["global"]);
}

struct Greeter(&'static str);

#[derive(Default)]
struct Greeting {
    greeter: Option<Arc<Greeter>>,
}

#[async_trait]
impl ResourceSpec for Greeting {
    fn inject(&mut self, services: &Services) -> Result<(), BoxError> {
        self.greeter = Some(services.require::<Greeter>()?);
        Ok(())
    }

    async fn get(&self, _ctx: Context, req: Request, _span: Span) -> Response {
        let greeting = self.greeter.as_ref().map_or("?", |g| g.0);
        Response::text(format!("{greeting}, {}", req.param("name").unwrap_or("stranger")))
    }
}

#[tokio::test]
async fn resources_receive_registered_services() {
    let mut services = Services::new();
    services.insert(Greeter("hello"));
    let mut router = Router::new().services(services);
    router.register("/greet/{name}", Greeting::default(), []).unwrap();

    let resp = router.serve(Request::new("GET", "/greet/ada")).await;

    assert_eq!(resp.into_bytes().await.unwrap().as_ref(), b"hello, ada");
}

#[tokio::test]
async fn missing_service_fails_registration() {
    let mut router = Router::new();

    let err = router.register("/greet/{name}", Greeting::default(), []).unwrap_err();

    assert!(matches!(err, Error::Inject(_)), "{err:?}");
    assert!(!router.has_route("/greet/{name}"));
    let resp = router.serve(Request::new("GET", "/greet/ada")).await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
}

struct Exploding;

#[async_trait]
impl ResourceSpec for Exploding {
    async fn get(&self, _ctx: Context, _req: Request, _span: Span) -> Response {
        panic!("kaboom");
    }
}

#[tokio::test]
async fn recovered_panic_still_carries_request_id() {
    let mut router = Router::new();
    router.add_middleware(RequestIdMiddleware::new());
    router.add_middleware(RecoverMiddleware::new());
    router.register("/boom", Exploding, []).unwrap();

    let req = Request::new("GET", "/boom").with_header(REQUEST_ID_HEADER, "req-77");
    let resp = router.serve(req).await;

    assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.header(REQUEST_ID_HEADER), Some("req-77"));

    // The router keeps serving after a recovered panic.
    let resp = router.serve(Request::new("GET", "/boom")).await;
    assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.header(REQUEST_ID_HEADER).map(str::len), Some(36));
}
