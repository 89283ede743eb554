//! Response cache middleware.
//!
//! Serves `GET` responses out of a [`Cache`], keyed by request path. Every other
//! method goes straight to the wrapped handler without touching the cache.
//!
//! | Situation | Handler runs | Returned |
//! |---|---|---|
//! | cache read fails | no | error factory |
//! | miss (`None` or empty value) | yes | handler's response, written to the cache |
//! | hit, value decodes | no | cached response |
//! | hit, value is junk | no | error factory |
//! | write fails after a miss | yes | error factory |
//!
//! A failed write replaces the handler's response even though the handler's
//! side effects already happened: the client must not be told it got a
//! response the cache does not hold.

mod codec;

use std::sync::Arc;

use tracing::{Span, debug, warn};

pub use codec::{CodecError, deserialize, serialize};

use super::{ErrorFactory, Middleware, default_error_factory};
use crate::cache::Cache;
use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{BoxedHandler, handler_fn};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// What went wrong while consulting or filling the cache. Handed to the
/// error factory.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache read failed: {0}")]
    Read(#[source] BoxError),

    #[error("cached response could not be decoded: {0}")]
    Decode(#[source] CodecError),

    #[error("response could not be encoded: {0}")]
    Encode(#[source] CodecError),

    #[error("cache write failed: {0}")]
    Write(#[source] BoxError),
}

/// Cache key for a request path: outer slashes trimmed, inner slashes mapped
/// to `.` (`/foo/bar` → `foo.bar`).
pub fn cache_key(path: &str) -> String {
    path.trim_matches('/').replace('/', ".")
}

/// Middleware that serves `GET` responses from a [`Cache`].
///
/// ```rust
/// use std::sync::Arc;
/// use arbor::cache::MemoryCache;
/// use arbor::middleware::cache::ResponseCache;
///
/// let responses = ResponseCache::new(Some(Arc::new(MemoryCache::new())))
///     .tags(["users"]);
/// ```
#[derive(Clone)]
pub struct ResponseCache {
    cache: Option<Arc<dyn Cache>>,
    tags: Arc<[String]>,
    error_factory: ErrorFactory<CacheError>,
}

impl ResponseCache {
    /// With `None`, the middleware passes every request through untouched.
    pub fn new(cache: Option<Arc<dyn Cache>>) -> Self {
        Self {
            cache,
            tags: Arc::from([]),
            error_factory: default_error_factory(),
        }
    }

    /// Labels attached to every value this middleware writes, for bulk
    /// invalidation with [`Cache::bust_tags`].
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Response returned on read, decode, encode, and write failures.
    /// Defaults to an empty `500`.
    pub fn error_factory(mut self, factory: impl Fn(&CacheError) -> Response + Send + Sync + 'static) -> Self {
        self.error_factory = Arc::new(factory);
        self
    }
}

impl Middleware for ResponseCache {
    fn convert(&self, handler: BoxedHandler) -> Result<BoxedHandler, BoxError> {
        let Some(cache) = self.cache.clone() else {
            return Ok(handler);
        };

        let layer = Arc::new(Layer {
            cache,
            tags: Arc::clone(&self.tags),
            error_factory: Arc::clone(&self.error_factory),
            inner: handler,
        });

        Ok(handler_fn(move |ctx: Context, req: Request, span: Span| {
            let layer = Arc::clone(&layer);
            async move { layer.respond(ctx, req, span).await }
        }))
    }
}

struct Layer {
    cache: Arc<dyn Cache>,
    tags: Arc<[String]>,
    error_factory: ErrorFactory<CacheError>,
    inner: BoxedHandler,
}

impl Layer {
    async fn respond(&self, ctx: Context, req: Request, span: Span) -> Response {
        if req.method() != Method::Get.as_str() {
            return self.inner.call(ctx, req, span).await;
        }

        let key = cache_key(req.path());

        match self.cache.get_value(&key).await {
            Err(e) => return self.fail(&span, &key, CacheError::Read(e)),
            Ok(Some(value)) if !value.is_empty() => {
                return match deserialize(&value) {
                    Ok(resp) => {
                        debug!(parent: &span, key = %key, "cache hit");
                        resp
                    }
                    Err(e) => self.fail(&span, &key, CacheError::Decode(e)),
                };
            }
            Ok(_) => debug!(parent: &span, key = %key, "cache miss"),
        }

        let resp = self.inner.call(ctx, req, span.clone()).await;

        let (value, resp) = match serialize(resp).await {
            Ok(encoded) => encoded,
            Err(e) => return self.fail(&span, &key, CacheError::Encode(e)),
        };

        if let Err(e) = self.cache.set_value(&key, value, &self.tags).await {
            return self.fail(&span, &key, CacheError::Write(e));
        }

        resp
    }

    fn fail(&self, span: &Span, key: &str, error: CacheError) -> Response {
        warn!(parent: span, key, error = %error, "response cache failure");
        (self.error_factory)(&error)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use parking_lot::Mutex;

    use super::*;

    type GetFn = Box<dyn Fn(&str) -> Result<Option<String>, BoxError> + Send + Sync>;
    type SetFn = Box<dyn Fn(&str, &str, &[String]) -> Result<(), BoxError> + Send + Sync>;

    /// Records calls; behavior is swappable per test.
    struct MockCache {
        get: GetFn,
        set: SetFn,
        gets: Mutex<Vec<String>>,
        sets: Mutex<Vec<(String, String, Vec<String>)>>,
    }

    impl MockCache {
        fn new() -> Self {
            Self {
                get: Box::new(|_| Ok(None)),
                set: Box::new(|_, _, _| Ok(())),
                gets: Mutex::new(Vec::new()),
                sets: Mutex::new(Vec::new()),
            }
        }

        fn on_get(mut self, f: impl Fn(&str) -> Result<Option<String>, BoxError> + Send + Sync + 'static) -> Self {
            self.get = Box::new(f);
            self
        }

        fn on_set(mut self, f: impl Fn(&str, &str, &[String]) -> Result<(), BoxError> + Send + Sync + 'static) -> Self {
            self.set = Box::new(f);
            self
        }
    }

    #[async_trait::async_trait]
    impl Cache for MockCache {
        async fn get_value(&self, key: &str) -> Result<Option<String>, BoxError> {
            self.gets.lock().push(key.to_owned());
            (self.get)(key)
        }

        async fn set_value(&self, key: &str, value: String, tags: &[String]) -> Result<(), BoxError> {
            self.sets.lock().push((key.to_owned(), value.clone(), tags.to_vec()));
            (self.set)(key, &value, tags)
        }

        async fn remove(&self, _key: &str) -> Result<(), BoxError> {
            Ok(())
        }

        async fn bust_tags(&self, _tags: &[String]) -> Result<(), BoxError> {
            Ok(())
        }
    }

    /// A handler returning `201 foobar` that counts its invocations.
    fn counting_handler(calls: &Arc<Mutex<usize>>) -> BoxedHandler {
        let calls = Arc::clone(calls);
        handler_fn(move |_: Context, _: Request, _: Span| {
            *calls.lock() += 1;
            async {
                Response::builder().status(StatusCode::CREATED).text("foobar")
            }
        })
    }

    fn whoopsie(_: &CacheError) -> Response {
        Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .json(br#"{"message":"cache whoopsie"}"#.to_vec())
    }

    async fn get(handler: &BoxedHandler, method: &str, path: &str) -> Response {
        handler.call(Context::new(), Request::new(method, path), Span::none()).await
    }

    async fn cached_value(status: StatusCode, body: &str) -> String {
        let resp = Response::builder().status(status).text(body.to_owned());
        serialize(resp).await.unwrap().0
    }

    #[test]
    fn key_maps_path_separators() {
        assert_eq!(cache_key("/foo/bar"), "foo.bar");
        assert_eq!(cache_key("/foo/bar/"), "foo.bar");
        assert_eq!(cache_key("/users/42/posts"), "users.42.posts");
        assert_eq!(cache_key("/"), "");
    }

    #[tokio::test]
    async fn hit_skips_handler() {
        let value = cached_value(StatusCode::CREATED, "cached").await;
        let cache = Arc::new(MockCache::new().on_get(move |key| {
            assert_eq!(key, "foo.bar");
            Ok(Some(value.clone()))
        }));
        let calls = Arc::new(Mutex::new(0));

        let wrapped = ResponseCache::new(Some(cache.clone())).convert(counting_handler(&calls)).unwrap();
        let resp = get(&wrapped, "GET", "/foo/bar").await;

        assert_eq!(*calls.lock(), 0);
        assert_eq!(resp.status_code(), StatusCode::CREATED);
        assert_eq!(resp.into_bytes().await.unwrap().as_ref(), b"cached");
        assert!(cache.sets.lock().is_empty());
    }

    #[tokio::test]
    async fn read_error_skips_handler() {
        let cache = Arc::new(MockCache::new().on_get(|_| Err("utoh".into())));
        let calls = Arc::new(Mutex::new(0));

        let wrapped = ResponseCache::new(Some(cache))
            .error_factory(whoopsie)
            .convert(counting_handler(&calls))
            .unwrap();
        let resp = get(&wrapped, "GET", "/foo/bar").await;

        assert_eq!(*calls.lock(), 0);
        assert_eq!(resp.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.into_bytes().await.unwrap().as_ref(), br#"{"message":"cache whoopsie"}"#);
    }

    #[tokio::test]
    async fn junk_value_skips_handler() {
        let cache = Arc::new(MockCache::new().on_get(|_| Ok(Some("foobar".into()))));
        let calls = Arc::new(Mutex::new(0));
        let seen = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&seen);

        let wrapped = ResponseCache::new(Some(cache))
            .error_factory(move |e| {
                *recorded.lock() = Some(matches!(e, CacheError::Decode(_)));
                whoopsie(e)
            })
            .convert(counting_handler(&calls))
            .unwrap();
        let resp = get(&wrapped, "GET", "/foo/bar").await;

        assert_eq!(*calls.lock(), 0);
        assert_eq!(*seen.lock(), Some(true));
        assert_eq!(resp.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn write_error_replaces_handler_response() {
        let cache = Arc::new(MockCache::new().on_set(|_, _, _| Err("utoh".into())));
        let calls = Arc::new(Mutex::new(0));

        let wrapped = ResponseCache::new(Some(cache.clone()))
            .error_factory(whoopsie)
            .convert(counting_handler(&calls))
            .unwrap();
        let resp = get(&wrapped, "GET", "/foo/bar").await;

        assert_eq!(*calls.lock(), 1);
        assert_eq!(cache.sets.lock().len(), 1);
        assert_eq!(resp.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn default_error_response_is_empty_500() {
        let cache = Arc::new(MockCache::new().on_get(|_| Err("utoh".into())));
        let calls = Arc::new(Mutex::new(0));

        let wrapped = ResponseCache::new(Some(cache)).convert(counting_handler(&calls)).unwrap();
        let resp = get(&wrapped, "GET", "/foo/bar").await;

        assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().is_empty());
        assert!(resp.into_bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn miss_writes_tagged_entry() {
        let cache = Arc::new(MockCache::new());
        let calls = Arc::new(Mutex::new(0));

        let wrapped = ResponseCache::new(Some(cache.clone()))
            .tags(["foo", "bar", "baz"])
            .convert(counting_handler(&calls))
            .unwrap();
        let resp = get(&wrapped, "GET", "/foo/bar").await;

        assert_eq!(*calls.lock(), 1);
        assert_eq!(resp.status_code(), StatusCode::CREATED);
        assert_eq!(resp.into_bytes().await.unwrap().as_ref(), b"foobar");

        let sets = cache.sets.lock();
        assert_eq!(sets.len(), 1);
        let (key, value, tags) = &sets[0];
        assert_eq!(key, "foo.bar");
        assert_eq!(tags, &["foo", "bar", "baz"]);

        let stored = deserialize(value).unwrap();
        assert_eq!(stored.status_code(), StatusCode::CREATED);
        assert_eq!(stored.body().as_bytes().unwrap().as_ref(), b"foobar");
    }

    #[tokio::test]
    async fn empty_value_is_a_miss() {
        let cache = Arc::new(MockCache::new().on_get(|_| Ok(Some(String::new()))));
        let calls = Arc::new(Mutex::new(0));

        let wrapped = ResponseCache::new(Some(cache.clone())).convert(counting_handler(&calls)).unwrap();
        let resp = get(&wrapped, "GET", "/foo/bar").await;

        assert_eq!(*calls.lock(), 1);
        assert_eq!(resp.status_code(), StatusCode::CREATED);
        assert_eq!(cache.sets.lock().len(), 1);
    }

    #[tokio::test]
    async fn other_methods_never_touch_cache() {
        let cache = Arc::new(MockCache::new());
        let calls = Arc::new(Mutex::new(0));
        let wrapped = ResponseCache::new(Some(cache.clone())).convert(counting_handler(&calls)).unwrap();

        for method in ["OPTIONS", "POST", "PUT", "PATCH", "DELETE", "HEAD"] {
            get(&wrapped, method, "/foo/bar").await;
        }

        assert_eq!(*calls.lock(), 6);
        assert!(cache.gets.lock().is_empty());
        assert!(cache.sets.lock().is_empty());
    }

    #[tokio::test]
    async fn streamed_response_is_served_from_cache_on_second_get() {
        let calls = Arc::new(Mutex::new(0));
        let counted = Arc::clone(&calls);
        let streaming = handler_fn(move |_: Context, _: Request, _: Span| {
            *counted.lock() += 1;
            async {
                Response::builder()
                    .status(StatusCode::CREATED)
                    .header("x-a", "1")
                    .header("x-a", "2")
                    .header("x-b", "k=v;,\"")
                    .stream(&b"streamed-body"[..])
            }
        });
        let expected: Vec<(String, String)> = [("x-a", "1"), ("x-a", "2"), ("x-b", "k=v;,\"")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let cache: Arc<dyn Cache> = Arc::new(crate::cache::MemoryCache::new());
        let wrapped = ResponseCache::new(Some(cache)).convert(streaming).unwrap();

        let miss = get(&wrapped, "GET", "/feed").await;
        assert_eq!(miss.status_code(), StatusCode::CREATED);
        assert_eq!(miss.headers(), expected.as_slice());
        assert_eq!(miss.into_bytes().await.unwrap().as_ref(), b"streamed-body");

        let hit = get(&wrapped, "GET", "/feed").await;
        assert_eq!(hit.status_code(), StatusCode::CREATED);
        assert_eq!(hit.headers(), expected.as_slice());
        assert_eq!(hit.into_bytes().await.unwrap().as_ref(), b"streamed-body");

        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test]
    async fn absent_cache_passes_through() {
        let calls = Arc::new(Mutex::new(0));
        let wrapped = ResponseCache::new(None).convert(counting_handler(&calls)).unwrap();

        let resp = get(&wrapped, "GET", "/foo/bar").await;
        assert_eq!(*calls.lock(), 1);
        assert_eq!(resp.status_code(), StatusCode::CREATED);
    }
}
