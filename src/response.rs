//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Headers are an ordered multi-map: a list of `(name, value)` pairs in the
//! order they were added. Repeating a name keeps every value. The body is
//! either a buffer or a live reader; [`Response::buffer`] drains the latter.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A streaming body source. Dropping it closes the stream.
pub type BodyReader = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// The payload of a [`Response`].
pub enum Body {
    Full(Bytes),
    Stream(BodyReader),
}

impl Body {
    /// Reads the whole body into memory. A stream is consumed.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }

    /// The buffered content, or `None` for a stream.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Full(bytes) => Some(bytes),
            Self::Stream(_) => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use arbor::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::empty(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use arbor::Response;
/// use http::StatusCode;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Body,
}

impl Response {
    /// Response with no body and no headers.
    pub fn empty(status: StatusCode) -> Self {
        Self::from_parts(status, Vec::new(), Bytes::new())
    }

    /// `200 OK`, `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK` with a body read from `reader` when the response is written.
    pub fn stream(reader: impl AsyncRead + Send + 'static) -> Self {
        Self { status: StatusCode::OK, headers: Vec::new(), body: Body::Stream(Box::pin(reader)) }
    }

    pub fn from_parts(status: StatusCode, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: Body::Full(body.into()) }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn set_status_code(&mut self, status: StatusCode) { self.status = status; }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Body { &self.body }

    /// First value of header `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of header `name`, in the order they were added.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Appends a value, keeping any existing values of the same header.
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Replaces every existing value of the header with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.add_header(name, value);
    }

    /// Drains a streaming body into memory. Status and headers are kept.
    pub async fn buffer(self) -> io::Result<Self> {
        let Self { status, headers, body } = self;
        let bytes = body.into_bytes().await?;
        Ok(Self { status, headers, body: Body::Full(bytes) })
    }

    /// Consumes the response, returning its full body.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        self.body.into_bytes().await
    }

    /// Converts into the form hyper writes to the wire.
    ///
    /// Headers that are not valid HTTP field names or values are dropped.
    pub(crate) async fn into_http(self) -> io::Result<http::Response<Full<Bytes>>> {
        let Self { status, headers, body } = self;
        let bytes = body.into_bytes().await?;

        let mut out = http::Response::new(Full::new(bytes));
        *out.status_mut() = status;
        for (name, value) in headers {
            match (
                http::HeaderName::try_from(name.as_str()),
                http::HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    out.headers_mut().append(name, value);
                }
                _ => tracing::warn!(header = %name, "dropping invalid response header"),
            }
        }
        Ok(out)
    }
}

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish("application/json", body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", body.into().into())
    }

    /// Terminate with a body of any content type.
    pub fn bytes(self, content_type: &str, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    /// Terminate with a streaming body.
    pub fn stream(self, reader: impl AsyncRead + Send + 'static) -> Response {
        Response { status: self.status, headers: self.headers, body: Body::Stream(Box::pin(reader)) }
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(self) -> Response {
        Response::from_parts(self.status, self.headers, Bytes::new())
    }

    fn finish(self, content_type: &str, body: Bytes) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response::from_parts(self.status, headers, body)
    }
}

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::empty(self) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_headers_keep_every_value_in_order() {
        let mut resp = Response::empty(StatusCode::OK);
        resp.add_header("X-Order", "a");
        resp.add_header("x-order", "b");
        resp.add_header("X-Order", "c");

        let values: Vec<_> = resp.header_values("X-ORDER").collect();
        assert_eq!(values, ["a", "b", "c"]);
        assert_eq!(resp.header("x-order"), Some("a"));
    }

    #[test]
    fn set_header_replaces_all_values() {
        let mut resp = Response::builder()
            .header("X-Request-ID", "old")
            .header("x-request-id", "older")
            .no_body();
        resp.set_header("X-Request-ID", "new");

        assert_eq!(resp.header_values("x-request-id").collect::<Vec<_>>(), ["new"]);
    }

    #[tokio::test]
    async fn buffering_drains_stream_and_keeps_metadata() {
        let resp = Response::builder()
            .status(StatusCode::CREATED)
            .header("x-kind", "stream")
            .stream(&b"streamed body"[..]);

        let resp = resp.buffer().await.unwrap();
        assert_eq!(resp.status_code(), StatusCode::CREATED);
        assert_eq!(resp.header("x-kind"), Some("stream"));
        assert_eq!(resp.body().as_bytes().unwrap().as_ref(), b"streamed body");
    }

    #[tokio::test]
    async fn into_http_preserves_duplicate_headers() {
        let mut resp = Response::text("hi");
        resp.add_header("set-cookie", "a=1");
        resp.add_header("set-cookie", "b=2");

        let out = resp.into_http().await.unwrap();
        let cookies: Vec<_> = out.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
    }
}
