//! Cache value encoding for responses.
//!
//! A response is stored as a JSON document:
//!
//! ```text
//! {"status": 201, "headers": [["x-order", "a"], ["x-order", "b"]], "body": "<base64>"}
//! ```
//!
//! Headers keep their order and duplicates. The body is base64 so arbitrary
//! bytes survive the string-valued cache.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::response::Response;

/// Why a response could not be encoded or a cache value decoded.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to read response body: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed cache value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed cached body: {0}")]
    Body(#[from] base64::DecodeError),

    #[error("invalid cached status: {0}")]
    Status(#[from] http::status::InvalidStatusCode),
}

#[derive(Serialize, Deserialize)]
struct CachedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

/// Encodes `resp` as a cache value.
///
/// A streaming body is drained first; the returned response carries the same
/// status, headers, and content with a buffered body, ready to be sent.
pub async fn serialize(resp: Response) -> Result<(String, Response), CodecError> {
    let Response { status, headers, body } = resp;
    let bytes = body.into_bytes().await?;

    let cached = CachedResponse {
        status: status.as_u16(),
        headers: headers.clone(),
        body: STANDARD.encode(&bytes),
    };
    Ok((serde_json::to_string(&cached)?, Response::from_parts(status, headers, bytes)))
}

/// Decodes a cache value produced by [`serialize`].
pub fn deserialize(value: &str) -> Result<Response, CodecError> {
    let cached: CachedResponse = serde_json::from_str(value)?;
    let status = StatusCode::from_u16(cached.status)?;
    let body = STANDARD.decode(cached.body)?;
    Ok(Response::from_parts(status, cached.headers, body))
}
