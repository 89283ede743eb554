//! Unified error type.

/// Error type produced by collaborators the crate does not own: middleware
/// conversion, service injection, cache backends, authorizers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by arbor's fallible operations.
///
/// Application-level failures (404, 405, 500, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// setup-time failures (registering a resource, loading configuration) and
/// infrastructure failures (binding to a port).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resource already registered to url pattern `{0}`")]
    DuplicatePattern(String),

    #[error("invalid url pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("failed to inject services: {0}")]
    Inject(#[source] BoxError),

    #[error("failed to apply middleware: {0}")]
    Middleware(#[source] BoxError),

    #[error("missing service `{0}`")]
    MissingService(&'static str),

    #[error("route initializer failed: {0}")]
    Initializer(#[source] BoxError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
