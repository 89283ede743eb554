//! Authorization middleware.
//!
//! [`AuthMiddleware`] asks an [`Authorizer`] about every request before the
//! wrapped handler runs. An authorized request reaches the handler with the
//! authorizer's payload in its [`Context`]; see [`auth_payload`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;
use tracing::{Span, error};

use super::{ErrorFactory, Middleware, ResponseFactory, default_error_factory};
use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{BoxedHandler, handler_fn};
use crate::request::Request;
use crate::response::Response;

/// Outcome of [`Authorizer::authorize`].
pub enum AuthResult<P> {
    Authorized(P),
    /// Credentials were valid but do not grant access.
    Forbidden,
    /// Credentials were missing or unusable.
    Unauthorized(Option<BoxError>),
    /// The authorizer itself failed.
    Invalid(BoxError),
}

impl<P> fmt::Debug for AuthResult<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthResult::Authorized(_) => f.write_str("Authorized"),
            AuthResult::Forbidden => f.write_str("Forbidden"),
            AuthResult::Unauthorized(err) => f.debug_tuple("Unauthorized").field(err).finish(),
            AuthResult::Invalid(err) => f.debug_tuple("Invalid").field(err).finish(),
        }
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync + 'static {
    type Payload: Send + Sync + 'static;

    async fn authorize(&self, ctx: &Context, req: &Request) -> AuthResult<Self::Payload>;
}

/// The payload of a successful authorization, as stored in the [`Context`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthPayload<P>(pub P);

pub fn auth_payload<P: Send + Sync + 'static>(ctx: &Context) -> Option<&P> {
    ctx.get::<AuthPayload<P>>().map(|payload| &payload.0)
}

pub type UnauthorizedFactory = Arc<dyn Fn(Option<&BoxError>) -> Response + Send + Sync>;

pub struct AuthMiddleware<A> {
    authorizer: Arc<A>,
    error_factory: ErrorFactory,
    forbidden_factory: ResponseFactory,
    unauthorized_factory: UnauthorizedFactory,
}

impl<A: Authorizer> AuthMiddleware<A> {
    pub fn new(authorizer: A) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
            error_factory: default_error_factory(),
            forbidden_factory: Arc::new(|| Response::empty(StatusCode::FORBIDDEN)),
            unauthorized_factory: Arc::new(|_: Option<&BoxError>| Response::empty(StatusCode::UNAUTHORIZED)),
        }
    }

    /// Response for [`AuthResult::Invalid`]. Defaults to an empty `500`.
    pub fn error_factory(mut self, f: impl Fn(&BoxError) -> Response + Send + Sync + 'static) -> Self {
        self.error_factory = Arc::new(f);
        self
    }

    /// Response for [`AuthResult::Forbidden`]. Defaults to an empty `403`.
    pub fn forbidden_factory(mut self, f: impl Fn() -> Response + Send + Sync + 'static) -> Self {
        self.forbidden_factory = Arc::new(f);
        self
    }

    /// Response for [`AuthResult::Unauthorized`]. Defaults to an empty `401`.
    pub fn unauthorized_factory(mut self, f: impl Fn(Option<&BoxError>) -> Response + Send + Sync + 'static) -> Self {
        self.unauthorized_factory = Arc::new(f);
        self
    }
}

impl<A: Authorizer> Middleware for AuthMiddleware<A> {
    fn convert(&self, inner: BoxedHandler) -> Result<BoxedHandler, BoxError> {
        let authorizer = Arc::clone(&self.authorizer);
        let error_factory = Arc::clone(&self.error_factory);
        let forbidden_factory = Arc::clone(&self.forbidden_factory);
        let unauthorized_factory = Arc::clone(&self.unauthorized_factory);

        Ok(handler_fn(move |ctx: Context, req: Request, span: Span| {
            let inner = Arc::clone(&inner);
            let authorizer = Arc::clone(&authorizer);
            let error_factory = Arc::clone(&error_factory);
            let forbidden_factory = Arc::clone(&forbidden_factory);
            let unauthorized_factory = Arc::clone(&unauthorized_factory);
            async move {
                match authorizer.authorize(&ctx, &req).await {
                    AuthResult::Authorized(payload) => {
                        let ctx = ctx.with(AuthPayload(payload));
                        inner.call(ctx, req, span).await
                    }
                    AuthResult::Forbidden => forbidden_factory(),
                    AuthResult::Unauthorized(err) => unauthorized_factory(err.as_ref()),
                    AuthResult::Invalid(err) => {
                        error!(parent: &span, error = %err, "failed to invoke authorizer");
                        error_factory(&err)
                    }
                }
            }
        }))
    }
}

/// Checks a username and password taken from an `Authorization: Basic` header.
#[async_trait]
pub trait BasicAuthValidator: Send + Sync + 'static {
    async fn validate(&self, ctx: &Context, username: &str, password: &str) -> Result<bool, BoxError>;
}

struct FnValidator<F>(F);

#[async_trait]
impl<F> BasicAuthValidator for FnValidator<F>
where
    F: Fn(&str, &str) -> Result<bool, BoxError> + Send + Sync + 'static,
{
    async fn validate(&self, _ctx: &Context, username: &str, password: &str) -> Result<bool, BoxError> {
        (self.0)(username, password)
    }
}

/// The authenticated username, stored as the [`AuthPayload`] by [`BasicAuthorizer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicAuthUser(pub String);

pub fn basic_auth_username(ctx: &Context) -> Option<&str> {
    auth_payload::<BasicAuthUser>(ctx).map(|user| user.0.as_str())
}

/// HTTP basic authentication.
///
/// A request without usable credentials is unauthorized; credentials the
/// validator rejects are forbidden.
pub struct BasicAuthorizer {
    validator: Box<dyn BasicAuthValidator>,
}

impl BasicAuthorizer {
    pub fn new(validator: impl BasicAuthValidator) -> Self {
        Self { validator: Box::new(validator) }
    }

    pub fn from_fn(f: impl Fn(&str, &str) -> Result<bool, BoxError> + Send + Sync + 'static) -> Self {
        Self::new(FnValidator(f))
    }
}

#[async_trait]
impl Authorizer for BasicAuthorizer {
    type Payload = BasicAuthUser;

    async fn authorize(&self, ctx: &Context, req: &Request) -> AuthResult<BasicAuthUser> {
        let Some((username, password)) = basic_credentials(req) else {
            return AuthResult::Unauthorized(None);
        };

        match self.validator.validate(ctx, &username, &password).await {
            Ok(true) => AuthResult::Authorized(BasicAuthUser(username)),
            Ok(false) => AuthResult::Forbidden,
            Err(err) => AuthResult::Invalid(err),
        }
    }
}

fn basic_credentials(req: &Request) -> Option<(String, String)> {
    let header = req.header("authorization")?;
    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}

/// Unauthorized factory that challenges the client for basic credentials in `realm`.
pub fn basic_unauthorized_factory(realm: &str) -> impl Fn(Option<&BoxError>) -> Response + Send + Sync + use<> {
    let challenge = format!("Basic realm=\"{realm}\"");
    move |_: Option<&BoxError>| {
        let mut resp = Response::empty(StatusCode::UNAUTHORIZED);
        resp.set_header("WWW-Authenticate", &challenge);
        resp
    }
}
