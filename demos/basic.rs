//! Minimal arbor example: a user resource with cached reads.
//!
//! Run with:
//!   HTTP_PORT=3000 RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -X PUT http://localhost:3000/users/42 -d 'bob'
//!   curl -i -X DELETE -u admin:secret http://localhost:3000/users/42
//!   curl -i -X PATCH http://localhost:3000/users/42

use std::collections::HashMap;
use std::sync::Arc;

use arbor::cache::{Cache, MemoryCache};
use arbor::middleware::auth::{AuthMiddleware, BasicAuthorizer, basic_auth_username, basic_unauthorized_factory};
use arbor::middleware::cache::ResponseCache;
use arbor::middleware::logging::LoggingMiddleware;
use arbor::middleware::recover::RecoverMiddleware;
use arbor::middleware::request_id::{RequestIdMiddleware, request_id};
use arbor::middleware::{with_middleware, with_middleware_for};
use arbor::{
    BoxError, Context, Method, Request, ResourceSpec, Response, Router, ServerConfig, Services, async_trait, boot,
};
use http::StatusCode;
use parking_lot::RwLock;
use tracing::{Span, info};

const USERS_TAG: &str = "users";

#[derive(Default)]
struct UserStore {
    names: RwLock<HashMap<String, String>>,
}

#[derive(Default)]
struct UserResource {
    store: Arc<UserStore>,
    cache: Option<Arc<dyn Cache>>,
}

#[async_trait]
impl ResourceSpec for UserResource {
    fn inject(&mut self, services: &Services) -> Result<(), BoxError> {
        let cache: Arc<dyn Cache> = services.require::<MemoryCache>()?;
        self.store = services.require::<UserStore>()?;
        self.cache = Some(cache);
        Ok(())
    }

    async fn get(&self, ctx: Context, req: Request, span: Span) -> Response {
        let id = req.param("id").unwrap_or_default();
        info!(parent: &span, request_id = request_id(&ctx), "loading user {id}");

        match self.store.names.read().get(id) {
            Some(name) => Response::json(format!(r#"{{"id":"{id}","name":"{name}"}}"#).into_bytes()),
            None => Response::empty(StatusCode::NOT_FOUND),
        }
    }

    async fn put(&self, _ctx: Context, req: Request, span: Span) -> Response {
        let id = req.param("id").unwrap_or_default().to_owned();
        let name = String::from_utf8_lossy(req.body()).into_owned();
        self.store.names.write().insert(id, name);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.bust_tags(&[USERS_TAG.to_owned()]).await {
                tracing::warn!(parent: &span, "failed to bust user cache: {e}");
            }
        }
        Response::empty(StatusCode::NO_CONTENT)
    }

    async fn delete(&self, ctx: Context, req: Request, _span: Span) -> Response {
        let id = req.param("id").unwrap_or_default();
        let removed = self.store.names.write().remove(id).is_some();
        Response::text(format!("{} removed {id}: {removed}", basic_auth_username(&ctx).unwrap_or("?")))
    }
}

#[tokio::main]
async fn main() -> Result<(), arbor::Error> {
    tracing_subscriber::fmt::init();

    let cache = Arc::new(MemoryCache::new());
    let mut services = Services::new();
    services.insert(UserStore::default());
    services.insert_shared(Arc::clone(&cache));

    boot("users", services, move |_: &ServerConfig, router: &mut Router| -> Result<(), BoxError> {
        router.add_middleware(LoggingMiddleware::new());
        router.add_middleware(RequestIdMiddleware::new());
        router.add_middleware(RecoverMiddleware::new());

        let admin_only = AuthMiddleware::new(BasicAuthorizer::from_fn(|user, pass| Ok(user == "admin" && pass == "secret")))
            .unauthorized_factory(basic_unauthorized_factory("users"));

        router.register(
            "/users/{id}",
            UserResource::default(),
            [
                with_middleware(ResponseCache::new(Some(cache.clone() as Arc<dyn Cache>)).tags([USERS_TAG])),
                with_middleware_for(admin_only, &[Method::Delete]),
            ],
        )?;
        Ok(())
    })
    .await
}
