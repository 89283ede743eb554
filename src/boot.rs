//! Application entry point.

use tracing::info;

use crate::config::ServerConfig;
use crate::error::{BoxError, Error};
use crate::router::Router;
use crate::server::Server;
use crate::services::Services;

/// Registers an application's resources and middleware.
pub trait RouteInitializer {
    fn init(&self, config: &ServerConfig, router: &mut Router) -> Result<(), BoxError>;
}

impl<F> RouteInitializer for F
where
    F: Fn(&ServerConfig, &mut Router) -> Result<(), BoxError>,
{
    fn init(&self, config: &ServerConfig, router: &mut Router) -> Result<(), BoxError> {
        self(config, router)
    }
}

/// Builds a router over `services` and lets `initializer` populate it.
pub fn build_router(config: &ServerConfig, services: Services, initializer: &impl RouteInitializer) -> Result<Router, Error> {
    let mut router = Router::new().services(services);
    initializer.init(config, &mut router).map_err(Error::Initializer)?;
    Ok(router)
}

/// Loads [`ServerConfig`] from the environment, builds the router and serves
/// it until SIGTERM or Ctrl-C.
///
/// ```rust,no_run
/// use arbor::{boot, BoxError, EmptySpec, Router, ServerConfig, Services};
///
/// #[tokio::main]
/// async fn main() -> Result<(), arbor::Error> {
///     boot("inventory", Services::new(), |_: &ServerConfig, router: &mut Router| -> Result<(), BoxError> {
///         router.register("/items", EmptySpec, [])?;
///         Ok(())
///     })
///     .await
/// }
/// ```
pub async fn boot(name: &str, services: Services, initializer: impl RouteInitializer) -> Result<(), Error> {
    let config = ServerConfig::from_env()?;
    let router = build_router(&config, services, &initializer)?;

    info!(service = name, host = %config.host, port = config.port, "booting");
    Server::from_config(&config)?.serve(router).await
}
