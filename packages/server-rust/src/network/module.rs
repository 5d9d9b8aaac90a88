//! Network module with deferred startup lifecycle.
//!
//! `new()` creates resources, `start()` binds the TCP listener, and
//! `serve()` starts accepting connections. Callers can grab the shutdown
//! controller between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    add_field_handler, archive_workshop_handler, cancel_registration_handler, changes_handler,
    create_workshop_handler, get_form_handler, get_waitlist_handler, get_workshop_handler,
    health_handler, liveness_handler, promote_handler, publish_workshop_handler,
    readiness_handler, remove_field_handler, reorder_fields_handler,
    set_default_fields_handler, submit_handler, update_field_handler, validate_schema_handler,
    AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::service::ServiceStack;

/// Owns the HTTP listener and serves the API over a [`ServiceStack`].
///
/// 1. `new()` -- allocates the shutdown controller
/// 2. `start()` -- binds the TCP listener
/// 3. `serve()` -- accepts connections until shutdown is signalled, then
///    drains in-flight requests and shuts the stack down
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    stack: Arc<ServiceStack>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, stack: Arc<ServiceStack>) -> Self {
        Self {
            config,
            listener: None,
            stack,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        build_router(
            &self.config,
            Arc::clone(&self.stack),
            Arc::clone(&self.shutdown),
        )
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured
    /// port when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until the shutdown signal fires.
    ///
    /// After the signal the health state moves to Draining, in-flight
    /// requests get up to `drain_timeout` to finish, and the service stack
    /// is shut down (which flushes queued notifications).
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called, on a fatal I/O error,
    /// or if the stack fails to shut down.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };

        // Transition to Ready so readiness probes pass.
        self.shutdown.set_ready();
        info!("Serving HTTP connections");

        let controller = Arc::clone(&self.shutdown);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                controller.trigger_shutdown();
            })
            .await?;

        drain(&self.shutdown, &self.config).await;
        self.stack.shutdown().await
    }
}

/// Router over `stack` with the API routes and HTTP middleware.
#[must_use]
pub fn build_router(
    config: &NetworkConfig,
    stack: Arc<ServiceStack>,
    shutdown: Arc<ShutdownController>,
) -> Router {
    let state = AppState {
        stack,
        shutdown,
        config: Arc::new(config.clone()),
        start_time: Instant::now(),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/workshops", post(create_workshop_handler))
        .route("/workshops/{id}", get(get_workshop_handler))
        .route("/workshops/{id}/publish", post(publish_workshop_handler))
        .route("/workshops/{id}/archive", post(archive_workshop_handler))
        .route("/workshops/{id}/form", get(get_form_handler))
        .route("/workshops/{id}/form/defaults", put(set_default_fields_handler))
        .route("/workshops/{id}/form/fields", post(add_field_handler))
        .route(
            "/workshops/{id}/form/fields/{field_id}",
            patch(update_field_handler).delete(remove_field_handler),
        )
        .route("/workshops/{id}/form/order", put(reorder_fields_handler))
        .route("/workshops/{id}/form/validate", post(validate_schema_handler))
        .route("/workshops/{id}/registrations", post(submit_handler))
        .route(
            "/workshops/{id}/registrations/{registration_id}",
            delete(cancel_registration_handler),
        )
        .route("/workshops/{id}/waitlist", get(get_waitlist_handler))
        .route("/workshops/{id}/waitlist/promote", post(promote_handler))
        .route("/sync/workshops", get(changes_handler))
        .layer(build_http_layers(config))
        .with_state(state)
}

async fn drain(shutdown: &ShutdownController, config: &NetworkConfig) {
    shutdown.trigger_shutdown();
    if shutdown.wait_for_drain(config.drain_timeout).await {
        info!("All in-flight requests drained");
    } else {
        warn!(
            in_flight = shutdown.in_flight_count(),
            "Drain timeout expired with in-flight requests remaining"
        );
    }
}
